//! Batch iteration for training and evaluation.

use crate::codec::encode_one_hot;
use crate::pairs::{index_pairs, load_pair};
use crate::resize::TransformPipeline;
use crate::types::{
    DatasetLayout, DatasetResult, OutOfRangePolicy, PairIndex, SegDatasetError, SegSample,
};
use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use data_contracts::LabelMap;
use rand::{seq::SliceRandom, SeedableRng};
use rayon::prelude::*;
use std::time::{Duration, Instant};

pub(crate) const DEFAULT_LOG_EVERY_SAMPLES: usize = 1000;

pub struct SegBatch<B: Backend> {
    /// Normalized images, shape `[batch, 3, height, width]`.
    pub images: Tensor<B, 4>,
    /// One-hot targets, shape `[batch, classes, height, width]`.
    pub targets: Tensor<B, 4>,
    /// Host-side ground truth, one per image, for metric computation.
    pub labels: Vec<LabelMap>,
    pub ids: Vec<String>,
}

impl<B: Backend> SegBatch<B> {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Stack already-loaded samples into a batch. All samples must share one size.
pub fn collate<B: Backend>(
    samples: &[SegSample],
    classes: usize,
    device: &B::Device,
) -> DatasetResult<SegBatch<B>> {
    let first = samples.first().ok_or(SegDatasetError::EmptyBatch)?;
    let (width, height) = (first.width, first.height);
    let plane = width as usize * height as usize;

    let mut images = Vec::with_capacity(samples.len() * 3 * plane);
    let mut targets = Vec::with_capacity(samples.len() * classes * plane);
    let mut labels = Vec::with_capacity(samples.len());
    let mut ids = Vec::with_capacity(samples.len());
    for sample in samples {
        if (sample.width, sample.height) != (width, height) {
            return Err(SegDatasetError::Other(format!(
                "batch contains varying image sizes ({} is {}x{}, expected {}x{}); set a target size",
                sample.id, sample.width, sample.height, width, height
            )));
        }
        images.extend_from_slice(&sample.image_chw);
        let one_hot = encode_one_hot(&sample.label, classes, OutOfRangePolicy::Reject)?;
        targets.extend_from_slice(&one_hot.to_chw());
        labels.push(sample.label.clone());
        ids.push(sample.id.clone());
    }

    let n = samples.len();
    let (h, w) = (height as usize, width as usize);
    let images = Tensor::<B, 4>::from_data(TensorData::new(images, [n, 3, h, w]), device);
    let targets = Tensor::<B, 4>::from_data(TensorData::new(targets, [n, classes, h, w]), device);
    Ok(SegBatch {
        images,
        targets,
        labels,
        ids,
    })
}

#[derive(Debug, Clone, Default)]
pub struct LoaderConfig {
    /// Shuffle pairs at construction and on every `reset`.
    pub shuffle: bool,
    /// Seed for reproducible shuffling.
    pub seed: Option<u64>,
    /// Drop the last partial batch.
    pub drop_last: bool,
}

pub struct BatchIter {
    pairs: Vec<PairIndex>,
    cursor: usize,
    epoch: u64,
    cfg: LoaderConfig,
    pipeline: TransformPipeline,
    processed_samples: usize,
    processed_batches: usize,
    skipped_errors: usize,
    started: Instant,
    total_load_time: Duration,
    last_log: Instant,
    last_logged_samples: usize,
    log_every_samples: Option<usize>,
    permissive_errors: bool,
}

impl BatchIter {
    pub fn from_layout(
        layout: &DatasetLayout,
        pipeline: TransformPipeline,
        cfg: LoaderConfig,
    ) -> DatasetResult<Self> {
        let pairs = index_pairs(layout)?;
        Ok(Self::from_pairs(pairs, pipeline, cfg))
    }

    pub fn from_pairs(pairs: Vec<PairIndex>, pipeline: TransformPipeline, cfg: LoaderConfig) -> Self {
        let log_every_samples = match std::env::var("SEG_DATASET_LOG_EVERY") {
            Ok(val) => {
                if val.eq_ignore_ascii_case("off") || val.trim() == "0" {
                    None
                } else {
                    val.parse::<usize>().ok().filter(|v| *v > 0)
                }
            }
            Err(_) => Some(DEFAULT_LOG_EVERY_SAMPLES),
        };
        let permissive_errors = std::env::var("SEG_DATASET_PERMISSIVE")
            .ok()
            .map(|v| v.trim().to_ascii_lowercase())
            .map(|v| v == "1" || v == "true" || v == "on")
            .unwrap_or(false);
        let now = Instant::now();
        let mut iter = Self {
            pairs,
            cursor: 0,
            epoch: 0,
            cfg,
            pipeline,
            processed_samples: 0,
            processed_batches: 0,
            skipped_errors: 0,
            started: now,
            total_load_time: Duration::ZERO,
            last_log: now,
            last_logged_samples: 0,
            log_every_samples,
            permissive_errors,
        };
        iter.shuffle();
        iter
    }

    /// Skip unreadable pairs with a warning instead of failing the batch.
    pub fn with_permissive_errors(mut self, permissive: bool) -> Self {
        self.permissive_errors = permissive;
        self
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn classes(&self) -> usize {
        self.pipeline.classes
    }

    pub fn skipped_errors(&self) -> usize {
        self.skipped_errors
    }

    /// Rewind for the next epoch, reshuffling if configured.
    pub fn reset(&mut self) {
        self.cursor = 0;
        self.epoch += 1;
        self.shuffle();
    }

    fn shuffle(&mut self) {
        if !self.cfg.shuffle {
            return;
        }
        let mut rng = match self.cfg.seed {
            Some(seed) => rand::rngs::StdRng::seed_from_u64(seed.wrapping_add(self.epoch)),
            None => rand::rngs::StdRng::from_rng(&mut rand::rng()),
        };
        self.pairs.shuffle(&mut rng);
    }

    pub fn next_batch<B: Backend>(
        &mut self,
        batch_size: usize,
        device: &B::Device,
    ) -> DatasetResult<Option<SegBatch<B>>> {
        let batch_size = batch_size.max(1);
        loop {
            if self.cursor >= self.pairs.len() {
                return Ok(None);
            }
            let end = (self.cursor + batch_size).min(self.pairs.len());
            if self.cfg.drop_last && end - self.cursor < batch_size {
                self.cursor = self.pairs.len();
                return Ok(None);
            }
            let slice = &self.pairs[self.cursor..end];
            self.cursor = end;

            let t_load = Instant::now();
            let pipeline = &self.pipeline;
            let loaded: Vec<(&PairIndex, DatasetResult<SegSample>)> = slice
                .par_iter()
                .map(|pair| (pair, load_pair(pair, pipeline)))
                .collect();
            self.total_load_time += t_load.elapsed();

            let mut samples = Vec::with_capacity(loaded.len());
            for (pair, res) in loaded {
                match res {
                    Ok(sample) => samples.push(sample),
                    Err(e) if self.permissive_errors => {
                        tracing::warn!(image = %pair.image_path.display(), "skipping pair: {e}");
                        self.skipped_errors += 1;
                    }
                    Err(e) => return Err(e),
                }
            }
            if samples.is_empty() {
                continue;
            }

            let batch = collate::<B>(&samples, self.pipeline.classes, device)?;
            self.processed_samples += batch.len();
            self.processed_batches += 1;
            self.maybe_log_progress();
            return Ok(Some(batch));
        }
    }

    fn maybe_log_progress(&mut self) {
        let Some(threshold) = self.log_every_samples else {
            return;
        };
        let processed_since = self
            .processed_samples
            .saturating_sub(self.last_logged_samples);
        let should_log =
            processed_since >= threshold || self.last_log.elapsed() >= Duration::from_secs(30);
        if !should_log {
            return;
        }
        let secs = self.started.elapsed().as_secs_f32().max(0.001);
        let avg_load_ms = if self.processed_batches > 0 {
            (self.total_load_time.as_secs_f64() * 1000.0) / self.processed_batches as f64
        } else {
            0.0
        };
        tracing::info!(
            batches = self.processed_batches,
            samples = self.processed_samples,
            skipped_errors = self.skipped_errors,
            rate = %format!("{:.1} img/s", self.processed_samples as f32 / secs),
            avg_load_ms = %format!("{avg_load_ms:.2}"),
            "[dataset] progress"
        );
        self.last_logged_samples = self.processed_samples;
        self.last_log = Instant::now();
    }
}
