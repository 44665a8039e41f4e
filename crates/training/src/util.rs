use burn::backend::Autodiff;
use burn::module::AutodiffModule;
use burn::optim::momentum::MomentumConfig;
use burn::optim::{AdamConfig, GradientsParams, Optimizer, SgdConfig};
use burn::tensor::activation::log_softmax;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use clap::{Parser, ValueEnum};
use cli_support::{PipelineArgs, PipelineConfig, ReportArgs};
use data_contracts::{ClassTensor, LabelMap};
use models::{check_input_size, Fcn8, Fcn8Config};
use seg_dataset::{decode_argmax, BatchIter, LoaderConfig, TransformPipeline};
use seg_metrics::{MetricsReport, OverlapCounts, PerClassMetrics};
use std::fs;
use std::path::{Path, PathBuf};

use crate::TrainBackend;

type ADBackend = Autodiff<TrainBackend>;

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum BackendKind {
    NdArray,
    Wgpu,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelPreset {
    /// Full VGG-16 widths with a 4096-wide conv6/conv7 head.
    Vgg16,
    /// A few channels per layer; for smoke runs.
    Tiny,
}

impl ModelPreset {
    pub fn config(self, classes: usize) -> Fcn8Config {
        match self {
            ModelPreset::Vgg16 => Fcn8Config {
                classes,
                ..Default::default()
            },
            ModelPreset::Tiny => Fcn8Config::tiny(classes),
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerKind {
    /// SGD with Nesterov momentum.
    Sgd,
    Adam,
}

#[derive(Parser, Debug)]
#[command(
    name = "train",
    about = "Train an FCN-8 segmentation model on image/label map pairs"
)]
pub struct TrainArgs {
    #[command(flatten)]
    pub pipeline: PipelineArgs,
    /// Backend to use (ndarray or wgpu if enabled).
    #[arg(long, value_enum, default_value_t = BackendKind::NdArray)]
    pub backend: BackendKind,
    /// Model size preset.
    #[arg(long, value_enum, default_value_t = ModelPreset::Vgg16)]
    pub model: ModelPreset,
    /// Number of epochs.
    #[arg(long, default_value_t = 1)]
    pub epochs: usize,
    /// Batch size.
    #[arg(long, default_value_t = 64)]
    pub batch_size: usize,
    /// Learning rate.
    #[arg(long, default_value_t = 1e-2)]
    pub lr: f64,
    /// Momentum for SGD.
    #[arg(long, default_value_t = 0.9)]
    pub momentum: f64,
    #[arg(long, value_enum, default_value_t = OptimizerKind::Sgd)]
    pub optimizer: OptimizerKind,
    /// Seed for weight init, shuffling, and flips.
    #[arg(long)]
    pub seed: Option<u64>,
    /// Checkpoint output path.
    #[arg(long, default_value = "checkpoints/fcn8.bin")]
    pub checkpoint_out: PathBuf,
    /// Pretrained encoder record to start from (saved with `Fcn8::save_encoder`).
    #[arg(long)]
    pub encoder_weights: Option<PathBuf>,
    /// Score the test split after every epoch.
    #[arg(long, default_value_t = false)]
    pub validate: bool,
}

#[derive(Parser, Debug)]
#[command(
    name = "eval",
    about = "Evaluate an FCN-8 checkpoint on the test split (per-class IoU and Dice)"
)]
pub struct EvalArgs {
    #[command(flatten)]
    pub pipeline: PipelineArgs,
    #[command(flatten)]
    pub report: ReportArgs,
    /// Backend to use (ndarray or wgpu if enabled).
    #[arg(long, value_enum, default_value_t = BackendKind::NdArray)]
    pub backend: BackendKind,
    /// Model size preset the checkpoint was trained with.
    #[arg(long, value_enum, default_value_t = ModelPreset::Vgg16)]
    pub model: ModelPreset,
    /// Checkpoint path to load.
    #[arg(long, default_value = "checkpoints/fcn8.bin")]
    pub checkpoint: PathBuf,
    /// Batch size.
    #[arg(long, default_value_t = 8)]
    pub batch_size: usize,
}

pub fn validate_backend_choice(kind: BackendKind) -> anyhow::Result<()> {
    let built_wgpu = cfg!(feature = "backend-wgpu");
    match (kind, built_wgpu) {
        (BackendKind::Wgpu, false) => {
            anyhow::bail!("backend-wgpu feature not enabled; rebuild with --features backend-wgpu or choose ndarray backend")
        }
        (BackendKind::NdArray, true) => {
            tracing::warn!("built with backend-wgpu; the WGPU backend is used despite --backend nd-array");
        }
        _ => {}
    }
    Ok(())
}

/// Categorical cross-entropy between one-hot `targets` and class `logits`, both
/// `[batch, classes, height, width]`, averaged over pixels.
pub fn cross_entropy<B: Backend>(logits: Tensor<B, 4>, targets: Tensor<B, 4>) -> Tensor<B, 1> {
    let log_probs = log_softmax(logits, 1);
    (targets * log_probs).sum_dim(1).mean().neg()
}

/// Class maps for a batch of images: softmax probabilities, arg-max per pixel.
pub fn predict_label_maps<B: Backend>(
    model: &Fcn8<B>,
    images: Tensor<B, 4>,
) -> anyhow::Result<Vec<LabelMap>> {
    let probs = model.forward_probs(images)?;
    let [batch, classes, height, width] = probs.dims();
    let data = probs
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| anyhow::anyhow!("failed to read predictions: {e:?}"))?;
    let per_image = classes * height * width;
    data.chunks_exact(per_image.max(1))
        .take(batch)
        .map(|chw| -> anyhow::Result<LabelMap> {
            let tensor = ClassTensor::from_chw(height, width, classes, chw)?;
            Ok(decode_argmax(&tensor))
        })
        .collect()
}

/// Pool overlap counts for every batch the loader yields. Returns counts and image count.
pub fn evaluate<B: Backend>(
    model: &Fcn8<B>,
    loader: &mut BatchIter,
    batch_size: usize,
    device: &B::Device,
) -> anyhow::Result<(OverlapCounts, usize)> {
    let mut counts = OverlapCounts::new(model.classes());
    let mut images = 0;
    while let Some(batch) = loader.next_batch::<B>(batch_size, device)? {
        let preds = predict_label_maps(model, batch.images)?;
        for (pred, truth) in preds.iter().zip(&batch.labels) {
            counts.accumulate(pred, truth)?;
        }
        images += batch.labels.len();
    }
    Ok((counts, images))
}

fn build_pipeline(
    cfg: &PipelineConfig,
    classes: usize,
    seed: Option<u64>,
) -> anyhow::Result<TransformPipeline> {
    check_input_size(cfg.input_height as usize, cfg.input_width as usize)?;
    let pipeline = cfg.pipeline_builder(classes).seed(seed).build()?;
    tracing::info!(pipeline = %pipeline.describe(), "input pipeline");
    Ok(pipeline)
}

pub fn run_train(args: TrainArgs) -> anyhow::Result<()> {
    validate_backend_choice(args.backend)?;
    let cfg = args.pipeline.resolve()?;
    let catalog = cfg.catalog()?;
    let classes = catalog.len();
    let pipeline = build_pipeline(&cfg, classes, args.seed)?;

    let train_layout = cfg.train_layout();
    let mut loader = BatchIter::from_layout(
        &train_layout,
        pipeline.clone(),
        LoaderConfig {
            shuffle: true,
            seed: args.seed,
            drop_last: false,
        },
    )?;
    if loader.is_empty() {
        anyhow::bail!("no training pairs under {}", train_layout.images_dir().display());
    }
    let mut val_loader = if args.validate {
        // Validation never flips.
        let mut val_pipeline = pipeline;
        val_pipeline.flip_horizontal_prob = 0.0;
        Some(BatchIter::from_layout(
            &cfg.test_layout(),
            val_pipeline,
            LoaderConfig::default(),
        )?)
    } else {
        None
    };

    if let Some(parent) = args.checkpoint_out.parent() {
        fs::create_dir_all(parent)?;
    }

    if let Some(seed) = args.seed {
        ADBackend::seed(seed);
    }
    let device = <ADBackend as Backend>::Device::default();
    let mut model = Fcn8::<ADBackend>::new(args.model.config(classes), &device)?;
    if let Some(path) = &args.encoder_weights {
        model = model.load_encoder(path, &device)?;
    }
    tracing::info!(
        pairs = loader.len(),
        classes,
        epochs = args.epochs,
        batch_size = args.batch_size,
        "training FCN-8"
    );

    let model = match args.optimizer {
        OptimizerKind::Sgd => {
            let optim = SgdConfig::new()
                .with_momentum(Some(
                    MomentumConfig::new()
                        .with_momentum(args.momentum)
                        .with_dampening(0.0)
                        .with_nesterov(true),
                ))
                .init();
            fit(
                &args,
                model,
                optim,
                &mut loader,
                val_loader.as_mut(),
                cfg.smoothing,
                &device,
            )?
        }
        OptimizerKind::Adam => {
            let optim = AdamConfig::new().init();
            fit(
                &args,
                model,
                optim,
                &mut loader,
                val_loader.as_mut(),
                cfg.smoothing,
                &device,
            )?
        }
    };

    model.save_checkpoint(&args.checkpoint_out)?;
    println!("Saved checkpoint to {}", args.checkpoint_out.display());
    Ok(())
}

fn fit<O>(
    args: &TrainArgs,
    mut model: Fcn8<ADBackend>,
    mut optim: O,
    loader: &mut BatchIter,
    mut val_loader: Option<&mut BatchIter>,
    smoothing: f64,
    device: &<ADBackend as Backend>::Device,
) -> anyhow::Result<Fcn8<ADBackend>>
where
    O: Optimizer<Fcn8<ADBackend>, ADBackend>,
{
    let batch_size = args.batch_size.max(1);
    for epoch in 0..args.epochs {
        if epoch > 0 {
            loader.reset();
        }
        let mut losses = Vec::new();
        while let Some(batch) = loader.next_batch::<ADBackend>(batch_size, device)? {
            let logits = model.forward(batch.images)?;
            let loss = cross_entropy(logits, batch.targets);
            let loss_detached = loss.clone().detach();
            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optim.step(args.lr, model, grads);

            losses.push(scalar_value(loss_detached)?);
        }
        let avg_loss: f32 = if losses.is_empty() {
            0.0
        } else {
            losses.iter().sum::<f32>() / losses.len() as f32
        };
        tracing::info!(epoch, batches = losses.len(), avg_loss = %format!("{avg_loss:.4}"), "epoch done");

        if let Some(val) = val_loader.as_deref_mut() {
            let scores = validate_epoch(&model.valid(), val, batch_size, smoothing, device)?;
            tracing::info!(
                epoch,
                mean_iou = %format!("{:.4}", scores.mean_iou()),
                mean_dice = %format!("{:.4}", scores.mean_dice()),
                "validation"
            );
        }
    }
    Ok(model)
}

/// Read a one-element tensor back to the host.
fn scalar_value<B: Backend>(tensor: Tensor<B, 1>) -> anyhow::Result<f32> {
    let values = tensor
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| anyhow::anyhow!("failed to read loss: {e:?}"))?;
    values
        .first()
        .copied()
        .ok_or_else(|| anyhow::anyhow!("loss tensor is empty"))
}

/// Score one pass over the validation split with the configured smoothing.
fn validate_epoch<B: Backend>(
    model: &Fcn8<B>,
    val: &mut BatchIter,
    batch_size: usize,
    smoothing: f64,
    device: &B::Device,
) -> anyhow::Result<PerClassMetrics> {
    val.reset();
    let (counts, images) = evaluate(model, val, batch_size, device)?;
    tracing::debug!(images, "validation pass");
    Ok(counts.scores(smoothing)?)
}

pub fn run_eval(args: EvalArgs) -> anyhow::Result<MetricsReport> {
    validate_backend_choice(args.backend)?;
    let cfg = args.pipeline.resolve()?;
    let catalog = cfg.catalog()?;
    let mut pipeline = build_pipeline(&cfg, catalog.len(), None)?;
    pipeline.flip_horizontal_prob = 0.0;

    let device = <TrainBackend as Backend>::Device::default();
    let model = Fcn8::<TrainBackend>::load_checkpoint(
        args.model.config(catalog.len()),
        &args.checkpoint,
        &device,
    )?;

    let test_layout = cfg.test_layout();
    let mut loader = BatchIter::from_layout(&test_layout, pipeline, LoaderConfig::default())?;
    if loader.is_empty() {
        anyhow::bail!("no test pairs under {}", test_layout.images_dir().display());
    }
    let (counts, images) = evaluate(&model, &mut loader, args.batch_size.max(1), &device)?;
    let report = MetricsReport::new(&catalog, &counts, images, cfg.smoothing)?;

    println!("{}", report.format_table());
    if let Some(path) = &args.report.json_out {
        write_report(path, &report)?;
        println!("Wrote metrics report to {}", path.display());
    }
    Ok(report)
}

fn write_report(path: &Path, report: &MetricsReport) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_vec_pretty(report)?;
    fs::write(path, json)?;
    Ok(())
}
