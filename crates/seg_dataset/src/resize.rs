//! Pair resizing and the transform pipeline applied to every loaded sample.

use crate::codec::apply_range_policy;
use crate::types::{DatasetResult, LabelResample, OutOfRangePolicy, SegDatasetError};
use data_contracts::{LabelMap, ValidationError};
use image::imageops::FilterType;
use rand::{Rng, SeedableRng};

/// Reference input size of the VGG-16/FCN-8 network.
pub const DEFAULT_TARGET_SIZE: (u32, u32) = (224, 224);

/// Resize a label map to `height x width` using half-pixel-centered sampling.
///
/// An empty source has nothing to sample from and only resizes to an empty target.
pub fn resize_label(
    label: &LabelMap,
    height: usize,
    width: usize,
    mode: LabelResample,
) -> Result<LabelMap, ValidationError> {
    if label.dims() == (height, width) {
        return Ok(label.clone());
    }
    if label.is_empty() {
        if height * width == 0 {
            return Ok(LabelMap::filled(height, width, 0));
        }
        return Err(ValidationError::ShapeMismatch {
            expected: (height, width),
            actual: label.dims(),
        });
    }
    Ok(match mode {
        LabelResample::Nearest => resize_label_nearest(label, height, width),
        LabelResample::Bilinear => resize_label_bilinear(label, height, width),
    })
}

fn nearest_source(dst: usize, src_len: usize, dst_len: usize) -> usize {
    let scale = src_len as f64 / dst_len as f64;
    (((dst as f64 + 0.5) * scale).floor() as usize).min(src_len - 1)
}

fn resize_label_nearest(label: &LabelMap, height: usize, width: usize) -> LabelMap {
    let (src_h, src_w) = label.dims();
    let cols: Vec<usize> = (0..width)
        .map(|x| nearest_source(x, src_w, width))
        .collect();
    let src = label.as_slice();
    LabelMap::from_fn(height, width, |p| {
        let sy = nearest_source(p / width, src_h, height);
        src[sy * src_w + cols[p % width]]
    })
}

/// Source coordinate, lower neighbor, upper neighbor, and fraction for one axis.
fn bilinear_source(dst: usize, src_len: usize, dst_len: usize) -> (usize, usize, f64) {
    let scale = src_len as f64 / dst_len as f64;
    let pos = ((dst as f64 + 0.5) * scale - 0.5).max(0.0);
    let lo = (pos.floor() as usize).min(src_len - 1);
    let hi = (lo + 1).min(src_len - 1);
    (lo, hi, pos - lo as f64)
}

fn resize_label_bilinear(label: &LabelMap, height: usize, width: usize) -> LabelMap {
    let (src_h, src_w) = label.dims();
    let src = label.as_slice();
    let at = |y: usize, x: usize| src[y * src_w + x] as f64;
    LabelMap::from_fn(height, width, |p| {
        let (y0, y1, ty) = bilinear_source(p / width, src_h, height);
        let (x0, x1, tx) = bilinear_source(p % width, src_w, width);
        let top = at(y0, x0) + (at(y0, x1) - at(y0, x0)) * tx;
        let bottom = at(y1, x0) + (at(y1, x1) - at(y1, x0)) * tx;
        // Truncating cast, matching an integer cast of the interpolated value.
        (top + (bottom - top) * ty) as u32
    })
}

pub fn resize_image(img: &image::RgbImage, width: u32, height: u32) -> image::RgbImage {
    if img.dimensions() == (width, height) {
        return img.clone();
    }
    image::imageops::resize(img, width, height, FilterType::Triangle)
}

fn flip_label_horizontal(label: &mut LabelMap) {
    let width = label.width();
    if width == 0 {
        return;
    }
    for row in label.as_mut_slice().chunks_exact_mut(width) {
        row.reverse();
    }
}

#[derive(Debug, Clone)]
pub struct TransformPipeline {
    pub classes: usize,
    /// Resize every pair to this (width, height). If None, pairs keep their size.
    pub target_size: Option<(u32, u32)>,
    pub label_resample: LabelResample,
    pub out_of_range: OutOfRangePolicy,
    /// Probability of mirroring image and label together.
    pub flip_horizontal_prob: f32,
    pub seed: Option<u64>,
}

impl TransformPipeline {
    pub fn describe(&self) -> String {
        let ts = self
            .target_size
            .map(|(w, h)| format!("{}x{}", w, h))
            .unwrap_or_else(|| "none".to_string());
        format!(
            "classes={} target_size={} label_resample={:?} out_of_range={:?} flip_p={:.2} seed={}",
            self.classes,
            ts,
            self.label_resample,
            self.out_of_range,
            self.flip_horizontal_prob,
            self.seed
                .map(|s| s.to_string())
                .unwrap_or_else(|| "none".to_string())
        )
    }

    /// Validate, resize, and optionally flip one pair. `sample_key` mixes into the seed so
    /// every sample gets its own deterministic draw.
    pub fn apply(
        &self,
        img: image::RgbImage,
        label: LabelMap,
        sample_key: u64,
    ) -> DatasetResult<(image::RgbImage, LabelMap)> {
        let (w, h) = img.dimensions();
        let img_dims = (h as usize, w as usize);
        if img_dims != label.dims() {
            return Err(ValidationError::ShapeMismatch {
                expected: img_dims,
                actual: label.dims(),
            }
            .into());
        }
        let label = apply_range_policy(&label, self.classes, self.out_of_range)?.into_owned();

        let (mut img, mut label) = match self.target_size {
            Some((tw, th)) => (
                resize_image(&img, tw, th),
                resize_label(&label, th as usize, tw as usize, self.label_resample)?,
            ),
            None => (img, label),
        };

        if self.flip_horizontal_prob > 0.0 {
            let flip = match self.seed {
                Some(seed) => {
                    let mut rng = rand::rngs::StdRng::seed_from_u64(seed ^ sample_key);
                    rng.random::<f32>() < self.flip_horizontal_prob
                }
                None => rand::rng().random::<f32>() < self.flip_horizontal_prob,
            };
            if flip {
                image::imageops::flip_horizontal_in_place(&mut img);
                flip_label_horizontal(&mut label);
            }
        }
        Ok((img, label))
    }
}

#[derive(Debug, Clone)]
pub struct TransformPipelineBuilder {
    inner: TransformPipeline,
}

impl TransformPipelineBuilder {
    pub fn new(classes: usize) -> Self {
        Self {
            inner: TransformPipeline {
                classes,
                target_size: Some(DEFAULT_TARGET_SIZE),
                label_resample: LabelResample::Nearest,
                out_of_range: OutOfRangePolicy::Reject,
                flip_horizontal_prob: 0.0,
                seed: None,
            },
        }
    }
    pub fn target_size(mut self, size: Option<(u32, u32)>) -> Self {
        self.inner.target_size = size;
        self
    }
    pub fn label_resample(mut self, mode: LabelResample) -> Self {
        self.inner.label_resample = mode;
        self
    }
    pub fn out_of_range(mut self, policy: OutOfRangePolicy) -> Self {
        self.inner.out_of_range = policy;
        self
    }
    pub fn flip_horizontal_prob(mut self, p: f32) -> Self {
        self.inner.flip_horizontal_prob = p;
        self
    }
    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.inner.seed = seed;
        self
    }
    pub fn build(self) -> DatasetResult<TransformPipeline> {
        if self.inner.classes == 0 {
            return Err(ValidationError::ZeroClasses.into());
        }
        if let Some((w, h)) = self.inner.target_size {
            if w == 0 || h == 0 {
                return Err(SegDatasetError::Other(format!(
                    "target size must be non-zero, got {w}x{h}"
                )));
            }
        }
        if self.inner.label_resample == LabelResample::Bilinear {
            tracing::warn!(
                "bilinear label resampling interpolates class ids and will invent classes at region boundaries"
            );
        }
        Ok(self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearest_upsample_keeps_existing_classes() {
        let label = LabelMap::from_rows(&[[0u32, 10]]).unwrap();
        let up = resize_label(&label, 1, 4, LabelResample::Nearest).unwrap();
        assert_eq!(up.as_slice(), &[0, 0, 10, 10]);
    }

    #[test]
    fn bilinear_invents_intermediate_classes() {
        let label = LabelMap::from_rows(&[[0u32, 10]]).unwrap();
        let up = resize_label(&label, 1, 4, LabelResample::Bilinear).unwrap();
        assert_eq!(up.as_slice(), &[0, 2, 7, 10]);
    }

    #[test]
    fn nearest_downsample_picks_center_sources() {
        let label = LabelMap::from_rows(&[[0u32, 1, 2, 3], [4, 5, 6, 7]]).unwrap();
        let down = resize_label(&label, 1, 2, LabelResample::Nearest).unwrap();
        // Target centers at x = 1.0 and 3.0 in source space, y = 1.0.
        assert_eq!(down.as_slice(), &[5, 7]);
    }

    #[test]
    fn uniform_regions_survive_bilinear() {
        let label = LabelMap::filled(3, 3, 4);
        let out = resize_label(&label, 7, 5, LabelResample::Bilinear).unwrap();
        assert!(out.as_slice().iter().all(|&v| v == 4));
        assert_eq!(out.dims(), (7, 5));
    }

    #[test]
    fn empty_source_cannot_grow() {
        let empty = LabelMap::new(0, 0, Vec::new()).unwrap();
        assert!(resize_label(&empty, 2, 2, LabelResample::Nearest).is_err());
    }

    #[test]
    fn pipeline_rejects_shape_mismatch_before_resize() {
        let pipeline = TransformPipelineBuilder::new(3)
            .target_size(Some((4, 4)))
            .build()
            .unwrap();
        let img = image::RgbImage::new(3, 2);
        let label = LabelMap::filled(3, 2, 0);
        let err = pipeline.apply(img, label, 0).unwrap_err();
        assert!(matches!(
            err,
            SegDatasetError::Contract(ValidationError::ShapeMismatch {
                expected: (2, 3),
                actual: (3, 2)
            })
        ));
    }

    #[test]
    fn seeded_flip_mirrors_image_and_label_together() {
        let pipeline = TransformPipelineBuilder::new(3)
            .target_size(None)
            .flip_horizontal_prob(1.0)
            .seed(Some(7))
            .build()
            .unwrap();
        let mut img = image::RgbImage::new(2, 1);
        img.put_pixel(0, 0, image::Rgb([255, 0, 0]));
        let label = LabelMap::from_rows(&[[2u32, 0]]).unwrap();
        let (img, label) = pipeline.apply(img, label, 1).unwrap();
        assert_eq!(img.get_pixel(1, 0), &image::Rgb([255, 0, 0]));
        assert_eq!(label.as_slice(), &[0, 2]);
    }

    #[test]
    fn zero_target_size_rejected() {
        assert!(TransformPipelineBuilder::new(2)
            .target_size(Some((0, 8)))
            .build()
            .is_err());
    }
}
