//! Burn segmentation models.
//!
//! - `Vgg16Encoder`: five VGG-16 conv blocks plus the conv6/conv7 head.
//! - `Fcn8Decoder`: transposed-conv upsampling with pool4/pool3 skip fusion.
//! - `Fcn8`: encoder + decoder producing per-pixel class logits.
//!
//! Models are plain Burn modules; data loading and the training loop live in the
//! `seg_dataset` and `training` crates.

pub mod fcn8;
pub mod vgg;

pub use fcn8::Fcn8Decoder;
pub use vgg::{ConvBlock, Vgg16Encoder, VggFeatures, VGG16_BLOCK_DEPTHS};

use burn::module::Module;
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use burn::tensor::activation::softmax;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use std::path::{Path, PathBuf};

/// Input height and width must be multiples of the encoder's total downsampling.
pub const INPUT_STRIDE: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("input {height}x{width} is not a multiple of {INPUT_STRIDE}")]
    InputSize { height: usize, width: usize },
    #[error("expected 3 input channels, got {0}")]
    Channels(usize),
    #[error("model needs at least one class")]
    ZeroClasses,
    #[error("checkpoint {path}: {message}")]
    Record { path: PathBuf, message: String },
}

pub fn check_input_size(height: usize, width: usize) -> Result<(), ModelError> {
    if height == 0 || width == 0 || height % INPUT_STRIDE != 0 || width % INPUT_STRIDE != 0 {
        return Err(ModelError::InputSize { height, width });
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct Fcn8Config {
    pub classes: usize,
    /// Channel widths of the five conv blocks.
    pub widths: [usize; 5],
    /// Channel width of conv6/conv7.
    pub head_width: usize,
}

impl Default for Fcn8Config {
    fn default() -> Self {
        Self {
            classes: 12,
            widths: [64, 128, 256, 512, 512],
            head_width: 4096,
        }
    }
}

impl Fcn8Config {
    /// Same topology with a handful of channels; for tests and quick checks.
    pub fn tiny(classes: usize) -> Self {
        Self {
            classes,
            widths: [4, 4, 8, 8, 8],
            head_width: 16,
        }
    }
}

#[derive(Debug, Module)]
pub struct Fcn8<B: Backend> {
    encoder: Vgg16Encoder<B>,
    decoder: Fcn8Decoder<B>,
    classes: usize,
}

impl<B: Backend> Fcn8<B> {
    pub fn new(cfg: Fcn8Config, device: &B::Device) -> Result<Self, ModelError> {
        if cfg.classes == 0 {
            return Err(ModelError::ZeroClasses);
        }
        let encoder = Vgg16Encoder::new(cfg.widths, cfg.head_width, device);
        let decoder = Fcn8Decoder::new(
            cfg.classes,
            cfg.head_width,
            cfg.widths[3],
            cfg.widths[2],
            device,
        );
        Ok(Self {
            encoder,
            decoder,
            classes: cfg.classes,
        })
    }

    pub fn classes(&self) -> usize {
        self.classes
    }

    pub fn encoder(&self) -> &Vgg16Encoder<B> {
        &self.encoder
    }

    /// Class logits, `[batch, classes, height, width]`, for `[batch, 3, height, width]` images.
    pub fn forward(&self, images: Tensor<B, 4>) -> Result<Tensor<B, 4>, ModelError> {
        let [_, channels, height, width] = images.dims();
        if channels != 3 {
            return Err(ModelError::Channels(channels));
        }
        check_input_size(height, width)?;
        Ok(self.decoder.forward(self.encoder.forward(images)))
    }

    /// Per-pixel class probabilities (softmax over the class axis).
    pub fn forward_probs(&self, images: Tensor<B, 4>) -> Result<Tensor<B, 4>, ModelError> {
        Ok(softmax(self.forward(images)?, 1))
    }

    /// Replace the encoder weights with a record saved by `save_encoder`.
    pub fn load_encoder(self, path: &Path, device: &B::Device) -> Result<Self, ModelError> {
        let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
        let encoder = self
            .encoder
            .load_file(path, &recorder, device)
            .map_err(|e| record_error(path, e))?;
        tracing::info!(path = %path.display(), "loaded encoder weights");
        Ok(Self { encoder, ..self })
    }

    pub fn save_encoder(&self, path: &Path) -> Result<(), ModelError> {
        let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
        self.encoder
            .clone()
            .save_file(path, &recorder)
            .map_err(|e| record_error(path, e))
    }

    pub fn save_checkpoint(&self, path: &Path) -> Result<(), ModelError> {
        let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
        self.clone()
            .save_file(path, &recorder)
            .map_err(|e| record_error(path, e))
    }

    pub fn load_checkpoint(
        cfg: Fcn8Config,
        path: &Path,
        device: &B::Device,
    ) -> Result<Self, ModelError> {
        let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
        Self::new(cfg, device)?
            .load_file(path, &recorder, device)
            .map_err(|e| record_error(path, e))
    }
}

fn record_error(path: &Path, err: impl std::fmt::Display) -> ModelError {
    ModelError::Record {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

pub mod prelude {
    pub use super::{check_input_size, Fcn8, Fcn8Config, Fcn8Decoder, ModelError, Vgg16Encoder};
}
