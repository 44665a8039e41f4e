//! FCN-8 decoder: upsamples the stride-32 head and fuses the pool4/pool3 skips.

use burn::module::Module;
use burn::nn::conv::{Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig};
use burn::tensor::activation::relu;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::vgg::VggFeatures;

/// x2 upsampling: kernel 4, stride 2, padding 1 gives exactly twice the input size.
fn upsample2<B: Backend>(channels: usize, device: &B::Device) -> ConvTranspose2d<B> {
    ConvTranspose2dConfig::new([channels, channels], [4, 4])
        .with_stride([2, 2])
        .with_padding([1, 1])
        .with_bias(false)
        .init(device)
}

#[derive(Debug, Module)]
pub struct Fcn8Decoder<B: Backend> {
    head_up: ConvTranspose2d<B>,
    pool4_score: Conv2d<B>,
    fuse4_up: ConvTranspose2d<B>,
    pool3_score: Conv2d<B>,
    out_up: ConvTranspose2d<B>,
}

impl<B: Backend> Fcn8Decoder<B> {
    pub fn new(
        classes: usize,
        head_width: usize,
        pool4_width: usize,
        pool3_width: usize,
        device: &B::Device,
    ) -> Self {
        let head_up = ConvTranspose2dConfig::new([head_width, classes], [4, 4])
            .with_stride([2, 2])
            .with_padding([1, 1])
            .with_bias(false)
            .init(device);
        Self {
            head_up,
            pool4_score: Conv2dConfig::new([pool4_width, classes], [1, 1]).init(device),
            fuse4_up: upsample2(classes, device),
            pool3_score: Conv2dConfig::new([pool3_width, classes], [1, 1]).init(device),
            out_up: ConvTranspose2dConfig::new([classes, classes], [8, 8])
                .with_stride([8, 8])
                .with_bias(false)
                .init(device),
        }
    }

    /// Per-class logits at input resolution, `[batch, classes, height, width]`.
    pub fn forward(&self, features: VggFeatures<B>) -> Tensor<B, 4> {
        let x = self.head_up.forward(features.head);
        let x = x + relu(self.pool4_score.forward(features.pool4));
        let x = self.fuse4_up.forward(x);
        let x = x + relu(self.pool3_score.forward(features.pool3));
        self.out_up.forward(x)
    }
}
