//! VGG-16 style feature extractor.

use burn::module::Module;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::nn::PaddingConfig2d;
use burn::tensor::activation::relu;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Convolutions per block, as in VGG-16.
pub const VGG16_BLOCK_DEPTHS: [usize; 5] = [2, 2, 3, 3, 3];

/// Kernel size of the conv6 head layer.
pub const HEAD_KERNEL: usize = 7;

/// `depth` 3x3 convolutions with ReLU, followed by a 2x2 stride-2 max pool.
#[derive(Debug, Module)]
pub struct ConvBlock<B: Backend> {
    convs: Vec<Conv2d<B>>,
    pool: MaxPool2d,
}

impl<B: Backend> ConvBlock<B> {
    pub fn new(in_channels: usize, out_channels: usize, depth: usize, device: &B::Device) -> Self {
        let convs = (0..depth.max(1))
            .map(|i| {
                let input = if i == 0 { in_channels } else { out_channels };
                Conv2dConfig::new([input, out_channels], [3, 3])
                    .with_padding(PaddingConfig2d::Explicit(1, 1))
                    .init(device)
            })
            .collect();
        let pool = MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();
        Self { convs, pool }
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut x = input;
        for conv in &self.convs {
            x = relu(conv.forward(x));
        }
        self.pool.forward(x)
    }
}

/// Skip and head features consumed by the FCN-8 decoder.
#[derive(Debug, Clone)]
pub struct VggFeatures<B: Backend> {
    /// Output of block 3, stride 8.
    pub pool3: Tensor<B, 4>,
    /// Output of block 4, stride 16.
    pub pool4: Tensor<B, 4>,
    /// conv6/conv7 output on top of block 5, stride 32.
    pub head: Tensor<B, 4>,
}

#[derive(Debug, Module)]
pub struct Vgg16Encoder<B: Backend> {
    block1: ConvBlock<B>,
    block2: ConvBlock<B>,
    block3: ConvBlock<B>,
    block4: ConvBlock<B>,
    block5: ConvBlock<B>,
    conv6: Conv2d<B>,
    conv7: Conv2d<B>,
}

impl<B: Backend> Vgg16Encoder<B> {
    pub fn new(widths: [usize; 5], head_width: usize, device: &B::Device) -> Self {
        let [w1, w2, w3, w4, w5] = widths;
        let [d1, d2, d3, d4, d5] = VGG16_BLOCK_DEPTHS;
        let pad = HEAD_KERNEL / 2;
        Self {
            block1: ConvBlock::new(3, w1, d1, device),
            block2: ConvBlock::new(w1, w2, d2, device),
            block3: ConvBlock::new(w2, w3, d3, device),
            block4: ConvBlock::new(w3, w4, d4, device),
            block5: ConvBlock::new(w4, w5, d5, device),
            conv6: Conv2dConfig::new([w5, head_width], [HEAD_KERNEL, HEAD_KERNEL])
                .with_padding(PaddingConfig2d::Explicit(pad, pad))
                .init(device),
            conv7: Conv2dConfig::new([head_width, head_width], [1, 1]).init(device),
        }
    }

    pub fn forward(&self, images: Tensor<B, 4>) -> VggFeatures<B> {
        let x = self.block1.forward(images);
        let x = self.block2.forward(x);
        let pool3 = self.block3.forward(x);
        let pool4 = self.block4.forward(pool3.clone());
        let pool5 = self.block5.forward(pool4.clone());
        let head = relu(self.conv6.forward(pool5));
        let head = relu(self.conv7.forward(head));
        VggFeatures { pool3, pool4, head }
    }
}
