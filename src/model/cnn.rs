//! CNN Model Architecture for Rice Leaf Disease Classification
//!
//! This module implements a Convolutional Neural Network using the Burn framework.
//! Besides the plain forward pass, the network can be split at any named convolution
//! layer so that Grad-CAM can differentiate the class score with respect to that
//! layer's activations.

use burn::{
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        Linear, LinearConfig, PaddingConfig2d, Relu,
    },
    tensor::{backend::Backend, Tensor},
};

use super::config::ModelConfig;
use crate::utils::error::{Result, RiceDiseaseError};

/// Name of the final convolution layer, the default Grad-CAM target
pub const TARGET_LAYER: &str = "last_conv_layer";

/// Layer names for a stack of `count` blocks: `conv1`, `conv2`, ..., `last_conv_layer`
pub(crate) fn layer_names(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            if i + 1 == count {
                TARGET_LAYER.to_string()
            } else {
                format!("conv{}", i + 1)
            }
        })
        .collect()
}

/// A CNN block with an unpadded Conv2d, ReLU, and 2x2 MaxPool
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    pub conv: Conv2d<B>,
    pub relu: Relu,
    pub pool: MaxPool2d,
}

impl<B: Backend> ConvBlock<B> {
    /// Create a new convolutional block
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        device: &B::Device,
    ) -> Self {
        let conv = Conv2dConfig::new([in_channels, out_channels], [kernel_size, kernel_size])
            .with_padding(PaddingConfig2d::Valid)
            .init(device);

        Self {
            conv,
            relu: Relu::new(),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
        }
    }

    /// Convolution and activation, the output Grad-CAM inspects
    pub fn activate(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.relu.forward(self.conv.forward(x))
    }

    /// Forward pass through the block
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.pool.forward(self.activate(x))
    }
}

/// Rice Leaf Disease Classifier CNN
///
/// Architecture:
/// - N convolutional blocks (unpadded conv, ReLU, MaxPool)
/// - Flatten
/// - Dense hidden layer with ReLU
/// - Linear classifier producing one logit per label
#[derive(Module, Debug)]
pub struct RiceClassifier<B: Backend> {
    pub blocks: Vec<ConvBlock<B>>,
    pub dense: Linear<B>,
    pub classifier: Linear<B>,
    relu: Relu,
    num_classes: usize,
}

impl<B: Backend> RiceClassifier<B> {
    /// Create a new randomly initialized classifier from configuration
    pub fn new(config: &ModelConfig, device: &B::Device) -> Result<Self> {
        config.validate()?;

        let mut blocks = Vec::with_capacity(config.conv_filters.len());
        let mut in_channels = config.input_channels;
        for &filters in &config.conv_filters {
            blocks.push(ConvBlock::new(in_channels, filters, config.kernel_size, device));
            in_channels = filters;
        }

        let flatten_size = config.flatten_size().ok_or_else(|| {
            RiceDiseaseError::Config("input size too small for the convolution stack".to_string())
        })?;

        Ok(Self {
            blocks,
            dense: LinearConfig::new(flatten_size, config.dense_units).init(device),
            classifier: LinearConfig::new(config.dense_units, config.num_classes).init(device),
            relu: Relu::new(),
            num_classes: config.num_classes,
        })
    }

    /// Forward pass through the network
    ///
    /// # Arguments
    /// * `x` - Input tensor of shape [batch_size, 3, height, width] with values in [0, 1]
    ///
    /// # Returns
    /// * Logits tensor of shape [batch_size, num_classes]
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self
            .blocks
            .iter()
            .fold(x, |x, block| block.forward(x));
        self.head(x)
    }

    /// Forward pass with softmax for inference
    pub fn forward_softmax(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        burn::tensor::activation::softmax(self.forward(x), 1)
    }

    /// Run the network up to and including the activation of `layer`
    ///
    /// The returned tensor is the layer's post-ReLU output, before pooling.
    pub fn forward_until(&self, x: Tensor<B, 4>, layer: &str) -> Result<Tensor<B, 4>> {
        let index = self.layer_index(layer)?;
        let x = self.blocks[..index]
            .iter()
            .fold(x, |x, block| block.forward(x));
        Ok(self.blocks[index].activate(x))
    }

    /// Continue a forward pass from the activations of `layer` to the logits
    pub fn forward_from(&self, activations: Tensor<B, 4>, layer: &str) -> Result<Tensor<B, 2>> {
        let index = self.layer_index(layer)?;
        let x = self.blocks[index].pool.forward(activations);
        let x = self.blocks[index + 1..]
            .iter()
            .fold(x, |x, block| block.forward(x));
        Ok(self.head(x))
    }

    /// Names of the addressable convolution layers, in forward order
    pub fn layer_names(&self) -> Vec<String> {
        layer_names(self.blocks.len())
    }

    /// Get the number of output classes
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn layer_index(&self, layer: &str) -> Result<usize> {
        let names = self.layer_names();
        names
            .iter()
            .position(|n| n == layer)
            .ok_or_else(|| RiceDiseaseError::LayerNotFound {
                name: layer.to_string(),
                available: names,
            })
    }

    fn head(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        // Flatten: [B, C, H, W] -> [B, C*H*W]
        let x: Tensor<B, 2> = x.flatten(1, 3);
        let x = self.relu.forward(self.dense.forward(x));
        self.classifier.forward(x)
    }
}
