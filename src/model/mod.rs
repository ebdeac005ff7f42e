//! Model module for the rice leaf CNN using the Burn framework
//!
//! This module provides:
//! - The `RiceClassifier` CNN with named, addressable convolution layers
//! - Model configuration and training hyperparameters
//!
//! ## Architecture
//!
//! Six unpadded 3x3 convolution blocks (ReLU, then 2x2 max pooling), a flatten step,
//! a 64-unit dense layer and a softmax classifier over the label set. The last
//! convolution is named `last_conv_layer` so Grad-CAM can address it.

pub mod cnn;
pub mod config;

// Re-export main types for convenience
pub use cnn::{ConvBlock, RiceClassifier, TARGET_LAYER};
pub use config::{ModelConfig, TrainingConfig};
