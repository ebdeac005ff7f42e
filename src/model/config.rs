//! Model Configuration Module
//!
//! Defines configuration structures for the CNN architecture and the training
//! hyperparameters. `ModelConfig` is stored next to trained weights so a model can be
//! rebuilt with the exact shape it was trained with.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::cnn::{self, TARGET_LAYER};
use crate::dataset::split::SplitConfig;
use crate::utils::error::{Result, RiceDiseaseError};
use crate::IMAGE_SIZE;

/// Pooling window and stride of every block
const POOL_SIZE: usize = 2;

/// Configuration for the CNN model architecture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Number of output classes
    pub num_classes: usize,

    /// Input image size (width and height, assumed square)
    pub input_size: usize,

    /// Number of input channels (3 for RGB)
    pub input_channels: usize,

    /// Number of filters in each convolutional block
    pub conv_filters: Vec<usize>,

    /// Kernel size for convolutional layers (unpadded)
    pub kernel_size: usize,

    /// Units in the hidden dense layer
    pub dense_units: usize,

    /// Convolution layer Grad-CAM reads activations from
    pub target_layer: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            num_classes: 5,
            input_size: IMAGE_SIZE,
            input_channels: 3,
            conv_filters: vec![32, 64, 64, 64, 64, 64],
            kernel_size: 3,
            dense_units: 64,
            target_layer: TARGET_LAYER.to_string(),
        }
    }
}

impl ModelConfig {
    /// Names of the convolution layers, in forward order
    ///
    /// Layers are `conv1`, `conv2`, ... and the final one is always `last_conv_layer`.
    pub fn layer_names(&self) -> Vec<String> {
        cnn::layer_names(self.conv_filters.len())
    }

    /// Spatial side length after each block, as `(after conv, after pool)` pairs
    ///
    /// Returns `None` if the input is too small for the stack to produce a non-empty map.
    pub fn spatial_sizes(&self) -> Option<Vec<(usize, usize)>> {
        let mut size = self.input_size;
        let mut sizes = Vec::with_capacity(self.conv_filters.len());

        for _ in &self.conv_filters {
            let conv = size.checked_sub(self.kernel_size)? + 1;
            let pooled = conv / POOL_SIZE;
            if pooled == 0 {
                return None;
            }
            sizes.push((conv, pooled));
            size = pooled;
        }

        Some(sizes)
    }

    /// Side length of the target layer's activation grid
    pub fn target_grid_size(&self) -> Option<usize> {
        let index = self
            .layer_names()
            .iter()
            .position(|n| *n == self.target_layer)?;
        self.spatial_sizes().map(|sizes| sizes[index].0)
    }

    /// Number of features entering the dense layer
    pub fn flatten_size(&self) -> Option<usize> {
        let sizes = self.spatial_sizes()?;
        let (_, side) = *sizes.last()?;
        let channels = *self.conv_filters.last()?;
        Some(side * side * channels)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.num_classes == 0 {
            return Err(RiceDiseaseError::Config(
                "num_classes must be greater than 0".to_string(),
            ));
        }

        if self.input_channels == 0 {
            return Err(RiceDiseaseError::Config(
                "input_channels must be greater than 0".to_string(),
            ));
        }

        if self.conv_filters.is_empty() || self.conv_filters.contains(&0) {
            return Err(RiceDiseaseError::Config(
                "conv_filters must have at least one layer and no zero entries".to_string(),
            ));
        }

        if self.kernel_size < 1 || self.kernel_size % 2 == 0 {
            return Err(RiceDiseaseError::Config(
                "kernel_size must be a positive odd number".to_string(),
            ));
        }

        if self.dense_units == 0 {
            return Err(RiceDiseaseError::Config(
                "dense_units must be greater than 0".to_string(),
            ));
        }

        if self.spatial_sizes().is_none() {
            return Err(RiceDiseaseError::Config(format!(
                "input_size {} is too small for {} convolution blocks",
                self.input_size,
                self.conv_filters.len()
            )));
        }

        let names = self.layer_names();
        if !names.contains(&self.target_layer) {
            return Err(RiceDiseaseError::LayerNotFound {
                name: self.target_layer.clone(),
                available: names,
            });
        }

        Ok(())
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Training configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Number of training epochs
    pub epochs: usize,

    /// Batch size for training
    pub batch_size: usize,

    /// Adam learning rate
    pub learning_rate: f64,

    /// Random seed for the split and epoch shuffling
    pub seed: u64,

    /// Train/validation/test partitioning
    pub split: SplitConfig,

    /// Directory the trained artifact and history are written to
    pub output_dir: PathBuf,

    /// Cap on the number of images used, for quick experiments
    pub max_samples: Option<usize>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 20,
            batch_size: 32,
            learning_rate: 1e-3,
            seed: 12,
            split: SplitConfig::default(),
            output_dir: PathBuf::from("output/models"),
            max_samples: None,
        }
    }
}

impl TrainingConfig {
    /// Create a fast training config for debugging
    pub fn debug() -> Self {
        Self {
            epochs: 2,
            batch_size: 8,
            max_samples: Some(200),
            ..Default::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(RiceDiseaseError::Config(
                "epochs must be greater than 0".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(RiceDiseaseError::Config(
                "batch_size must be greater than 0".to_string(),
            ));
        }
        if !(self.learning_rate > 0.0) {
            return Err(RiceDiseaseError::Config(
                "learning_rate must be positive".to_string(),
            ));
        }
        self.split.validate()
    }
}
