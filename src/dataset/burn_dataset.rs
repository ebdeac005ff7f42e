//! Burn Dataset Integration for rice leaf images
//!
//! This module implements Burn's Dataset trait and Batcher for data loading and
//! batching during training. Items are preprocessed exactly like serving inputs.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::prelude::*;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::inference::preprocess;
use crate::utils::error::{Result, RiceDiseaseError};

/// A single rice leaf item ready for Burn
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RiceLeafItem {
    /// Image data as flattened CHW float array [3 * H * W] in [0, 1]
    pub image: Vec<f32>,
    /// Class label index
    pub label: usize,
    /// Image path (for debugging/logging)
    pub path: String,
}

impl RiceLeafItem {
    /// Create a new item by loading and preprocessing an image
    pub fn from_path(path: &Path, label: usize, image_size: usize) -> Result<Self> {
        let img = image::open(path)
            .map_err(|e| RiceDiseaseError::ImageLoadError(path.to_path_buf(), e.to_string()))?;
        let rgb = preprocess::resize_rgb(&img, image_size);

        Ok(Self {
            image: preprocess::rgb_to_chw(&rgb),
            label,
            path: path.to_string_lossy().to_string(),
        })
    }
}

/// In-memory rice leaf dataset implementing Burn's Dataset trait
///
/// Images are decoded once up front; unreadable files are skipped with a warning.
#[derive(Debug, Clone)]
pub struct RiceLeafBurnDataset {
    items: Vec<RiceLeafItem>,
    image_size: usize,
}

impl RiceLeafBurnDataset {
    /// Load and preprocess all samples in parallel
    pub fn new_cached(samples: &[(PathBuf, usize)], image_size: usize) -> Result<Self> {
        let total = samples.len();
        info!("Pre-loading {} images into memory", total);

        let pb = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("  {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
        {
            pb.set_style(style.progress_chars("#>-"));
        }

        let loaded = AtomicUsize::new(0);

        let items: Vec<RiceLeafItem> = samples
            .par_iter()
            .filter_map(|(path, label)| {
                let result = match RiceLeafItem::from_path(path, *label, image_size) {
                    Ok(item) => Some(item),
                    Err(e) => {
                        warn!("Skipping {}", e);
                        None
                    }
                };
                let count = loaded.fetch_add(1, Ordering::Relaxed);
                if count % 100 == 0 {
                    pb.set_position(count as u64);
                }
                result
            })
            .collect();

        pb.finish_and_clear();
        info!("Loaded {}/{} images", items.len(), total);

        if items.is_empty() && total > 0 {
            return Err(RiceDiseaseError::Dataset(
                "None of the images could be loaded".to_string(),
            ));
        }

        Ok(Self { items, image_size })
    }

    /// Square side length of every item
    pub fn image_size(&self) -> usize {
        self.image_size
    }

    /// Get samples per class count
    pub fn class_distribution(&self, num_classes: usize) -> Vec<usize> {
        let mut counts = vec![0usize; num_classes];
        for item in &self.items {
            if item.label < num_classes {
                counts[item.label] += 1;
            }
        }
        counts
    }
}

impl Dataset<RiceLeafItem> for RiceLeafBurnDataset {
    fn get(&self, index: usize) -> Option<RiceLeafItem> {
        self.items.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

/// A batch of rice leaf images
#[derive(Clone, Debug)]
pub struct RiceLeafBatch<B: Backend> {
    /// Batch of images with shape [batch_size, 3, height, width]
    pub images: Tensor<B, 4>,
    /// Batch of labels with shape [batch_size]
    pub targets: Tensor<B, 1, Int>,
}

/// Batcher stacking preprocessed items into tensors
#[derive(Clone, Debug)]
pub struct RiceLeafBatcher {
    image_size: usize,
}

impl RiceLeafBatcher {
    pub fn new(image_size: usize) -> Self {
        Self { image_size }
    }
}

impl<B: Backend> Batcher<B, RiceLeafItem, RiceLeafBatch<B>> for RiceLeafBatcher {
    fn batch(&self, items: Vec<RiceLeafItem>, device: &B::Device) -> RiceLeafBatch<B> {
        let batch_size = items.len();
        let size = self.image_size;

        let images_data: Vec<f32> = items
            .iter()
            .flat_map(|item| item.image.iter().copied())
            .collect();
        let images = Tensor::<B, 4>::from_floats(
            TensorData::new(images_data, [batch_size, 3, size, size]),
            device,
        );

        let targets_data: Vec<i64> = items.iter().map(|item| item.label as i64).collect();
        let targets =
            Tensor::<B, 1, Int>::from_data(TensorData::new(targets_data, [batch_size]), device);

        RiceLeafBatch { images, targets }
    }
}
