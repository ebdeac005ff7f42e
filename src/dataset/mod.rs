//! Dataset module for rice leaf data handling
//!
//! This module provides functionality for:
//! - The ordered label set shared by training and serving
//! - Loading a folder-per-class dataset from disk
//! - Seeded train/validation/test partitioning
//! - Burn `Dataset` and `Batcher` integration for the training loop
//!
//! ## Label Order
//!
//! The index of a label is the class identifier of the model output. Training derives the
//! order from the sorted class directory names and stores it next to the weights; serving
//! reads it back from there. Reordering the labels silently corrupts every prediction.

pub mod burn_dataset;
pub mod loader;
pub mod split;

use serde::{Deserialize, Serialize};

pub use burn_dataset::{RiceLeafBatch, RiceLeafBatcher, RiceLeafBurnDataset, RiceLeafItem};
pub use loader::{DatasetStats, ImageSample, RiceLeafDataset};
pub use split::{DatasetSplits, SplitConfig};

/// Class names used by the serving model, in model output order
pub const CLASS_NAMES: [&str; 5] = ["Bacterialblight", "Blast", "Brownspot", "Healthy", "Tungro"];

/// Ordered, immutable list of class names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelSet {
    names: Vec<String>,
}

impl LabelSet {
    /// Create a label set from names in model output order
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Labels of the serving model
    pub fn serving() -> Self {
        Self::new(CLASS_NAMES)
    }

    /// Number of classes
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Check if there are no labels
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Get the class name for a given label index
    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// Get the label index for a given class name
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Iterate over names in output order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Names as a slice
    pub fn as_slice(&self) -> &[String] {
        &self.names
    }
}

impl Default for LabelSet {
    fn default() -> Self {
        Self::serving()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serving_labels() {
        let labels = LabelSet::serving();
        assert_eq!(labels.len(), 5);
        assert_eq!(labels.name(0), Some("Bacterialblight"));
        assert_eq!(labels.name(3), Some("Healthy"));
        assert_eq!(labels.name(5), None);
    }

    #[test]
    fn test_index_of() {
        let labels = LabelSet::serving();
        assert_eq!(labels.index_of("Tungro"), Some(4));
        assert_eq!(labels.index_of("tungro"), None);
    }

    #[test]
    fn test_serde_is_a_plain_list() {
        let labels = LabelSet::new(["a", "b"]);
        let json = serde_json::to_string(&labels).unwrap();
        assert_eq!(json, r#"["a","b"]"#);

        let back: LabelSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, labels);
    }
}
