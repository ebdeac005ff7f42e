//! Dataset partitioning for training
//!
//! Samples are shuffled once with a seeded RNG and cut into train, validation and test
//! partitions by fraction. The same seed on the same directory always yields the same split.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::loader::ImageSample;
use crate::utils::error::{Result, RiceDiseaseError};

/// Tolerance when checking that fractions sum to one
const FRACTION_EPSILON: f64 = 1e-6;

/// Configuration for dataset splitting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Fraction of data used for training
    pub train_fraction: f64,
    /// Fraction of data used for per-epoch validation
    pub validation_fraction: f64,
    /// Fraction of data held out for the final evaluation
    pub test_fraction: f64,
    /// Random seed for reproducibility
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            train_fraction: 0.8,
            validation_fraction: 0.1,
            test_fraction: 0.1,
            seed: 12,
        }
    }
}

impl SplitConfig {
    /// Create a new split configuration, validating the fractions
    pub fn new(
        train_fraction: f64,
        validation_fraction: f64,
        test_fraction: f64,
        seed: u64,
    ) -> Result<Self> {
        let config = Self {
            train_fraction,
            validation_fraction,
            test_fraction,
            seed,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check that each fraction is in `[0, 1]` and that they sum to one
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("Train", self.train_fraction),
            ("Validation", self.validation_fraction),
            ("Test", self.test_fraction),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(RiceDiseaseError::Config(format!(
                    "{} fraction must be between 0.0 and 1.0, got {}",
                    name, value
                )));
            }
        }

        let total = self.train_fraction + self.validation_fraction + self.test_fraction;
        if (total - 1.0).abs() > FRACTION_EPSILON {
            return Err(RiceDiseaseError::Config(format!(
                "Split fractions must sum to 1.0, got {:.4}",
                total
            )));
        }

        if self.train_fraction == 0.0 {
            return Err(RiceDiseaseError::Config(
                "Train fraction must be greater than 0.0".to_string(),
            ));
        }

        Ok(())
    }
}

/// The three partitions as `(path, label)` pairs, ready for the Burn dataset
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasetSplits {
    pub train: Vec<(PathBuf, usize)>,
    pub validation: Vec<(PathBuf, usize)>,
    pub test: Vec<(PathBuf, usize)>,
}

impl DatasetSplits {
    /// Shuffle the samples and partition them according to `config`
    ///
    /// Validation and test sizes are rounded down; rounding leftovers go to training.
    pub fn from_samples(samples: &[ImageSample], config: &SplitConfig) -> Result<Self> {
        config.validate()?;

        if samples.is_empty() {
            return Err(RiceDiseaseError::Dataset(
                "Cannot split an empty dataset".to_string(),
            ));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let mut shuffled: Vec<(PathBuf, usize)> = samples
            .iter()
            .map(|s| (s.path.clone(), s.label))
            .collect();
        shuffled.shuffle(&mut rng);

        let total = shuffled.len();
        let n_validation = (total as f64 * config.validation_fraction).floor() as usize;
        let n_test = (total as f64 * config.test_fraction).floor() as usize;
        let n_train = total - n_validation - n_test;

        let mut rest = shuffled.split_off(n_train);
        let test = rest.split_off(n_validation);

        Ok(Self {
            train: shuffled,
            validation: rest,
            test,
        })
    }

    /// Total number of samples across all partitions
    pub fn total(&self) -> usize {
        self.train.len() + self.validation.len() + self.test.len()
    }
}

impl std::fmt::Display for DatasetSplits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Dataset Split:")?;
        writeln!(f, "  Train:      {:6} images", self.train.len())?;
        writeln!(f, "  Validation: {:6} images", self.validation.len())?;
        write!(f, "  Test:       {:6} images", self.test.len())
    }
}
