//! Training module for the rice leaf classifier
//!
//! This module provides:
//! - A supervised training loop with the Burn framework (Adam + cross-entropy)
//! - Per-epoch validation and a final held-out test evaluation
//! - The saved model artifact and a JSON training history
//!
//! The label order of the artifact is the sorted list of class directories, so a model
//! trained on the standard five folders serves with the standard label set.

pub mod trainer;

pub use trainer::{evaluate, run_training, EpochMetrics, TrainingHistory, TrainingSummary};

// Re-export TrainingConfig from model::config where it's defined
pub use crate::model::config::TrainingConfig;
