//! # Rice Leaf Disease Classification
//!
//! A Rust library for diagnosing rice leaf diseases from photographs using the Burn framework,
//! with Grad-CAM saliency maps and natural-language explanations for every prediction.
//!
//! ## Features
//!
//! - **CNN classifier** built with Burn, with an addressable target layer for saliency
//! - **Grad-CAM** heatmaps computed through Burn's autodiff backend
//! - **Overlay rendering** with a JET colormap, JPEG + base64 encoding for transport
//! - **Explanations** from a curated rule table or an external text-generation service
//!
//! ## Modules
//!
//! - `dataset`: Label set, folder-per-class loading, partitioning and Burn batching
//! - `model`: CNN architecture and model configuration
//! - `inference`: Preprocessing, prediction, Grad-CAM, overlay and artifact loading
//! - `explain`: Disease classification, static reports and generative explanations
//! - `training`: Supervised training loop producing the model artifact
//! - `utils`: Logging, errors and formatting helpers
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rice_disease::backend::{default_device, ExplainBackend};
//! use rice_disease::inference::InferenceEngine;
//!
//! let engine = InferenceEngine::<ExplainBackend>::load("output/models/rice_classifier.mpk", &default_device())?;
//! let diagnosis = engine.diagnose_bytes(&std::fs::read("leaf.jpg")?)?;
//! println!("{} ({:.2}%)", diagnosis.prediction.label, diagnosis.prediction.confidence_percent());
//! ```

pub mod backend;
pub mod dataset;
pub mod explain;
pub mod inference;
pub mod model;
pub mod training;
pub mod utils;

pub use dataset::LabelSet;
pub use explain::{AiExplanation, DiseaseKind, ExplanationGenerator};
pub use inference::{Diagnosis, GradCam, Heatmap, InferenceEngine, Prediction, Predictor};
pub use model::cnn::{RiceClassifier, TARGET_LAYER};
pub use model::config::{ModelConfig, TrainingConfig};
pub use utils::error::{Result, RiceDiseaseError};

/// Square input resolution used by the serving model
pub const IMAGE_SIZE: usize = 224;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
