//! Inference module for diagnosing rice leaf images
//!
//! This module provides:
//! - Image preprocessing shared with training
//! - Batched prediction with labelled outputs
//! - Grad-CAM saliency maps over a named convolution layer
//! - Heatmap overlays and JPEG/base64 encoding
//! - Model artifacts (weights + metadata sidecar)
//! - The `InferenceEngine` tying the pipeline together

pub mod artifact;
pub mod engine;
pub mod gradcam;
pub mod overlay;
pub mod predictor;
pub mod preprocess;

pub use artifact::{load_model, save_model, ArtifactMetadata};
pub use engine::{Diagnosis, InferenceEngine};
pub use gradcam::{grad_cam_from, GradCam, GradCamResult, Heatmap};
pub use overlay::{jpeg_base64, overlay_heatmap, OVERLAY_ALPHA};
pub use predictor::{Prediction, Predictor};
pub use preprocess::{decode_image, ImagePreprocessor};
