//! Application state for the diagnosis server
//!
//! The engine and the explanation generator are built once at startup and injected here.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use rice_disease::backend::ExplainBackend;
use rice_disease::explain::ExplanationGenerator;
use rice_disease::inference::InferenceEngine;
use serde::Serialize;

use crate::error::ApiError;

/// Engine type served over HTTP
pub type Engine = InferenceEngine<ExplainBackend>;

/// Server configuration
#[derive(Clone, Debug, Serialize)]
pub struct ServerConfig {
    /// Model artifact the engine was loaded from
    pub model_path: PathBuf,
    /// Maximum accepted upload size in bytes
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("output/models/rice_classifier.mpk"),
            body_limit_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Shared application state
pub struct AppState {
    /// Server configuration
    pub config: ServerConfig,
    /// Loaded classifier; requests clone the module handles out of it
    engine: Mutex<Engine>,
    /// Explanation source for predicted labels
    pub explainer: ExplanationGenerator,
    /// Number of labels the engine predicts
    pub num_labels: usize,
    /// Server start time
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: ServerConfig, engine: Engine, explainer: ExplanationGenerator) -> Self {
        Self {
            config,
            num_labels: engine.labels().len(),
            engine: Mutex::new(engine),
            explainer,
            started_at: Instant::now(),
        }
    }

    /// A private copy of the engine for one request
    pub fn engine(&self) -> Result<Engine, ApiError> {
        self.engine
            .lock()
            .map(|engine| engine.clone())
            .map_err(|_| ApiError::Internal("inference engine lock poisoned".to_string()))
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

pub type SharedState = Arc<AppState>;
