//! Rice Leaf Disease Diagnosis Server
//!
//! Loads the model artifact once, then serves `POST /predict` and `GET /health`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use rice_disease::backend::{backend_name, default_device};
use rice_disease::explain::{ExplanationGenerator, GeminiConfig};
use rice_disease::utils::logging::{init_logging, LogConfig, LogLevel};
use rice_disease_server::state::{AppState, Engine, ServerConfig};

/// Rice Leaf Disease Diagnosis Server
#[derive(Parser, Debug)]
#[command(name = "rice-disease-server")]
#[command(version)]
#[command(about = "HTTP API for rice leaf disease diagnosis with Grad-CAM")]
struct Cli {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "8000")]
    port: u16,

    /// Host to bind to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Path to the trained model artifact
    #[arg(short, long, env = "RICE_MODEL_PATH", default_value = "output/models/rice_classifier.mpk")]
    model: PathBuf,

    /// Gemini API key; generated explanations are disabled without it
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    gemini_api_key: Option<String>,

    /// Gemini model name
    #[arg(long, env = "GEMINI_MODEL", default_value = rice_disease::explain::generative::DEFAULT_GEMINI_MODEL)]
    gemini_model: String,

    /// Maximum upload size in megabytes
    #[arg(long, default_value = "10")]
    max_upload_mb: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RICE_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let _ = dotenv::dotenv();
    let cli = Cli::parse();

    let log_config = LogConfig::production().with_level(LogLevel::parse(&cli.log_level));
    let _ = init_logging(&log_config);

    let config = ServerConfig {
        model_path: cli.model,
        body_limit_bytes: cli.max_upload_mb * 1024 * 1024,
    };

    info!("Rice Disease Server v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Model:        {:?}", config.model_path);
    info!("  Backend:      {}", backend_name());
    info!("  Upload limit: {} MB", cli.max_upload_mb);
    info!("  Gemini model: {}", cli.gemini_model);

    let device = default_device();
    let engine = Engine::load(&config.model_path, &device)
        .with_context(|| format!("loading model artifact {:?}", config.model_path))?;

    let gemini = GeminiConfig::new(cli.gemini_api_key).with_model(cli.gemini_model);
    if gemini.api_key.is_none() {
        warn!("GEMINI_API_KEY is not set. AI explanations will use the fallback message.");
    }
    let explainer = ExplanationGenerator::from_config(&gemini);

    let state = Arc::new(AppState::new(config, engine, explainer));
    let app = rice_disease_server::router(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", cli.host, cli.port).parse()?;
    info!("Starting server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
