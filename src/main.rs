//! Rice Leaf Disease CLI
//!
//! Entry point for training the classifier, diagnosing images with Grad-CAM overlays
//! and printing the explanation reports.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::{info, warn};

use rice_disease::backend::{backend_name, default_device, ExplainBackend, TrainingBackend};
use rice_disease::dataset::{LabelSet, RiceLeafDataset, SplitConfig};
use rice_disease::explain::{render_report, AiExplanation, ExplanationGenerator, GeminiConfig};
use rice_disease::inference::overlay::encode_jpeg;
use rice_disease::inference::{decode_image, InferenceEngine, Prediction};
use rice_disease::model::{ModelConfig, TrainingConfig};
use rice_disease::training::run_training;
use rice_disease::utils::confidence_meter;
use rice_disease::utils::logging::{init_logging, LogConfig, LogLevel, ProgressLogger};

/// Images per forward pass when no overlays are requested
const INFER_BATCH_SIZE: usize = 16;

/// Rice leaf disease classification with Grad-CAM explanations
#[derive(Parser, Debug)]
#[command(name = "rice_disease")]
#[command(version)]
#[command(about = "Rice leaf disease classification with Burn", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RICE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Train the classifier on a folder-per-class dataset
    Train {
        /// Path to the dataset directory
        #[arg(short, long, default_value = "data/rice_leaf")]
        data_dir: PathBuf,

        /// Number of training epochs
        #[arg(short, long, default_value = "20")]
        epochs: usize,

        /// Batch size for training
        #[arg(short, long, default_value = "32")]
        batch_size: usize,

        /// Learning rate
        #[arg(short, long, default_value = "0.001")]
        learning_rate: f64,

        /// Square input resolution [default: 224]
        #[arg(long)]
        image_size: Option<usize>,

        /// Model configuration JSON, e.g. the `model_config.json` of an earlier run
        #[arg(long)]
        model_config: Option<PathBuf>,

        /// Fraction of images held out for validation
        #[arg(long, default_value = "0.1")]
        validation_fraction: f64,

        /// Fraction of images held out for the final test
        #[arg(long, default_value = "0.1")]
        test_fraction: f64,

        /// Output directory for the model artifact
        #[arg(short, long, default_value = "output/models")]
        output_dir: PathBuf,

        /// Random seed for reproducibility
        #[arg(long, default_value = "12")]
        seed: u64,

        /// Quick test mode - 2 epochs on at most 200 images
        #[arg(long, default_value = "false")]
        quick: bool,
    },

    /// Diagnose a single image or every image in a directory
    Infer {
        /// Path to input image or directory
        #[arg(short, long)]
        input: PathBuf,

        /// Path to trained model
        #[arg(short, long, env = "RICE_MODEL_PATH")]
        model: PathBuf,

        /// Ground-truth label, compared against the prediction in the report
        #[arg(long)]
        actual: Option<String>,

        /// Number of top classes to show
        #[arg(long, default_value = "3")]
        top_k: usize,

        /// Directory to write Grad-CAM overlays to
        #[arg(long)]
        overlay_dir: Option<PathBuf>,

        /// Print the detailed report for each image
        #[arg(long, default_value = "false")]
        report: bool,
    },

    /// Print the explanation for a disease label
    Explain {
        /// Predicted label, e.g. "Blast"
        label: String,

        /// Confidence in percent shown in the report
        #[arg(long, default_value = "100.0")]
        confidence: f64,

        /// Ground-truth label
        #[arg(long)]
        actual: Option<String>,

        /// Also ask the text-generation service for a one-sentence explanation
        #[arg(long, default_value = "false")]
        ai: bool,

        /// Gemini API key
        #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
        gemini_api_key: Option<String>,

        /// Gemini model name
        #[arg(long, env = "GEMINI_MODEL", default_value = rice_disease::explain::generative::DEFAULT_GEMINI_MODEL)]
        gemini_model: String,
    },

    /// Show dataset statistics
    Stats {
        /// Path to the dataset directory
        #[arg(short, long, default_value = "data/rice_leaf")]
        data_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    // A missing .env file is fine
    let _ = dotenv::dotenv();
    let cli = Cli::parse();

    let mut log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::default()
    };
    if let Some(level) = &cli.log_level {
        log_config = log_config.with_level(LogLevel::parse(level));
    }
    let _ = init_logging(&log_config);

    print_banner();

    match cli.command {
        Commands::Train {
            data_dir,
            epochs,
            batch_size,
            learning_rate,
            image_size,
            model_config,
            validation_fraction,
            test_fraction,
            output_dir,
            seed,
            quick,
        } => {
            let split = SplitConfig::new(
                1.0 - validation_fraction - test_fraction,
                validation_fraction,
                test_fraction,
                seed,
            )?;
            let base = if quick {
                TrainingConfig::debug()
            } else {
                TrainingConfig {
                    epochs,
                    batch_size,
                    ..Default::default()
                }
            };
            let config = TrainingConfig {
                learning_rate,
                seed,
                split,
                output_dir,
                ..base
            };
            let mut model_config = match model_config {
                Some(path) => ModelConfig::load(&path)
                    .with_context(|| format!("reading model configuration {:?}", path))?,
                None => ModelConfig::default(),
            };
            if let Some(size) = image_size {
                model_config.input_size = size;
            }
            cmd_train(&data_dir, model_config, &config)?;
        }

        Commands::Infer {
            input,
            model,
            actual,
            top_k,
            overlay_dir,
            report,
        } => {
            cmd_infer(
                &input,
                &model,
                actual.as_deref(),
                top_k,
                overlay_dir.as_deref(),
                report,
            )?;
        }

        Commands::Explain {
            label,
            confidence,
            actual,
            ai,
            gemini_api_key,
            gemini_model,
        } => {
            println!("{}", render_report(&label, confidence, actual.as_deref()));
            println!();
            println!("{}", confidence_meter(confidence));

            if ai {
                let config = GeminiConfig::new(gemini_api_key).with_model(gemini_model);
                cmd_ai_explain(&label, &config)?;
            }
        }

        Commands::Stats { data_dir } => {
            cmd_stats(&data_dir)?;
        }
    }

    Ok(())
}

fn print_banner() {
    println!(
        "{}",
        r#"
 ╔══════════════════════════════════════════════════════════════╗
 ║   🌾 Rice Leaf Disease Classification                         ║
 ║   Grad-CAM explanations with Burn + Rust                     ║
 ╚══════════════════════════════════════════════════════════════╝
  "#
        .green()
    );
}

fn cmd_train(data_dir: &Path, model_config: ModelConfig, config: &TrainingConfig) -> Result<()> {
    info!("Training on {:?} with backend {}", data_dir, backend_name());

    if !data_dir.exists() {
        println!(
            "{} Dataset directory not found: {:?}",
            "Error:".red(),
            data_dir
        );
        return Ok(());
    }

    let device = default_device();
    let summary = run_training::<TrainingBackend>(data_dir, model_config, config, &device)?;

    println!();
    println!("  📝 History: {:?}", summary.history_path);
    println!("  ⚙️  Config:  {:?}", summary.config_path);
    Ok(())
}

fn collect_images(input: &Path) -> Result<Vec<PathBuf>> {
    if !input.is_dir() {
        return Ok(vec![input.to_path_buf()]);
    }

    let mut files: Vec<PathBuf> = std::fs::read_dir(input)
        .with_context(|| format!("reading {:?}", input))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .map(|e| ["jpg", "jpeg", "png", "bmp"].contains(&e.to_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}

fn print_prediction(
    file_path: &Path,
    prediction: &Prediction,
    labels: &LabelSet,
    actual: Option<&str>,
    top_k: usize,
) {
    println!(
        "📷 {}",
        file_path.file_name().unwrap_or_default().to_string_lossy()
    );
    if let Some(actual) = actual {
        let mark = if actual == prediction.label {
            "✅".green()
        } else {
            "❌".red()
        };
        println!("  Actual: {} {}", actual.yellow(), mark);
    }
    for line in prediction.display(labels, top_k).lines() {
        println!("  {}", line);
    }
    println!("  {}", confidence_meter(prediction.confidence_percent()));
}

fn print_report(prediction: &Prediction, actual: Option<&str>) {
    println!();
    println!(
        "{}",
        render_report(&prediction.label, prediction.confidence_percent(), actual)
    );
}

fn cmd_infer(
    input: &Path,
    model: &Path,
    actual: Option<&str>,
    top_k: usize,
    overlay_dir: Option<&Path>,
    report: bool,
) -> Result<()> {
    println!("{}", "Inference Configuration:".cyan().bold());
    println!("  📷 Input:   {:?}", input);
    println!("  🧠 Model:   {:?}", model);
    println!("  🖥️  Backend: {}", backend_name());
    println!();

    if !input.exists() {
        println!("{} Input path not found: {:?}", "Error:".red(), input);
        return Ok(());
    }

    println!("{}", "Loading model...".cyan());
    let device = default_device();
    let engine = InferenceEngine::<ExplainBackend>::load(model, &device)
        .with_context(|| format!("loading model artifact {:?}", model))?;

    let files = collect_images(input)?;
    println!("{}", "Running inference...".cyan());
    println!();

    let mut progress = ProgressLogger::new("Diagnosing", files.len());
    match overlay_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).with_context(|| format!("creating {:?}", dir))?;

            for file_path in &files {
                progress.increment();
                let bytes =
                    std::fs::read(file_path).with_context(|| format!("reading {:?}", file_path))?;

                let start = std::time::Instant::now();
                let diagnosis = match engine.diagnose_bytes(&bytes) {
                    Ok(diagnosis) => diagnosis,
                    Err(e) => {
                        warn!("Skipping {:?}: {}", file_path, e);
                        continue;
                    }
                };
                let elapsed = start.elapsed();

                print_prediction(file_path, &diagnosis.prediction, engine.labels(), actual, top_k);
                println!("  Time: {:.2}ms", elapsed.as_secs_f64() * 1000.0);

                let stem = file_path
                    .file_stem()
                    .unwrap_or_default()
                    .to_string_lossy()
                    .to_string();
                let out = dir.join(format!("{}_gradcam.jpg", stem));
                std::fs::write(&out, encode_jpeg(&diagnosis.overlay)?)
                    .with_context(|| format!("writing {:?}", out))?;
                println!("  Grad-CAM: {:?}", out);

                if report {
                    print_report(&diagnosis.prediction, actual);
                }
                println!();
            }
        }
        None => {
            // No heatmaps needed, so classify in batches without gradient tracking
            let predictor = engine.predictor()?;

            for chunk in files.chunks(INFER_BATCH_SIZE) {
                let mut paths = Vec::with_capacity(chunk.len());
                let mut images = Vec::with_capacity(chunk.len());
                for file_path in chunk {
                    progress.increment();
                    let bytes = std::fs::read(file_path)
                        .with_context(|| format!("reading {:?}", file_path))?;
                    match decode_image(&bytes) {
                        Ok(image) => {
                            paths.push(file_path);
                            images.push(image);
                        }
                        Err(e) => warn!("Skipping {:?}: {}", file_path, e),
                    }
                }

                let start = std::time::Instant::now();
                let predictions = predictor.predict_batch(&images)?;
                info!(
                    "Classified {} images in {:.2}ms",
                    predictions.len(),
                    start.elapsed().as_secs_f64() * 1000.0
                );

                for (file_path, prediction) in paths.into_iter().zip(&predictions) {
                    print_prediction(file_path, prediction, predictor.labels(), actual, top_k);
                    if report {
                        print_report(prediction, actual);
                    }
                    println!();
                }
            }
        }
    }
    progress.finish();

    Ok(())
}

fn cmd_ai_explain(label: &str, config: &GeminiConfig) -> Result<()> {
    if config.api_key.is_none() {
        warn!("GEMINI_API_KEY is not set; generated explanations are disabled");
    }

    let generator = ExplanationGenerator::from_config(config);
    let runtime = tokio::runtime::Runtime::new().context("starting async runtime")?;
    let explanation = runtime.block_on(generator.explain(label));

    println!();
    let header = "🤖 AI EXPLANATION:".cyan().bold();
    match &explanation {
        AiExplanation::Failed(_) => println!("{}\n{}", header, explanation.text().red()),
        _ => println!("{}\n{}", header, explanation.text()),
    }
    Ok(())
}

fn cmd_stats(data_dir: &Path) -> Result<()> {
    info!("Computing dataset statistics for: {:?}", data_dir);

    if !data_dir.exists() {
        println!(
            "{} Dataset directory not found: {:?}",
            "Error:".red(),
            data_dir
        );
        return Ok(());
    }

    match RiceLeafDataset::new(data_dir) {
        Ok(dataset) => dataset.get_stats().print(),
        Err(e) => println!("{} Failed to load dataset: {}", "Error:".red(), e),
    }

    Ok(())
}
