//! Supervised Training Implementation
//!
//! A manual Burn training loop: Adam, cross-entropy over integer labels, per-epoch
//! shuffled mini-batches, validation accuracy after every epoch and a final evaluation
//! on the held-out test partition. The result is a model artifact (weights + sidecar),
//! a `history.json` with the per-epoch metrics and the `model_config.json` used.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use burn::{
    data::dataloader::batcher::Batcher,
    data::dataset::Dataset,
    module::AutodiffModule,
    nn::loss::CrossEntropyLossConfig,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::{backend::AutodiffBackend, ElementConversion},
};
use chrono::Local;
use colored::Colorize;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::dataset::{
    DatasetSplits, ImageSample, LabelSet, RiceLeafBatch, RiceLeafBatcher, RiceLeafBurnDataset,
    RiceLeafDataset,
};
use crate::inference::artifact::{self, ArtifactMetadata};
use crate::model::{ModelConfig, RiceClassifier, TrainingConfig};
use crate::utils::logging::TrainingLogger;

/// Metrics for one epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch: usize,
    pub train_loss: f64,
    pub train_accuracy: f64,
    pub val_loss: f64,
    pub val_accuracy: f64,
}

/// Everything written to `history.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub labels: LabelSet,
    pub model_config: ModelConfig,
    pub training_config: TrainingConfig,
    pub epochs: Vec<EpochMetrics>,
    pub test_loss: f64,
    pub test_accuracy: f64,
}

/// Outcome of a training run
#[derive(Debug, Clone)]
pub struct TrainingSummary {
    /// Weights file of the saved artifact
    pub artifact_path: PathBuf,
    /// Path of the written history
    pub history_path: PathBuf,
    /// Model configuration, reusable with `train --model-config`
    pub config_path: PathBuf,
    pub history: TrainingHistory,
}

/// Running loss and accuracy over a pass
#[derive(Debug, Default, Clone, Copy)]
struct PassStats {
    loss_sum: f64,
    batches: usize,
    correct: usize,
    total: usize,
}

impl PassStats {
    fn loss(&self) -> f64 {
        self.loss_sum / self.batches.max(1) as f64
    }

    fn accuracy(&self) -> f64 {
        self.correct as f64 / self.total.max(1) as f64
    }
}

/// Loss and number of correct predictions for one batch
fn batch_step<B: Backend>(
    model: &RiceClassifier<B>,
    batch: RiceLeafBatch<B>,
) -> (Tensor<B, 1>, usize, usize) {
    let batch_size = batch.targets.dims()[0];
    let output = model.forward(batch.images);

    let loss = CrossEntropyLossConfig::new()
        .init(&output.device())
        .forward(output.clone(), batch.targets.clone());

    let predictions = output.argmax(1).reshape([batch_size]);
    let correct: i64 = predictions
        .equal(batch.targets)
        .int()
        .sum()
        .into_scalar()
        .elem();

    (loss, correct as usize, batch_size)
}

/// Evaluate a model on a dataset, returning `(loss, accuracy)`
pub fn evaluate<B: Backend>(
    model: &RiceClassifier<B>,
    dataset: &RiceLeafBurnDataset,
    batch_size: usize,
    device: &B::Device,
) -> (f64, f64) {
    let batcher = RiceLeafBatcher::new(dataset.image_size());
    let len = dataset.len();
    let mut stats = PassStats::default();

    for start in (0..len).step_by(batch_size.max(1)) {
        let end = (start + batch_size).min(len);
        let items: Vec<_> = (start..end).filter_map(|i| dataset.get(i)).collect();
        if items.is_empty() {
            continue;
        }

        let batch: RiceLeafBatch<B> = batcher.batch(items, device);
        let (loss, correct, total) = batch_step(model, batch);
        stats.loss_sum += loss.into_scalar().elem::<f64>();
        stats.batches += 1;
        stats.correct += correct;
        stats.total += total;
    }

    (stats.loss(), stats.accuracy())
}

/// Train a classifier on a folder-per-class dataset and save the artifact
///
/// `model_config.num_classes` is replaced by the number of class directories found.
pub fn run_training<B: AutodiffBackend>(
    data_dir: &Path,
    mut model_config: ModelConfig,
    config: &TrainingConfig,
    device: &B::Device,
) -> Result<TrainingSummary> {
    config.validate()?;
    println!("{}", "Initializing Training...".green().bold());
    println!("  Device: {:?}", device);

    // Load the dataset
    println!("{}", "Loading Dataset...".cyan());
    let dataset = RiceLeafDataset::new(data_dir)?;
    let stats = dataset.get_stats();
    stats.print();

    if dataset.is_empty() {
        anyhow::bail!(
            "No images found in {:?}. Expected layout: {{class_name}}/*.jpg",
            data_dir
        );
    }

    let labels = dataset.labels.clone();
    model_config.num_classes = labels.len();
    model_config.validate()?;

    let samples: Vec<ImageSample> = match config.max_samples {
        Some(max) => {
            // Shuffle first, then take max samples to keep every class represented
            let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
            let mut shuffled = dataset.samples.clone();
            shuffled.shuffle(&mut rng);
            shuffled.into_iter().take(max).collect()
        }
        None => dataset.samples.clone(),
    };

    let splits = DatasetSplits::from_samples(&samples, &config.split)?;
    println!();
    println!("{}", splits);

    let image_size = model_config.input_size;
    println!();
    println!("{}", "Pre-loading Data...".cyan().bold());
    let train_dataset = RiceLeafBurnDataset::new_cached(&splits.train, image_size)?;
    let val_dataset = RiceLeafBurnDataset::new_cached(&splits.validation, image_size)?;
    let test_dataset = RiceLeafBurnDataset::new_cached(&splits.test, image_size)?;

    let train_counts = train_dataset.class_distribution(labels.len());
    for (name, count) in labels.iter().zip(&train_counts) {
        if *count == 0 {
            warn!("Class '{}' has no training images", name);
        }
    }

    let batcher = RiceLeafBatcher::new(image_size);
    let inner_device = device.clone();

    // Create model
    let mut model = RiceClassifier::<B>::new(&model_config, device)?;
    let mut optimizer = AdamConfig::new().init();

    println!();
    println!("{}", "Training Configuration:".cyan().bold());
    println!("  🏷️  Classes:           {}", labels.as_slice().join(", "));
    println!("  🖼️  Input size:        {}x{}", image_size, image_size);
    println!("  🔄 Epochs:            {}", config.epochs);
    println!("  📦 Batch size:        {}", config.batch_size);
    println!("  📈 Learning rate:     {}", config.learning_rate);
    println!();

    let mut logger = TrainingLogger::new(config.epochs);
    let mut epoch_rng = ChaCha8Rng::seed_from_u64(config.seed);
    let mut history = Vec::with_capacity(config.epochs);

    for epoch in 0..config.epochs {
        logger.start_epoch(epoch);

        let mut indices: Vec<usize> = (0..train_dataset.len()).collect();
        indices.shuffle(&mut epoch_rng);

        let mut stats = PassStats::default();
        for chunk in indices.chunks(config.batch_size) {
            let items: Vec<_> = chunk.iter().filter_map(|&i| train_dataset.get(i)).collect();
            if items.is_empty() {
                continue;
            }

            let batch: RiceLeafBatch<B> = batcher.batch(items, device);
            let (loss, correct, total) = batch_step(&model, batch);
            stats.loss_sum += loss.clone().into_scalar().elem::<f64>();
            stats.batches += 1;
            stats.correct += correct;
            stats.total += total;

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optimizer.step(config.learning_rate, model, grads);
        }

        let (val_loss, val_accuracy) = evaluate::<B::InnerBackend>(
            &model.valid(),
            &val_dataset,
            config.batch_size,
            &inner_device,
        );
        logger.end_epoch(stats.loss(), stats.accuracy(), val_accuracy);

        history.push(EpochMetrics {
            epoch: epoch + 1,
            train_loss: stats.loss(),
            train_accuracy: stats.accuracy(),
            val_loss,
            val_accuracy,
        });
    }

    let (test_loss, test_accuracy) = evaluate::<B::InnerBackend>(
        &model.valid(),
        &test_dataset,
        config.batch_size,
        &inner_device,
    );
    logger.log_complete(test_accuracy);

    // Save the model with timestamp
    std::fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("creating {:?}", config.output_dir))?;
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let model_path = config
        .output_dir
        .join(format!("rice_classifier_{}.mpk", timestamp));

    let metadata = ArtifactMetadata::new(model_config.clone(), labels.clone());
    let artifact_path = artifact::save_model(&model, &metadata, &model_path)?;
    let config_path = config.output_dir.join("model_config.json");
    model_config.save(&config_path)?;

    let history = TrainingHistory {
        labels,
        model_config,
        training_config: config.clone(),
        epochs: history,
        test_loss,
        test_accuracy,
    };
    let history_path = config.output_dir.join("history.json");
    std::fs::write(&history_path, serde_json::to_string_pretty(&history)?)
        .with_context(|| format!("writing {:?}", history_path))?;
    info!("Training history written to {:?}", history_path);

    println!();
    println!("{}", "Training Complete!".green().bold());
    println!("  🧪 Test accuracy: {:.2}%", test_accuracy * 100.0);
    println!("  💾 Saved to: {:?}", artifact_path);

    Ok(TrainingSummary {
        artifact_path,
        history_path,
        config_path,
        history,
    })
}
