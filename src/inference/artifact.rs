//! Trained model artifacts
//!
//! An artifact is a Burn `CompactRecorder` weights file (`<name>.mpk`) plus a JSON
//! sidecar (`<name>.json`) holding the `ModelConfig` and the ordered label set. The
//! sidecar is mandatory: weights alone cannot say which label each output means.

use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::prelude::*;
use burn::record::CompactRecorder;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::dataset::LabelSet;
use crate::model::{ModelConfig, RiceClassifier};
use crate::utils::error::{Result, RiceDiseaseError};

/// Extension of the weights file written by `CompactRecorder`
pub const WEIGHTS_EXTENSION: &str = "mpk";

/// Metadata stored next to the weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub config: ModelConfig,
    pub labels: LabelSet,
    /// RFC 3339 timestamp of when the artifact was written
    #[serde(default)]
    pub created_at: Option<String>,
}

impl ArtifactMetadata {
    pub fn new(config: ModelConfig, labels: LabelSet) -> Self {
        Self {
            config,
            labels,
            created_at: Some(chrono::Local::now().to_rfc3339()),
        }
    }

    /// Check internal consistency
    pub fn validate(&self) -> Result<()> {
        self.config.validate()?;
        if self.labels.len() != self.config.num_classes {
            return Err(RiceDiseaseError::LabelMismatch {
                labels: self.labels.len(),
                classes: self.config.num_classes,
            });
        }
        Ok(())
    }
}

/// Artifact path without a trailing `.mpk`; other dotted segments are part of the name
fn artifact_stem(path: &Path) -> PathBuf {
    match path.extension() {
        Some(ext) if ext == WEIGHTS_EXTENSION => path.with_extension(""),
        _ => path.to_path_buf(),
    }
}

fn with_suffix(path: &Path, extension: &str) -> PathBuf {
    let mut name = artifact_stem(path).into_os_string();
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

/// Path of the JSON sidecar for a weights path (with or without extension)
pub fn sidecar_path(path: &Path) -> PathBuf {
    with_suffix(path, "json")
}

/// Path of the weights file for a path given with or without extension
pub fn weights_path(path: &Path) -> PathBuf {
    with_suffix(path, WEIGHTS_EXTENSION)
}

/// Save weights and sidecar; returns the weights file path
pub fn save_model<B: Backend>(
    model: &RiceClassifier<B>,
    metadata: &ArtifactMetadata,
    path: &Path,
) -> Result<PathBuf> {
    metadata.validate()?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let weights = weights_path(path);
    model
        .clone()
        .save_file(weights.clone(), &CompactRecorder::new())
        .map_err(|e| RiceDiseaseError::Model(format!("Failed to save model: {:?}", e)))?;

    let json = serde_json::to_string_pretty(metadata)?;
    std::fs::write(sidecar_path(path), json)?;

    info!("Saved model artifact to {:?}", weights);
    Ok(weights)
}

/// Read and validate the sidecar for a weights path
pub fn load_metadata(path: &Path) -> Result<ArtifactMetadata> {
    let sidecar = sidecar_path(path);
    if !sidecar.exists() {
        return Err(RiceDiseaseError::PathNotFound(sidecar));
    }

    let json = std::fs::read_to_string(&sidecar)?;
    let metadata: ArtifactMetadata = serde_json::from_str(&json)?;
    metadata.validate()?;

    if metadata.labels != LabelSet::serving() {
        warn!(
            "Artifact labels {:?} differ from the serving labels {:?}; using the artifact's",
            metadata.labels.as_slice(),
            LabelSet::serving().as_slice()
        );
    }

    Ok(metadata)
}

/// Load a model and its metadata from an artifact
pub fn load_model<B: Backend>(
    path: &Path,
    device: &B::Device,
) -> Result<(RiceClassifier<B>, ArtifactMetadata)> {
    let weights = weights_path(path);
    if !weights.exists() {
        return Err(RiceDiseaseError::PathNotFound(weights));
    }

    let metadata = load_metadata(path)?;
    let model = RiceClassifier::<B>::new(&metadata.config, device)?
        .load_file(weights.clone(), &CompactRecorder::new(), device)
        .map_err(|e| RiceDiseaseError::Model(format!("Failed to load model weights: {:?}", e)))?;

    info!(
        "Loaded model from {:?} ({} classes, input {}x{})",
        weights, metadata.config.num_classes, metadata.config.input_size, metadata.config.input_size
    );

    Ok((model, metadata))
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;

    fn small_config() -> ModelConfig {
        ModelConfig {
            input_size: 16,
            conv_filters: vec![4, 8],
            dense_units: 8,
            ..Default::default()
        }
    }

    #[test]
    fn test_paths() {
        let p = Path::new("output/models/rice_classifier.mpk");
        assert_eq!(sidecar_path(p), PathBuf::from("output/models/rice_classifier.json"));
        assert_eq!(
            weights_path(Path::new("output/models/rice_classifier")),
            PathBuf::from("output/models/rice_classifier.mpk")
        );
    }

    #[test]
    fn test_paths_keep_dotted_names() {
        let p = Path::new("models/rice.v2");
        assert_eq!(weights_path(p), PathBuf::from("models/rice.v2.mpk"));
        assert_eq!(sidecar_path(p), PathBuf::from("models/rice.v2.json"));

        let p = Path::new("models/rice.v2.mpk");
        assert_eq!(weights_path(p), PathBuf::from("models/rice.v2.mpk"));
        assert_eq!(sidecar_path(p), PathBuf::from("models/rice.v2.json"));
    }

    #[test]
    fn test_dotted_artifact_name_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rice.v2");
        let device = Default::default();

        let model = RiceClassifier::<TestBackend>::new(&small_config(), &device).unwrap();
        let saved = save_model(&model, &ArtifactMetadata::new(small_config(), LabelSet::serving()), &path)
            .unwrap();
        assert_eq!(saved, dir.path().join("rice.v2.mpk"));
        assert!(saved.exists());
        assert!(dir.path().join("rice.v2.json").exists());
        assert!(!dir.path().join("rice.mpk").exists());

        let (_, metadata) = load_model::<TestBackend>(&path, &device).unwrap();
        assert_eq!(metadata.config, small_config());
        assert!(load_model::<TestBackend>(&dir.path().join("rice"), &device).is_err());
    }

    #[test]
    fn test_save_then_load_reproduces_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.mpk");
        let device = Default::default();

        let model = RiceClassifier::<TestBackend>::new(&small_config(), &device).unwrap();
        let metadata = ArtifactMetadata::new(small_config(), LabelSet::serving());
        let saved = save_model(&model, &metadata, &path).unwrap();
        assert!(saved.exists());
        assert!(sidecar_path(&path).exists());

        let (loaded, loaded_meta) = load_model::<TestBackend>(&path, &device).unwrap();
        assert_eq!(loaded_meta.labels, LabelSet::serving());
        assert_eq!(loaded_meta.config, small_config());

        let x = Tensor::<TestBackend, 4>::ones([1, 3, 16, 16], &device);
        let a: Vec<f32> = model.forward_softmax(x.clone()).into_data().to_vec().unwrap();
        let b: Vec<f32> = loaded.forward_softmax(x).into_data().to_vec().unwrap();
        // CompactRecorder stores half precision
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-2);
        }
    }

    #[test]
    fn test_missing_sidecar_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.mpk");
        let device = Default::default();

        let model = RiceClassifier::<TestBackend>::new(&small_config(), &device).unwrap();
        save_model(&model, &ArtifactMetadata::new(small_config(), LabelSet::serving()), &path)
            .unwrap();
        std::fs::remove_file(sidecar_path(&path)).unwrap();

        assert!(matches!(
            load_model::<TestBackend>(&path, &device),
            Err(RiceDiseaseError::PathNotFound(_))
        ));
    }

    #[test]
    fn test_label_count_must_match_classes() {
        let metadata = ArtifactMetadata::new(small_config(), LabelSet::new(["a", "b"]));
        assert!(matches!(
            metadata.validate(),
            Err(RiceDiseaseError::LabelMismatch { labels: 2, classes: 5 })
        ));
    }
}
