//! End-to-end diagnosis pipeline
//!
//! Preprocess, classify, Grad-CAM and overlay for one image. The engine is built once
//! from a model artifact and is immutable afterwards; cloning it is cheap because
//! Burn parameters are reference counted.

use std::path::Path;
use std::time::Instant;

use burn::module::AutodiffModule;
use burn::tensor::backend::AutodiffBackend;
use image::{DynamicImage, RgbImage};
use tracing::{debug, info};

use super::artifact::{self, ArtifactMetadata};
use super::gradcam::{GradCam, Heatmap};
use super::overlay::{self, OVERLAY_ALPHA};
use super::predictor::{Prediction, Predictor};
use super::preprocess::{self, ImagePreprocessor};
use crate::dataset::LabelSet;
use crate::model::{ModelConfig, RiceClassifier};
use crate::utils::error::{Result, RiceDiseaseError};

/// Everything the pipeline produces for one image
#[derive(Debug, Clone)]
pub struct Diagnosis {
    pub prediction: Prediction,
    /// Grad-CAM map at the target layer's resolution
    pub heatmap: Heatmap,
    /// The input at model resolution
    pub resized: RgbImage,
    /// Heatmap superimposed on `resized`
    pub overlay: RgbImage,
}

impl Diagnosis {
    /// Overlay as a base64 JPEG
    pub fn overlay_base64(&self) -> Result<String> {
        overlay::jpeg_base64(&self.overlay)
    }
}

/// Loaded classifier with its labels, ready to diagnose images
#[derive(Debug, Clone)]
pub struct InferenceEngine<B: AutodiffBackend> {
    model: RiceClassifier<B>,
    metadata: ArtifactMetadata,
    preprocessor: ImagePreprocessor,
    gradcam: GradCam,
    device: B::Device,
}

impl<B: AutodiffBackend> InferenceEngine<B> {
    /// Load an engine from a model artifact (weights + JSON sidecar)
    pub fn load<P: AsRef<Path>>(path: P, device: &B::Device) -> Result<Self> {
        let (model, metadata) = artifact::load_model::<B>(path.as_ref(), device)?;
        let engine = Self::from_parts(model, metadata.config.clone(), metadata.labels.clone(), device.clone())?;
        info!(
            "Inference engine ready: labels {:?}, Grad-CAM layer '{}'",
            engine.labels().as_slice(),
            engine.gradcam.layer()
        );
        Ok(engine)
    }

    /// Build an engine from an in-memory model
    pub fn from_parts(
        model: RiceClassifier<B>,
        config: ModelConfig,
        labels: LabelSet,
        device: B::Device,
    ) -> Result<Self> {
        let metadata = ArtifactMetadata {
            config,
            labels,
            created_at: None,
        };
        metadata.validate()?;

        if model.num_classes() != metadata.config.num_classes {
            return Err(RiceDiseaseError::LabelMismatch {
                labels: metadata.labels.len(),
                classes: model.num_classes(),
            });
        }

        Ok(Self {
            preprocessor: ImagePreprocessor::new(metadata.config.input_size),
            gradcam: GradCam::new(metadata.config.target_layer.clone()),
            model,
            metadata,
            device,
        })
    }

    pub fn labels(&self) -> &LabelSet {
        &self.metadata.labels
    }

    pub fn config(&self) -> &ModelConfig {
        &self.metadata.config
    }

    /// Plain predictor on the non-autodiff backend, for paths that need no heatmap
    pub fn predictor(&self) -> Result<Predictor<B::InnerBackend>> {
        Predictor::new(
            self.model.valid(),
            self.metadata.labels.clone(),
            self.metadata.config.input_size,
            self.device.clone(),
        )
    }

    /// Decode and diagnose encoded image bytes
    pub fn diagnose_bytes(&self, bytes: &[u8]) -> Result<Diagnosis> {
        let image = preprocess::decode_image(bytes)?;
        self.diagnose_image(&image)
    }

    /// Run the full pipeline on a decoded image
    pub fn diagnose_image(&self, image: &DynamicImage) -> Result<Diagnosis> {
        let start = Instant::now();

        let input = self.preprocessor.preprocess::<B>(image, &self.device);
        let cam = self.gradcam.compute(&self.model, input.tensor)?;
        let prediction = Prediction::from_probabilities(cam.probabilities, &self.metadata.labels)?;
        let overlay = overlay::overlay_heatmap(&input.resized, &cam.heatmap, OVERLAY_ALPHA)?;

        debug!(
            "Diagnosed {} ({:.2}%) in {:.1} ms",
            prediction.label,
            prediction.confidence_percent(),
            start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(Diagnosis {
            prediction,
            heatmap: cam.heatmap,
            resized: input.resized,
            overlay,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::Autodiff;
    use burn_ndarray::NdArray;
    use image::Rgb;
    use std::io::Cursor;

    type TestBackend = Autodiff<NdArray>;

    fn small_config() -> ModelConfig {
        ModelConfig {
            input_size: 32,
            conv_filters: vec![4, 8],
            dense_units: 8,
            ..Default::default()
        }
    }

    fn engine() -> InferenceEngine<TestBackend> {
        let device = Default::default();
        let model = RiceClassifier::new(&small_config(), &device).unwrap();
        InferenceEngine::from_parts(model, small_config(), LabelSet::serving(), device).unwrap()
    }

    fn leaf_jpeg() -> Vec<u8> {
        let img = RgbImage::from_fn(64, 48, |x, y| Rgb([(x * 3) as u8, 150, (y * 5) as u8]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Jpeg)
            .unwrap();
        bytes
    }

    #[test]
    fn test_diagnose_bytes() {
        let diagnosis = engine().diagnose_bytes(&leaf_jpeg()).unwrap();

        assert!(LabelSet::serving().index_of(&diagnosis.prediction.label).is_some());
        let sum: f32 = diagnosis.prediction.probabilities.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!((0.0..=100.0).contains(&diagnosis.prediction.confidence_percent()));

        assert_eq!(diagnosis.resized.dimensions(), (32, 32));
        assert_eq!(diagnosis.overlay.dimensions(), diagnosis.resized.dimensions());
        assert!(diagnosis
            .heatmap
            .values()
            .iter()
            .all(|v| (0.0..=1.0).contains(v)));
        assert!(!diagnosis.overlay_base64().unwrap().is_empty());
    }

    #[test]
    fn test_engine_and_predictor_agree() {
        let engine = engine();
        let image = image::load_from_memory(&leaf_jpeg()).unwrap();

        let diagnosis = engine.diagnose_image(&image).unwrap();
        let prediction = engine.predictor().unwrap().predict_image(&image).unwrap();
        assert_eq!(diagnosis.prediction.index, prediction.index);
    }

    #[test]
    fn test_batch_predictor_matches_diagnosis() {
        let engine = engine();
        let images = vec![
            image::load_from_memory(&leaf_jpeg()).unwrap(),
            DynamicImage::ImageRgb8(RgbImage::from_pixel(50, 20, Rgb([200, 40, 10]))),
            DynamicImage::ImageRgb8(RgbImage::from_pixel(32, 32, Rgb([10, 10, 10]))),
        ];

        let batch = engine.predictor().unwrap().predict_batch(&images).unwrap();
        assert_eq!(batch.len(), images.len());
        for (image, prediction) in images.iter().zip(&batch) {
            let diagnosis = engine.diagnose_image(image).unwrap();
            assert_eq!(diagnosis.prediction.index, prediction.index);
            for (a, b) in diagnosis.prediction.probabilities.iter().zip(&prediction.probabilities) {
                assert!((a - b).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn test_invalid_bytes() {
        let err = engine().diagnose_bytes(b"not an image").unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn test_mismatched_labels_rejected() {
        let device = Default::default();
        let model = RiceClassifier::<TestBackend>::new(&small_config(), &device).unwrap();
        let result =
            InferenceEngine::from_parts(model, small_config(), LabelSet::new(["a", "b"]), device);
        assert!(matches!(result, Err(RiceDiseaseError::LabelMismatch { .. })));
    }
}
