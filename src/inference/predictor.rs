//! Inference Predictor Module
//!
//! Runs the classifier on preprocessed images and turns probability rows into
//! labelled predictions.

use std::time::Instant;

use burn::prelude::*;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::preprocess::ImagePreprocessor;
use crate::dataset::LabelSet;
use crate::model::RiceClassifier;
use crate::utils::error::{Result, RiceDiseaseError};
use crate::utils::round2;

/// Index of the first maximum, `None` for an empty slice
pub fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Result of a single prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Predicted class index
    pub index: usize,

    /// Predicted class name
    pub label: String,

    /// Probability of the predicted class
    pub confidence: f32,

    /// Full probability distribution over the label set
    pub probabilities: Vec<f32>,
}

impl Prediction {
    /// Build a prediction from one probability row
    pub fn from_probabilities(probabilities: Vec<f32>, labels: &LabelSet) -> Result<Self> {
        if probabilities.len() != labels.len() {
            return Err(RiceDiseaseError::LabelMismatch {
                labels: labels.len(),
                classes: probabilities.len(),
            });
        }

        let index = argmax(&probabilities)
            .ok_or_else(|| RiceDiseaseError::Inference("empty probability vector".to_string()))?;
        let label = labels
            .name(index)
            .ok_or_else(|| RiceDiseaseError::Inference(format!("no label for class {}", index)))?
            .to_string();

        Ok(Self {
            index,
            label,
            confidence: probabilities[index],
            probabilities,
        })
    }

    /// Confidence as a percentage rounded to two decimals
    pub fn confidence_percent(&self) -> f64 {
        round2(self.confidence as f64 * 100.0)
    }

    /// The `k` most probable classes, highest first
    pub fn top_k(&self, k: usize, labels: &LabelSet) -> Vec<(usize, String, f32)> {
        let mut indexed: Vec<(usize, f32)> = self.probabilities.iter().copied().enumerate().collect();
        indexed.sort_by(|a, b| b.1.total_cmp(&a.1));

        indexed
            .into_iter()
            .take(k)
            .map(|(idx, prob)| {
                let name = labels.name(idx).unwrap_or("Unknown").to_string();
                (idx, name, prob)
            })
            .collect()
    }

    /// Pretty print the prediction with its top-k classes
    pub fn display(&self, labels: &LabelSet, k: usize) -> String {
        let mut output = format!(
            "Prediction: {} (class {})\nConfidence: {:.2}%\n",
            self.label,
            self.index,
            self.confidence_percent()
        );

        output.push_str(&format!("\nTop-{} predictions:\n", k));
        for (i, (idx, name, prob)) in self.top_k(k, labels).iter().enumerate() {
            output.push_str(&format!(
                "  {}. {} (class {}) - {:.2}%\n",
                i + 1,
                name,
                idx,
                prob * 100.0
            ));
        }

        output
    }
}

/// Predictor for running inference with a trained model
#[derive(Debug, Clone)]
pub struct Predictor<B: Backend> {
    model: RiceClassifier<B>,
    labels: LabelSet,
    preprocessor: ImagePreprocessor,
    device: B::Device,
}

impl<B: Backend> Predictor<B> {
    /// Create a predictor, checking that the labels cover the model output
    pub fn new(
        model: RiceClassifier<B>,
        labels: LabelSet,
        image_size: usize,
        device: B::Device,
    ) -> Result<Self> {
        if labels.len() != model.num_classes() {
            return Err(RiceDiseaseError::LabelMismatch {
                labels: labels.len(),
                classes: model.num_classes(),
            });
        }

        Ok(Self {
            model,
            labels,
            preprocessor: ImagePreprocessor::new(image_size),
            device,
        })
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn model(&self) -> &RiceClassifier<B> {
        &self.model
    }

    pub fn preprocessor(&self) -> &ImagePreprocessor {
        &self.preprocessor
    }

    /// Probability matrix for a batch tensor, one row per image
    pub fn predict_probabilities(&self, batch: Tensor<B, 4>) -> Result<Vec<Vec<f32>>> {
        let [batch_size, _, _, _] = batch.dims();
        let num_classes = self.model.num_classes();

        let probs = self.model.forward_softmax(batch);
        let flat: Vec<f32> = probs
            .into_data()
            .convert::<f32>()
            .to_vec()
            .map_err(|e| RiceDiseaseError::Inference(format!("{:?}", e)))?;

        debug_assert_eq!(flat.len(), batch_size * num_classes);
        Ok(flat.chunks(num_classes).map(<[f32]>::to_vec).collect())
    }

    /// Predict every image in a batch tensor
    pub fn predict_tensor(&self, batch: Tensor<B, 4>) -> Result<Vec<Prediction>> {
        self.predict_probabilities(batch)?
            .into_iter()
            .map(|row| Prediction::from_probabilities(row, &self.labels))
            .collect()
    }

    /// Predict a single decoded image
    pub fn predict_image(&self, image: &DynamicImage) -> Result<Prediction> {
        let start = Instant::now();
        let input = self.preprocessor.preprocess::<B>(image, &self.device);
        let prediction = self
            .predict_tensor(input.tensor)?
            .pop()
            .ok_or_else(|| RiceDiseaseError::Inference("empty batch output".to_string()))?;

        debug!(
            "Predicted {} ({:.2}%) in {:.2} ms",
            prediction.label,
            prediction.confidence_percent(),
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(prediction)
    }

    /// Predict a batch of decoded images
    pub fn predict_batch(&self, images: &[DynamicImage]) -> Result<Vec<Prediction>> {
        if images.is_empty() {
            return Ok(Vec::new());
        }

        let resized: Vec<_> = images
            .iter()
            .map(|img| super::preprocess::resize_rgb(img, self.preprocessor.image_size()))
            .collect();
        let batch = self.preprocessor.batch_tensor::<B>(&resized, &self.device);
        self.predict_tensor(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelConfig;
    use burn_ndarray::NdArray;
    use image::{Rgb, RgbImage};

    type TestBackend = NdArray;

    fn predictor() -> Predictor<TestBackend> {
        let device = Default::default();
        let config = ModelConfig {
            input_size: 16,
            conv_filters: vec![4, 8],
            dense_units: 8,
            ..Default::default()
        };
        let model = RiceClassifier::new(&config, &device).unwrap();
        Predictor::new(model, LabelSet::serving(), 16, device).unwrap()
    }

    #[test]
    fn test_argmax_takes_first_maximum() {
        assert_eq!(argmax(&[0.1, 0.4, 0.4, 0.1]), Some(1));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn test_prediction_from_probabilities() {
        let labels = LabelSet::serving();
        let pred =
            Prediction::from_probabilities(vec![0.05, 0.1, 0.7, 0.1, 0.05], &labels).unwrap();

        assert_eq!(pred.index, 2);
        assert_eq!(pred.label, "Brownspot");
        assert_eq!(pred.confidence_percent(), 70.0);

        let top = pred.top_k(2, &labels);
        assert_eq!(top[0].1, "Brownspot");
        assert_eq!(top.len(), 2);
    }

    #[test]
    fn test_display_lists_top_k() {
        let labels = LabelSet::serving();
        let pred =
            Prediction::from_probabilities(vec![0.05, 0.6, 0.1, 0.2, 0.05], &labels).unwrap();

        let text = pred.display(&labels, 2);
        assert!(text.starts_with("Prediction: Blast (class 1)\nConfidence: 60.00%"));
        assert!(text.contains("Top-2 predictions:"));
        assert!(text.contains("  1. Blast (class 1) - 60.00%"));
        assert!(text.contains("  2. Healthy (class 3) - 20.00%"));
        assert!(!text.contains("Brownspot"));
    }

    #[test]
    fn test_confidence_percent_rounding() {
        let labels = LabelSet::new(["a", "b"]);
        let pred = Prediction::from_probabilities(vec![0.123456, 0.876544], &labels).unwrap();
        assert_eq!(pred.confidence_percent(), 87.65);
    }

    #[test]
    fn test_label_count_mismatch() {
        let labels = LabelSet::new(["a", "b"]);
        let err = Prediction::from_probabilities(vec![0.2, 0.3, 0.5], &labels).unwrap_err();
        assert!(matches!(
            err,
            RiceDiseaseError::LabelMismatch { labels: 2, classes: 3 }
        ));
    }

    #[test]
    fn test_predict_image_distribution() {
        let predictor = predictor();
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 40, Rgb([40, 160, 60])));
        let pred = predictor.predict_image(&img).unwrap();

        assert_eq!(pred.probabilities.len(), 5);
        let sum: f32 = pred.probabilities.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!(LabelSet::serving().index_of(&pred.label).is_some());
        assert!((0.0..=100.0).contains(&pred.confidence_percent()));
    }

    #[test]
    fn test_predict_batch_rows() {
        let predictor = predictor();
        let images = vec![
            DynamicImage::ImageRgb8(RgbImage::from_pixel(20, 20, Rgb([0, 0, 0]))),
            DynamicImage::ImageRgb8(RgbImage::from_pixel(30, 10, Rgb([255, 255, 255]))),
        ];
        let preds = predictor.predict_batch(&images).unwrap();
        assert_eq!(preds.len(), 2);
    }

    #[test]
    fn test_predictor_rejects_wrong_label_count() {
        let device = Default::default();
        let config = ModelConfig {
            input_size: 16,
            conv_filters: vec![4, 8],
            ..Default::default()
        };
        let model = RiceClassifier::<TestBackend>::new(&config, &device).unwrap();
        assert!(Predictor::new(model, LabelSet::new(["only", "two"]), 16, device).is_err());
    }
}
