//! Grad-CAM saliency maps
//!
//! Gradient-weighted class activation mapping over a named convolution layer. The
//! class score is differentiated with respect to that layer's activations; each
//! channel's gradient is averaged over space into a weight, and the weighted sum of
//! the activation channels (negatives clamped) becomes the heatmap.
//!
//! Reference: Selvaraju et al. (2017) "Grad-CAM: Visual Explanations from Deep
//! Networks via Gradient-based Localization"

use burn::prelude::*;
use burn::tensor::activation::softmax;
use burn::tensor::backend::AutodiffBackend;
use image::imageops::FilterType;
use image::{ImageBuffer, Luma};
use serde::Serialize;

use super::predictor::argmax;
use crate::model::{RiceClassifier, TARGET_LAYER};
use crate::utils::error::{Result, RiceDiseaseError};

/// Added to the maximum before normalizing, so all-zero maps stay finite
pub const NORMALIZATION_EPSILON: f32 = 1e-8;

/// Row-major 2-D map of values in `[0, 1]`
///
/// Only built through `new`, which checks the value count.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Heatmap {
    width: usize,
    height: usize,
    values: Vec<f32>,
}

impl Heatmap {
    /// Build a heatmap from row-major values
    pub fn new(width: usize, height: usize, values: Vec<f32>) -> Result<Self> {
        if values.len() != width * height {
            return Err(RiceDiseaseError::Inference(format!(
                "heatmap of {}x{} needs {} values, got {}",
                width,
                height,
                width * height,
                values.len()
            )));
        }
        Ok(Self {
            width,
            height,
            values,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Value at column `x`, row `y`, `None` outside the map
    pub fn get(&self, x: usize, y: usize) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.values.get(y * self.width + x).copied()
    }

    /// Bilinear resize to `width x height`
    pub fn upsample(&self, width: u32, height: u32) -> Result<Self> {
        let buffer: ImageBuffer<Luma<f32>, Vec<f32>> =
            ImageBuffer::from_raw(self.width as u32, self.height as u32, self.values.clone())
                .ok_or_else(|| {
                    RiceDiseaseError::Inference("heatmap buffer has the wrong size".to_string())
                })?;

        let resized = image::imageops::resize(&buffer, width, height, FilterType::Triangle);
        let values = resized
            .into_raw()
            .into_iter()
            .map(|v| v.clamp(0.0, 1.0))
            .collect();

        Self::new(width as usize, height as usize, values)
    }
}

/// Compute the normalized Grad-CAM map from one sample's activations and gradients
///
/// Both tensors have shape [1, channels, height, width]; extra batch entries are ignored.
pub fn grad_cam_from<B: Backend>(
    activations: Tensor<B, 4>,
    gradients: Tensor<B, 4>,
) -> Result<Heatmap> {
    if activations.dims() != gradients.dims() {
        return Err(RiceDiseaseError::Inference(format!(
            "activation shape {:?} does not match gradient shape {:?}",
            activations.dims(),
            gradients.dims()
        )));
    }

    let [batch, channels, height, width] = activations.dims();
    if batch == 0 {
        return Err(RiceDiseaseError::Inference("empty batch".to_string()));
    }

    let activations = activations.slice([0..1, 0..channels, 0..height, 0..width]);
    let gradients = gradients.slice([0..1, 0..channels, 0..height, 0..width]);

    // Global average pool the gradients: [1, C, H, W] -> [1, C, 1, 1]
    let weights = gradients.mean_dim(3).mean_dim(2);

    // Weighted sum of activation channels: [1, C, H, W] -> [1, 1, H, W]
    let cam = (activations * weights).sum_dim(1).clamp_min(0.0);

    let raw: Vec<f32> = cam
        .reshape([height * width])
        .into_data()
        .convert::<f32>()
        .to_vec()
        .map_err(|e| RiceDiseaseError::Inference(format!("{:?}", e)))?;

    let max = raw.iter().copied().fold(0.0f32, f32::max);
    let values = raw
        .into_iter()
        .map(|v| {
            let v = v / (max + NORMALIZATION_EPSILON);
            if v.is_finite() {
                v.clamp(0.0, 1.0)
            } else {
                0.0
            }
        })
        .collect();

    Heatmap::new(width, height, values)
}

/// Output of a Grad-CAM pass: the class distribution and the map for the top class
#[derive(Debug, Clone)]
pub struct GradCamResult {
    /// Softmax probabilities for the single input image
    pub probabilities: Vec<f32>,
    /// Index of the explained (top-scoring) class
    pub class_index: usize,
    /// Map at the target layer's spatial resolution
    pub heatmap: Heatmap,
}

/// Grad-CAM over a named convolution layer
#[derive(Debug, Clone)]
pub struct GradCam {
    layer: String,
}

impl Default for GradCam {
    fn default() -> Self {
        Self::new(TARGET_LAYER)
    }
}

impl GradCam {
    pub fn new(layer: impl Into<String>) -> Self {
        Self {
            layer: layer.into(),
        }
    }

    pub fn layer(&self) -> &str {
        &self.layer
    }

    /// Classify `input` ([1, 3, H, W]) and explain the top-scoring class
    ///
    /// The score differentiated is the softmax probability of the predicted class.
    pub fn compute<B: AutodiffBackend>(
        &self,
        model: &RiceClassifier<B>,
        input: Tensor<B, 4>,
    ) -> Result<GradCamResult> {
        let activations = model
            .forward_until(input, &self.layer)?
            .detach()
            .require_grad();
        let logits = model.forward_from(activations.clone(), &self.layer)?;
        let probs = softmax(logits, 1);

        let [_, num_classes] = probs.dims();
        let probabilities: Vec<f32> = probs
            .clone()
            .slice([0..1, 0..num_classes])
            .into_data()
            .convert::<f32>()
            .to_vec()
            .map_err(|e| RiceDiseaseError::Inference(format!("{:?}", e)))?;

        let class_index = argmax(&probabilities)
            .ok_or_else(|| RiceDiseaseError::Inference("model produced no classes".to_string()))?;

        let score = probs
            .slice([0..1, class_index..class_index + 1])
            .sum();
        let grads = score.backward();

        let gradients = activations.grad(&grads).ok_or_else(|| {
            RiceDiseaseError::Inference(format!(
                "no gradient reached layer '{}'",
                self.layer
            ))
        })?;

        let heatmap = grad_cam_from(activations.inner(), gradients)?;

        Ok(GradCamResult {
            probabilities,
            class_index,
            heatmap,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelConfig;
    use burn::backend::Autodiff;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;
    type TestAutodiffBackend = Autodiff<NdArray>;

    #[test]
    fn test_grad_cam_from_uniform_gradients() {
        let device = Default::default();
        let activations = Tensor::<TestBackend, 4>::from_floats(
            [[[[0.0, 1.0], [2.0, 4.0]], [[1.0, 1.0], [1.0, 1.0]]]],
            &device,
        );
        let gradients = Tensor::<TestBackend, 4>::ones([1, 2, 2, 2], &device);

        let heatmap = grad_cam_from(activations, gradients).unwrap();
        assert_eq!((heatmap.width(), heatmap.height()), (2, 2));

        // cam = [1, 2, 3, 5] normalized by 5
        let expected = [0.2, 0.4, 0.6, 1.0];
        for (v, e) in heatmap.values().iter().zip(expected) {
            assert!((v - e).abs() < 1e-5);
        }
    }

    #[test]
    fn test_negative_contributions_are_clamped() {
        let device = Default::default();
        let activations = Tensor::<TestBackend, 4>::ones([1, 3, 4, 4], &device);
        let gradients = Tensor::<TestBackend, 4>::ones([1, 3, 4, 4], &device) * -1.0;

        let heatmap = grad_cam_from(activations, gradients).unwrap();
        assert!(heatmap.values().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_zero_activations_do_not_produce_nan() {
        let device = Default::default();
        let activations = Tensor::<TestBackend, 4>::zeros([1, 4, 3, 3], &device);
        let gradients = Tensor::<TestBackend, 4>::ones([1, 4, 3, 3], &device);

        let heatmap = grad_cam_from(activations, gradients).unwrap();
        assert!(heatmap.values().iter().all(|v| v.is_finite() && *v == 0.0));
    }

    #[test]
    fn test_shape_mismatch_is_an_error() {
        let device = Default::default();
        let activations = Tensor::<TestBackend, 4>::zeros([1, 4, 3, 3], &device);
        let gradients = Tensor::<TestBackend, 4>::zeros([1, 4, 2, 2], &device);
        assert!(grad_cam_from(activations, gradients).is_err());
    }

    #[test]
    fn test_get_is_bounds_checked() {
        let heatmap = Heatmap::new(3, 2, vec![0.0, 0.1, 0.2, 0.3, 0.4, 0.5]).unwrap();
        assert_eq!(heatmap.get(2, 1), Some(0.5));
        assert_eq!(heatmap.get(0, 1), Some(0.3));
        // x past the row width must not wrap into the next row
        assert_eq!(heatmap.get(3, 0), None);
        assert_eq!(heatmap.get(0, 2), None);
    }

    #[test]
    fn test_new_rejects_wrong_value_count() {
        assert!(Heatmap::new(2, 2, vec![0.0; 3]).is_err());
        assert!(Heatmap::new(0, 0, Vec::new()).is_ok());
    }

    #[test]
    fn test_upsample_keeps_range() {
        let heatmap = Heatmap::new(2, 2, vec![0.0, 1.0, 0.5, 0.25]).unwrap();
        let up = heatmap.upsample(7, 5).unwrap();
        assert_eq!((up.width(), up.height()), (7, 5));
        assert!(up.values().iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_compute_on_model() {
        let device = Default::default();
        let config = ModelConfig {
            input_size: 16,
            conv_filters: vec![4, 8],
            dense_units: 8,
            ..Default::default()
        };
        let model = RiceClassifier::<TestAutodiffBackend>::new(&config, &device).unwrap();
        let input = Tensor::<TestAutodiffBackend, 4>::random(
            [1, 3, 16, 16],
            burn::tensor::Distribution::Uniform(0.0, 1.0),
            &device,
        );

        let result = GradCam::default().compute(&model, input).unwrap();
        let grid = config.target_grid_size().unwrap();

        assert_eq!(result.probabilities.len(), 5);
        assert_eq!(result.class_index, argmax(&result.probabilities).unwrap());
        assert_eq!(result.heatmap.width(), grid);
        assert_eq!(result.heatmap.height(), grid);
        assert!(result
            .heatmap
            .values()
            .iter()
            .all(|v| v.is_finite() && (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_compute_unknown_layer() {
        let device = Default::default();
        let config = ModelConfig {
            input_size: 16,
            conv_filters: vec![4, 8],
            ..Default::default()
        };
        let model = RiceClassifier::<TestAutodiffBackend>::new(&config, &device).unwrap();
        let input = Tensor::<TestAutodiffBackend, 4>::zeros([1, 3, 16, 16], &device);

        let err = GradCam::new("conv9").compute(&model, input).unwrap_err();
        assert!(matches!(err, RiceDiseaseError::LayerNotFound { .. }));
    }
}
