//! Diagnosis endpoint
//!
//! Accepts a multipart upload with a `file` field and answers with the prediction, an
//! explanation and base64 JPEGs of the original image and its Grad-CAM overlay. A
//! JPEG upload is echoed as sent.

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::Json;
use rice_disease::inference::overlay::original_base64;
use rice_disease::inference::{decode_image, Prediction};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ApiError;
use crate::state::SharedState;

/// Multipart field carrying the image
pub const UPLOAD_FIELD: &str = "file";

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    pub filename: String,
    pub predicted_class: String,
    pub confidence_percent: f64,
    pub ai_explanation: String,
    pub original_image_base64: String,
    pub grad_cam_image_base64: String,
}

struct Upload {
    filename: String,
    bytes: Vec<u8>,
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {}", e)))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?;

        return Ok(Upload {
            filename,
            bytes: bytes.to_vec(),
        });
    }

    Err(ApiError::BadRequest(format!(
        "Missing multipart field '{}'",
        UPLOAD_FIELD
    )))
}

/// POST /predict - Diagnose an uploaded leaf image
pub async fn predict(
    State(state): State<SharedState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let multipart = multipart.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let upload = read_upload(multipart).await?;
    debug!("Received '{}' ({} bytes)", upload.filename, upload.bytes.len());

    let engine = state.engine()?;
    let bytes = upload.bytes;

    // The pipeline is CPU bound; keep it off the async workers
    let (prediction, original, overlay): (Prediction, String, String) =
        tokio::task::spawn_blocking(move || {
            let image = decode_image(&bytes)?;
            let diagnosis = engine.diagnose_image(&image)?;
            let original = original_base64(&bytes, &image)?;
            let overlay = diagnosis.overlay_base64()?;
            Ok::<_, rice_disease::RiceDiseaseError>((diagnosis.prediction, original, overlay))
        })
        .await
        .map_err(|e| ApiError::Internal(format!("Diagnosis task failed: {}", e)))??;

    let explanation = state.explainer.explain(&prediction.label).await;

    info!(
        "{} -> {} ({:.2}%)",
        upload.filename,
        prediction.label,
        prediction.confidence_percent()
    );

    Ok(Json(PredictResponse {
        filename: upload.filename,
        confidence_percent: prediction.confidence_percent(),
        predicted_class: prediction.label,
        ai_explanation: explanation.into_text(),
        original_image_base64: original,
        grad_cam_image_base64: overlay,
    }))
}
