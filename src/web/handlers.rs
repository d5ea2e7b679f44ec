use crate::{
    detection::{
        aggregator, ClassifiedDetection, DetectionService, DetectorStatus, DualDetections,
        GroupedDetection, OrchestrationMode,
    },
    image::ImageLoader,
    utils::error::DetectError,
    web::{
        extractors::{RequestId, Validate, ValidatedJson},
        AppState,
    },
    Result,
};
use axum::{
    body::Bytes,
    extract::{Multipart, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// JSON request body (base64 mode)
#[derive(Debug, Deserialize)]
pub struct DetectJsonRequest {
    /// Base64 image data, optionally as a data URL
    pub image: String,
}

#[derive(Debug, Deserialize)]
pub struct EnsembleRequest {
    pub enabled: bool,
}

/// Response envelope shared by every endpoint
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
    pub timestamp: String,
    pub request_id: String,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T, request_id: RequestId) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
            request_id: request_id.0,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DetectionResponse {
    /// Detections grouped by name and category
    pub items: Vec<GroupedDetection>,
    /// Individual detections as returned by the orchestration
    pub detections: Vec<ClassifiedDetection>,
    pub total_detected: usize,
    pub mode: OrchestrationMode,
    pub processing_time: f64,
}

#[derive(Debug, Serialize)]
pub struct ModelStatusResponse {
    #[serde(flatten)]
    pub status: DetectorStatus,
    pub mode: OrchestrationMode,
}

impl ModelStatusResponse {
    fn new(status: DetectorStatus) -> Self {
        let mode = OrchestrationMode::select(
            status.primary_model_ready,
            status.secondary_model_ready,
            status.ensemble_mode,
        );
        Self { status, mode }
    }
}

impl Validate for DetectJsonRequest {
    type Error = String;

    fn validate(&self) -> std::result::Result<(), Self::Error> {
        if self.image.trim().is_empty() {
            return Err("Image data cannot be empty".to_string());
        }
        Ok(())
    }
}

impl Validate for EnsembleRequest {
    type Error = String;

    fn validate(&self) -> std::result::Result<(), Self::Error> {
        Ok(())
    }
}

/// Multipart upload handler
pub async fn detect_upload_handler(
    State(state): State<AppState>,
    request_id: RequestId,
    multipart: Multipart,
) -> Result<Json<ApiResponse<DetectionResponse>>> {
    tracing::info!("Processing multipart detection request: request_id={}", request_id.0);

    let image_data = read_image_field(multipart).await?;
    let response = run_detection(Arc::clone(&state.service), image_data).await?;

    tracing::info!(
        "Upload detection completed: request_id={}, detections={}, time={:.3}s",
        request_id.0,
        response.total_detected,
        response.processing_time
    );

    Ok(Json(ApiResponse::success(response, request_id)))
}

/// JSON base64 handler
pub async fn detect_json_handler(
    State(state): State<AppState>,
    request_id: RequestId,
    ValidatedJson(request): ValidatedJson<DetectJsonRequest>,
) -> Result<Json<ApiResponse<DetectionResponse>>> {
    tracing::info!("Processing JSON detection request: request_id={}", request_id.0);

    let image_data = Bytes::from(ImageLoader::decode_base64(&request.image)?);
    let response = run_detection(Arc::clone(&state.service), image_data).await?;

    tracing::info!(
        "JSON detection completed: request_id={}, detections={}, time={:.3}s",
        request_id.0,
        response.total_detected,
        response.processing_time
    );

    Ok(Json(ApiResponse::success(response, request_id)))
}

/// Runs each model separately on an uploaded image
pub async fn compare_handler(
    State(state): State<AppState>,
    request_id: RequestId,
    multipart: Multipart,
) -> Result<Json<ApiResponse<DualDetections>>> {
    let image_data = read_image_field(multipart).await?;
    let service = Arc::clone(&state.service);

    let result = tokio::task::spawn_blocking(move || {
        service.detect_both_models_separately(&image_data)
    })
    .await
    .map_err(|e| DetectError::Internal(format!("Detection task failed: {}", e)))??;

    tracing::info!(
        "Comparison completed: request_id={}, model1={}, model2={}",
        request_id.0,
        result.model1.len(),
        result.model2.len()
    );

    Ok(Json(ApiResponse::success(result, request_id)))
}

pub async fn model_status_handler(
    State(state): State<AppState>,
    request_id: RequestId,
) -> Json<ApiResponse<ModelStatusResponse>> {
    let status = ModelStatusResponse::new(state.service.status());
    Json(ApiResponse::success(status, request_id))
}

pub async fn ensemble_handler(
    State(state): State<AppState>,
    request_id: RequestId,
    ValidatedJson(request): ValidatedJson<EnsembleRequest>,
) -> Json<ApiResponse<ModelStatusResponse>> {
    let status = ModelStatusResponse::new(state.service.set_ensemble_mode(request.enabled));
    Json(ApiResponse::success(status, request_id))
}

async fn run_detection(
    service: Arc<DetectionService>,
    image_data: Bytes,
) -> Result<DetectionResponse> {
    let start_time = Instant::now();

    let (detections, mode) =
        tokio::task::spawn_blocking(move || service.detect_with_mode(&image_data))
            .await
            .map_err(|e| DetectError::Internal(format!("Detection task failed: {}", e)))??;

    Ok(DetectionResponse {
        items: aggregator::group_and_count(&detections),
        total_detected: detections.len(),
        detections,
        mode,
        processing_time: start_time.elapsed().as_secs_f64(),
    })
}

/// Reads the `file` field of a multipart upload
async fn read_image_field(mut multipart: Multipart) -> Result<Bytes> {
    let mut image_data: Option<Bytes> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        DetectError::InvalidInput(format!("Failed to read multipart field: {}", e))
    })? {
        let field_name = field.name().unwrap_or("unknown").to_string();

        if field_name != "file" {
            tracing::debug!("Ignoring unknown field: {}", field_name);
            continue;
        }

        let data = field.bytes().await.map_err(|e| {
            DetectError::InvalidInput(format!("Failed to read file data: {}", e))
        })?;

        // unknown magic bytes are left for the decoder to reject
        if let Some(format) = ImageLoader::detect_format(&data) {
            if !ImageLoader::is_supported_format(format) {
                return Err(DetectError::UnsupportedFormat(format!("{:?}", format)));
            }
        }

        tracing::debug!("Received file: {} bytes", data.len());
        image_data = Some(data);
    }

    image_data.ok_or_else(|| DetectError::InvalidInput("No image file provided".to_string()))
}
