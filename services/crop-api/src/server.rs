//! HTTP server for the crop service.
//!
//! Provides endpoints for:
//! - `POST /crop` - Crop a file to a bounding box
//! - `GET /files/:file_name/binding` - Inferred coordinates of a file
//! - `GET /status` - Active and recent crop jobs
//! - `GET /health` - Health check
//! - `GET /metrics` - Prometheus metrics

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{Extension, Json, Path, Query},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use subset::{BoundingBox, CropError, CropOptions, CropReport};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::state::AppState;
use crate::tracker::JobOutcome;

/// Request body for `/crop`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CropRequest {
    pub file_name: String,
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
    /// Dataset paths, absolute or relative to the data group
    #[serde(default)]
    pub data_vars: Option<Vec<String>>,
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    /// Overrides the configured data group
    #[serde(default)]
    pub data_group: Option<String>,
    #[serde(default)]
    pub output_name: Option<String>,
}

impl CropRequest {
    /// Validate the bounding box and build engine options.
    pub fn into_options(self) -> Result<CropOptions, CropError> {
        let bbox = BoundingBox::new(self.lat_min, self.lat_max, self.lon_min, self.lon_max)?;
        Ok(CropOptions {
            file_name: self.file_name,
            bbox,
            data_vars: self.data_vars,
            output_dir: self.output_dir,
            data_group: self.data_group,
            output_name: self.output_name,
        })
    }
}

/// Response body for a successful `/crop`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CropResponse {
    pub output_file: String,
    pub copied: Vec<String>,
    pub skipped: Vec<String>,
    pub selected_points: u64,
    pub total_points: u64,
}

impl From<CropReport> for CropResponse {
    fn from(report: CropReport) -> Self {
        Self {
            output_file: report.output_path.display().to_string(),
            copied: report.copied,
            skipped: report.skipped,
            selected_points: report.selected_points,
            total_points: report.total_points,
        }
    }
}

/// Error body returned with every non-2xx crop response.
#[derive(Debug, Serialize, Deserialize)]
pub struct CropErrorBody {
    pub kind: String,
    pub message: String,
}

/// A crop error rendered as an HTTP response.
pub struct ApiError(pub CropError);

impl From<CropError> for ApiError {
    fn from(err: CropError) -> Self {
        Self(err)
    }
}

/// HTTP status for each failure kind.
pub fn status_for(err: &CropError) -> StatusCode {
    match err {
        CropError::FileNotFound(_) => StatusCode::NOT_FOUND,
        CropError::InvalidBoundingBox(_) => StatusCode::BAD_REQUEST,
        CropError::AmbiguousCoordinate(_) | CropError::EmptyIntersection(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        CropError::SlabRead(_) => StatusCode::BAD_GATEWAY,
        CropError::OutputWrite(_) => StatusCode::INTERNAL_SERVER_ERROR,
        CropError::Catalog(_) => StatusCode::SERVICE_UNAVAILABLE,
        CropError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = CropErrorBody {
            kind: self.0.kind().to_string(),
            message: self.0.to_string(),
        };
        (status_for(&self.0), Json(body)).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct BindingQuery {
    pub data_group: Option<String>,
}

/// Response for `/files/:file_name/binding`.
#[derive(Debug, Serialize, Deserialize)]
pub struct BindingResponse {
    pub file_id: i64,
    pub file_name: String,
    pub storage_path: String,
    pub latitude: String,
    pub longitude: String,
    pub coordinate_group: String,
    pub data_group: String,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub catalog: String,
}

/// POST /crop - Crop a file to a bounding box
async fn crop_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<CropRequest>,
) -> Result<Json<CropResponse>, ApiError> {
    let id = Uuid::new_v4().to_string();
    counter!("crop_api_requests_total", "endpoint" => "crop").increment(1);

    info!(
        id = %id,
        file_name = %request.file_name,
        data_vars = ?request.data_vars,
        "Received crop request"
    );

    let options = request.into_options().map_err(|e| {
        warn!(id = %id, error = %e, "Rejected crop request");
        ApiError(e)
    })?;
    let bbox = options.bbox.to_string();

    state.tracker.start(&id, &options.file_name, &bbox).await;
    let result = run_job(&state, &options).await;

    match result {
        Ok(report) => {
            let response = CropResponse::from(report);
            state
                .tracker
                .complete(
                    &id,
                    JobOutcome::Completed {
                        output_file: response.output_file.clone(),
                    },
                )
                .await;
            Ok(Json(response))
        }
        Err(e) => {
            error!(id = %id, kind = e.kind(), error = %e, "Crop request failed");
            state
                .tracker
                .complete(
                    &id,
                    JobOutcome::Failed {
                        kind: e.kind().to_string(),
                        message: e.to_string(),
                    },
                )
                .await;
            Err(ApiError(e))
        }
    }
}

/// Run a crop with the configured timeout.
///
/// A timed out job future is dropped, which removes any partial output.
pub async fn run_job(state: &AppState, options: &CropOptions) -> Result<CropReport, CropError> {
    match state.job_timeout {
        Some(limit) => tokio::time::timeout(limit, state.cropper.crop_file(options))
            .await
            .unwrap_or_else(|_| Err(CropError::Timeout(limit.as_secs()))),
        None => state.cropper.crop_file(options).await,
    }
}

/// GET /files/:file_name/binding - Inferred coordinate datasets
async fn binding_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(file_name): Path<String>,
    Query(query): Query<BindingQuery>,
) -> Result<Json<BindingResponse>, ApiError> {
    counter!("crop_api_requests_total", "endpoint" => "binding").increment(1);

    let (file, binding) = state
        .cropper
        .inspect(&file_name, query.data_group.as_deref())
        .await?;

    Ok(Json(BindingResponse {
        file_id: file.file_id,
        file_name: file.file_name,
        storage_path: file.storage_path,
        latitude: binding.lat_dataset.full_path(),
        longitude: binding.lon_dataset.full_path(),
        coordinate_group: binding.coordinate_group,
        data_group: binding.data_group,
    }))
}

/// GET /status - Active and recent jobs
async fn status_handler(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    Json(state.tracker.get_status().await)
}

/// GET /health - Health check
async fn health_handler(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "crop-api".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        catalog: state.cropper.catalog().backend_name().to_string(),
    })
}

/// GET /metrics - Prometheus metrics
async fn metrics_handler(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    let body = state
        .prometheus
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default();
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
}

/// Build the HTTP router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/crop", post(crop_handler))
        .route("/files/:file_name/binding", get(binding_handler))
        .route("/status", get(status_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Start the HTTP server.
pub async fn start_server(state: Arc<AppState>, listen: &str) -> anyhow::Result<()> {
    let app = build_router(state);

    let addr: SocketAddr = listen.parse()?;
    info!(address = %addr, "Starting crop-api HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog::CatalogError;
    use slab_store::SlabStoreError;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (CropError::FileNotFound("x".into()), 404),
            (CropError::invalid_bbox("lat_min >= lat_max"), 400),
            (CropError::ambiguous("no latitude"), 422),
            (CropError::EmptyIntersection("none".into()), 422),
            (
                CropError::SlabRead(SlabStoreError::read_failed("/FS/Latitude", "io")),
                502,
            ),
            (CropError::output_write("disk full"), 500),
            (
                CropError::Catalog(CatalogError::Database("down".into())),
                503,
            ),
            (CropError::Timeout(30), 504),
        ];
        for (err, expected) in cases {
            assert_eq!(status_for(&err).as_u16(), expected, "{}", err.kind());
        }
    }

    #[test]
    fn test_request_validation() {
        let request: CropRequest = serde_json::from_value(serde_json::json!({
            "file_name": "swath.h5",
            "lat_min": 20.0, "lat_max": 10.0,
            "lon_min": 150.0, "lon_max": 160.0
        }))
        .unwrap();
        let err = request.into_options().unwrap_err();
        assert_eq!(err.kind(), "InvalidBoundingBox");
    }

    #[test]
    fn test_request_optional_fields() {
        let request: CropRequest = serde_json::from_value(serde_json::json!({
            "file_name": "swath.h5",
            "lat_min": 10.0, "lat_max": 20.0,
            "lon_min": 150.0, "lon_max": 160.0,
            "data_vars": ["SLV/precipRate"],
            "output_name": "mine.h5"
        }))
        .unwrap();
        let options = request.into_options().unwrap();
        assert_eq!(options.data_vars, Some(vec!["SLV/precipRate".to_string()]));
        assert_eq!(options.output_name.as_deref(), Some("mine.h5"));
        assert!(options.output_dir.is_none());
    }
}
