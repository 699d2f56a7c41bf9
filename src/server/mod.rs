// HTTP server module
// Upload, query and suggestion endpoints over the ingestion and answering pipelines


use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::{debug, error, info, warn};

use crate::SynapseError;
use crate::index::VectorIndex;
use crate::pipeline::{AnsweringEngine, DEFAULT_QUESTION_COUNT, IngestionPipeline, Source};

const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Shared state handed to every request handler
pub struct AppState {
    pub pipeline: IngestionPipeline,
    pub engine: AnsweringEngine,
    pub index: Arc<dyn VectorIndex>,
    /// Directory holding in-flight uploads
    pub upload_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<Source>,
}

#[derive(Debug, Deserialize)]
pub struct SuggestRequest {
    pub content: String,
    #[serde(default)]
    pub count: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SuggestResponse {
    pub questions: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub status: &'static str,
    pub message: String,
    pub chunks: usize,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub entries: usize,
    pub dimension: usize,
}

/// Error response rendered as `{"detail": ...}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    #[inline]
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }
}

impl From<SynapseError> for ApiError {
    #[inline]
    fn from(err: SynapseError) -> Self {
        let status = if err.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            error!("Request failed: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR
        };

        Self {
            status,
            detail: format!("An error occurred: {}", err),
        }
    }
}

impl From<JsonRejection> for ApiError {
    #[inline]
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    #[inline]
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Build the application router
#[inline]
pub fn build_router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(root))
        .route(
            "/upload-document/",
            post(upload_document).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/query/", post(query))
        .route("/suggest-questions/", post(suggest_questions))
        .route("/status", get(status))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `host:port` and serve until Ctrl-C
#[inline]
pub async fn serve(
    state: Arc<AppState>,
    host: &str,
    port: u16,
    max_upload_bytes: usize,
) -> anyhow::Result<()> {
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Synapse API listening on http://{}", addr);

    axum::serve(listener, build_router(state, max_upload_bytes))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({ "message": "Welcome to the Synapse API!" }))
}

async fn upload_document(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> ApiResult<UploadResponse> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Multipart error: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        if field.content_type() != Some(PDF_CONTENT_TYPE) {
            return Err(ApiError::bad_request("Only PDF files are allowed."));
        }

        let filename = field
            .file_name()
            .and_then(|name| Path::new(name).file_name())
            .and_then(|name| name.to_str())
            .unwrap_or("document.pdf")
            .to_string();

        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read file: {}", e)))?;

        debug!("Received upload '{}' ({} bytes)", filename, bytes.len());

        let chunks = ingest_upload(&state, &filename, &bytes).await?;

        return Ok(Json(UploadResponse {
            status: "success",
            message: format!("Document '{}' processed successfully.", filename),
            chunks,
        }));
    }

    Err(ApiError::bad_request("No file provided."))
}

/// Stage the upload in a temporary file and ingest it. The file is removed when
/// this returns, whether or not ingestion succeeded.
async fn ingest_upload(state: &AppState, filename: &str, bytes: &[u8]) -> Result<usize, ApiError> {
    tokio::fs::create_dir_all(&state.upload_dir).await.map_err(SynapseError::from)?;

    let staged = tempfile::Builder::new()
        .prefix("upload-")
        .suffix(".pdf")
        .tempfile_in(&state.upload_dir)
        .map_err(SynapseError::from)?;

    tokio::fs::write(staged.path(), bytes)
        .await
        .map_err(SynapseError::from)?;

    let report = state.pipeline.ingest_named(staged.path(), filename).await?;
    Ok(report.chunks)
}

async fn query(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> ApiResult<QueryResponse> {
    let Json(request) = payload?;
    let answer = state.engine.answer(&request.query).await?;

    Ok(Json(QueryResponse {
        answer: answer.answer,
        sources: answer.sources,
    }))
}

async fn suggest_questions(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SuggestRequest>, JsonRejection>,
) -> ApiResult<SuggestResponse> {
    let Json(request) = payload?;
    let questions = state
        .engine
        .suggest_questions(
            &request.content,
            request.count.unwrap_or(DEFAULT_QUESTION_COUNT),
        )
        .await?;

    Ok(Json(SuggestResponse { questions }))
}

async fn status(State(state): State<Arc<AppState>>) -> ApiResult<StatusResponse> {
    Ok(Json(StatusResponse {
        entries: state.index.count().await?,
        dimension: state.index.dimension(),
    }))
}
