//! HTTP boundary: upload, progress stream, polling, and result retrieval.

use crate::config::Config;
use crate::error::{AnalyzerError, Result};
use crate::jobs::{is_terminal_line, JobManager};
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::{Stream, StreamExt};
use serde_json::json;
use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_stream::wrappers::BroadcastStream;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

type AppState = Arc<JobManager>;

/// Maps domain errors onto HTTP responses with a uniform error body
struct ApiError(AnalyzerError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AnalyzerError::UnknownJob(_) => StatusCode::NOT_FOUND,
            AnalyzerError::NotReady(_) => StatusCode::CONFLICT,
            error if error.is_client_error() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(json!({
            "status": "error",
            "detail": self.0.to_string(),
        }));
        (status, body).into_response()
    }
}

impl From<AnalyzerError> for ApiError {
    fn from(error: AnalyzerError) -> Self {
        Self(error)
    }
}

/// Builds the application router around a shared job manager
pub fn create_app(manager: AppState) -> Router {
    let upload_limit = manager.upload_limit_bytes();
    Router::new()
        .route("/health", get(health))
        .route("/analyse", post(analyse))
        .route("/events/:job_id", get(events))
        .route("/status/:job_id", get(status))
        .route("/result/:job_id", get(result))
        .layer(DefaultBodyLimit::max(upload_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(manager)
}

/// Binds the listener and serves until shutdown
pub async fn serve(config: Config) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let manager = Arc::new(JobManager::new(config)?);
    let app = create_app(manager);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

async fn analyse(
    State(manager): State<AppState>,
    mut multipart: Multipart,
) -> std::result::Result<Json<serde_json::Value>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AnalyzerError::InvalidArchive(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_lowercase();
        if !filename.ends_with(".zip") {
            return Err(
                AnalyzerError::InvalidArchive("only .zip uploads are accepted".to_string()).into(),
            );
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AnalyzerError::InvalidArchive(e.to_string()))?;
        let archive_path = persist_upload(&bytes).await?;
        let job_id = manager.submit(archive_path);
        tracing::info!(%job_id, size = bytes.len(), "upload accepted");
        return Ok(Json(json!({"job_id": job_id})));
    }
    Err(AnalyzerError::InvalidArchive("missing 'file' field".to_string()).into())
}

/// Writes the upload to a temporary path that outlives the request
async fn persist_upload(bytes: &[u8]) -> Result<PathBuf> {
    let temp_path = tempfile::Builder::new()
        .prefix("upload_")
        .suffix(".zip")
        .tempfile()?
        .into_temp_path();
    let path = temp_path.keep().map_err(|e| AnalyzerError::Io(e.error))?;
    tokio::fs::write(&path, bytes).await?;
    Ok(path)
}

async fn events(
    State(manager): State<AppState>,
    Path(job_id): Path<String>,
) -> std::result::Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>, ApiError>
{
    let (history, live) = manager.subscribe(&job_id)?;

    // Replay first, then the live tail; the subscription was taken under
    // the same lock the recorder uses, so the concatenation has no gaps
    // and no duplicates. The stream closes after the terminal line.
    let replay = futures::stream::iter(history);
    let tail = BroadcastStream::new(live).filter_map(|item| futures::future::ready(item.ok()));
    let lines = replay.chain(tail).scan(false, |closed, line| {
        if *closed {
            return futures::future::ready(None);
        }
        *closed = is_terminal_line(&line);
        futures::future::ready(Some(line))
    });

    let stream = lines.map(|line| Ok::<_, Infallible>(Event::default().data(line)));
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

async fn status(
    State(manager): State<AppState>,
    Path(job_id): Path<String>,
) -> std::result::Result<Json<serde_json::Value>, ApiError> {
    let report = manager.status(&job_id)?;
    Ok(Json(serde_json::to_value(report).map_err(AnalyzerError::from)?))
}

async fn result(
    State(manager): State<AppState>,
    Path(job_id): Path<String>,
) -> std::result::Result<Json<serde_json::Value>, ApiError> {
    match manager.result(&job_id) {
        Ok(artifacts) => Ok(Json(json!({
            "status": "done",
            "tree_text": artifacts.tree_text,
            "file_summaries": artifacts.file_summaries,
            "project_summary": artifacts.project_summary,
        }))),
        // A running job is not an error; the client is expected to poll.
        Err(AnalyzerError::NotReady(_)) => Ok(Json(json!({"status": "running"}))),
        Err(error) => Err(error.into()),
    }
}
