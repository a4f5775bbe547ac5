//! HTTP API.
//!
//! Exposes ingestion, retrieval-augmented query, chat and the document
//! tools over JSON. Handlers are thin: each one calls into [`Services`]
//! and maps the typed pipeline error onto the error contract below.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/health` | Health check (returns version) |
//! | `POST`   | `/query` | Answer a question from the index (`"stream": true` for chunked text) |
//! | `POST`   | `/query/sources` | Chunks and source files a question would use |
//! | `POST`   | `/chat` | One chat turn (`"stream": true` for chunked text) |
//! | `POST`   | `/sessions/{id}/clear` | Clear a session's history |
//! | `DELETE` | `/sessions/{id}` | Delete a session |
//! | `GET`    | `/documents` | Index statistics and document ids |
//! | `POST`   | `/documents` | Ingest server-side files or directories |
//! | `DELETE` | `/documents` | Drop every indexed chunk |
//! | `DELETE` | `/documents/{doc_id}` | Remove one document |
//! | `POST`   | `/summarize` | Summarize a server-side file |
//! | `POST`   | `/extract` | Extract entities, keywords and key points |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "validation", "message": "validation failed: question must not be empty" } }
//! ```
//!
//! Input problems map to 400, unknown sessions to 404, unreadable documents
//! to 422, embedding and language model failures to 502, anything else 500.
//!
//! Streamed responses are `text/plain` bodies written fragment by fragment.
//! Chat streams carry the session id in the `x-session-id` header.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use ragline_core::models::{IndexInfo, QueryHit};
use ragline_core::prompt::SummaryStyle;
use ragline_core::Error;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use crate::llm::FragmentStream;
use crate::services::Services;

type AppState = Arc<Services>;

/// Build the router over shared services.
pub fn router(services: Arc<Services>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/query", post(handle_query))
        .route("/query/sources", post(handle_query_sources))
        .route("/chat", post(handle_chat))
        .route("/sessions/{id}/clear", post(handle_clear_session))
        .route("/sessions/{id}", delete(handle_delete_session))
        .route(
            "/documents",
            get(handle_list_documents)
                .post(handle_ingest)
                .delete(handle_clear_documents),
        )
        .route("/documents/{doc_id}", delete(handle_delete_document))
        .route("/summarize", post(handle_summarize))
        .route("/extract", post(handle_extract))
        .layer(cors)
        .with_state(services)
}

/// Serve on `[server].bind` until the process is terminated.
pub async fn run_server(services: Arc<Services>) -> anyhow::Result<()> {
    let bind_addr = services.config.server.bind.clone();
    let app = router(services);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("listening on http://{}", bind_addr);
    println!("ragline listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// A pipeline error on its way out as an HTTP response.
struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::Validation(_)
        | Error::UnsupportedFormat(_)
        | Error::Decode { .. }
        | Error::EmptyDocument(_)
        | Error::EmptyChunks(_) => StatusCode::BAD_REQUEST,
        Error::SessionNotFound(_) => StatusCode::NOT_FOUND,
        Error::ExtractionFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        Error::EmbeddingBackend(_) | Error::LlmBackend(_) => StatusCode::BAD_GATEWAY,
        Error::Store(_) | Error::Io(_) | Error::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.0.code().to_string(),
                message: self.0.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

fn require_non_empty(value: &str, field: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(Error::validation(format!("{} must not be empty", field)).into());
    }
    Ok(())
}

/// Turn a fragment channel into a chunked `text/plain` body.
fn stream_response(stream: FragmentStream) -> Response {
    let body = futures_util::stream::unfold(stream, |mut stream| async move {
        let item = stream.recv().await?;
        Some((item.map_err(|e| std::io::Error::other(e.to_string())), stream))
    });
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(body),
    )
        .into_response()
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /query ============

#[derive(Deserialize)]
struct QueryRequest {
    question: String,
    #[serde(default)]
    top_k: Option<usize>,
    #[serde(default)]
    stream: bool,
}

async fn handle_query(
    State(services): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<Response, ApiError> {
    require_non_empty(&req.question, "question")?;
    if req.stream {
        let stream = services.rag.answer_stream(&req.question, req.top_k).await?;
        return Ok(stream_response(stream));
    }
    let answer = services.rag.answer(&req.question, req.top_k).await?;
    Ok(Json(answer).into_response())
}

#[derive(Serialize)]
struct SourcesResponse {
    sources: Vec<String>,
    chunks: Vec<QueryHit>,
}

async fn handle_query_sources(
    State(services): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<SourcesResponse>, ApiError> {
    require_non_empty(&req.question, "question")?;
    let chunks = services
        .rag
        .relevant_chunks(&req.question, req.top_k)
        .await?;
    Ok(Json(SourcesResponse {
        sources: ragline_core::prompt::source_files(&chunks),
        chunks,
    }))
}

// ============ Chat and sessions ============

#[derive(Deserialize)]
struct ChatRequest {
    message: String,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    stream: bool,
}

async fn handle_chat(
    State(services): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Response, ApiError> {
    require_non_empty(&req.message, "message")?;
    if req.stream {
        let (session_id, stream) = services
            .chat
            .chat_stream(req.session_id.as_deref(), &req.message)
            .await?;
        let mut response = stream_response(stream);
        if let Ok(value) = HeaderValue::from_str(&session_id) {
            response.headers_mut().insert("x-session-id", value);
        }
        return Ok(response);
    }
    let reply = services
        .chat
        .chat(req.session_id.as_deref(), &req.message)
        .await?;
    Ok(Json(reply).into_response())
}

async fn handle_clear_session(
    State(services): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    services.chat.clear_history(&id)?;
    Ok(Json(serde_json::json!({ "session_id": id, "cleared": true })))
}

async fn handle_delete_session(
    State(services): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !services.chat.delete_session(&id)? {
        return Err(Error::SessionNotFound(id).into());
    }
    Ok(Json(serde_json::json!({ "session_id": id, "deleted": true })))
}

// ============ Documents ============

#[derive(Serialize)]
struct DocumentsResponse {
    #[serde(flatten)]
    info: IndexInfo,
    doc_ids: Vec<String>,
}

async fn handle_list_documents(
    State(services): State<AppState>,
) -> Result<Json<DocumentsResponse>, ApiError> {
    Ok(Json(DocumentsResponse {
        info: services.index.get_document_info().await?,
        doc_ids: services.index.list_documents().await?,
    }))
}

#[derive(Deserialize)]
struct IngestRequest {
    paths: Vec<PathBuf>,
}

async fn handle_ingest(
    State(services): State<AppState>,
    Json(req): Json<IngestRequest>,
) -> Result<Json<crate::ingest::IngestReport>, ApiError> {
    if req.paths.is_empty() {
        return Err(Error::validation("paths must not be empty").into());
    }
    Ok(Json(services.ingestor.ingest_paths(&req.paths).await))
}

async fn handle_clear_documents(
    State(services): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    services.index.clear_all().await?;
    Ok(Json(serde_json::json!({ "cleared": true })))
}

async fn handle_delete_document(
    State(services): State<AppState>,
    Path(doc_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let deleted = services.index.delete_document(&doc_id).await?;
    Ok(Json(serde_json::json!({ "doc_id": doc_id, "deleted_chunks": deleted })))
}

// ============ Document tools ============

#[derive(Deserialize)]
struct SummarizeRequest {
    path: PathBuf,
    #[serde(default)]
    style: SummaryStyle,
}

#[derive(Serialize)]
struct SummarizeResponse {
    summary: String,
    style: SummaryStyle,
}

async fn handle_summarize(
    State(services): State<AppState>,
    Json(req): Json<SummarizeRequest>,
) -> Result<Json<SummarizeResponse>, ApiError> {
    let summary = services
        .summarizer
        .summarize_file(&req.path, req.style)
        .await?;
    Ok(Json(SummarizeResponse {
        summary,
        style: req.style,
    }))
}

#[derive(Deserialize)]
struct ExtractRequest {
    path: PathBuf,
}

async fn handle_extract(
    State(services): State<AppState>,
    Json(req): Json<ExtractRequest>,
) -> Result<Json<ragline_core::extraction::ExtractionResult>, ApiError> {
    Ok(Json(services.extractor.extract_from_file(&req.path).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&Error::validation("x")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&Error::UnsupportedFormat(".xlsx".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&Error::SessionNotFound("s".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&Error::extraction("a.pdf", "bad")),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(status_for(&Error::llm("down")), StatusCode::BAD_GATEWAY);
        assert_eq!(
            status_for(&Error::store("locked")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_body_shape() {
        let body = serde_json::to_value(ErrorBody {
            error: ErrorDetail {
                code: "not_found".into(),
                message: "session not found: s".into(),
            },
        })
        .unwrap();
        assert_eq!(body["error"]["code"], "not_found");
    }
}
