//! API route handlers

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::engine::DEFAULT_SESSION;
use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::{ConversationTurn, DocumentRecord, FileKind, SourceRef};

/// Build all API routes
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/upload",
            post(upload).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route("/chat", post(chat))
        .route("/search", get(search))
        .route("/status", get(status))
        .route("/documents", delete(delete_documents))
        .route("/sessions/clear", post(clear_all_sessions))
        .route("/sessions/:id/history", get(history))
        .route("/sessions/:id/clear", post(clear_session))
}

#[derive(Serialize)]
pub struct UploadResponse {
    pub documents: Vec<DocumentSummary>,
    pub total_chunks: usize,
    pub errors: Vec<UploadError>,
}

#[derive(Serialize)]
pub struct DocumentSummary {
    pub source_id: String,
    pub file_kind: FileKind,
    pub chunk_count: usize,
    pub bytes: usize,
}

#[derive(Serialize)]
pub struct UploadError {
    pub filename: String,
    pub error: String,
}

/// POST /api/upload - ingest uploaded files into the index.
///
/// Each file is parsed, chunked, embedded, and indexed independently; a
/// failure is reported per file and does not stop the batch.
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let mut documents = Vec::new();
    let mut errors = Vec::new();
    let mut total_chunks = 0usize;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::internal(format!("Failed to read multipart field: {}", e)))?
    {
        let filename = match field.file_name() {
            Some(name) => name.to_string(),
            None => continue,
        };

        let data = match field.bytes().await {
            Ok(d) => d,
            Err(e) => {
                errors.push(UploadError {
                    filename,
                    error: format!("Failed to read file: {}", e),
                });
                continue;
            }
        };

        tracing::info!("Processing file: {} ({} bytes)", filename, data.len());

        match ingest_one(&state, &filename, &data).await {
            Ok(record) => {
                total_chunks += record.chunk_count;
                documents.push(DocumentSummary {
                    source_id: record.source_id.clone(),
                    file_kind: record.file_kind,
                    chunk_count: record.chunk_count,
                    bytes: record.bytes,
                });
                state.add_record(record);
            }
            Err(e) => {
                tracing::warn!("Failed to process {}: {}", filename, e);
                errors.push(UploadError {
                    filename,
                    error: e.to_string(),
                });
            }
        }
    }

    Ok(Json(UploadResponse {
        documents,
        total_chunks,
        errors,
    }))
}

async fn ingest_one(state: &AppState, filename: &str, data: &[u8]) -> Result<DocumentRecord> {
    let output = state.pipeline().ingest(filename, data)?;
    let chunk_count = output.chunks.len();
    state.index().add(output.chunks).await?;

    Ok(DocumentRecord {
        source_id: filename.to_string(),
        file_kind: output.file_kind,
        chunk_count,
        bytes: data.len(),
        content_hash: output.content_hash,
        ingested_at: chrono::Utc::now(),
    })
}

#[derive(Deserialize)]
pub struct ChatRequest {
    pub question: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Serialize)]
pub struct ChatResponse {
    pub answer: String,
    pub sources: Vec<SourceRef>,
    pub session_id: String,
}

/// POST /api/chat - answer a question within a conversation session
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>> {
    let session_id = request
        .session_id
        .unwrap_or_else(|| DEFAULT_SESSION.to_string());

    let result = state.engine().ask(&session_id, &request.question).await?;

    Ok(Json(ChatResponse {
        answer: result.answer,
        sources: result.sources,
        session_id,
    }))
}

#[derive(Deserialize)]
pub struct SearchParams {
    pub query: String,
    #[serde(default)]
    pub k: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
}

#[derive(Debug, Serialize)]
pub struct SearchHit {
    pub source_id: String,
    pub position: u32,
    pub text: String,
    pub score: f32,
}

/// GET /api/search - similarity search without generation
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>> {
    let k = params.k.unwrap_or(state.config().retrieval.top_k);
    if k == 0 {
        // Caller input, not a server fault: reject as a bad request
        return Err(Error::Config("k must be a positive integer".to_string()));
    }
    let results = state.index().search(&params.query, k).await?;

    Ok(Json(SearchResponse {
        results: results
            .into_iter()
            .map(|scored| SearchHit {
                source_id: scored.chunk.source_id,
                position: scored.chunk.position,
                text: scored.chunk.text,
                score: scored.score,
            })
            .collect(),
    }))
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub documents: Vec<DocumentRecord>,
    pub document_count: usize,
    pub chunk_count: usize,
    pub session_count: usize,
    pub active_provider: Option<String>,
    pub supported_formats: Vec<&'static str>,
}

/// GET /api/status - index and session overview
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        documents: state.list_records(),
        document_count: state.record_count(),
        chunk_count: state.index().chunk_count(),
        session_count: state.memory().session_count(),
        active_provider: state.registry().active_id().map(str::to_string),
        supported_formats: FileKind::SUPPORTED_EXTENSIONS.to_vec(),
    })
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub session_id: String,
    pub turns: Vec<ConversationTurn>,
}

/// GET /api/sessions/:id/history - ordered turn log for a session
pub async fn history(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Json<HistoryResponse> {
    Json(HistoryResponse {
        turns: state.memory().get(&session_id),
        session_id,
    })
}

/// POST /api/sessions/:id/clear - reset one session
pub async fn clear_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Json<serde_json::Value> {
    state.engine().clear(&session_id);
    Json(serde_json::json!({ "session_id": session_id, "cleared": true }))
}

/// POST /api/sessions/clear - reset every session
pub async fn clear_all_sessions(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.memory().clear_all();
    Json(serde_json::json!({ "cleared": true }))
}

#[derive(Serialize)]
pub struct DeleteDocumentsResponse {
    pub removed_chunks: usize,
}

/// DELETE /api/documents - clear the index and the document registry
pub async fn delete_documents(
    State(state): State<AppState>,
) -> Result<Json<DeleteDocumentsResponse>> {
    let removed_chunks = state.index().clear()?;
    state.clear_records();
    tracing::info!(removed_chunks, "Cleared document index");
    Ok(Json(DeleteDocumentsResponse { removed_chunks }))
}
