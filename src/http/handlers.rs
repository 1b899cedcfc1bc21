//! Route handlers.
//!
//! Index work is synchronous, so every handler that touches documents or
//! embeddings hops onto the blocking pool and takes the index lock there.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Path, State};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::io::Write;

use super::AppState;
use super::error::{ApiError, ApiResult};
use crate::answer::{AnswerResponse, SourceDocument, StubAnswerGenerator};
use crate::loader::Metadata;
use crate::processor::{DocumentProcessor, ProcessOutcome};
use crate::store::{Filter, SearchHit, SearchRequest, StoredDocument};
use crate::{debug_event, log_event};

fn default_limit() -> usize {
    3
}

/// Body shared by the search, MCP and answer routes.
#[derive(Debug, Deserialize)]
pub struct SearchBody {
    pub query: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Restrict to these document types (`"pdf"`, `".docx"`, ...).
    #[serde(default)]
    pub file_types: Option<Vec<String>>,
    /// Metadata filter document.
    #[serde(default)]
    pub filter: Option<Value>,
}

impl SearchBody {
    fn into_request(self, state: &AppState) -> ApiResult<SearchRequest> {
        let kinds = self
            .file_types
            .filter(|types| !types.is_empty())
            .map(|types| Filter::kind_in(types.as_slice()));
        let filter = self
            .filter
            .map(|value| Filter::parse(&value))
            .transpose()
            .map_err(|e| ApiError::BadRequest(format!("Invalid filter: {e}")))?;

        let limit = self.limit.min(state.settings.server.max_results);
        Ok(SearchRequest::new(self.query, limit)
            .with_filter(Filter::all(kinds.into_iter().chain(filter)))
            .with_min_score(state.settings.semantic_search.threshold))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SourceDocument>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct McpResult {
    pub content: String,
    pub metadata: Metadata,
    pub score: f32,
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let document_count = state.index.read().await.count();
    Json(json!({ "status": "ok", "document_count": document_count }))
}

/// One uploaded file held in memory until it is processed.
struct Upload {
    file_name: String,
    bytes: Vec<u8>,
}

async fn collect_uploads(mut multipart: Multipart, field_name: &str) -> ApiResult<Vec<Upload>> {
    let mut uploads = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(field_name) {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let bytes = field.bytes().await?.to_vec();
        uploads.push(Upload { file_name, bytes });
    }
    Ok(uploads)
}

/// Write the upload to a temp file carrying its extension and process it.
/// The temp file is removed when this returns.
fn process_upload(
    processor: &mut DocumentProcessor<'_>,
    upload: &Upload,
) -> std::io::Result<ProcessOutcome> {
    let suffix = std::path::Path::new(&upload.file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default();
    let mut temp = tempfile::Builder::new()
        .prefix("docseek-upload-")
        .suffix(&suffix)
        .tempfile()?;
    temp.write_all(&upload.bytes)?;
    temp.flush()?;

    Ok(processor.process_named_file(temp.path(), &upload.file_name))
}

pub async fn upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<ProcessOutcome>> {
    let upload = collect_uploads(multipart, "file")
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::BadRequest("multipart field 'file' is required".to_string()))?;
    log_event!("http", "upload", "{} ({} bytes)", upload.file_name, upload.bytes.len());

    let outcome = tokio::task::spawn_blocking(move || {
        let mut index = state.index.blocking_write();
        let mut processor = DocumentProcessor::from_settings(&mut index, &state.settings);
        process_upload(&mut processor, &upload)
    })
    .await??;
    Ok(Json(outcome))
}

pub async fn upload_batch(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<Vec<Value>>> {
    let uploads = collect_uploads(multipart, "files").await?;
    log_event!("http", "upload batch", "{} files", uploads.len());

    let results = tokio::task::spawn_blocking(move || {
        let mut index = state.index.blocking_write();
        let mut processor = DocumentProcessor::from_settings(&mut index, &state.settings);
        uploads
            .iter()
            .map(|upload| {
                let outcome = process_upload(&mut processor, upload)
                    .map_err(|e| e.to_string())
                    .and_then(|outcome| serde_json::to_value(outcome).map_err(|e| e.to_string()));
                match outcome {
                    Ok(value) => value,
                    Err(error) => json!({
                        "status": "error",
                        "filename": upload.file_name,
                        "error": error,
                    }),
                }
            })
            .collect::<Vec<_>>()
    })
    .await?;
    Ok(Json(results))
}

async fn run_search(state: &AppState, request: SearchRequest) -> ApiResult<Vec<SearchHit>> {
    let index = state.index.clone();
    let hits = tokio::task::spawn_blocking(move || index.blocking_read().search(&request)).await??;
    Ok(hits)
}

pub async fn search(
    State(state): State<AppState>,
    body: Result<Json<SearchBody>, JsonRejection>,
) -> ApiResult<Json<SearchResponse>> {
    let Json(body) = body?;
    let request = body.into_request(&state)?;
    debug_event!("http", "search", "'{}' limit {}", request.query, request.limit);

    let results: Vec<SourceDocument> = run_search(&state, request)
        .await?
        .into_iter()
        .map(SourceDocument::from)
        .collect();
    Ok(Json(SearchResponse {
        total: results.len(),
        results,
    }))
}

pub async fn mcp_file_search(
    State(state): State<AppState>,
    body: Result<Json<SearchBody>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = body?;
    let request = body.into_request(&state)?;
    let query = request.query.clone();

    let results: Vec<McpResult> = run_search(&state, request)
        .await?
        .into_iter()
        .map(|hit| McpResult {
            content: hit.content,
            metadata: hit.metadata,
            score: hit.score,
        })
        .collect();
    Ok(Json(json!({
        "name": "file_search",
        "parameters": {
            "query": query,
            "results": results,
        }
    })))
}

pub async fn retrieve_answer(
    State(state): State<AppState>,
    body: Result<Json<SearchBody>, JsonRejection>,
) -> ApiResult<Json<AnswerResponse>> {
    let Json(body) = body?;
    let request = body.into_request(&state)?;
    let max_context_chars = state.settings.answer.max_context_chars;

    let index = state.index.clone();
    let response = tokio::task::spawn_blocking(move || {
        crate::answer::retrieve_answer(
            &index.blocking_read(),
            &request,
            &StubAnswerGenerator,
            max_context_chars,
        )
    })
    .await??;
    Ok(Json(response))
}

pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<StoredDocument>> {
    let index = state.index.clone();
    let lookup = id.clone();
    let stored = tokio::task::spawn_blocking(move || index.blocking_read().get(&lookup)).await??;
    stored
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Document not found: {id}")))
}

pub async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let index = state.index.clone();
    let deleted = tokio::task::spawn_blocking(move || index.blocking_write().delete(&id)).await??;
    Ok(Json(json!({ "deleted": deleted })))
}
