/// Wire types exchanged with the extraction backend.
use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Parameters shared by every ingestion request.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub tenant_id: String,
    pub llm_provider: String,
    pub llm_model: String,
    /// `None` selects the backend's default extraction agent.
    pub agent_id: Option<String>,
    pub language: String,
}

#[derive(Debug, Clone)]
pub struct IngestTextRequest {
    pub text: String,
    pub options: IngestOptions,
}

#[derive(Debug, Clone)]
pub struct AudioUpload {
    pub path: PathBuf,
    pub options: IngestOptions,
}

#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub path: PathBuf,
    /// Processing mode; the backend only understands `document`.
    pub mode: String,
}

/// Response of `/api/meeting/ingest` and `/api/meeting/asr`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    /// Extraction payload as produced by the backend, rendered as-is.
    #[serde(default)]
    pub extraction: Value,
    /// Present only on audio transcription.
    #[serde(default)]
    pub transcript: Option<String>,
    #[serde(default)]
    pub source_type: Option<String>,
    #[serde(default)]
    pub storage: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Agent {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub output_language: Option<String>,
    #[serde(default)]
    pub version: Option<i64>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub visibility: Option<String>,
    /// Remaining backend fields (prompt, schema_json, parent_id, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DocumentRecord {
    pub row_id: i64,
    #[serde(default)]
    pub document_id: Option<String>,
    #[serde(default)]
    pub document_title: Option<String>,
    #[serde(default)]
    pub document_type: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub risk_level: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub tenant_id: String,
    pub query: String,
    pub language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_model: Option<String>,
}

/// Body of `/api/report/pdf` and `/api/report/note`.
#[derive(Debug, Clone, Serialize)]
pub struct ReportRequest {
    pub payload: Value,
    pub language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_model: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct NoteResponse {
    pub note: String,
}

/// FastAPI error body: `{"detail": ...}`.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub detail: Value,
}
