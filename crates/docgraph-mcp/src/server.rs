/// MCP server for the document-to-knowledge-graph backend.
///
/// Exposes the extraction workflows as tools and renders every extraction payload
/// into an HTML decision document:
/// - `render_extraction`: render a payload the caller already has
/// - `ingest_meeting_text`, `transcribe_meeting_audio`, `process_document`: run the
///   backend pipeline and render its result
/// - `list_agents`, `list_documents`: tenant-scoped listings
/// - `decision_chat`: streamed question answering over the tenant's documents
/// - `generate_report`, `report_note`: report generation from a payload
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use rmcp::{
    Json, ServerHandler,
    handler::server::router::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::*,
    tool, tool_handler, tool_router,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use docgraph_common::api::{
    Agent, AudioUpload, ChatRequest, DocumentRecord, DocumentUpload, IngestOptions,
    IngestResponse, IngestTextRequest, ReportRequest,
};
use docgraph_common::backend::{BackendClient, DEFAULT_DOCUMENT_LIMIT, PROCESS_MODES};
use docgraph_render::{render, Locale, Strings};

use crate::config::Config;
use crate::error::AppError;

const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "m4a"];
const MAX_DOCUMENT_LIMIT: u32 = 200;

#[derive(Clone)]
pub struct DocGraphServer {
    backend: Arc<BackendClient>,
    config: Arc<Config>,
    tool_router: ToolRouter<DocGraphServer>,
}

impl DocGraphServer {
    pub fn new(backend: Arc<BackendClient>, config: Config) -> Self {
        Self {
            backend,
            config: Arc::new(config),
            tool_router: Self::tool_router(),
        }
    }

    fn language(&self, requested: Option<String>) -> String {
        non_blank(requested).unwrap_or_else(|| self.config.language.clone())
    }

    fn tenant(&self, requested: Option<String>) -> String {
        non_blank(requested).unwrap_or_else(|| self.config.tenant_id.clone())
    }

    fn ingest_options(&self, params: IngestParams) -> IngestOptions {
        IngestOptions {
            tenant_id: self.tenant(params.tenant_id),
            llm_provider: non_blank(params.llm_provider)
                .unwrap_or_else(|| self.config.llm_provider.clone()),
            llm_model: non_blank(params.llm_model)
                .unwrap_or_else(|| self.config.llm_model.clone()),
            agent_id: non_blank(params.agent_id),
            language: self.language(params.language),
        }
    }

    fn ingest_result(response: IngestResponse, language: &str) -> Result<IngestResult, String> {
        let document = render_document(Some(&response.extraction), language, false)?;
        Ok(IngestResult {
            document,
            transcript: response.transcript,
            source_type: response.source_type,
            storage: response.storage,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Render a payload with the string table of `language`.
fn render_document(
    payload: Option<&Value>,
    language: &str,
    standalone: bool,
) -> Result<RenderedDocument, String> {
    let strings = Strings::for_locale(Locale::parse(language));
    let document = render(payload, &strings)
        .map_err(AppError::from)
        .map_err(|e| format!("render failed: {e}"))?;
    let html = if standalone {
        document.standalone_page(&strings)
    } else {
        document.as_html().to_string()
    };
    Ok(RenderedDocument {
        shape: document.shape().map(|s| s.as_str().to_string()),
        title: document.title().to_string(),
        html,
    })
}

fn check_audio_file(path: &Path) -> Result<(), String> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    if !AUDIO_EXTENSIONS.contains(&ext.as_str()) {
        return Err(format!(
            "unsupported audio file '{}': expected one of {}",
            path.display(),
            AUDIO_EXTENSIONS.join(", ")
        ));
    }
    Ok(())
}

fn process_mode(requested: Option<String>) -> Result<String, String> {
    let mode = non_blank(requested).unwrap_or_else(|| PROCESS_MODES[0].to_string());
    if !PROCESS_MODES.contains(&mode.as_str()) {
        return Err(format!(
            "unsupported mode '{mode}': expected one of {}",
            PROCESS_MODES.join(", ")
        ));
    }
    Ok(mode)
}

/// Reduce a requested report name to a plain `*.pdf` file name.
fn report_file_name(requested: Option<&str>) -> String {
    let cleaned: String = requested
        .and_then(|name| Path::new(name.trim()).file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let stem = cleaned.trim_end_matches(".pdf").trim_matches('.');
    if stem.is_empty() {
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        format!("report-{ts}.pdf")
    } else {
        format!("{stem}.pdf")
    }
}

async fn write_report(dir: &Path, file_name: &str, bytes: &[u8]) -> Result<PathBuf, AppError> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(file_name);
    tokio::fs::write(&path, bytes).await?;
    Ok(path)
}

// --- Tool parameters ---

#[derive(Debug, Deserialize, JsonSchema)]
struct RenderExtractionParams {
    /// Extraction payload. Omit or pass null to get the empty-state placeholder.
    payload: Option<Value>,
    /// Output language for labels, e.g. "zh-Hant" or "en".
    language: Option<String>,
    /// Wrap the fragment in a self-contained HTML page (default: false).
    standalone: Option<bool>,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
struct IngestParams {
    tenant_id: Option<String>,
    /// "deepseek" or "ollama".
    llm_provider: Option<String>,
    llm_model: Option<String>,
    /// Extraction agent; omit for the default extraction.
    agent_id: Option<String>,
    language: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct IngestTextParams {
    /// Meeting transcript or summary text.
    text: String,
    #[serde(flatten)]
    options: IngestParams,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct TranscribeAudioParams {
    /// Local path of a .wav, .mp3 or .m4a recording.
    file_path: String,
    #[serde(flatten)]
    options: IngestParams,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ProcessDocumentParams {
    /// Local path of the PDF, IFC or text document to process.
    file_path: String,
    /// Pipeline mode (default: "document").
    mode: Option<String>,
    language: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ListAgentsParams {
    tenant_id: Option<String>,
    include_inactive: Option<bool>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ListDocumentsParams {
    tenant_id: Option<String>,
    /// Maximum number of documents (default: 20, max: 200).
    limit: Option<u32>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct DecisionChatParams {
    query: String,
    tenant_id: Option<String>,
    language: Option<String>,
    llm_provider: Option<String>,
    llm_model: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct GenerateReportParams {
    /// Extraction payload to report on.
    payload: Value,
    language: Option<String>,
    /// File name under the report directory (default: report-<timestamp>.pdf).
    file_name: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ReportNoteParams {
    payload: Value,
    language: Option<String>,
    llm_provider: Option<String>,
    llm_model: Option<String>,
}

// --- Tool responses ---

#[derive(Debug, Serialize, JsonSchema)]
struct RenderedDocument {
    /// "contextual", "flat" or "generic"; absent for the empty state.
    shape: Option<String>,
    title: String,
    html: String,
}

#[derive(Debug, Serialize, JsonSchema)]
struct IngestResult {
    document: RenderedDocument,
    transcript: Option<String>,
    source_type: Option<String>,
    storage: Option<Value>,
}

#[derive(Debug, Serialize, JsonSchema)]
struct AgentListResponse {
    agents: Vec<Agent>,
}

#[derive(Debug, Serialize, JsonSchema)]
struct DocumentListResponse {
    documents: Vec<DocumentRecord>,
}

#[derive(Debug, Serialize, JsonSchema)]
struct TextResponse {
    text: String,
}

#[derive(Debug, Serialize, JsonSchema)]
struct ReportFileResponse {
    path: String,
    bytes: usize,
}

#[tool_router]
impl DocGraphServer {
    #[tool(description = "Render an extraction payload into an HTML decision document. The display shape (contextual decisions, flat document, or generic fields) is inferred from the payload.")]
    async fn render_extraction(
        &self,
        Parameters(params): Parameters<RenderExtractionParams>,
    ) -> Result<Json<RenderedDocument>, String> {
        let language = self.language(params.language);
        let document = render_document(
            params.payload.as_ref(),
            &language,
            params.standalone.unwrap_or(false),
        )?;
        Ok(Json(document))
    }

    #[tool(description = "Extract structured decisions from a meeting transcript (POST /api/meeting/ingest) and render the result.")]
    async fn ingest_meeting_text(
        &self,
        Parameters(params): Parameters<IngestTextParams>,
    ) -> Result<Json<IngestResult>, String> {
        let text = params.text.trim().to_string();
        if text.is_empty() {
            return Err("text must not be empty".to_string());
        }
        let options = self.ingest_options(params.options);
        let language = options.language.clone();
        info!(tenant_id = %options.tenant_id, chars = text.chars().count(), "ingesting meeting text");

        let response = self
            .backend
            .ingest_meeting_text(IngestTextRequest { text, options })
            .await
            .map_err(|e| format!("ingest failed: {e}"))?;
        Ok(Json(Self::ingest_result(response, &language)?))
    }

    #[tool(description = "Transcribe a meeting recording (.wav/.mp3/.m4a) and extract structured decisions from it (POST /api/meeting/asr). Returns the transcript and the rendered result.")]
    async fn transcribe_meeting_audio(
        &self,
        Parameters(params): Parameters<TranscribeAudioParams>,
    ) -> Result<Json<IngestResult>, String> {
        let path = PathBuf::from(params.file_path.trim());
        check_audio_file(&path)?;
        let options = self.ingest_options(params.options);
        let language = options.language.clone();
        info!(tenant_id = %options.tenant_id, path = %path.display(), "transcribing meeting audio");

        let response = self
            .backend
            .transcribe_meeting_audio(AudioUpload { path, options })
            .await
            .map_err(|e| format!("transcription failed: {e}"))?;
        Ok(Json(Self::ingest_result(response, &language)?))
    }

    #[tool(description = "Upload a document to the extraction pipeline (POST /api/process) and render the extracted result.")]
    async fn process_document(
        &self,
        Parameters(params): Parameters<ProcessDocumentParams>,
    ) -> Result<Json<RenderedDocument>, String> {
        if params.file_path.trim().is_empty() {
            return Err("file_path must not be empty".to_string());
        }
        let path = PathBuf::from(params.file_path.trim());
        let mode = process_mode(params.mode)?;
        let language = self.language(params.language);
        info!(path = %path.display(), mode = %mode, "processing document");

        let extraction = self
            .backend
            .process_document(DocumentUpload { path, mode })
            .await
            .map_err(|e| format!("process failed: {e}"))?;
        Ok(Json(render_document(Some(&extraction), &language, false)?))
    }

    #[tool(description = "List the extraction agents of a tenant (GET /api/agents).")]
    async fn list_agents(
        &self,
        Parameters(params): Parameters<ListAgentsParams>,
    ) -> Result<Json<AgentListResponse>, String> {
        let tenant_id = self.tenant(params.tenant_id);
        let agents = self
            .backend
            .list_agents(&tenant_id, params.include_inactive.unwrap_or(false))
            .await
            .map_err(|e| format!("list_agents failed: {e}"))?;
        Ok(Json(AgentListResponse { agents }))
    }

    #[tool(description = "List the most recently ingested documents of a tenant (GET /api/documents).")]
    async fn list_documents(
        &self,
        Parameters(params): Parameters<ListDocumentsParams>,
    ) -> Result<Json<DocumentListResponse>, String> {
        let tenant_id = self.tenant(params.tenant_id);
        let limit = params
            .limit
            .unwrap_or(DEFAULT_DOCUMENT_LIMIT)
            .clamp(1, MAX_DOCUMENT_LIMIT);
        let documents = self
            .backend
            .list_documents(&tenant_id, limit)
            .await
            .map_err(|e| format!("list_documents failed: {e}"))?;
        Ok(Json(DocumentListResponse { documents }))
    }

    #[tool(description = "Ask a follow-up question about the tenant's decisions (POST /api/chat). The streamed answer is returned as one text.")]
    async fn decision_chat(
        &self,
        Parameters(params): Parameters<DecisionChatParams>,
    ) -> Result<Json<TextResponse>, String> {
        let query = params.query.trim().to_string();
        if query.is_empty() {
            return Err("query must not be empty".to_string());
        }
        let request = ChatRequest {
            tenant_id: self.tenant(params.tenant_id),
            query,
            language: self.language(params.language),
            llm_provider: non_blank(params.llm_provider)
                .or_else(|| Some(self.config.llm_provider.clone())),
            llm_model: non_blank(params.llm_model).or_else(|| Some(self.config.llm_model.clone())),
        };

        let mut chunks: usize = 0;
        let text = self
            .backend
            .stream_chat(request, |piece| {
                chunks += 1;
                debug!(chunk = chunks, len = piece.len(), "chat chunk received");
            })
            .await
            .map_err(|e| format!("chat failed: {e}"))?;
        info!(chunks, chars = text.chars().count(), "chat answer complete");
        Ok(Json(TextResponse { text }))
    }

    #[tool(description = "Generate a PDF report for an extraction payload (POST /api/report/pdf) and save it under the report directory.")]
    async fn generate_report(
        &self,
        Parameters(params): Parameters<GenerateReportParams>,
    ) -> Result<Json<ReportFileResponse>, String> {
        if !params.payload.is_object() {
            return Err("payload must be a JSON object".to_string());
        }
        let request = ReportRequest {
            payload: params.payload,
            language: self.language(params.language),
            llm_provider: None,
            llm_model: None,
        };
        let pdf = self
            .backend
            .report_pdf(&request)
            .await
            .map_err(|e| format!("report failed: {e}"))?;

        let file_name = report_file_name(params.file_name.as_deref());
        let path = write_report(&self.config.report_dir(), &file_name, &pdf)
            .await
            .map_err(|e| format!("report failed: {e}"))?;
        info!(path = %path.display(), bytes = pdf.len(), "report written");

        Ok(Json(ReportFileResponse {
            path: path.display().to_string(),
            bytes: pdf.len(),
        }))
    }

    #[tool(description = "Generate a short narrative note for an extraction payload (POST /api/report/note).")]
    async fn report_note(
        &self,
        Parameters(params): Parameters<ReportNoteParams>,
    ) -> Result<Json<TextResponse>, String> {
        if !params.payload.is_object() {
            return Err("payload must be a JSON object".to_string());
        }
        let request = ReportRequest {
            payload: params.payload,
            language: self.language(params.language),
            llm_provider: non_blank(params.llm_provider)
                .or_else(|| Some(self.config.llm_provider.clone())),
            llm_model: non_blank(params.llm_model).or_else(|| Some(self.config.llm_model.clone())),
        };
        let text = self
            .backend
            .report_note(&request)
            .await
            .map_err(|e| format!("report_note failed: {e}"))?;
        Ok(Json(TextResponse { text }))
    }
}

#[tool_handler]
impl ServerHandler for DocGraphServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_06_18,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "docgraph-mcp".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Document-to-knowledge-graph MCP server. Use ingest_meeting_text, \
transcribe_meeting_audio or process_document to extract structured decisions and get them \
rendered as HTML; render_extraction renders a payload you already have. list_agents and \
list_documents browse a tenant, decision_chat asks follow-up questions, and \
generate_report/report_note produce reports."
                    .to_string(),
            ),
        }
    }
}
