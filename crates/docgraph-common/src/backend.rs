use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::api::{
    Agent, AudioUpload, ChatRequest, DocumentRecord, DocumentUpload, ErrorEnvelope,
    IngestOptions, IngestResponse, IngestTextRequest, NoteResponse, ReportRequest,
};
use crate::error::BackendError;
use crate::stream::Utf8ChunkDecoder;

pub const DEFAULT_DOCUMENT_LIMIT: u32 = 20;

/// Processing modes `/api/process` understands.
pub const PROCESS_MODES: &[&str] = &["document"];

#[derive(Clone, Debug)]
pub struct BackendClientConfig {
    pub base_url: String,
    pub default_timeout: Duration,
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub max_error_body_bytes: usize,
}

impl BackendClientConfig {
    pub fn from_env() -> Self {
        let base_url = std::env::var("DOCGRAPH_BACKEND_URL")
            .unwrap_or_else(|_| "http://localhost:8000".to_string());

        // Extraction runs an LLM pipeline server-side; allow it plenty of time.
        let default_timeout = std::env::var("DOCGRAPH_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(120));

        let max_retries = std::env::var("DOCGRAPH_MAX_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(3);

        let initial_backoff = std::env::var("DOCGRAPH_RETRY_INITIAL_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or_else(|| Duration::from_millis(200));

        let max_backoff = std::env::var("DOCGRAPH_RETRY_MAX_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or_else(|| Duration::from_millis(5_000));

        let max_error_body_bytes = std::env::var("DOCGRAPH_MAX_ERROR_BODY_BYTES")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(8 * 1024);

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            default_timeout,
            max_retries,
            initial_backoff,
            max_backoff,
            max_error_body_bytes,
        }
    }
}

/// HTTP client for the extraction backend.
///
/// Only idempotent reads are retried; ingestion, chat and report requests are sent once
/// because the backend stores their results.
#[derive(Clone)]
pub struct BackendClient {
    config: BackendClientConfig,
    http: reqwest::Client,
}

impl BackendClient {
    pub fn new(config: BackendClientConfig) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .user_agent("docgraph-mcp")
            .build()?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &BackendClientConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    pub async fn ingest_meeting_text(
        &self,
        request: IngestTextRequest,
    ) -> Result<IngestResponse, BackendError> {
        let form = options_form(Form::new().text("text", request.text), &request.options);
        let resp = self
            .http
            .post(self.url("/api/meeting/ingest"))
            .timeout(self.config.default_timeout)
            .multipart(form)
            .send()
            .await?;
        Self::parse_json_response(resp, self.config.max_error_body_bytes).await
    }

    pub async fn transcribe_meeting_audio(
        &self,
        upload: AudioUpload,
    ) -> Result<IngestResponse, BackendError> {
        let part = file_part(&upload.path).await?;
        let form = options_form(Form::new().part("file", part), &upload.options);
        let resp = self
            .http
            .post(self.url("/api/meeting/asr"))
            .timeout(self.config.default_timeout)
            .multipart(form)
            .send()
            .await?;
        Self::parse_json_response(resp, self.config.max_error_body_bytes).await
    }

    /// Run the document pipeline on an uploaded file and return its extraction payload.
    pub async fn process_document(&self, upload: DocumentUpload) -> Result<Value, BackendError> {
        let part = file_part(&upload.path).await?;
        let form = Form::new().part("file", part).text("mode", upload.mode);
        let resp = self
            .http
            .post(self.url("/api/process"))
            .timeout(self.config.default_timeout)
            .multipart(form)
            .send()
            .await?;
        let payload: Value =
            Self::parse_json_response(resp, self.config.max_error_body_bytes).await?;
        match pipeline_error(&payload) {
            Some(detail) => Err(BackendError::Rejected(detail)),
            None => Ok(payload),
        }
    }

    pub async fn list_agents(
        &self,
        tenant_id: &str,
        include_inactive: bool,
    ) -> Result<Vec<Agent>, BackendError> {
        let url = self.url("/api/agents");
        let include = if include_inactive { "true" } else { "false" };
        self.request_with_retry(|| async {
            let resp = self
                .http
                .get(&url)
                .query(&[("tenant_id", tenant_id), ("include_inactive", include)])
                .timeout(self.config.default_timeout)
                .send()
                .await?;
            Self::parse_json_response(resp, self.config.max_error_body_bytes).await
        })
        .await
    }

    pub async fn list_documents(
        &self,
        tenant_id: &str,
        limit: u32,
    ) -> Result<Vec<DocumentRecord>, BackendError> {
        let url = self.url("/api/documents");
        let limit = limit.to_string();
        self.request_with_retry(|| async {
            let resp = self
                .http
                .get(&url)
                .query(&[("tenant_id", tenant_id), ("limit", limit.as_str())])
                .timeout(self.config.default_timeout)
                .send()
                .await?;
            Self::parse_json_response(resp, self.config.max_error_body_bytes).await
        })
        .await
    }

    /// Stream a chat answer, handing each decoded piece to `on_chunk` as it arrives.
    ///
    /// Returns the concatenated assistant message. The caller cancels by dropping the future.
    pub async fn stream_chat<F>(
        &self,
        request: ChatRequest,
        mut on_chunk: F,
    ) -> Result<String, BackendError>
    where
        F: FnMut(&str),
    {
        let resp = self
            .http
            .post(self.url("/api/chat"))
            .timeout(self.config.default_timeout)
            .json(&request)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Self::to_upstream_error(resp, self.config.max_error_body_bytes).await);
        }

        let mut stream = resp.bytes_stream();
        let mut decoder = Utf8ChunkDecoder::new();
        let mut message = String::new();
        while let Some(next) = stream.next().await {
            let chunk = next?;
            let piece = decoder.push(&chunk);
            if !piece.is_empty() {
                on_chunk(&piece);
                message.push_str(&piece);
            }
        }
        let rest = decoder.finish();
        if !rest.is_empty() {
            on_chunk(&rest);
            message.push_str(&rest);
        }
        debug!(chars = message.chars().count(), "chat stream finished");
        Ok(message)
    }

    /// Generate a PDF report for an extraction payload.
    pub async fn report_pdf(&self, request: &ReportRequest) -> Result<Vec<u8>, BackendError> {
        let resp = self
            .http
            .post(self.url("/api/report/pdf"))
            .timeout(self.config.default_timeout)
            .json(request)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Self::to_upstream_error(resp, self.config.max_error_body_bytes).await);
        }
        Ok(resp.bytes().await?.to_vec())
    }

    pub async fn report_note(&self, request: &ReportRequest) -> Result<String, BackendError> {
        let resp = self
            .http
            .post(self.url("/api/report/note"))
            .timeout(self.config.default_timeout)
            .json(request)
            .send()
            .await?;
        let note: NoteResponse =
            Self::parse_json_response(resp, self.config.max_error_body_bytes).await?;
        Ok(note.note)
    }

    async fn parse_json_response<T: for<'de> Deserialize<'de>>(
        resp: Response,
        max_error_body_bytes: usize,
    ) -> Result<T, BackendError> {
        if resp.status().is_success() {
            let bytes = resp.bytes().await?;
            return Ok(serde_json::from_slice(&bytes)?);
        }
        Err(Self::to_upstream_error(resp, max_error_body_bytes).await)
    }

    async fn to_upstream_error(resp: Response, max_error_body_bytes: usize) -> BackendError {
        let status = resp.status();
        let body = read_limited_text(resp, max_error_body_bytes).await;
        upstream_error(status, body)
    }

    async fn request_with_retry<T, Fut, F>(&self, mut f: F) -> Result<T, BackendError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, BackendError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match f().await {
                Ok(v) => return Ok(v),
                Err(e) => {
                    if attempt > self.config.max_retries || !should_retry(&e) {
                        return Err(e);
                    }
                    let delay = backoff_delay(
                        self.config.initial_backoff,
                        self.config.max_backoff,
                        attempt - 1,
                    );
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis(),
                        error = %e,
                        "backend request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

fn options_form(form: Form, options: &IngestOptions) -> Form {
    let form = form
        .text("tenant_id", options.tenant_id.clone())
        .text("llm_provider", options.llm_provider.clone())
        .text("llm_model", options.llm_model.clone())
        .text("language", options.language.clone());
    match &options.agent_id {
        Some(agent_id) => form.text("agent_id", agent_id.clone()),
        None => form,
    }
}

async fn file_part(path: &Path) -> Result<Part, BackendError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| BackendError::Upload {
        path: path.display().to_string(),
        source,
    })?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    Ok(Part::bytes(bytes).file_name(file_name))
}

fn upstream_error(status: StatusCode, body: String) -> BackendError {
    match serde_json::from_str::<ErrorEnvelope>(&body) {
        Ok(parsed) => {
            let detail = match parsed.detail {
                Value::String(s) => s,
                other => other.to_string(),
            };
            BackendError::Upstream { status, detail }
        }
        Err(_) => BackendError::UpstreamBody { status, body },
    }
}

/// The pipeline reports some failures as a 200 with a lone `{"error": ...}` body.
fn pipeline_error(payload: &Value) -> Option<String> {
    let map = payload.as_object()?;
    if map.len() != 1 {
        return None;
    }
    match map.get("error")? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn should_retry(err: &BackendError) -> bool {
    match err {
        BackendError::Request(e) => e.is_timeout() || e.is_connect() || e.is_request(),
        BackendError::Upstream { status, .. } | BackendError::UpstreamBody { status, .. } => {
            *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
        }
        BackendError::InvalidJson(_) | BackendError::Rejected(_) | BackendError::Upload { .. } => {
            false
        }
    }
}

fn backoff_delay(initial: Duration, max: Duration, exponent: u32) -> Duration {
    let mult = 1u128.checked_shl(exponent).unwrap_or(u128::MAX);
    let base_ms = initial.as_millis().saturating_mul(mult);
    let capped_ms = std::cmp::min(base_ms, max.as_millis()) as u64;
    let jitter_cap = std::cmp::max(1, capped_ms / 4);
    let jitter_ms = pseudo_jitter_ms(jitter_cap);
    Duration::from_millis(capped_ms.saturating_add(jitter_ms))
}

fn pseudo_jitter_ms(max_inclusive: u64) -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0));
    let nanos = now.subsec_nanos() as u64;
    nanos % (max_inclusive + 1)
}

async fn read_limited_text(resp: Response, max_bytes: usize) -> String {
    match resp.bytes().await {
        Ok(mut b) => {
            if b.len() > max_bytes {
                b.truncate(max_bytes);
            }
            String::from_utf8_lossy(&b).to_string()
        }
        Err(e) => {
            warn!(error = %e, "failed to read backend error body");
            "<failed to read error body>".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    use super::*;

    fn stub_config(base_url: String) -> BackendClientConfig {
        BackendClientConfig {
            base_url,
            default_timeout: Duration::from_secs(5),
            max_retries: 2,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
            max_error_body_bytes: 256,
        }
    }

    fn reply(status: &str, content_type: &str, body: &str) -> Vec<Vec<u8>> {
        vec![format!(
            "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
        .into_bytes()]
    }

    fn chunk(bytes: &[u8]) -> Vec<u8> {
        let mut out = format!("{:x}\r\n", bytes.len()).into_bytes();
        out.extend_from_slice(bytes);
        out.extend_from_slice(b"\r\n");
        out
    }

    /// Read one request (headers plus a sized or chunked body).
    async fn read_request(stream: &mut TcpStream) -> std::io::Result<()> {
        let mut buf = Vec::new();
        let mut block = [0u8; 4096];
        loop {
            let n = stream.read(&mut block).await?;
            if n == 0 {
                return Ok(());
            }
            buf.extend_from_slice(&block[..n]);
            let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
            let body = &buf[end + 4..];
            let complete = if let Some(len) = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
            {
                body.len() >= len.trim().parse::<usize>().unwrap_or(0)
            } else if head.contains("transfer-encoding: chunked") {
                body.ends_with(b"0\r\n\r\n")
            } else {
                true
            };
            if complete {
                return Ok(());
            }
        }
    }

    /// Serve one scripted reply per connection, counting the requests that arrive.
    async fn stub_backend(replies: Vec<Vec<Vec<u8>>>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        tokio::spawn(async move {
            for segments in replies {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                if read_request(&mut stream).await.is_err() {
                    return;
                }
                counter.fetch_add(1, Ordering::SeqCst);
                for segment in segments {
                    if stream.write_all(&segment).await.is_err() {
                        return;
                    }
                    let _ = stream.flush().await;
                    tokio::time::sleep(Duration::from_millis(20)).await;
                }
                let _ = stream.shutdown().await;
            }
        });
        (format!("http://{addr}"), hits)
    }

    #[test]
    fn fastapi_detail_is_extracted() {
        let err = upstream_error(
            StatusCode::NOT_FOUND,
            r#"{"detail": "Agent not found"}"#.to_string(),
        );
        match err {
            BackendError::Upstream { status, detail } => {
                assert_eq!(status, StatusCode::NOT_FOUND);
                assert_eq!(detail, "Agent not found");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn validation_detail_is_serialized() {
        let err = upstream_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"detail": [{"loc": ["body", "text"], "msg": "field required"}]}"#.to_string(),
        );
        let BackendError::Upstream { detail, .. } = err else {
            panic!("expected parsed detail");
        };
        assert!(detail.contains("field required"));
    }

    #[test]
    fn plain_body_is_kept() {
        let err = upstream_error(StatusCode::BAD_GATEWAY, "upstream down".to_string());
        assert!(matches!(err, BackendError::UpstreamBody { .. }));
        assert!(should_retry(&err));
    }

    #[test]
    fn client_errors_are_not_retried() {
        let err = BackendError::Upstream {
            status: StatusCode::BAD_REQUEST,
            detail: "bad".to_string(),
        };
        assert!(!should_retry(&err));
        let err = BackendError::Upstream {
            status: StatusCode::TOO_MANY_REQUESTS,
            detail: "slow down".to_string(),
        };
        assert!(should_retry(&err));
    }

    #[test]
    fn backoff_is_capped() {
        let initial = Duration::from_millis(200);
        let max = Duration::from_millis(1_000);
        let first = backoff_delay(initial, max, 0);
        assert!(first >= initial && first <= Duration::from_millis(250));
        let late = backoff_delay(initial, max, 10);
        assert!(late >= max && late <= Duration::from_millis(1_250));
    }

    #[test]
    fn url_joins_base_and_path() {
        let config = BackendClientConfig {
            base_url: "http://backend:8000".to_string(),
            default_timeout: Duration::from_secs(1),
            max_retries: 0,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(1),
            max_error_body_bytes: 64,
        };
        let client = BackendClient::new(config).expect("client builds");
        assert_eq!(client.url("/api/agents"), "http://backend:8000/api/agents");
    }

    #[tokio::test]
    async fn missing_upload_is_reported() {
        let err = file_part(Path::new("/nonexistent/meeting.wav"))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Upload { .. }));
    }

    #[test]
    fn lone_error_body_is_a_pipeline_error() {
        assert_eq!(
            pipeline_error(&json!({"error": "Unsupported mode"})).as_deref(),
            Some("Unsupported mode")
        );
        assert_eq!(pipeline_error(&json!({"summary": "ok", "error": "x"})), None);
        assert_eq!(pipeline_error(&json!({"error": null})), None);
        assert_eq!(pipeline_error(&json!(["error"])), None);
    }

    #[tokio::test]
    async fn listing_is_retried_after_server_error() {
        let (base_url, hits) = stub_backend(vec![
            reply("503 Service Unavailable", "text/plain", "warming up"),
            reply(
                "200 OK",
                "application/json",
                r#"[{"id": "a1", "name": "ECN reader", "is_active": true}]"#,
            ),
        ])
        .await;
        let client = BackendClient::new(stub_config(base_url)).expect("client builds");

        let agents = client.list_agents("default", false).await.expect("agents");
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0].name, "ECN reader");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn report_note_is_sent_once() {
        let (base_url, hits) = stub_backend(vec![
            reply("503 Service Unavailable", "application/json", r#"{"detail": "busy"}"#),
            reply("200 OK", "application/json", r#"{"note": "late"}"#),
        ])
        .await;
        let client = BackendClient::new(stub_config(base_url)).expect("client builds");
        let request = ReportRequest {
            payload: json!({"summary": "ok"}),
            language: "en".to_string(),
            llm_provider: None,
            llm_model: None,
        };

        let err = client.report_note(&request).await.unwrap_err();
        match err {
            BackendError::Upstream { status, detail } => {
                assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
                assert_eq!(detail, "busy");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn chat_stream_is_joined_across_split_characters() {
        let body = "決策OK".as_bytes();
        let (base_url, _hits) = stub_backend(vec![vec![
            b"HTTP/1.1 200 OK\r\nContent-Type: text/plain; charset=utf-8\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n".to_vec(),
            chunk(&body[..4]),
            chunk(&body[4..]),
            b"0\r\n\r\n".to_vec(),
        ]])
        .await;
        let client = BackendClient::new(stub_config(base_url)).expect("client builds");
        let request = ChatRequest {
            tenant_id: "default".to_string(),
            query: "why steel?".to_string(),
            language: "zh".to_string(),
            llm_provider: None,
            llm_model: None,
        };

        let mut pieces = Vec::new();
        let message = client
            .stream_chat(request, |piece| pieces.push(piece.to_string()))
            .await
            .expect("chat streams");
        assert_eq!(message, "決策OK");
        assert_eq!(pieces.concat(), message);
        assert!(pieces.iter().all(|p| !p.contains(char::REPLACEMENT_CHARACTER)));
    }

    #[tokio::test]
    async fn process_error_body_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("spec.txt");
        std::fs::write(&path, "beam sizes").expect("writable");
        let (base_url, hits) = stub_backend(vec![reply(
            "200 OK",
            "application/json",
            r#"{"error": "Unsupported mode"}"#,
        )])
        .await;
        let client = BackendClient::new(stub_config(base_url)).expect("client builds");

        let err = client
            .process_document(DocumentUpload {
                path,
                mode: "document".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Rejected(ref d) if d == "Unsupported mode"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
