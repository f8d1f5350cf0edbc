/// Errors raised by the backend client.
///
/// Every variant describes a failure at the HTTP boundary; callers turn them into a
/// user-visible message and never hand them to the renderer.
use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid response JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("backend returned error: status={status} detail={detail}")]
    Upstream { status: StatusCode, detail: String },

    #[error("backend returned non-JSON error: status={status} body={body}")]
    UpstreamBody { status: StatusCode, body: String },

    #[error("backend rejected request: {0}")]
    Rejected(String),

    #[error("failed to read upload {path}: {source}")]
    Upload {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
