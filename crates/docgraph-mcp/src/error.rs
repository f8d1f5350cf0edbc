use docgraph_common::error::BackendError;
use docgraph_render::PayloadError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error("report error: {0}")]
    Report(#[from] std::io::Error),
}
