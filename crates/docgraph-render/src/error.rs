/// Errors raised while classifying an extraction payload.
///
/// Missing optional fields never produce an error; only a contextual payload whose
/// records cannot be read is rejected, and it is rejected as a whole.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("`contexts` must be a sequence of decision-context records")]
    ContextsNotSequence,

    #[error("malformed decision context at index {index}: {source}")]
    MalformedContext {
        index: usize,
        #[source]
        source: serde_json::Error,
    },
}
