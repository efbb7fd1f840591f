use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataGenError {
    #[error("Unsupported schema: {0}")]
    Schema(String),
    #[error("Type '{0}' is currently not supported")]
    UnsupportedType(String),
    #[error("content_type '{0}' not supported")]
    UnsupportedContentType(String),
    #[error("Pattern '{pattern}' cannot be used for string generation: {reason}")]
    Pattern { pattern: String, reason: String },
    #[error("{0}")]
    Range(String),
    #[error("{0}")]
    NoInvalidationTarget(String),
    #[error("{0}")]
    ConstraintMismatch(String),
    #[error("Collaborator request failed: {0}")]
    Collaborator(String),
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to parse YAML: {0}")]
    Yaml(String),
}

impl DataGenError {
    /// Whether the error describes a malformed or unsupported schema shape.
    #[must_use]
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            Self::Schema(_)
                | Self::UnsupportedType(_)
                | Self::UnsupportedContentType(_)
                | Self::Pattern { .. }
        )
    }
}
