use thiserror::Error;

/// Error type shared by the cvingest crates.
#[derive(Error, Debug)]
pub enum IngestError {
    /// The input stream is not well-formed markup.
    #[error("Malformed XML: {0}")]
    MalformedXml(String),

    /// A structurally singular element appeared more than once.
    #[error("Unexpected multiple {element} in {context}")]
    UnexpectedCardinality { context: String, element: String },

    /// A node matched none of the known shapes.
    #[error("Unknown record shape: {0}")]
    UnknownShape(String),

    /// The background reader stopped abnormally.
    #[error("Record producer failed: {0}")]
    ProducerFailure(String),

    /// A date with no leading `YYYY-MM-DD` at all.
    #[error("Invalid date: {0:?}")]
    InvalidDate(String),

    /// A consistency violation found while linearizing a record.
    #[error("Inconsistent record {0}")]
    Inconsistent(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl IngestError {
    pub fn cardinality(context: impl Into<String>, element: impl Into<String>) -> Self {
        IngestError::UnexpectedCardinality {
            context: context.into(),
            element: element.into(),
        }
    }
}

/// Result type alias for cvingest operations.
pub type Result<T> = std::result::Result<T, IngestError>;
