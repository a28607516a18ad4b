use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum TesseraError {
    #[error("Document not found: {table}/{id}")]
    NotFound { table: String, id: String },

    #[error("Query matched more than one document")]
    NotUnique,

    #[error("Schema validation failed for table '{table}':\n  - {}", .errors.join("\n  - "))]
    SchemaValidation { table: String, errors: Vec<String> },

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid pagination cursor: {0}")]
    InvalidCursor(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TesseraError>;

impl TesseraError {
    /// Tag of the failure for the three document-level failures, `None` for
    /// caller and infrastructure errors.
    pub fn failure_tag(&self) -> Option<&'static str> {
        match self {
            TesseraError::NotFound { .. } => Some("NotFoundError"),
            TesseraError::NotUnique => Some("NotUniqueError"),
            TesseraError::SchemaValidation { .. } => Some("SchemaValidationError"),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, TesseraError::NotFound { .. })
    }

    pub fn is_not_unique(&self) -> bool {
        matches!(self, TesseraError::NotUnique)
    }

    pub fn is_schema_validation(&self) -> bool {
        matches!(self, TesseraError::SchemaValidation { .. })
    }

    pub(crate) fn validation(table: &str, errors: Vec<String>) -> Self {
        TesseraError::SchemaValidation {
            table: table.to_string(),
            errors,
        }
    }

    /// A stored document that no longer deserializes into its row type.
    pub(crate) fn decode(table: &str, id: &str, err: serde_json::Error) -> Self {
        log::warn!("Failed to decode document {table}/{id}: {err}");
        Self::validation(table, vec![format!("Document '{id}' does not match its row type: {err}")])
    }
}

impl From<StoreError> for TesseraError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { table, id } => TesseraError::NotFound { table, id },
            StoreError::Rejected { table, reason } => TesseraError::SchemaValidation {
                table,
                errors: vec![reason],
            },
            StoreError::InvalidPosition(message) => TesseraError::InvalidCursor(message),
            StoreError::Backend(message) => TesseraError::Store(message),
        }
    }
}
