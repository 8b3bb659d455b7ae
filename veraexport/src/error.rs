//! Error types for veraexport
use crate::credentials::CredentialError;

/// Custom error type for veraexport operations
#[derive(thiserror::Error, Debug)]
pub enum ExportError {
    /// Veracode API error
    #[error("Veracode API error: {0}")]
    VeracodeApi(#[from] veracode_reporting::VeracodeError),

    /// Veracode reporting error (create, poll or fetch)
    #[error("Veracode reporting error: {0}")]
    Reporting(#[from] veracode_reporting::ReportingError),

    /// Report request rejected or answered with an unusable result
    #[error("Report request failed: {0}")]
    Request(String),

    /// A window's report never reached COMPLETED within the poll budget
    #[error("Report for window {window} timed out after {polls} polls")]
    TimedOut {
        /// Window being exported
        window: String,
        /// Number of status polls made
        polls: u32,
    },

    /// Invalid run configuration, detected before any network call
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Credential error
    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    /// File I/O error
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for veraexport operations
pub type Result<T> = std::result::Result<T, ExportError>;
