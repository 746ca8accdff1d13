//! Error types for the SOS monitor service

/// Errors that can occur in the SOS monitor service
#[derive(Debug, thiserror::Error)]
pub enum SosMonitorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Not authenticated")]
    Unauthenticated,

    #[error("API returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Notifier error: {0}")]
    Notifier(String),
}

/// Result type alias for SOS monitor operations
pub type Result<T> = std::result::Result<T, SosMonitorError>;
