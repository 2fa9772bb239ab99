use thiserror::Error;

/// Failure to register a resource with the tracking service
///
/// Never surfaced by [`CleanupRecorder`](super::CleanupRecorder); only logged.
#[derive(Error, Debug)]
pub enum CleanupRecordingError {
    #[error("Tracking service unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Tracking service rejected the request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Failed to encode or decode tracking payload: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Tracking endpoint '{endpoint}' cannot carry a path")]
    InvalidEndpoint { endpoint: String },
}

pub type Result<T> = std::result::Result<T, CleanupRecordingError>;
