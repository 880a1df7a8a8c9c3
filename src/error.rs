use thiserror::Error;

/// Recorder error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecorderError {
    #[error("Session already recording")]
    AlreadyRecording,

    #[error("Session not recording")]
    NotRecording,

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Acquisition failed: {0}")]
    Acquisition(String),

    #[error("Storage error: {0}")]
    Persistence(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Broad error class, used by callers to decide how to recover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected at the boundary, nothing changed.
    Configuration,
    /// Sensor or scan failure; stops an active recording.
    Acquisition,
    /// Export failed; buffers are intact and the export can be retried.
    Persistence,
    Internal,
}

impl RecorderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RecorderError::AlreadyRecording
            | RecorderError::NotRecording
            | RecorderError::Configuration(_) => ErrorKind::Configuration,
            RecorderError::Acquisition(_) => ErrorKind::Acquisition,
            RecorderError::Persistence(_) => ErrorKind::Persistence,
            RecorderError::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<std::io::Error> for RecorderError {
    fn from(err: std::io::Error) -> Self {
        RecorderError::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for RecorderError {
    fn from(err: serde_json::Error) -> Self {
        RecorderError::Persistence(err.to_string())
    }
}

/// Result type for recorder operations
pub type RResult<T> = Result<T, RecorderError>;
