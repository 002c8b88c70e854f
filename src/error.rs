use std::io;
use thiserror::Error;

/// Custom error type for Systemizer
#[derive(Error, Debug)]
pub enum SystemizerError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("GPU not available: {0}")]
    GpuNotAvailable(String),

    #[error("NVIDIA library error: {0}")]
    NvidiaLibrary(String),

    #[error("AMD library error: {0}")]
    AmdLibrary(String),

    #[error("Intel GPU query failed: {0}")]
    IntelQuery(String),

    #[error("Metric collection failed: {0}")]
    MetricCollection(String),

    #[error("Command `{command}` failed: {reason}")]
    CommandFailed { command: String, reason: String },

    #[error("Command `{command}` timed out after {secs}s")]
    CommandTimeout { command: String, secs: u64 },

    #[error("Collector already started")]
    AlreadyStarted,

    #[error("Failed to spawn metrics worker: {0}")]
    WorkerSpawn(io::Error),
}

/// Result type alias for Systemizer
pub type Result<T> = std::result::Result<T, SystemizerError>;

impl SystemizerError {
    /// Create a config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        SystemizerError::Config(msg.into())
    }

    pub fn gpu_not_available<S: Into<String>>(msg: S) -> Self {
        SystemizerError::GpuNotAvailable(msg.into())
    }

    pub fn nvidia_library<S: Into<String>>(msg: S) -> Self {
        SystemizerError::NvidiaLibrary(msg.into())
    }

    pub fn amd_library<S: Into<String>>(msg: S) -> Self {
        SystemizerError::AmdLibrary(msg.into())
    }

    pub fn intel_query<S: Into<String>>(msg: S) -> Self {
        SystemizerError::IntelQuery(msg.into())
    }

    pub fn metric_collection<S: Into<String>>(msg: S) -> Self {
        SystemizerError::MetricCollection(msg.into())
    }

    pub fn command_failed<C: Into<String>, R: Into<String>>(command: C, reason: R) -> Self {
        SystemizerError::CommandFailed {
            command: command.into(),
            reason: reason.into(),
        }
    }
}
