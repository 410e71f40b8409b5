//! Error types for Lingo

use thiserror::Error;

/// Result type alias using Lingo's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in Lingo
#[derive(Error, Debug)]
pub enum Error {
    /// Microphone access was refused or the capture stream could not be started
    #[error("Microphone permission error: {0}")]
    Permission(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The remote service answered, but reported a failure
    #[error("Service error{}: {message}", status_suffix(.status))]
    Service {
        status: Option<u16>,
        message: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

impl Error {
    /// True for failures reported by the transport or the remote service
    pub fn is_network_failure(&self) -> bool {
        matches!(self, Error::Network(_) | Error::Service { .. })
    }
}
