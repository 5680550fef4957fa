pub mod chat;
pub mod messages;
pub mod settings;
pub mod speech;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ChatterError {
    #[error("Stream init error: {0}")]
    StreamInitError(String),

    #[error("Stream read error: {0}")]
    StreamReadError(String),

    #[error("Synthesis error: {0}")]
    SynthesisError(String),

    #[error("Playback error: {0}")]
    PlaybackError(String),

    #[error("Persistence error: {0}")]
    PersistenceError(String),

    #[error("Dispatch error: {0}")]
    DispatchError(String),

    #[error("IO error: {0}")]
    IOError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<std::io::Error> for ChatterError {
    fn from(e: std::io::Error) -> Self {
        ChatterError::IOError(e.to_string())
    }
}

impl ChatterError {
    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            // The caller may simply resubmit the request
            ChatterError::StreamInitError(_) => true,
            ChatterError::StreamReadError(_) => true,
            // Per-segment failures never abort the response
            ChatterError::SynthesisError(_) => true,
            ChatterError::PlaybackError(_) => true,
            ChatterError::PersistenceError(_) => false,
            ChatterError::DispatchError(_) => false,
            ChatterError::IOError(_) => false,
            ChatterError::ConfigError(_) => false,
        }
    }

    /// Get a user-friendly description
    pub fn user_message(&self) -> String {
        match self {
            ChatterError::StreamInitError(_) => {
                "Could not reach the chat backend. Please try again.".to_string()
            }
            ChatterError::StreamReadError(_) => {
                "The response was interrupted. Partial reply kept.".to_string()
            }
            ChatterError::SynthesisError(_) => {
                "Speech synthesis failed. Response will be shown as text.".to_string()
            }
            ChatterError::PlaybackError(_) => {
                "Audio playback failed for part of the response.".to_string()
            }
            ChatterError::PersistenceError(_) => {
                "Failed to save session data. Please check settings storage.".to_string()
            }
            ChatterError::DispatchError(_) => {
                "Internal speech queue error. Please restart the application.".to_string()
            }
            ChatterError::IOError(_) => "File system error occurred.".to_string(),
            ChatterError::ConfigError(_) => {
                "Configuration error. Please check settings.".to_string()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, ChatterError>;
