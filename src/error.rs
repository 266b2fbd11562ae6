use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Malformed content: {0}")]
    MalformedContent(String),

    #[error("Unsupported content type: {0}")]
    UnsupportedContentType(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    #[error("Storage failure at {}: {source}", .path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl AgentError {
    /// Wrap an I/O failure on `path` as a storage error.
    pub fn storage(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Storage { path, source }
    }

    /// Whether the submitter sent something we refuse to process.
    pub fn is_rejected_input(&self) -> bool {
        matches!(
            self,
            Self::MalformedContent(_)
                | Self::UnsupportedContentType(_)
                | Self::InvalidPayload(_)
                | Self::InvalidRule(_)
                | Self::Json(_)
        )
    }

    pub fn exit_code(&self) -> i32 {
        if self.is_rejected_input() {
            2
        } else {
            3
        }
    }
}
