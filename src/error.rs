use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadGenError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Encoding error: {0}")]
    Encode(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<reqwest::Error> for LoadGenError {
    fn from(err: reqwest::Error) -> Self {
        LoadGenError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for LoadGenError {
    fn from(err: serde_json::Error) -> Self {
        LoadGenError::Encode(err.to_string())
    }
}

impl From<std::io::Error> for LoadGenError {
    fn from(err: std::io::Error) -> Self {
        LoadGenError::Io(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LoadGenError>;
