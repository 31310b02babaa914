use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WeaverError {
    #[error("path does not exist: {}", .0.display())]
    NotFound(PathBuf),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("watch error: {0}")]
    Watch(String),
}

impl WeaverError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        WeaverError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<notify::Error> for WeaverError {
    fn from(e: notify::Error) -> Self {
        WeaverError::Watch(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, WeaverError>;
