use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MediaError>;

#[derive(Error, Debug)]
pub enum MediaError {
    /// The file does not exist under the media root (or is not a regular file)
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// The filename points outside the media root
    #[error("Path escapes the media root: {0}")]
    PathTraversal(String),

    /// The configured root cannot be used; fatal at startup
    #[error("Media root {path} is not a readable directory: {source}")]
    RootUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// Both missing files and rejected paths are answered with 404.
    pub fn is_not_found(&self) -> bool {
        matches!(self, MediaError::FileNotFound(_) | MediaError::PathTraversal(_))
    }
}
