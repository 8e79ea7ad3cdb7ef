use std::path::PathBuf;

use thiserror::Error;

/// Every failure the cache, the parsers and the visualizer can report.
#[derive(Debug, Error)]
pub enum Error {
    /// Non-2xx response or transport failure while talking to the content API.
    #[error("network error fetching {url}: {reason}")]
    Network { url: String, reason: String },

    /// A resolve attempt left no usable data, or a sidecar file is missing.
    #[error("not found: {0}")]
    NotFound(String),

    /// A single image could not be decoded.
    #[error("cannot decode image {path}: {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Delimited text that does not fit the header.
    #[error("parse error: {0}")]
    Parse(String),

    #[error("archive error on {path}: {reason}")]
    Archive { path: PathBuf, reason: String },

    /// Invalid construction parameters or options.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The model collaborator failed or returned a malformed batch.
    #[error("prediction failed: {0}")]
    Prediction(String),

    #[error("display update failed: {0}")]
    Display(String),
}

impl Error {
    /// Wraps an `std::io::Error` together with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io { path: path.into(), source }
    }

    pub fn network(url: impl Into<String>, reason: impl ToString) -> Self {
        Error::Network { url: url.into(), reason: reason.to_string() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
