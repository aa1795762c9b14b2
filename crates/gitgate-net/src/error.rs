//! Error types for gitgate-net

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid base url: {0}")]
    InvalidBaseUrl(String),

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// Error message reported by the internal API itself.
    #[error("{0}")]
    Api(String),

    #[error("Internal API error ({0})")]
    Status(u16),

    #[error("failed to decode response: {0}")]
    Protocol(#[from] serde_json::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
