//! Error types for gitgate-gitaly

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("no gitaly_address given")]
    MissingAddress,

    #[error("invalid gitaly address: {0}")]
    InvalidAddress(String),

    /// Diagnostic detail from the backend is deliberately dropped here;
    /// operators get a fixed message instead.
    #[error("The git server, Gitaly, is not available at this time. Please contact your administrator.")]
    Unavailable,

    #[error(transparent)]
    Rpc(#[from] tonic::Status),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Map a backend status onto the gateway's error taxonomy. New backend
/// failure classes get a row here; call sites stay unchanged.
pub fn translate_status(status: tonic::Status) -> Error {
    match status.code() {
        tonic::Code::Unavailable => Error::Unavailable,
        _ => Error::Rpc(status),
    }
}
