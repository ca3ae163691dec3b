use thiserror::Error;

use crate::store::StoreError;

/// Errors from the hosted backend or from persisting what it returned.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend answered with an error status; `message` is user-facing.
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("session storage failed: {0}")]
    Storage(#[from] StoreError),
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("no active session")]
    NotSignedIn,
}

impl BackendError {
    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}
