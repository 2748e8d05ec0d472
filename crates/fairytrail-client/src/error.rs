use thiserror::Error;

use crate::forms::ValidationError;

/// Errors surfaced to the person submitting a form.
///
/// Background beacons never produce these: their failures are logged and
/// dropped inside [`crate::client::ApiClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Non-2xx response. `message` is the server's own text, shown verbatim.
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("network error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ClientError {
    /// HTTP status for [`ClientError::Api`], `None` otherwise.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}
