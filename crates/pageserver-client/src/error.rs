use shale_convergence::AccessorError;
use thiserror::Error;

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to the pageserver management API.
#[derive(Debug, Error)]
pub enum Error {
    /// The HTTP request itself failed.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("api error (status {status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },

    /// The response body could not be decoded.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<Error> for AccessorError {
    fn from(e: Error) -> Self {
        match e {
            Error::Http(inner) => Self::Transport(inner.to_string()),
            Error::Api { status, message } => Self::Api { status, message },
            Error::Json(inner) => Self::Malformed(inner.to_string()),
        }
    }
}
