//! Client error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Worker returned error: {status} - {message}")]
    Status { status: u16, message: String },

    #[error("Request timed out after {0:?}")]
    Timeout(std::time::Duration),
}
