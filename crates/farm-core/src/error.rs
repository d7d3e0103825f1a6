//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}
