use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("I/O operation failed")]
    Io(#[from] io::Error),
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid source '{0}', expected tcp://host:port, a file path or '-'")]
    InvalidSource(String),
    #[error("Service '{0}' is no longer running")]
    ServiceGone(&'static str),
    #[error("Shutdown")]
    Shutdown,
}
