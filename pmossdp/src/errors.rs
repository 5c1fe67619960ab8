use thiserror::Error;

/// Failures of socket setup or sending.
///
/// Malformed or unrelated datagrams are never errors: discovery and the
/// responder log and skip them.
#[derive(Error, Debug)]
pub enum SsdpError {
    #[error("SSDP socket error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid SSDP address: {0}")]
    InvalidAddress(String),
    #[error("SSDP responder must be started inside a tokio runtime")]
    NoRuntime,
}
