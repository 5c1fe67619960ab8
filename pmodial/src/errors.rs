use thiserror::Error;

/// Failures of the DIAL client.
///
/// Transport errors are flattened to text so the HTTP stack never leaks
/// through the public API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DialError {
    #[error("DIAL transport error: {0}")]
    Transport(String),
    #[error("Malformed DIAL response: {0}")]
    MalformedResponse(String),
    #[error("Uninitialized application URL: fetch the device description first")]
    Uninitialized,
    #[error("Invalid URL '{0}'")]
    InvalidUrl(String),
    #[error("Device description response has no Application-URL header")]
    MissingApplicationUrl,
}

impl DialError {
    pub(crate) fn transport(url: &str, err: impl std::fmt::Display) -> Self {
        DialError::Transport(format!("{}: {}", url, err))
    }

    pub(crate) fn http_status(url: &str, status: u16) -> Self {
        DialError::Transport(format!("{} returned HTTP status {}", url, status))
    }
}
