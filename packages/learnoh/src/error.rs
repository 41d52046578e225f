use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Portal(Box<PortalError>),
}

impl From<PortalError> for Error {
    fn from(err: PortalError) -> Self {
        Error::Portal(Box::new(err))
    }
}

/// A failure talking to one portal endpoint.
///
/// Fetchers build these for every degraded branch and log them; only the
/// upload path hands them back to the caller.
#[derive(Debug, Error)]
#[error("Error from endpoint {endpoint}: {kind:?} - {message}")]
pub struct PortalError {
    kind: PortalErrorKind,
    endpoint: String,
    message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortalErrorKind {
    /// Transport level failure (connect, timeout, body read).
    Request,
    /// Non-success HTTP status.
    Status,
    /// The JSON envelope did not carry `result: "success"`.
    Envelope,
    Parse,
}

impl PortalError {
    pub fn request(endpoint: &str, message: String) -> Self {
        Self::new(PortalErrorKind::Request, endpoint, message)
    }

    pub fn status(endpoint: &str, status: reqwest::StatusCode) -> Self {
        Self::new(
            PortalErrorKind::Status,
            endpoint,
            format!("unexpected status {status}"),
        )
    }

    pub fn envelope(endpoint: &str, message: String) -> Self {
        Self::new(PortalErrorKind::Envelope, endpoint, message)
    }

    pub fn parse(endpoint: &str, message: String) -> Self {
        Self::new(PortalErrorKind::Parse, endpoint, message)
    }

    fn new(kind: PortalErrorKind, endpoint: &str, message: String) -> Self {
        Self {
            kind,
            endpoint: endpoint.to_string(),
            message,
        }
    }

    pub fn kind(&self) -> PortalErrorKind {
        self.kind
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn portal_error_display_names_endpoint_and_kind() {
        let err = PortalError::status("zyListWj", reqwest::StatusCode::BAD_GATEWAY);
        assert_eq!(err.kind(), PortalErrorKind::Status);
        assert_eq!(
            err.to_string(),
            "Error from endpoint zyListWj: Status - unexpected status 502 Bad Gateway"
        );
    }

    #[test]
    fn portal_error_converts_into_boxed_variant() {
        let err: Error = PortalError::envelope("pageListXsbyWgq", "result=failure".into()).into();
        assert!(matches!(err, Error::Portal(ref inner) if inner.endpoint() == "pageListXsbyWgq"));
    }
}
