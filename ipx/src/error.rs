//! Status-code-carrying error value used at every fallible seam in the crate.
use std::fmt;

/// An error that knows the HTTP status it should be reported as.
///
/// Suppliers, the decoder, and the pipeline all produce this type instead of
/// a bare `io::Error` or `Box<dyn Error>`, so the HTTP facade never has to
/// guess what status a failure corresponds to.
#[derive(Debug, Clone)]
pub enum IpxError {
    /// Missing/invalid modifier segment, missing id, unknown source, non-file
    /// path, bad URL. Status 400.
    BadRequest(String),
    /// Path escape, invalid filesystem characters, disallowed host,
    /// filesystem access denial. Status 403.
    Forbidden(String),
    /// Filesystem artifact missing. Status 404.
    NotFound(String),
    /// Request method not supported by the facade. Status 405.
    MethodNotAllowed(String),
    /// Non-2xx response from the HTTP supplier; preserves the upstream
    /// status code and reason phrase.
    Upstream { status: u16, reason: String },
    /// Anything uncaught, including codec failures. Status 500.
    Internal(String),
}

impl IpxError {
    pub fn status_code(&self) -> u16 {
        match self {
            IpxError::BadRequest(_) => 400,
            IpxError::Forbidden(_) => 403,
            IpxError::NotFound(_) => 404,
            IpxError::MethodNotAllowed(_) => 405,
            IpxError::Upstream { status, .. } => {
                if (200..600).contains(status) {
                    *status
                } else {
                    500
                }
            },
            IpxError::Internal(_) => 500,
        }
    }

    /// The bare message, without the `IPX: ` prefix used for the response body.
    pub fn message(&self) -> String {
        match self {
            IpxError::BadRequest(m)
            | IpxError::Forbidden(m)
            | IpxError::NotFound(m)
            | IpxError::MethodNotAllowed(m)
            | IpxError::Internal(m) => m.clone(),
            IpxError::Upstream { reason, .. } => reason.clone(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> IpxError {
        IpxError::Internal(msg.into())
    }
}

impl fmt::Display for IpxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for IpxError {}

impl From<std::io::Error> for IpxError {
    fn from(err: std::io::Error) -> IpxError {
        match err.kind() {
            std::io::ErrorKind::NotFound => IpxError::NotFound("File not found".to_string()),
            _ => IpxError::Forbidden(format!("File access error {}", err)),
        }
    }
}
