//! Unified error type.
//!
//! Handlers and middleware return [`Error`]. Anything that is not an
//! [`HttpError`] is opaque to the Error Handler and answers `500` with the
//! error's text as the message.

use std::fmt;

use http::StatusCode;

use crate::router::RouteError;

/// A boxed, thread-safe error used for opaque causes.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type returned by handlers, middleware, and the engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A failure carrying an explicit status code and client-facing message.
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("query: {0}")]
    Query(#[from] serde_urlencoded::de::Error),

    #[error("body: {0}")]
    Body(BoxError),

    #[error(transparent)]
    Route(#[from] RouteError),

    #[error("invalid socket address `{0}`")]
    Address(String),

    #[error("invalid redirect status code {0}")]
    InvalidRedirect(u16),

    /// Any other failure. Always answered with `500`.
    #[error("{0}")]
    Other(BoxError),
}

impl Error {
    /// Wraps an arbitrary error as an opaque failure.
    pub fn other(err: impl Into<BoxError>) -> Self {
        Self::Other(err.into())
    }

    /// The status the default Error Handler answers with for this value.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Http(e) => e.status,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The structured error, if this is one.
    pub fn as_http(&self) -> Option<&HttpError> {
        match self {
            Self::Http(e) => Some(e),
            _ => None,
        }
    }
}

/// A failure with an explicit status code and message.
///
/// The message is what clients see in the `{"error": ...}` body. The optional
/// source is for diagnostics only and never leaves the process.
///
/// ```rust
/// use http::StatusCode;
/// use zest::HttpError;
///
/// let err = HttpError::new(StatusCode::NOT_FOUND, "no such user");
/// assert_eq!(err.to_string(), "code=404, message=no such user");
/// ```
#[derive(Debug)]
pub struct HttpError {
    pub status: StatusCode,
    pub message: String,
    pub source: Option<BoxError>,
}

impl HttpError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into(), source: None }
    }

    /// Attaches a lower-level cause.
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "code={}, message={}", self.status.as_u16(), self.message)?;
        if let Some(source) = &self.source {
            write!(f, ", error={source}")?;
        }
        Ok(())
    }
}

impl std::error::Error for HttpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}
