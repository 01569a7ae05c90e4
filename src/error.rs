use std::fmt;

use thiserror::Error;

/// The error type for cloudcall operations.
///
/// Besides the classified kind and message, errors raised from a service
/// response carry the HTTP status, the provider error code and the request id
/// the service returned, so callers can log or match on them without parsing
/// the message text.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct Error {
    kind: ErrorKind,
    message: String,
    status: Option<http::StatusCode>,
    provider_code: Option<String>,
    request_id: Option<String>,
    #[source]
    source: Option<anyhow::Error>,
}

/// The kind of error that occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The service rejected the caller's identity (401/403 or an
    /// authentication error code). Capability probes treat this as
    /// "not entitled" rather than a failure.
    Unauthenticated,

    /// The addressed resource does not exist (404 or a known not-found
    /// code). Collaborators conventionally surface this as an empty result.
    NotFound,

    /// The resource already exists; idempotent creates treat this as
    /// success.
    AlreadyExists,

    /// A transient service condition (500/503, throttling). Retried
    /// internally; only surfaced after the attempt budget is exhausted.
    Transient,

    /// A terminal service error that is none of the above.
    Permanent,

    /// The response body could not be decoded as the declared content type.
    MalformedResponse,

    /// The request could not be constructed (missing region, bad endpoint).
    /// Raised before any network call.
    RequestConstruction,

    /// Signing could not determine its inputs (missing or malformed
    /// request date, empty credentials).
    AuthConfig,

    /// Unexpected errors (transport, I/O).
    Unexpected,
}

impl Error {
    /// Create a new error with the given kind and message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            provider_code: None,
            request_id: None,
            source: None,
        }
    }

    /// Add a source error.
    pub fn with_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Attach the HTTP status of the failed response.
    pub fn with_status(mut self, status: http::StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    /// Attach the provider error code of the failed response.
    pub fn with_provider_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    /// Attach the request id of the failed response.
    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    /// Get the error kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Get the HTTP status of the failed response, if any.
    pub fn status(&self) -> Option<http::StatusCode> {
        self.status
    }

    /// Get the provider error code, if any.
    pub fn provider_code(&self) -> Option<&str> {
        self.provider_code.as_deref()
    }

    /// Get the request id the service returned, if any.
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// Check if the addressed resource was missing.
    ///
    /// Lookup-style collaborators map this to an empty result instead of
    /// propagating the error.
    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }

    /// Check if the failure was an idempotent-create conflict.
    pub fn is_already_exists(&self) -> bool {
        self.kind == ErrorKind::AlreadyExists
    }

    /// Check if the caller's identity was rejected.
    ///
    /// Capability probes map this to `false` instead of propagating.
    pub fn is_unauthenticated(&self) -> bool {
        self.kind == ErrorKind::Unauthenticated
    }

    /// Check if the error is worth retrying.
    pub fn is_transient(&self) -> bool {
        self.kind == ErrorKind::Transient
    }
}

// Convenience constructors.
impl Error {
    /// Create an unauthenticated error.
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthenticated, message)
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Create an already-exists error.
    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AlreadyExists, message)
    }

    /// Create a transient error.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, message)
    }

    /// Create a permanent error.
    pub fn permanent(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Permanent, message)
    }

    /// Create a malformed-response error.
    pub fn malformed_response(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedResponse, message)
    }

    /// Create a request-construction error.
    pub fn request_construction(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RequestConstruction, message)
    }

    /// Create an auth-config error.
    pub fn auth_config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AuthConfig, message)
    }

    /// Create an unexpected error.
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unexpected, message)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Unauthenticated => write!(f, "unauthenticated"),
            ErrorKind::NotFound => write!(f, "not found"),
            ErrorKind::AlreadyExists => write!(f, "already exists"),
            ErrorKind::Transient => write!(f, "transient service error"),
            ErrorKind::Permanent => write!(f, "service error"),
            ErrorKind::MalformedResponse => write!(f, "malformed response"),
            ErrorKind::RequestConstruction => write!(f, "request construction failed"),
            ErrorKind::AuthConfig => write!(f, "auth configuration invalid"),
            ErrorKind::Unexpected => write!(f, "unexpected error"),
        }
    }
}

/// Convenience type alias for Results.
pub type Result<T> = std::result::Result<T, Error>;

// Common From implementations.
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::unexpected(err.to_string()).with_source(err)
    }
}

impl From<std::fmt::Error> for Error {
    fn from(err: std::fmt::Error) -> Self {
        Self::unexpected(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::Error> for Error {
    fn from(err: http::Error) -> Self {
        Self::request_construction(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::header::InvalidHeaderValue> for Error {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        Self::request_construction(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::header::InvalidHeaderName> for Error {
    fn from(err: http::header::InvalidHeaderName) -> Self {
        Self::request_construction(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::uri::InvalidUri> for Error {
    fn from(err: http::uri::InvalidUri) -> Self {
        Self::request_construction(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::uri::InvalidUriParts> for Error {
    fn from(err: http::uri::InvalidUriParts) -> Self {
        Self::request_construction(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::header::ToStrError> for Error {
    fn from(err: http::header::ToStrError) -> Self {
        Self::request_construction(err.to_string()).with_source(anyhow::Error::from(err))
    }
}
