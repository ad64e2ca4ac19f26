//! Error types for the media-server client.
//!
//! # Design
//! `DispatchError` describes what went wrong below HTTP (the session could
//! not produce a response). `ApiError` is what callers see: one variant per
//! failure class, each carrying its cause or status. `ErrorKind` is the flat
//! tag for callers that only want to branch on the class.
//!
//! HTTP 500 never becomes an `ApiError`; the transport logs it and returns
//! `Ok(None)`.

use thiserror::Error;

/// Failures raised by a `Session` before a response exists.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The server could not be reached: refused, reset, unknown host.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The server accepted the connection but did not answer in time.
    #[error("timed out: {0}")]
    Timeout(String),

    /// The URL was rejected by the HTTP stack.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// Any other transport failure (TLS, protocol, ...).
    #[error("transport error: {0}")]
    Other(String),
}

impl DispatchError {
    /// Whether another attempt may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, DispatchError::Connect(_) | DispatchError::Timeout(_))
    }
}

/// The class of an `ApiError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ServerUnreachable,
    ReadTimeout,
    Unauthorized,
    AccessRestricted,
    MissingSchema,
    Http(u16),
    Dispatch,
    Stream,
    Json,
    UnexpectedResponse,
    Config,
}

/// Errors returned by the transport and the client facade.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Every attempt failed to connect.
    #[error("server unreachable after {attempts} attempts")]
    ServerUnreachable {
        attempts: u32,
        #[source]
        source: DispatchError,
    },

    /// Every attempt timed out.
    #[error("read timed out after {attempts} attempts")]
    ReadTimeout {
        attempts: u32,
        #[source]
        source: DispatchError,
    },

    /// 401 without an application error code. The stored token has been
    /// revoked.
    #[error("unauthorized")]
    Unauthorized,

    /// 401 carrying `X-Application-Error-Code`, e.g. parental control or a
    /// disabled account. The token is kept.
    #[error("access restricted: {code}")]
    AccessRestricted { code: String },

    /// The request URL has no usable `http`/`https` scheme, usually because
    /// no server address was set.
    #[error("missing or unsupported url scheme: {url}")]
    MissingSchema { url: String },

    /// Any other non-2xx status, including 502 once retries are exhausted.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// A non-retryable transport failure.
    #[error(transparent)]
    Dispatch(DispatchError),

    /// Reading the response body or writing to the destination failed.
    #[error("stream failed: {0}")]
    Stream(#[from] std::io::Error),

    /// A body could not be serialized, or a response could not be decoded
    /// into the requested type.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The server answered successfully but without the data the operation
    /// needs.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::ServerUnreachable { .. } => ErrorKind::ServerUnreachable,
            ApiError::ReadTimeout { .. } => ErrorKind::ReadTimeout,
            ApiError::Unauthorized => ErrorKind::Unauthorized,
            ApiError::AccessRestricted { .. } => ErrorKind::AccessRestricted,
            ApiError::MissingSchema { .. } => ErrorKind::MissingSchema,
            ApiError::Http { status, .. } => ErrorKind::Http(*status),
            ApiError::Dispatch(_) => ErrorKind::Dispatch,
            ApiError::Stream(_) => ErrorKind::Stream,
            ApiError::Json(_) => ErrorKind::Json,
            ApiError::UnexpectedResponse(_) => ErrorKind::UnexpectedResponse,
            ApiError::Config(_) => ErrorKind::Config,
        }
    }

    /// HTTP status associated with the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized | ApiError::AccessRestricted { .. } => Some(401),
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}
