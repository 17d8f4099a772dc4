use std::fmt;

use crate::template::TemplateError;

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum CastError {
    /// Path template could not be expanded. No attempt was made.
    #[error("template expansion error: {0}")]
    TemplateExpansion(#[from] TemplateError),
    /// Request payload could not be serialized.
    #[error("body encoding error ({encoding}): {message}")]
    BodyEncoding {
        /// Declared encoding of the payload (`json`, `xml`, `form`).
        encoding: &'static str,
        message: String,
    },
    /// Structured query value could not be serialized.
    #[error("query encoding error: {0}")]
    QueryEncoding(String),
    /// URL, method or header is malformed. No attempt was made.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Network-level failure of the final attempt.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    /// Reply body could not be decoded into the requested type.
    #[error("decode error: {0}")]
    Decode(String),
}

/// Coarse classification of a transport failure.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum TransportErrorKind {
    /// Connection could not be established.
    Connect,
    /// Attempt deadline elapsed.
    Timeout,
    /// Request could not be sent.
    Request,
    /// Response body could not be read.
    Body,
    /// Request was rejected before it reached the network.
    Invalid,
    Other,
}

impl TransportErrorKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Timeout => "timeout",
            Self::Request => "request",
            Self::Body => "body",
            Self::Invalid => "invalid request",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by a [`Transport`](crate::Transport).
#[derive(Debug, thiserror::Error)]
#[error("{kind} failure: {message}")]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Attaches the underlying cause.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == TransportErrorKind::Timeout
    }

    /// Whether another attempt could succeed.
    ///
    /// Only [`TransportErrorKind::Invalid`] is terminal: the same request
    /// would be rejected again.
    pub fn is_retryable(&self) -> bool {
        self.kind != TransportErrorKind::Invalid
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportErrorKind::Timeout
        } else if err.is_connect() {
            TransportErrorKind::Connect
        } else if err.is_builder() {
            TransportErrorKind::Invalid
        } else if err.is_body() || err.is_decode() {
            TransportErrorKind::Body
        } else if err.is_request() {
            TransportErrorKind::Request
        } else {
            TransportErrorKind::Other
        };
        Self::new(kind, err.to_string()).with_source(err)
    }
}
