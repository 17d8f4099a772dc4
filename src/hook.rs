//! Retry hooks: predicates that vote on whether a response should be retried.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use reqwest::{header::HeaderMap, StatusCode};

use crate::TransportError;

/// Why an attempt should be retried.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RetryReason(String);

impl RetryReason {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }

    pub(crate) fn transport(err: &TransportError) -> Self {
        Self(format!("transport: {err}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RetryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A received response whose body has already been read in full.
#[derive(Clone, Debug)]
pub struct AttemptResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl AttemptResponse {
    /// Lossy UTF-8 view of the body.
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

type HookFn = dyn Fn(&AttemptResponse) -> Option<RetryReason> + Send + Sync;

/// One retry predicate.
#[derive(Clone)]
pub enum RetryHook {
    /// Retry on any of the listed status codes.
    Status(BTreeSet<u16>),
    /// Retry on any 5xx status.
    ServerError,
    /// Retry on 429, 500, 502, 503 and 504.
    Transient,
    /// Retry when the body contains the given text.
    BodyContains(String),
    Custom(Arc<HookFn>),
}

impl fmt::Debug for RetryHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(codes) => f.debug_tuple("Status").field(codes).finish(),
            Self::ServerError => f.write_str("ServerError"),
            Self::Transient => f.write_str("Transient"),
            Self::BodyContains(needle) => f.debug_tuple("BodyContains").field(needle).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl RetryHook {
    pub fn status(codes: impl IntoIterator<Item = u16>) -> Self {
        Self::Status(codes.into_iter().collect())
    }

    pub fn body_contains(needle: impl Into<String>) -> Self {
        Self::BodyContains(needle.into())
    }

    pub fn custom<F>(hook: F) -> Self
    where
        F: Fn(&AttemptResponse) -> Option<RetryReason> + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(hook))
    }

    /// `Some` to request another attempt, `None` to accept the response.
    pub fn evaluate(&self, response: &AttemptResponse) -> Option<RetryReason> {
        let status = response.status;
        match self {
            Self::Status(codes) => codes
                .contains(&status.as_u16())
                .then(|| RetryReason(format!("status {status}"))),
            Self::ServerError => status
                .is_server_error()
                .then(|| RetryReason(format!("server error {status}"))),
            Self::Transient => is_transient(status)
                .then(|| RetryReason(format!("transient status {status}"))),
            Self::BodyContains(needle) => response
                .text()
                .contains(needle.as_str())
                .then(|| RetryReason(format!("body contains '{needle}'"))),
            Self::Custom(hook) => hook(response),
        }
    }
}

/// First retry signal among `hooks`, in order.
pub fn evaluate_hooks(hooks: &[RetryHook], response: &AttemptResponse) -> Option<RetryReason> {
    hooks.iter().find_map(|hook| hook.evaluate(response))
}

fn is_transient(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}
