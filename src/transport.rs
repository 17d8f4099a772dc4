use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{stream::BoxStream, StreamExt, TryStreamExt};
use reqwest::{header::HeaderMap, Method, StatusCode};
use url::Url;

use crate::TransportError;

/// Overall timeout of the default transport, independent of attempt deadlines.
pub const DEFAULT_TRANSPORT_TIMEOUT: Duration = Duration::from_secs(10);

/// Response body as a stream of chunks. Dropping it releases the connection.
pub type BodyStream = BoxStream<'static, Result<Bytes, TransportError>>;

/// Fully assembled request for one attempt.
#[derive(Clone, Debug, PartialEq)]
pub struct TransportRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    /// Deadline for this attempt only.
    pub timeout: Option<Duration>,
}

/// Response head plus an unread body stream.
pub struct TransportResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: BodyStream,
}

impl fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Executes one request. Implementations must tolerate concurrent use.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: TransportRequest)
        -> Result<TransportResponse, TransportError>;
}

/// Default transport backed by a pooled `reqwest::Client`.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    http: reqwest::Client,
    overall: Option<Duration>,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TRANSPORT_TIMEOUT)
    }

    /// Creates a transport whose client enforces `timeout` on every request.
    ///
    /// # Panics
    ///
    /// Panics when the TLS backend cannot be initialised, like
    /// `reqwest::Client::new`. Use [`ReqwestTransport::try_with_timeout`] to
    /// handle that case.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::try_with_timeout(timeout).expect("reqwest client must build")
    }

    /// Fallible form of [`ReqwestTransport::with_timeout`].
    pub fn try_with_timeout(timeout: Duration) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            overall: Some(timeout),
        })
    }

    /// Wraps a preconfigured client. Its own timeout settings apply as is.
    pub fn from_client(http: reqwest::Client) -> Self {
        Self {
            http,
            overall: None,
        }
    }

    /// Overall timeout enforced on every request, if known.
    pub fn overall_timeout(&self) -> Option<Duration> {
        self.overall
    }

    /// A per-request timeout replaces the client's, so it is clamped to the
    /// overall one.
    fn request_timeout(&self, attempt: Option<Duration>) -> Option<Duration> {
        attempt.map(|limit| self.overall.map_or(limit, |overall| limit.min(overall)))
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(
        &self,
        request: TransportRequest,
    ) -> Result<TransportResponse, TransportError> {
        let mut builder = self
            .http
            .request(request.method, request.url)
            .headers(request.headers);
        if let Some(timeout) = self.request_timeout(request.timeout) {
            builder = builder.timeout(timeout);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes_stream().map_err(TransportError::from).boxed();

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}
