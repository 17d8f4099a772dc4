use std::time::Duration;

use bytes::Bytes;
use reqwest::{header::HeaderMap, Method, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use crate::{AttemptResponse, CastError, Result};

/// Final outcome of a request: the last response received plus timing.
#[derive(Clone, Debug)]
pub struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    cost: Duration,
    attempts: usize,
    method: Method,
    url: Url,
}

impl Reply {
    pub(crate) fn new(
        response: AttemptResponse,
        cost: Duration,
        attempts: usize,
        method: Method,
        url: Url,
    ) -> Self {
        Self {
            status: response.status,
            headers: response.headers,
            body: response.body,
            cost,
            attempts,
            method,
            url,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    /// `true` for exactly 200.
    pub fn status_ok(&self) -> bool {
        self.status == StatusCode::OK
    }

    /// `true` for any 2xx.
    pub fn success(&self) -> bool {
        self.status.is_success()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn size(&self) -> usize {
        self.body.len()
    }

    /// Lossy UTF-8 view of the body.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Time from the start of the first attempt until the body was read.
    pub fn cost(&self) -> Duration {
        self.cost
    }

    /// Number of dispatches, including the first one.
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn decode_json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|err| {
            CastError::Decode(format!("invalid JSON body: {err}; body: {}", self.text()))
        })
    }

    pub fn decode_xml<T: DeserializeOwned>(&self) -> Result<T> {
        let text = std::str::from_utf8(&self.body)
            .map_err(|err| CastError::Decode(format!("XML body is not UTF-8: {err}")))?;
        quick_xml::de::from_str(text)
            .map_err(|err| CastError::Decode(format!("invalid XML body: {err}; body: {text}")))
    }
}
