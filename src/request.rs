use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{
    header::{HeaderMap, HeaderValue, IntoHeaderName},
    Method,
};
use serde::Serialize;

use crate::{
    assemble::{merge_headers, MergeMode},
    body::Payload,
    BasicAuth, Body, Reply, TransportRequest,
};

pub(crate) type RequestObserver = Arc<dyn Fn(&TransportRequest) + Send + Sync>;
pub(crate) type ReplyObserver = Arc<dyn Fn(&Reply) + Send + Sync>;

/// Everything needed to assemble a request, independent of any attempt.
///
/// The value is built fluently and never mutated by the engine, so the same
/// spec assembles to the same request on every attempt.
#[derive(Clone)]
pub struct RequestSpec {
    pub(crate) method: Method,
    pub(crate) base_url: String,
    pub(crate) path: String,
    pub(crate) path_params: BTreeMap<String, String>,
    pub(crate) query: Vec<Arc<dyn Payload>>,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Body,
    pub(crate) basic_auth: Option<BasicAuth>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) on_request: Option<RequestObserver>,
    pub(crate) on_reply: Option<ReplyObserver>,
}

impl fmt::Debug for RequestSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestSpec")
            .field("method", &self.method)
            .field("base_url", &self.base_url)
            .field("path", &self.path)
            .field("path_params", &self.path_params)
            .field("query_sources", &self.query.len())
            .field("headers", &self.headers)
            .field("body", &self.body)
            .field("basic_auth", &self.basic_auth)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl RequestSpec {
    /// Creates a spec for `method` against `path`.
    ///
    /// `path` may contain `{var}` placeholders and is appended to the base
    /// URL. With an empty base URL it must be an absolute URL.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            base_url: String::new(),
            path: path.into(),
            path_params: BTreeMap::new(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: Body::empty(),
            basic_auth: None,
            timeout: None,
            on_request: None,
            on_reply: None,
        }
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn path_param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.path_params.insert(name.into(), value.to_string());
        self
    }

    /// Replaces all path parameters.
    pub fn path_params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        self.path_params = params
            .into_iter()
            .map(|(name, value)| (name.into(), value.to_string()))
            .collect();
        self
    }

    /// Adds a structured query source, serialized field by field.
    ///
    /// Sources are merged on top of any query already present in the URL.
    pub fn query<T: Serialize + Send + Sync + 'static>(mut self, params: T) -> Self {
        self.query.push(Arc::new(params));
        self
    }

    /// Adds `headers`, keeping values already configured under the same name.
    pub fn append_headers(mut self, headers: &HeaderMap) -> Self {
        merge_headers(&mut self.headers, headers, MergeMode::Append);
        self
    }

    /// Adds `headers`, overwriting values already configured under the same name.
    pub fn set_headers(mut self, headers: &HeaderMap) -> Self {
        merge_headers(&mut self.headers, headers, MergeMode::Replace);
        self
    }

    pub fn header<K: IntoHeaderName>(mut self, name: K, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    pub fn json<T: Serialize + Send + Sync + 'static>(self, payload: T) -> Self {
        self.body(Body::json(payload))
    }

    pub fn xml<T: Serialize + Send + Sync + 'static>(self, payload: T) -> Self {
        self.body(Body::xml(payload))
    }

    pub fn text(self, payload: impl Into<String>) -> Self {
        self.body(Body::text(payload))
    }

    pub fn form<T: Serialize + Send + Sync + 'static>(self, payload: T) -> Self {
        self.body(Body::form(payload))
    }

    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.basic_auth = Some(BasicAuth::new(username, password));
        self
    }

    pub(crate) fn credentials(mut self, auth: Option<BasicAuth>) -> Self {
        self.basic_auth = auth;
        self
    }

    /// Deadline applied to each attempt separately.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub(crate) fn attempt_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Called with every assembled request, once per attempt.
    pub fn on_request<F>(mut self, observer: F) -> Self
    where
        F: Fn(&TransportRequest) + Send + Sync + 'static,
    {
        self.on_request = Some(Arc::new(observer));
        self
    }

    /// Called with the final reply.
    pub fn on_reply<F>(mut self, observer: F) -> Self
    where
        F: Fn(&Reply) + Send + Sync + 'static,
    {
        self.on_reply = Some(Arc::new(observer));
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}
