use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{
    header::{HeaderMap, HeaderValue, IntoHeaderName},
    Method,
};
use serde::Serialize;

use crate::{
    assemble, engine, BackoffStrategy, BasicAuth, Body, ClientOptions, Reply, RequestSpec, Result,
    RetryHook, RetryPolicy, ReqwestTransport, Transport, TransportRequest,
};

#[derive(Clone)]
/// HTTP client that owns a transport and per-client defaults.
pub struct CastClient {
    transport: Arc<dyn Transport>,
    injected: bool,
    base_url: String,
    basic_auth: Option<BasicAuth>,
    options: ClientOptions,
}

impl fmt::Debug for CastClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CastClient")
            .field("base_url", &self.base_url)
            .field("basic_auth", &self.basic_auth)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl CastClient {
    /// Creates a client backed by the default reqwest transport.
    pub fn new(base_url: impl Into<String>) -> Self {
        let options = ClientOptions::default();
        Self {
            transport: Arc::new(ReqwestTransport::with_timeout(options.timeout())),
            injected: false,
            base_url: base_url.into(),
            basic_auth: None,
            options,
        }
    }

    /// Creates a client that dispatches through `transport`.
    pub fn with_transport(base_url: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            injected: true,
            base_url: base_url.into(),
            basic_auth: None,
            options: ClientOptions::default(),
        }
    }

    /// Creates a client from environment variables.
    ///
    /// Reads:
    /// - `CAST_BASE_URL` — prefix prepended to every request path
    /// - `CAST_USERNAME` / `CAST_PASSWORD` — optional basic credentials,
    ///   applied only when both are set
    ///
    /// Returns an error if the base URL is missing or empty.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use cast_http::CastClient;
    ///
    /// let client = CastClient::from_env().expect("missing CAST_BASE_URL");
    /// ```
    pub fn from_env() -> std::result::Result<Self, String> {
        let base_url = std::env::var("CAST_BASE_URL")
            .map_err(|_| "missing CAST_BASE_URL environment variable".to_owned())?;
        if base_url.trim().is_empty() {
            return Err("CAST_BASE_URL is set but empty".to_owned());
        }

        let client = Self::new(base_url.trim());
        match (std::env::var("CAST_USERNAME"), std::env::var("CAST_PASSWORD")) {
            (Ok(username), Ok(password)) => Ok(client.with_basic_auth(username, password)),
            _ => Ok(client),
        }
    }

    /// Applies client options such as timeouts and retry defaults.
    ///
    /// Rebuilds the default transport so its overall timeout follows
    /// `timeout_ms`; an injected transport is left untouched.
    pub fn with_options(mut self, opts: ClientOptions) -> Self {
        if !self.injected {
            self.transport = Arc::new(ReqwestTransport::with_timeout(opts.timeout()));
        }
        self.options = opts;
        self
    }

    /// Attaches basic credentials to every request from this client.
    pub fn with_basic_auth(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.basic_auth = Some(BasicAuth::new(username, password));
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Starts a request for `method` against the path template `path`.
    pub fn request(&self, method: Method, path: impl Into<String>) -> RequestBuilder {
        let spec = RequestSpec::new(method, path)
            .base_url(self.base_url.clone())
            .credentials(self.basic_auth.clone())
            .attempt_timeout(self.options.attempt_timeout());
        let policy = RetryPolicy::new(self.options.max_retries)
            .strategy(BackoffStrategy::constant(self.options.retry_backoff()));

        RequestBuilder {
            transport: Arc::clone(&self.transport),
            spec,
            policy,
        }
    }

    pub fn get(&self, path: impl Into<String>) -> RequestBuilder {
        self.request(Method::GET, path)
    }

    pub fn post(&self, path: impl Into<String>) -> RequestBuilder {
        self.request(Method::POST, path)
    }

    pub fn put(&self, path: impl Into<String>) -> RequestBuilder {
        self.request(Method::PUT, path)
    }

    pub fn patch(&self, path: impl Into<String>) -> RequestBuilder {
        self.request(Method::PATCH, path)
    }

    pub fn delete(&self, path: impl Into<String>) -> RequestBuilder {
        self.request(Method::DELETE, path)
    }

    pub fn head(&self, path: impl Into<String>) -> RequestBuilder {
        self.request(Method::HEAD, path)
    }
}

/// One request in preparation. Consumed by [`RequestBuilder::send`].
#[must_use = "a request does nothing until `send` is awaited"]
pub struct RequestBuilder {
    transport: Arc<dyn Transport>,
    spec: RequestSpec,
    policy: RetryPolicy,
}

impl fmt::Debug for RequestBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestBuilder")
            .field("spec", &self.spec)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl RequestBuilder {
    fn map_spec(mut self, f: impl FnOnce(RequestSpec) -> RequestSpec) -> Self {
        self.spec = f(self.spec);
        self
    }

    pub fn path_param(self, name: impl Into<String>, value: impl ToString) -> Self {
        self.map_spec(|spec| spec.path_param(name, value))
    }

    pub fn path_params<I, K, V>(self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        self.map_spec(|spec| spec.path_params(params))
    }

    pub fn query<T: Serialize + Send + Sync + 'static>(self, params: T) -> Self {
        self.map_spec(|spec| spec.query(params))
    }

    pub fn append_headers(self, headers: &HeaderMap) -> Self {
        self.map_spec(|spec| spec.append_headers(headers))
    }

    pub fn set_headers(self, headers: &HeaderMap) -> Self {
        self.map_spec(|spec| spec.set_headers(headers))
    }

    pub fn header<K: IntoHeaderName>(self, name: K, value: HeaderValue) -> Self {
        self.map_spec(|spec| spec.header(name, value))
    }

    pub fn body(self, body: Body) -> Self {
        self.map_spec(|spec| spec.body(body))
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

    pub fn basic_auth(self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.map_spec(|spec| spec.basic_auth(username, password))
    }

    /// Deadline for each attempt.
    pub fn timeout(self, timeout: Duration) -> Self {
        self.map_spec(|spec| spec.timeout(timeout))
    }

    pub fn on_request<F>(self, observer: F) -> Self
    where
        F: Fn(&TransportRequest) + Send + Sync + 'static,
    {
        self.map_spec(|spec| spec.on_request(observer))
    }

    pub fn on_reply<F>(self, observer: F) -> Self
    where
        F: Fn(&Reply) + Send + Sync + 'static,
    {
        self.map_spec(|spec| spec.on_reply(observer))
    }

    /// Maximum number of retries after the first attempt.
    pub fn retry(mut self, max_retries: usize) -> Self {
        self.policy = self.policy.max_retries(max_retries);
        self
    }

    pub fn backoff(mut self, strategy: BackoffStrategy) -> Self {
        self.policy = self.policy.strategy(strategy);
        self
    }

    pub fn retry_hook(mut self, hook: RetryHook) -> Self {
        self.policy = self.policy.hook(hook);
        self
    }

    pub fn retry_hooks(mut self, hooks: impl IntoIterator<Item = RetryHook>) -> Self {
        self.policy = self.policy.hooks(hooks);
        self
    }

    /// Replaces the whole retry policy, including client defaults.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn spec(&self) -> &RequestSpec {
        &self.spec
    }

    /// Assembles the request the first attempt would send, without sending it.
    pub fn build(&self) -> Result<TransportRequest> {
        assemble(&self.spec)
    }

    /// Runs the request to completion, retrying per the configured policy.
    pub async fn send(self) -> Result<Reply> {
        engine::execute(self.transport.as_ref(), &self.spec, self.policy).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::CastClient;
    use crate::ClientOptions;

    #[test]
    fn debug_redacts_credentials() {
        let client = CastClient::new("https://api.example.com").with_basic_auth("kit", "secret");
        let debug = format!("{client:?}");
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn requests_inherit_client_defaults() {
        let client = CastClient::new("https://api.example.com")
            .with_basic_auth("kit", "secret")
            .with_options(ClientOptions {
                attempt_timeout_ms: Some(750),
                max_retries: 4,
                ..ClientOptions::default()
            });

        let builder = client.get("/users/{id}").path_param("id", 9);
        let request = builder.build().expect("must assemble");
        assert_eq!(request.url.as_str(), "https://api.example.com/users/9");
        assert_eq!(request.timeout, Some(Duration::from_millis(750)));
        assert!(request.headers.contains_key(reqwest::header::AUTHORIZATION));
        assert_eq!(builder.policy.retry_limit(), 4);
    }

    #[test]
    fn per_request_settings_override_defaults() {
        let client = CastClient::new("https://api.example.com");
        let builder = client
            .post("/items")
            .timeout(Duration::from_millis(20))
            .retry(2);
        let request = builder.build().unwrap();
        assert_eq!(request.timeout, Some(Duration::from_millis(20)));
        assert_eq!(request.method, reqwest::Method::POST);
        assert_eq!(builder.policy.retry_limit(), 2);
    }
}
