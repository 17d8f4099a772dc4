use std::{
    collections::{BTreeMap, VecDeque},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::any,
    Json, Router,
};
use cast_http::{
    BackoffStrategy, CastClient, CastError, ClientOptions, ReqwestTransport, RetryHook,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

#[derive(Clone)]
struct MockResponse {
    status: StatusCode,
    body: JsonValue,
    delay: Duration,
}

impl MockResponse {
    fn json(status: StatusCode, body: JsonValue) -> Self {
        Self {
            status,
            body,
            delay: Duration::from_millis(0),
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// What the server saw for one request.
#[derive(Clone, Debug)]
struct Seen {
    method: String,
    uri: String,
    headers: HeaderMap,
    body: String,
}

#[derive(Clone)]
struct MockState {
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    seen: Arc<Mutex<Vec<Seen>>>,
    hits: Arc<AtomicUsize>,
}

async fn handler(State(state): State<MockState>, request: Request) -> impl IntoResponse {
    state.hits.fetch_add(1, Ordering::SeqCst);

    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("request body must be readable");
    state
        .seen
        .lock()
        .expect("seen mutex must not be poisoned")
        .push(Seen {
            method: parts.method.to_string(),
            uri: parts.uri.to_string(),
            headers: parts.headers,
            body: String::from_utf8_lossy(&body).into_owned(),
        });

    let response = {
        let mut queue = state
            .responses
            .lock()
            .expect("response queue mutex must not be poisoned");
        queue.pop_front().unwrap_or_else(|| {
            MockResponse::json(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"error": "no mock response available"}),
            )
        })
    };

    if !response.delay.is_zero() {
        tokio::time::sleep(response.delay).await;
    }

    (response.status, Json(response.body))
}

struct TestServer {
    base_url: String,
    hits: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<Seen>>>,
    task: tokio::task::JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl TestServer {
    fn client(&self) -> CastClient {
        CastClient::new(self.base_url.clone())
    }

    fn seen(&self) -> Vec<Seen> {
        self.seen.lock().expect("seen mutex must not be poisoned").clone()
    }
}

async fn spawn_server(responses: Vec<MockResponse>) -> TestServer {
    let state = MockState {
        responses: Arc::new(Mutex::new(responses.into())),
        seen: Arc::new(Mutex::new(Vec::new())),
        hits: Arc::new(AtomicUsize::new(0)),
    };

    let app = Router::new()
        .route("/*path", any(handler))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("must bind test listener");
    let address = listener.local_addr().expect("must have local addr");
    let task = tokio::spawn(async move {
        axum::serve(listener, app)
            .await
            .expect("mock server must run");
    });

    TestServer {
        base_url: format!("http://{address}"),
        hits: state.hits,
        seen: state.seen,
        task,
    }
}

#[derive(Debug, Deserialize, PartialEq)]
struct User {
    id: u64,
    name: String,
}

#[derive(Serialize)]
struct Filter {
    active: bool,
    limit: u32,
}

#[tokio::test]
async fn get_expands_path_and_merges_query() {
    let server = spawn_server(vec![MockResponse::json(
        StatusCode::OK,
        json!({"id": 42, "name": "Kit"}),
    )])
    .await;

    let reply = server
        .client()
        .get("/users/{id}?expand=profile")
        .path_param("id", 42)
        .query(Filter {
            active: true,
            limit: 5,
        })
        .send()
        .await
        .expect("request must succeed");

    let user: User = reply.decode_json().expect("must decode user");
    assert_eq!(
        user,
        User {
            id: 42,
            name: "Kit".to_owned()
        }
    );
    assert_eq!(reply.attempts(), 1);

    let seen = server.seen();
    assert_eq!(seen[0].method, "GET");
    assert_eq!(seen[0].uri, "/users/42?active=true&expand=profile&limit=5");
}

#[tokio::test]
async fn post_sends_json_body_and_basic_auth() {
    let server = spawn_server(vec![MockResponse::json(
        StatusCode::CREATED,
        json!({"id": 1, "name": "Kit"}),
    )])
    .await;

    let reply = server
        .client()
        .with_basic_auth("Aladdin", "open sesame")
        .post("/users")
        .json(json!({"name": "Kit"}))
        .send()
        .await
        .expect("request must succeed");

    assert!(reply.success());
    assert!(!reply.status_ok());

    let seen = server.seen();
    assert_eq!(seen[0].body, r#"{"name":"Kit"}"#);
    assert_eq!(seen[0].headers["content-type"], "application/json");
    assert_eq!(
        seen[0].headers["authorization"],
        "Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ=="
    );
}

#[tokio::test]
async fn form_body_is_url_encoded() {
    let server = spawn_server(vec![MockResponse::json(StatusCode::OK, json!({}))]).await;

    server
        .client()
        .put("/settings")
        .form(BTreeMap::from([("theme", "dark mode"), ("lang", "en")]))
        .send()
        .await
        .expect("request must succeed");

    let seen = server.seen();
    assert_eq!(seen[0].method, "PUT");
    assert_eq!(seen[0].body, "lang=en&theme=dark+mode");
    assert_eq!(
        seen[0].headers["content-type"],
        "application/x-www-form-urlencoded"
    );
}

#[tokio::test]
async fn retries_on_retryable_http_status() {
    let server = spawn_server(vec![
        MockResponse::json(StatusCode::INTERNAL_SERVER_ERROR, json!({"error": "boom"})),
        MockResponse::json(StatusCode::OK, json!({"id": 7, "name": "Renamed"})),
    ])
    .await;

    let reply = server
        .client()
        .patch("/users/7")
        .json(json!({"name": "Renamed"}))
        .retry(1)
        .backoff(BackoffStrategy::constant(Duration::from_millis(1)))
        .retry_hook(RetryHook::Transient)
        .send()
        .await
        .expect("request must succeed after retry");

    assert_eq!(reply.status_code(), StatusCode::OK);
    assert_eq!(reply.attempts(), 2);
    assert_eq!(server.hits.load(Ordering::SeqCst), 2);

    let seen = server.seen();
    assert_eq!(seen[0].body, seen[1].body);
}

#[tokio::test]
async fn client_options_drive_default_retries() {
    let server = spawn_server(vec![
        MockResponse::json(StatusCode::SERVICE_UNAVAILABLE, json!({})),
        MockResponse::json(StatusCode::SERVICE_UNAVAILABLE, json!({})),
        MockResponse::json(StatusCode::SERVICE_UNAVAILABLE, json!({"final": true})),
    ])
    .await;

    let reply = server
        .client()
        .with_options(ClientOptions {
            max_retries: 2,
            retry_backoff_ms: 1,
            ..ClientOptions::default()
        })
        .get("/status")
        .retry_hook(RetryHook::Transient)
        .send()
        .await
        .expect("exhaustion returns the last reply");

    assert_eq!(reply.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(reply.attempts(), 3);
    assert_eq!(reply.text(), r#"{"final":true}"#);
    assert_eq!(server.hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn request_timeout_surfaces_transport_error() {
    let server = spawn_server(vec![MockResponse::json(StatusCode::OK, json!({}))
        .with_delay(Duration::from_millis(150))])
    .await;

    let err = server
        .client()
        .delete("/users/1")
        .timeout(Duration::from_millis(20))
        .send()
        .await
        .expect_err("request must timeout");

    match err {
        CastError::Transport(inner) => assert!(inner.is_timeout()),
        other => panic!("expected transport timeout error, got {other:?}"),
    }
}

#[tokio::test]
async fn overall_timeout_still_applies_with_longer_attempt_timeout() {
    let server = spawn_server(vec![MockResponse::json(StatusCode::OK, json!({}))
        .with_delay(Duration::from_millis(400))])
    .await;

    let transport = Arc::new(ReqwestTransport::with_timeout(Duration::from_millis(100)));
    let err = CastClient::with_transport(server.base_url.clone(), transport)
        .get("/slow")
        .timeout(Duration::from_secs(2))
        .send()
        .await
        .expect_err("overall timeout must fire");

    match err {
        CastError::Transport(inner) => assert!(inner.is_timeout()),
        other => panic!("expected transport timeout error, got {other:?}"),
    }
    assert_eq!(server.hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn base_url_query_survives_path_join() {
    let server = spawn_server(vec![MockResponse::json(StatusCode::OK, json!({}))]).await;

    CastClient::new(format!("{}/api?key=1", server.base_url))
        .get("/users")
        .query(BTreeMap::from([("page", "2")]))
        .send()
        .await
        .expect("request must succeed");

    assert_eq!(server.seen()[0].uri, "/api/users?key=1&page=2");
}

#[tokio::test]
async fn connection_refused_is_retried_then_surfaced() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("must bind");
    let address = listener.local_addr().expect("must have local addr");
    drop(listener);

    let err = CastClient::new(format!("http://{address}"))
        .get("/nothing")
        .retry(1)
        .backoff(BackoffStrategy::constant(Duration::from_millis(1)))
        .send()
        .await
        .expect_err("nothing listens on the port");

    assert!(matches!(err, CastError::Transport(ref inner) if inner.is_retryable()));
}
