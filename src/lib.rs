//! `cast-http` is a configurable outbound HTTP request executor.
//!
//! A request is described by a [`RequestSpec`] (method, path template,
//! query, headers, body, credentials) and executed under a [`RetryPolicy`]
//! (retry budget, [`BackoffStrategy`], ordered [`RetryHook`]s):
//! - [`CastClient::request`] and the verb helpers start a [`RequestBuilder`]
//! - [`RequestBuilder::send`] runs the attempts and returns a [`Reply`]
//! - [`execute`] is the same engine over any [`Transport`]

mod assemble;
mod auth;
mod backoff;
mod body;
mod client;
mod engine;
mod error;
mod hook;
mod options;
mod reply;
mod request;
mod retry;
mod template;
mod transport;

pub use assemble::{assemble, merge_headers, MergeMode};
pub use auth::BasicAuth;
pub use backoff::{BackoffStrategy, Exponential};
pub use body::{Body, EncodedBody};
pub use client::{CastClient, RequestBuilder};
pub use engine::execute;
pub use error::{CastError, TransportError, TransportErrorKind};
pub use hook::{evaluate_hooks, AttemptResponse, RetryHook, RetryReason};
pub use options::ClientOptions;
pub use reply::Reply;
pub use request::RequestSpec;
pub use retry::RetryPolicy;
pub use template::{expand, TemplateError};
pub use transport::{
    BodyStream, ReqwestTransport, Transport, TransportRequest, TransportResponse,
    DEFAULT_TRANSPORT_TIMEOUT,
};

pub type Result<T> = std::result::Result<T, CastError>;
