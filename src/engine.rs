//! Retry engine: dispatches attempts until one is accepted or the retry
//! budget is spent.

use std::time::{Duration, Instant};

use bytes::BytesMut;
use futures::StreamExt;
use tokio::time::{sleep, timeout};

use crate::{
    assemble, AttemptResponse, Reply, RequestSpec, Result, RetryPolicy, RetryReason, Transport,
    TransportError, TransportErrorKind, TransportRequest, TransportResponse,
};

/// Executes `spec` through `transport` under `policy`.
///
/// Attempts run one after another. Each attempt assembles a new request,
/// runs under its own deadline, and has its body read to the end or dropped
/// before the next attempt starts.
///
/// When the budget runs out while still retry-eligible, the last response is
/// returned as a normal [`Reply`]; if the last attempt failed at the
/// transport level, that error is returned instead.
pub async fn execute(
    transport: &dyn Transport,
    spec: &RequestSpec,
    mut policy: RetryPolicy,
) -> Result<Reply> {
    let start = Instant::now();
    let mut retries = 0usize;

    loop {
        let request = assemble(spec)?;
        if let Some(observer) = &spec.on_request {
            observer(&request);
        }
        let method = request.method.clone();
        let url = request.url.clone();

        #[cfg(feature = "tracing")]
        tracing::debug!(%method, %url, attempt = retries + 1, "dispatching request");

        let outcome = dispatch(transport, request).await;
        let signal = match &outcome {
            Ok(response) => policy.evaluate(response),
            Err(err) if err.is_retryable() => Some(RetryReason::transport(err)),
            Err(_) => None,
        };

        #[cfg(feature = "tracing")]
        {
            if let Err(err) = &outcome {
                tracing::warn!(%url, attempt = retries + 1, "attempt failed: {err}");
            }
        }

        if let Some(reason) = signal {
            if policy.allows_retry(retries) {
                drop(outcome);
                retries += 1;
                let delay = policy.next_backoff(retries);

                #[cfg(feature = "tracing")]
                tracing::debug!(%url, retry = retries, ?delay, %reason, "retrying request");
                #[cfg(not(feature = "tracing"))]
                let _ = reason;

                wait(delay).await;
                continue;
            }
        }

        let response = outcome?;
        let reply = Reply::new(response, start.elapsed(), retries + 1, method, url);

        #[cfg(feature = "tracing")]
        tracing::info!(
            "{} took {:?} upto {} time(s)",
            reply.url(),
            reply.cost(),
            reply.attempts()
        );

        if let Some(observer) = &spec.on_reply {
            observer(&reply);
        }
        return Ok(reply);
    }
}

/// Sends one attempt and reads its body, bounded by the attempt deadline.
///
/// The deadline future is created here and dropped when this attempt
/// resolves, so it cannot reach a later attempt.
async fn dispatch(
    transport: &dyn Transport,
    request: TransportRequest,
) -> std::result::Result<AttemptResponse, TransportError> {
    let deadline = request.timeout;
    let exchange = async move {
        let response = transport.execute(request).await?;
        drain(response).await
    };

    match deadline {
        Some(limit) => timeout(limit, exchange).await.map_err(|_| {
            TransportError::new(
                TransportErrorKind::Timeout,
                format!("attempt exceeded {limit:?}"),
            )
        })?,
        None => exchange.await,
    }
}

/// Reads the body to the end. The stream is dropped on every return path.
async fn drain(
    response: TransportResponse,
) -> std::result::Result<AttemptResponse, TransportError> {
    let TransportResponse {
        status,
        headers,
        mut body,
    } = response;

    let mut buffer = BytesMut::new();
    while let Some(chunk) = body.next().await {
        buffer.extend_from_slice(&chunk?);
    }

    Ok(AttemptResponse {
        status,
        headers,
        body: buffer.freeze(),
    })
}

async fn wait(delay: Duration) {
    if !delay.is_zero() {
        sleep(delay).await;
    }
}
