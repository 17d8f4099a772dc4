use std::time::Duration;

/// Configures transport timeout, attempt deadline and default retry behavior.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClientOptions {
    /// Overall timeout of the default transport in milliseconds.
    pub timeout_ms: u64,
    /// Default deadline for each individual attempt in milliseconds.
    pub attempt_timeout_ms: Option<u64>,
    /// Maximum number of retries after the initial attempt.
    pub max_retries: usize,
    /// Wait between retries in milliseconds (constant strategy), used when a
    /// request does not pick its own strategy.
    pub retry_backoff_ms: u64,
}

impl ClientOptions {
    pub(crate) fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub(crate) fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout_ms.map(Duration::from_millis)
    }

    pub(crate) fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            attempt_timeout_ms: None,
            max_retries: 0,
            retry_backoff_ms: 250,
        }
    }
}
