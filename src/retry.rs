use std::time::Duration;

use crate::{evaluate_hooks, AttemptResponse, BackoffStrategy, RetryHook, RetryReason};

/// How many times to retry, how long to wait, and what counts as retryable.
///
/// Transport failures are always retry-eligible; `hooks` decide for
/// responses that did arrive.
#[derive(Clone, Debug, Default)]
pub struct RetryPolicy {
    max_retries: usize,
    strategy: BackoffStrategy,
    hooks: Vec<RetryHook>,
}

impl RetryPolicy {
    /// Single attempt, no retries.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Up to `max_retries` retries after the first attempt.
    pub fn new(max_retries: usize) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    pub fn max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn strategy(mut self, strategy: BackoffStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn hook(mut self, hook: RetryHook) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn hooks(mut self, hooks: impl IntoIterator<Item = RetryHook>) -> Self {
        self.hooks.extend(hooks);
        self
    }

    pub fn retry_limit(&self) -> usize {
        self.max_retries
    }

    pub fn backoff_strategy(&self) -> &BackoffStrategy {
        &self.strategy
    }

    pub fn retry_hooks(&self) -> &[RetryHook] {
        &self.hooks
    }

    pub(crate) fn evaluate(&self, response: &AttemptResponse) -> Option<RetryReason> {
        evaluate_hooks(&self.hooks, response)
    }

    /// Whether another attempt is allowed after `retries` retries.
    pub(crate) fn allows_retry(&self, retries: usize) -> bool {
        retries < self.max_retries
    }

    pub(crate) fn next_backoff(&mut self, retry: usize) -> Duration {
        self.strategy.backoff(retry)
    }
}
