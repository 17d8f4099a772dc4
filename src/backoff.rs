//! Backoff strategies for the wait between attempts.

use std::time::Duration;

use rand::Rng;

/// Capped exponential curve shared by the exponential variants.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Exponential {
    pub base: Duration,
    pub cap: Duration,
}

impl Exponential {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self { base, cap }
    }

    /// `min(cap, base * 2^(attempt - 1))`.
    pub fn delay(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1);
        if self.base.is_zero() {
            return Duration::ZERO;
        }
        if exponent >= 32 {
            return self.cap;
        }
        self.base
            .checked_mul(1u32 << exponent)
            .map_or(self.cap, |delay| delay.min(self.cap))
    }
}

/// Maps the 1-indexed retry number to the wait before that retry.
///
/// Every variant is stateless except [`BackoffStrategy::DecorrelatedJitter`],
/// which remembers the previous delay. `backoff` therefore takes `&mut self`:
/// one strategy value drives one retry sequence and must not be shared
/// between requests that are in flight at the same time. Clone it instead;
/// [`RetryPolicy`](crate::RetryPolicy) is passed by value into each request
/// for this reason.
#[derive(Clone, Debug, PartialEq)]
pub enum BackoffStrategy {
    /// Fixed interval.
    Constant { interval: Duration },
    /// `slope * attempt`.
    Linear { slope: Duration },
    /// Capped exponential growth.
    Exponential(Exponential),
    /// Half of the exponential value plus a random share of the other half.
    EqualJitter(Exponential),
    /// Uniformly random between zero and the exponential value.
    FullJitter(Exponential),
    /// `min(cap, random(base, previous * 3))`, with `previous` starting at `base`.
    DecorrelatedJitter {
        window: Exponential,
        previous: Duration,
    },
}

impl BackoffStrategy {
    pub fn constant(interval: Duration) -> Self {
        Self::Constant { interval }
    }

    pub fn linear(slope: Duration) -> Self {
        Self::Linear { slope }
    }

    pub fn exponential(base: Duration, cap: Duration) -> Self {
        Self::Exponential(Exponential::new(base, cap))
    }

    pub fn equal_jitter(base: Duration, cap: Duration) -> Self {
        Self::EqualJitter(Exponential::new(base, cap))
    }

    pub fn full_jitter(base: Duration, cap: Duration) -> Self {
        Self::FullJitter(Exponential::new(base, cap))
    }

    pub fn decorrelated_jitter(base: Duration, cap: Duration) -> Self {
        Self::DecorrelatedJitter {
            window: Exponential::new(base, cap),
            previous: base,
        }
    }

    /// Wait before retry number `attempt` (1-indexed).
    pub fn backoff(&mut self, attempt: usize) -> Duration {
        match self {
            Self::Constant { interval } => *interval,
            Self::Linear { slope } => {
                slope.saturating_mul(u32::try_from(attempt).unwrap_or(u32::MAX))
            }
            Self::Exponential(curve) => curve.delay(attempt),
            Self::EqualJitter(curve) => {
                let half = curve.delay(attempt) / 2;
                half + random_between(Duration::ZERO, half)
            }
            Self::FullJitter(curve) => random_between(Duration::ZERO, curve.delay(attempt)),
            Self::DecorrelatedJitter { window, previous } => {
                let next = random_between(window.base, previous.saturating_mul(3)).min(window.cap);
                *previous = next;
                next
            }
        }
    }

    /// Upper bound of any value `backoff` can return, if the variant has one.
    pub fn cap(&self) -> Option<Duration> {
        match self {
            Self::Constant { interval } => Some(*interval),
            Self::Linear { .. } => None,
            Self::Exponential(curve)
            | Self::EqualJitter(curve)
            | Self::FullJitter(curve)
            | Self::DecorrelatedJitter { window: curve, .. } => Some(curve.cap),
        }
    }
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::constant(Duration::ZERO)
    }
}

fn random_between(low: Duration, high: Duration) -> Duration {
    if high <= low {
        return low;
    }
    let low = u64::try_from(low.as_nanos()).unwrap_or(u64::MAX);
    let high = u64::try_from(high.as_nanos()).unwrap_or(u64::MAX);
    Duration::from_nanos(rand::rng().random_range(low..=high))
}
