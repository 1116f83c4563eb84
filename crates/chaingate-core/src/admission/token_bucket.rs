//! Async token bucket with reservation semantics.
//!
//! Waiting callers reserve their tokens up front: the bucket may go into debt, and the
//! caller sleeps until the debt would have been repaid by the refill schedule. A wait that
//! cannot finish before its deadline is rejected immediately, without consuming tokens.
//! Cancelling a sleeping waiter hands its reservation back.

use super::{context::Deadline, errors::WaitError};
use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Refill rate of a [`TokenBucket`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rate {
    /// Never blocks; every request is admitted.
    Unlimited,
    /// Tokens added per second. Only positive finite rates are meaningful; buckets treat
    /// anything else as [`Rate::Unlimited`].
    PerSecond(f64),
}

impl Rate {
    /// `0` means unlimited, matching the configuration convention.
    #[must_use]
    pub fn from_requests_per_second(requests_per_second: u32) -> Self {
        if requests_per_second == 0 {
            Self::Unlimited
        } else {
            Self::PerSecond(f64::from(requests_per_second))
        }
    }

    /// Fractional rate. Zero, negative, infinite and NaN rates are unlimited.
    #[must_use]
    pub fn per_second(tokens_per_second: f64) -> Self {
        if tokens_per_second.is_finite() && tokens_per_second > 0.0 {
            Self::PerSecond(tokens_per_second)
        } else {
            Self::Unlimited
        }
    }

    #[must_use]
    pub fn is_unlimited(&self) -> bool {
        matches!(self, Self::Unlimited)
    }

    fn normalized(self) -> Self {
        match self {
            Self::Unlimited => Self::Unlimited,
            Self::PerSecond(per_second) => Self::per_second(per_second),
        }
    }
}

#[derive(Debug)]
struct BucketState {
    /// Negative while outstanding reservations are being repaid.
    tokens: f64,
    last_update: Instant,
}

enum Rejection {
    Burst,
    TooLong(Duration),
}

/// Token bucket safe for concurrent use from any number of tasks.
///
/// The bucket starts full. Its capacity (`burst`) bounds both the largest single request and
/// the number of tokens that can accumulate while idle.
#[derive(Debug)]
pub struct TokenBucket {
    rate: Rate,
    burst: u32,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    #[must_use]
    pub fn new(rate: Rate, burst: u32) -> Self {
        Self {
            rate: rate.normalized(),
            burst,
            state: Mutex::new(BucketState {
                tokens: f64::from(burst),
                last_update: Instant::now(),
            }),
        }
    }

    #[must_use]
    pub fn unlimited() -> Self {
        Self::new(Rate::Unlimited, 0)
    }

    /// Bucket refilled at `requests_per_second` (`0` = unlimited).
    #[must_use]
    pub fn per_second(requests_per_second: u32, burst: u32) -> Self {
        Self::new(Rate::from_requests_per_second(requests_per_second), burst)
    }

    #[must_use]
    pub fn rate(&self) -> Rate {
        self.rate
    }

    #[must_use]
    pub fn burst(&self) -> u32 {
        self.burst
    }

    /// Tokens currently available, negative while reservations are outstanding.
    #[must_use]
    pub fn available(&self) -> f64 {
        let state = self.state.lock();
        self.tokens_at(&state, Instant::now())
    }

    fn tokens_at(&self, state: &BucketState, now: Instant) -> f64 {
        match self.rate {
            Rate::Unlimited => f64::from(self.burst),
            Rate::PerSecond(per_second) => {
                let elapsed = now.saturating_duration_since(state.last_update);
                (state.tokens + elapsed.as_secs_f64() * per_second).min(f64::from(self.burst))
            }
        }
    }

    fn reserve(
        &self,
        tokens: u32,
        now: Instant,
        max_wait: Duration,
    ) -> Result<Duration, Rejection> {
        let Rate::PerSecond(per_second) = self.rate else {
            return Ok(Duration::ZERO);
        };
        if tokens > self.burst {
            return Err(Rejection::Burst);
        }

        let mut state = self.state.lock();
        let remaining = self.tokens_at(&state, now) - f64::from(tokens);
        let wait = if remaining < 0.0 {
            // Rates small enough to overflow a Duration can never be waited out.
            Duration::try_from_secs_f64(-remaining / per_second).unwrap_or(Duration::MAX)
        } else {
            Duration::ZERO
        };
        if wait > max_wait {
            return Err(Rejection::TooLong(wait));
        }

        state.tokens = remaining;
        state.last_update = now;
        Ok(wait)
    }

    fn restore(&self, tokens: u32) {
        if self.rate.is_unlimited() {
            return;
        }
        let now = Instant::now();
        let mut state = self.state.lock();
        state.tokens = (self.tokens_at(&state, now) + f64::from(tokens)).min(f64::from(self.burst));
        state.last_update = now;
    }

    /// Takes `tokens` if they are available right now.
    pub fn try_acquire(&self, tokens: u32) -> bool {
        self.reserve(tokens, Instant::now(), Duration::ZERO).is_ok()
    }

    /// Waits until `tokens` are available, the deadline cannot be met, or `cancel` fires.
    ///
    /// Returns the time spent sleeping.
    ///
    /// # Errors
    ///
    /// - [`WaitError::Cancelled`] if `cancel` fires before or during the wait
    /// - [`WaitError::ExceedsBurst`] if `tokens` is larger than the bucket capacity
    /// - [`WaitError::Timeout`] / [`WaitError::CallerDeadline`] if the tokens would only be
    ///   available after `deadline`
    pub async fn wait_n(
        &self,
        tokens: u32,
        deadline: Deadline,
        cancel: &CancellationToken,
    ) -> Result<Duration, WaitError> {
        if cancel.is_cancelled() {
            return Err(WaitError::Cancelled);
        }

        let now = Instant::now();
        let remaining = deadline.remaining(now);
        let wait = self.reserve(tokens, now, remaining).map_err(|rejection| match rejection {
            Rejection::Burst => WaitError::ExceedsBurst { requested: tokens, burst: self.burst },
            Rejection::TooLong(wait) => WaitError::past_deadline(deadline.source, wait, remaining),
        })?;

        if wait.is_zero() {
            return Ok(wait);
        }

        tokio::select! {
            biased;
            () = tokio::time::sleep(wait) => Ok(wait),
            () = cancel.cancelled() => {
                self.restore(tokens);
                Err(WaitError::Cancelled)
            }
        }
    }
}
