use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Per-request execution context handed to [`super::AdmissionController::admit`].
///
/// Carries the caller's cancellation signal and, optionally, the caller's own deadline.
/// The per-connection limiter is not part of the context; it is passed to `admit` directly.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl RequestContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Context whose wait ends when `cancel` fires.
    #[must_use]
    pub fn with_cancellation(cancel: CancellationToken) -> Self {
        Self { deadline: None, cancel }
    }

    /// Sets an absolute caller deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Sets a caller deadline relative to now.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Combines the admission timeout with the caller's deadline; the earlier one wins.
    #[must_use]
    pub fn admission_deadline(&self, admission_timeout: Duration) -> Deadline {
        let admission = Deadline {
            at: Instant::now() + admission_timeout,
            source: DeadlineSource::Admission,
        };
        match self.deadline {
            Some(at) if at < admission.at => Deadline { at, source: DeadlineSource::Caller },
            _ => admission,
        }
    }
}

/// Which bound produced a [`Deadline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlineSource {
    /// The gateway's configured admission timeout.
    Admission,
    /// A deadline the caller set on its own context.
    Caller,
}

/// Absolute point in time a token wait must complete by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    pub at: Instant,
    pub source: DeadlineSource,
}

impl Deadline {
    #[must_use]
    pub fn after(timeout: Duration) -> Self {
        Self { at: Instant::now() + timeout, source: DeadlineSource::Admission }
    }

    #[must_use]
    pub fn remaining(&self, now: Instant) -> Duration {
        self.at.saturating_duration_since(now)
    }
}
