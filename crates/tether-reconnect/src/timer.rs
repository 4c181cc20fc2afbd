//! A cancellable single-shot deadline.

use std::time::Duration;

use tokio::time::{self, Instant};

/// A deadline that is either armed or not.
///
/// Scheduling overwrites the previous deadline, so a `Timer` can never have
/// two outstanding firings. [`wait`](Self::wait) pends forever while disarmed,
/// which makes it safe to leave in a `tokio::select!` branch permanently.
///
/// The timer does not disarm itself when it fires; the owner reacts and
/// calls [`cancel`](Self::cancel) (or schedules the next deadline).
#[derive(Debug, Default)]
pub struct Timer {
    deadline: Option<Instant>,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms the timer `after` from now, replacing any previous deadline.
    pub fn schedule(&mut self, after: Duration) -> Instant {
        let deadline = Instant::now() + after;
        self.deadline = Some(deadline);
        deadline
    }

    /// Disarms the timer. Returns `true` if it was armed.
    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Resolves at the deadline; pends forever when disarmed.
    pub async fn wait(&self) {
        match self.deadline {
            Some(deadline) => time::sleep_until(deadline).await,
            None => std::future::pending::<()>().await,
        }
    }
}
