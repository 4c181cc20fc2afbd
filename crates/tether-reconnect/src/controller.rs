//! The reconnection controller: sole writer of [`ConnectionState`].
//!
//! The controller reacts to what happened (a dial succeeded, a dial failed,
//! the link dropped, a retry timer fired) and decides what comes next. It
//! owns two timers:
//!
//! - the **retry timer**: when the next automatic attempt starts
//! - the **connect timer**: when an in-flight attempt is declared failed
//!
//! Its owner polls both with [`Timer::wait`] and calls back into the
//! controller when one fires.

use std::time::Duration;

use crate::{
    BackoffPolicy, ConnectionState, ReconnectError, RetryBudget, Timer,
};

/// Tunables for the controller.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Automatic attempts allowed before giving up. Default: 5.
    pub max_attempts: u32,
    /// Backoff shape. Default: 1 s base, 30 s cap, no jitter.
    pub backoff: BackoffPolicy,
    /// How long one attempt may stay in Connecting. Default: 10 s.
    pub connect_timeout: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: BackoffPolicy::default(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Who started the attempt currently in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptKind {
    /// The caller invoked `connect()`. Does not consume retry budget.
    Manual,
    /// A scheduled retry fired; `attempt` is 1-indexed.
    Automatic { attempt: u32 },
}

/// What the controller decided after a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recovery {
    /// Attempt `attempt` of `max` will start after `delay`.
    RetryScheduled {
        attempt: u32,
        max: u32,
        delay: Duration,
    },
    /// No attempts left. The state stays Errored until a manual connect.
    Exhausted(ReconnectError),
}

/// Owns the connection lifecycle state machine.
pub struct ReconnectController {
    config: ReconnectConfig,
    state: ConnectionState,
    budget: RetryBudget,
    current_attempt: Option<AttemptKind>,
    retry_timer: Timer,
    connect_timer: Timer,
}

impl ReconnectController {
    pub fn new(config: ReconnectConfig) -> Self {
        let budget = RetryBudget::new(config.max_attempts, &config.backoff);
        Self {
            config,
            state: ConnectionState::Disconnected,
            budget,
            current_attempt: None,
            retry_timer: Timer::new(),
            connect_timer: Timer::new(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn budget(&self) -> &RetryBudget {
        &self.budget
    }

    pub fn config(&self) -> &ReconnectConfig {
        &self.config
    }

    /// The attempt in flight, if the state is Connecting.
    pub fn current_attempt(&self) -> Option<AttemptKind> {
        self.current_attempt
    }

    /// Fires when the next automatic attempt is due.
    pub fn retry_timer(&self) -> &Timer {
        &self.retry_timer
    }

    /// Fires when the attempt in flight has taken too long.
    pub fn connect_timer(&self) -> &Timer {
        &self.connect_timer
    }

    /// `true` when automatic recovery has given up.
    pub fn is_exhausted(&self) -> bool {
        self.state == ConnectionState::Errored
            && !self.retry_timer.is_armed()
            && self.budget.is_exhausted()
    }

    /// A caller-initiated attempt. Resets the retry budget and cancels any
    /// pending retry.
    ///
    /// # Errors
    /// [`ReconnectError::InvalidTransition`] when already Connecting or
    /// Connected; nothing changes in that case.
    pub fn begin_connect(&mut self) -> Result<(), ReconnectError> {
        self.transition(ConnectionState::Connecting)?;
        self.retry_timer.cancel();
        self.budget.reset();
        self.start_attempt(AttemptKind::Manual);
        Ok(())
    }

    /// The retry timer fired: start automatic attempt *n*.
    ///
    /// Returns `n`.
    pub fn on_retry_due(&mut self) -> Result<u32, ReconnectError> {
        self.retry_timer.cancel();
        if !matches!(
            self.state,
            ConnectionState::Reconnecting | ConnectionState::Errored
        ) {
            tracing::warn!(state = %self.state, "retry fired outside recovery");
            return Err(ReconnectError::InvalidTransition {
                from: self.state,
                to: ConnectionState::Connecting,
            });
        }
        let attempt = self.budget.next_attempt().ok_or(
            ReconnectError::BudgetExhausted {
                attempts: self.budget.attempt_count,
            },
        )?;
        self.transition(ConnectionState::Connecting)?;
        self.start_attempt(AttemptKind::Automatic { attempt });
        tracing::info!(attempt, max = self.config.max_attempts, "reconnect attempt");
        Ok(attempt)
    }

    /// The attempt in flight succeeded.
    pub fn on_connected(&mut self) -> Result<(), ReconnectError> {
        self.transition(ConnectionState::Connected)?;
        self.connect_timer.cancel();
        self.retry_timer.cancel();
        self.budget.reset();
        self.current_attempt = None;
        Ok(())
    }

    /// The attempt in flight failed or timed out.
    pub fn on_attempt_failed(
        &mut self,
        reason: &str,
    ) -> Result<Recovery, ReconnectError> {
        self.transition(ConnectionState::Errored)?;
        self.connect_timer.cancel();
        if let Some(AttemptKind::Automatic { .. }) = self.current_attempt.take() {
            self.budget.record_failure();
        }
        tracing::warn!(
            reason,
            failed = self.budget.attempt_count,
            max = self.config.max_attempts,
            "connection attempt failed"
        );
        Ok(self.schedule_retry())
    }

    /// An open connection dropped unexpectedly.
    pub fn on_connection_lost(
        &mut self,
        reason: &str,
    ) -> Result<Recovery, ReconnectError> {
        self.transition(ConnectionState::Reconnecting)?;
        tracing::warn!(reason, "connection lost");
        Ok(self.schedule_retry())
    }

    /// The server ended the connection on purpose (close frame or kick).
    /// No retry is scheduled.
    pub fn on_closed_intentionally(
        &mut self,
        reason: &str,
    ) -> Result<(), ReconnectError> {
        self.transition(ConnectionState::Disconnected)?;
        self.cancel_timers();
        self.current_attempt = None;
        tracing::info!(reason, "connection closed by server, not retrying");
        Ok(())
    }

    /// Explicit user-initiated leave: cancel everything and go to
    /// Disconnected. Returns `false` if already Disconnected.
    pub fn leave(&mut self) -> bool {
        self.cancel_timers();
        self.current_attempt = None;
        self.budget.reset();
        if self.state == ConnectionState::Disconnected {
            return false;
        }
        self.state = ConnectionState::Disconnected;
        tracing::info!("left session, connection lifecycle reset");
        true
    }

    fn start_attempt(&mut self, kind: AttemptKind) {
        self.current_attempt = Some(kind);
        self.connect_timer.schedule(self.config.connect_timeout);
    }

    fn cancel_timers(&mut self) {
        self.retry_timer.cancel();
        self.connect_timer.cancel();
    }

    /// Arms the retry timer for the next attempt, or reports exhaustion.
    fn schedule_retry(&mut self) -> Recovery {
        let Some(attempt) = self.budget.next_attempt() else {
            self.retry_timer.cancel();
            let attempts = self.budget.attempt_count;
            tracing::error!(attempts, "reconnect budget exhausted, giving up");
            return Recovery::Exhausted(ReconnectError::BudgetExhausted {
                attempts,
            });
        };

        let delay = self.config.backoff.jittered_delay_for(attempt);
        self.budget.current_delay = delay;
        self.retry_timer.schedule(delay);
        tracing::debug!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            "retry scheduled"
        );
        Recovery::RetryScheduled {
            attempt,
            max: self.config.max_attempts,
            delay,
        }
    }

    /// The single place the state is written.
    fn transition(
        &mut self,
        to: ConnectionState,
    ) -> Result<(), ReconnectError> {
        let from = self.state;
        if !from.can_transition_to(to) {
            tracing::warn!(%from, %to, "refusing invalid connection transition");
            return Err(ReconnectError::InvalidTransition { from, to });
        }
        tracing::debug!(%from, %to, "connection state");
        self.state = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConnectionState::*;

    fn controller(max_attempts: u32) -> ReconnectController {
        ReconnectController::new(ReconnectConfig {
            max_attempts,
            ..ReconnectConfig::default()
        })
    }

    fn connected(max_attempts: u32) -> ReconnectController {
        let mut c = controller(max_attempts);
        c.begin_connect().unwrap();
        c.on_connected().unwrap();
        c
    }

    #[tokio::test]
    async fn test_manual_connect_arms_connect_timeout() {
        let mut c = controller(5);
        c.begin_connect().unwrap();
        assert_eq!(c.state(), Connecting);
        assert_eq!(c.current_attempt(), Some(AttemptKind::Manual));
        assert!(c.connect_timer().is_armed());
        assert!(!c.retry_timer().is_armed());
    }

    #[tokio::test]
    async fn test_connect_while_connected_is_refused() {
        let mut c = connected(5);
        assert_eq!(
            c.begin_connect(),
            Err(ReconnectError::InvalidTransition {
                from: Connected,
                to: Connecting
            })
        );
        assert_eq!(c.state(), Connected);
    }

    #[tokio::test]
    async fn test_loss_schedules_first_retry_at_base_delay() {
        let mut c = connected(5);
        let recovery = c.on_connection_lost("reset").unwrap();
        assert_eq!(
            recovery,
            Recovery::RetryScheduled {
                attempt: 1,
                max: 5,
                delay: Duration::from_secs(1)
            }
        );
        assert_eq!(c.state(), Reconnecting);
        assert!(c.retry_timer().is_armed());
    }

    #[tokio::test]
    async fn test_failed_manual_attempt_does_not_consume_budget() {
        let mut c = controller(5);
        c.begin_connect().unwrap();
        let recovery = c.on_attempt_failed("refused").unwrap();
        assert_eq!(c.state(), Errored);
        assert_eq!(c.budget().attempt_count, 0);
        assert!(matches!(
            recovery,
            Recovery::RetryScheduled { attempt: 1, .. }
        ));
        assert!(!c.connect_timer().is_armed());
    }

    #[tokio::test]
    async fn test_failed_automatic_attempts_back_off_then_exhaust() {
        let mut c = connected(3);
        c.on_connection_lost("reset").unwrap();

        let mut delays = Vec::new();
        for expected_attempt in 1..=3 {
            assert_eq!(c.on_retry_due().unwrap(), expected_attempt);
            assert_eq!(c.state(), Connecting);
            match c.on_attempt_failed("refused").unwrap() {
                Recovery::RetryScheduled { delay, .. } => delays.push(delay),
                Recovery::Exhausted(err) => {
                    assert_eq!(expected_attempt, 3);
                    assert_eq!(err, ReconnectError::BudgetExhausted { attempts: 3 });
                }
            }
        }
        assert_eq!(delays, vec![Duration::from_secs(2), Duration::from_secs(4)]);
        assert_eq!(c.state(), Errored);
        assert!(c.is_exhausted());
        assert!(!c.retry_timer().is_armed());
        assert!(c.on_retry_due().is_err());
        assert_eq!(c.state(), Errored);
    }

    #[tokio::test]
    async fn test_manual_connect_after_exhaustion_resets_budget() {
        let mut c = connected(1);
        c.on_connection_lost("reset").unwrap();
        c.on_retry_due().unwrap();
        assert!(matches!(
            c.on_attempt_failed("refused").unwrap(),
            Recovery::Exhausted(_)
        ));

        c.begin_connect().unwrap();
        assert_eq!(c.budget().attempt_count, 0);
        assert_eq!(c.state(), Connecting);
    }

    #[tokio::test]
    async fn test_success_resets_budget() {
        let mut c = connected(5);
        c.on_connection_lost("reset").unwrap();
        c.on_retry_due().unwrap();
        c.on_attempt_failed("refused").unwrap();
        c.on_retry_due().unwrap();
        assert_eq!(c.budget().attempt_count, 1);

        c.on_connected().unwrap();
        assert_eq!(c.budget().attempt_count, 0);
        assert_eq!(c.budget().current_delay, Duration::from_secs(1));
        assert!(!c.retry_timer().is_armed());
        assert!(!c.connect_timer().is_armed());
    }

    #[tokio::test]
    async fn test_intentional_close_schedules_nothing() {
        let mut c = connected(5);
        c.on_closed_intentionally("kicked").unwrap();
        assert_eq!(c.state(), Disconnected);
        assert!(!c.retry_timer().is_armed());
        assert!(c.on_retry_due().is_err());
        assert_eq!(c.state(), Disconnected);
    }

    #[tokio::test]
    async fn test_leave_cancels_timers_from_any_state() {
        let mut c = connected(5);
        c.on_connection_lost("reset").unwrap();
        assert!(c.leave());
        assert_eq!(c.state(), Disconnected);
        assert!(!c.retry_timer().is_armed());
        assert!(!c.leave(), "second leave is a no-op");
    }

    #[tokio::test]
    async fn test_loss_while_not_connected_is_refused() {
        let mut c = controller(5);
        assert!(c.on_connection_lost("reset").is_err());
        assert_eq!(c.state(), Disconnected);
        assert!(!c.retry_timer().is_armed());
    }
}
