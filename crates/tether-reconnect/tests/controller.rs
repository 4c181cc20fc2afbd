//! Drives the controller with real (paused) tokio time, the way the session
//! actor does: wait on whichever timer is armed, then call back in.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tether_reconnect::{
    BackoffPolicy, ConnectionState, ReconnectConfig, ReconnectController,
    Recovery,
};
use tokio::time::Instant;

fn config(max_attempts: u32) -> ReconnectConfig {
    ReconnectConfig {
        max_attempts,
        backoff: BackoffPolicy::default(),
        connect_timeout: Duration::from_secs(10),
    }
}

#[tokio::test(start_paused = true)]
async fn test_three_refused_attempts_then_errored() {
    let mut c = ReconnectController::new(config(3));
    c.begin_connect().unwrap();
    c.on_connected().unwrap();

    let lost_at = Instant::now();
    c.on_connection_lost("socket reset").unwrap();

    let mut attempt_offsets = Vec::new();
    loop {
        if !c.retry_timer().is_armed() {
            break;
        }
        c.retry_timer().wait().await;
        c.on_retry_due().unwrap();
        attempt_offsets.push(lost_at.elapsed());
        // Every dial is refused immediately.
        let _ = c.on_attempt_failed("connection refused").unwrap();
    }

    assert_eq!(
        attempt_offsets,
        vec![
            Duration::from_millis(1000),
            Duration::from_millis(3000),
            Duration::from_millis(7000),
        ]
    );
    assert_eq!(c.state(), ConnectionState::Errored);
    assert!(c.is_exhausted());
    assert!(!c.retry_timer().is_armed());
    assert!(!c.connect_timer().is_armed());
}

#[tokio::test(start_paused = true)]
async fn test_connect_timeout_counts_as_failure() {
    let mut c = ReconnectController::new(config(2));
    c.begin_connect().unwrap();
    c.on_connected().unwrap();
    c.on_connection_lost("reset").unwrap();

    c.retry_timer().wait().await;
    assert_eq!(c.on_retry_due().unwrap(), 1);

    // The dial hangs; the connect timer decides.
    let started = Instant::now();
    c.connect_timer().wait().await;
    assert_eq!(started.elapsed(), Duration::from_secs(10));
    let recovery = c.on_attempt_failed("timed out").unwrap();

    assert_eq!(c.budget().attempt_count, 1);
    assert_eq!(
        recovery,
        Recovery::RetryScheduled {
            attempt: 2,
            max: 2,
            delay: Duration::from_secs(2),
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_recovery_then_second_loss_starts_from_base_delay() {
    let mut c = ReconnectController::new(config(5));
    c.begin_connect().unwrap();
    c.on_connected().unwrap();

    c.on_connection_lost("reset").unwrap();
    c.retry_timer().wait().await;
    c.on_retry_due().unwrap();
    c.on_attempt_failed("refused").unwrap();
    c.retry_timer().wait().await;
    c.on_retry_due().unwrap();
    c.on_connected().unwrap();

    let recovery = c.on_connection_lost("reset again").unwrap();
    assert_eq!(
        recovery,
        Recovery::RetryScheduled {
            attempt: 1,
            max: 5,
            delay: Duration::from_secs(1),
        }
    );
}

/// Feeds random stimuli and checks that the controller never leaves the edge
/// table and that the failure count only grows between resets.
#[tokio::test(start_paused = true)]
async fn test_random_walk_only_takes_legal_edges() {
    let mut rng = StdRng::seed_from_u64(0x7e7e_7e7e);

    for _ in 0..50 {
        let mut c = ReconnectController::new(config(4));
        let mut last_count = 0;

        for _ in 0..200 {
            let before = c.state();
            let result = match rng.random_range(0..7) {
                0 => c.begin_connect().map(|_| ()),
                1 => c.on_retry_due().map(|_| ()),
                2 => c.on_connected(),
                3 => c.on_attempt_failed("refused").map(|_| ()),
                4 => c.on_connection_lost("reset").map(|_| ()),
                5 => c.on_closed_intentionally("closed"),
                _ => {
                    c.leave();
                    Ok(())
                }
            };
            let after = c.state();

            if result.is_err() {
                assert_eq!(before, after, "a refused stimulus changes nothing");
            } else if before != after {
                assert!(
                    before.can_transition_to(after),
                    "illegal edge {before} -> {after}"
                );
            }

            let count = c.budget().attempt_count;
            if count < last_count {
                assert!(
                    matches!(
                        after,
                        ConnectionState::Connecting
                            | ConnectionState::Connected
                            | ConnectionState::Disconnected
                    ),
                    "count dropped without a reset ({after})"
                );
            }
            assert!(count <= c.config().max_attempts);
            last_count = count;

            assert!(
                !(c.retry_timer().is_armed() && c.connect_timer().is_armed()),
                "retry and connect timers are never armed together"
            );
        }
    }
}
