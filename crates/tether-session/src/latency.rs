//! Round-trip latency sampling over ping/pong.
//!
//! The monitor is informational only. It never retries a probe and never
//! decides that the connection is gone; a missing pong just means there is
//! no new sample this cycle.

use std::fmt;
use std::time::Duration;

use tether_reconnect::Timer;
use tokio::time::Instant;

/// Coarse link quality derived from the latest round-trip time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionQuality {
    /// Under 100 ms.
    Good,
    /// 100 ms up to (not including) 300 ms.
    Poor,
    /// 300 ms or more.
    Bad,
}

impl ConnectionQuality {
    pub fn from_round_trip_ms(round_trip_ms: u64) -> Self {
        match round_trip_ms {
            0..100 => Self::Good,
            100..300 => Self::Poor,
            _ => Self::Bad,
        }
    }
}

impl fmt::Display for ConnectionQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Good => write!(f, "good"),
            Self::Poor => write!(f, "poor"),
            Self::Bad => write!(f, "bad"),
        }
    }
}

/// The most recent completed probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencySample {
    pub sent_at: Instant,
    pub round_trip_ms: u64,
}

impl LatencySample {
    pub fn quality(&self) -> ConnectionQuality {
        ConnectionQuality::from_round_trip_ms(self.round_trip_ms)
    }
}

/// A probe waiting for its pong.
#[derive(Debug, Clone, Copy)]
struct Probe {
    timestamp: u64,
    sent_at: Instant,
}

/// Sends a probe every `interval` while running and turns matching pongs
/// into [`LatencySample`]s.
///
/// Probe timestamps are milliseconds since the monitor was created, so they
/// are monotonic and independent of the wall clock.
#[derive(Debug)]
pub struct LatencyMonitor {
    interval: Duration,
    epoch: Instant,
    timer: Timer,
    outstanding: Option<Probe>,
    latest: Option<LatencySample>,
}

impl LatencyMonitor {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            epoch: Instant::now(),
            timer: Timer::new(),
            outstanding: None,
            latest: None,
        }
    }

    /// Starts probing. The first probe is due one interval from now.
    pub fn start(&mut self) {
        self.outstanding = None;
        self.timer.schedule(self.interval);
        tracing::trace!(interval_ms = self.interval.as_millis() as u64, "latency probing started");
    }

    /// Stops probing and forgets any outstanding probe. The last sample is
    /// kept for display.
    pub fn stop(&mut self) {
        if self.timer.cancel() {
            tracing::trace!("latency probing stopped");
        }
        self.outstanding = None;
    }

    pub fn is_running(&self) -> bool {
        self.timer.is_armed()
    }

    /// Fires when the next probe is due. Pends forever while stopped.
    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    /// The probe timer fired: returns the timestamp to send in a `Ping`
    /// and schedules the next probe. `None` if the monitor is stopped.
    ///
    /// A previous probe that never got its pong is abandoned.
    pub fn on_probe_due(&mut self) -> Option<u64> {
        if !self.timer.is_armed() {
            return None;
        }
        let sent_at = Instant::now();
        let timestamp = sent_at.duration_since(self.epoch).as_millis() as u64;
        if let Some(missed) = self.outstanding.replace(Probe { timestamp, sent_at }) {
            tracing::trace!(timestamp = missed.timestamp, "probe went unanswered");
        }
        self.timer.schedule(self.interval);
        tracing::trace!(timestamp, "latency probe");
        Some(timestamp)
    }

    /// A pong arrived. Returns the new sample if it answers the outstanding
    /// probe; anything else is ignored.
    pub fn on_pong(&mut self, timestamp: u64) -> Option<LatencySample> {
        match self.outstanding {
            Some(probe) if probe.timestamp == timestamp => {
                self.outstanding = None;
                let round_trip_ms = probe.sent_at.elapsed().as_millis() as u64;
                let sample = LatencySample {
                    sent_at: probe.sent_at,
                    round_trip_ms,
                };
                self.latest = Some(sample);
                Some(sample)
            }
            _ => {
                tracing::trace!(timestamp, "ignoring unmatched pong");
                None
            }
        }
    }

    pub fn latest(&self) -> Option<LatencySample> {
        self.latest
    }

    pub fn quality(&self) -> Option<ConnectionQuality> {
        self.latest.map(|s| s.quality())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_thresholds() {
        use ConnectionQuality::*;
        assert_eq!(ConnectionQuality::from_round_trip_ms(0), Good);
        assert_eq!(ConnectionQuality::from_round_trip_ms(99), Good);
        assert_eq!(ConnectionQuality::from_round_trip_ms(100), Poor);
        assert_eq!(ConnectionQuality::from_round_trip_ms(299), Poor);
        assert_eq!(ConnectionQuality::from_round_trip_ms(300), Bad);
        assert_eq!(ConnectionQuality::from_round_trip_ms(5000), Bad);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_probe_one_interval_after_start() {
        let mut monitor = LatencyMonitor::new(Duration::from_secs(5));
        let started = Instant::now();
        monitor.start();
        monitor.timer().wait().await;
        assert_eq!(started.elapsed(), Duration::from_secs(5));
        assert!(monitor.on_probe_due().is_some());
        assert!(monitor.is_running(), "next probe is scheduled");
    }

    #[tokio::test(start_paused = true)]
    async fn test_matching_pong_produces_sample() {
        let mut monitor = LatencyMonitor::new(Duration::from_secs(5));
        monitor.start();
        monitor.timer().wait().await;
        let ts = monitor.on_probe_due().unwrap();

        tokio::time::advance(Duration::from_millis(150)).await;
        let sample = monitor.on_pong(ts).unwrap();
        assert_eq!(sample.round_trip_ms, 150);
        assert_eq!(sample.quality(), ConnectionQuality::Poor);
        assert_eq!(monitor.quality(), Some(ConnectionQuality::Poor));

        assert!(monitor.on_pong(ts).is_none(), "a pong only counts once");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmatched_pong_is_ignored() {
        let mut monitor = LatencyMonitor::new(Duration::from_secs(5));
        monitor.start();
        monitor.timer().wait().await;
        let ts = monitor.on_probe_due().unwrap();
        assert!(monitor.on_pong(ts + 1).is_none());
        assert!(monitor.latest().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_disarms_and_forgets_probe() {
        let mut monitor = LatencyMonitor::new(Duration::from_secs(5));
        monitor.start();
        monitor.timer().wait().await;
        let ts = monitor.on_probe_due().unwrap();
        monitor.stop();

        assert!(!monitor.is_running());
        assert!(monitor.on_probe_due().is_none());
        assert!(monitor.on_pong(ts).is_none());
    }
}
