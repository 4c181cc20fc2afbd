//! The outbound message queue: actions issued while the link is down.
//!
//! Two limits keep it honest:
//!
//! - **capacity**: a full queue evicts its oldest entry to make room
//! - **ttl**: anything that has waited `ttl` or longer by the time we flush
//!   is dropped rather than replayed into a game that has moved on

use std::collections::VecDeque;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;

/// One action waiting for a connection.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedMessage {
    pub kind: String,
    pub payload: Value,
    pub enqueued_at: Instant,
}

impl QueuedMessage {
    /// `true` once the message has waited `ttl` or longer.
    pub fn is_stale(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.enqueued_at) >= ttl
    }
}

/// What a [`OutboundQueue::flush`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub sent: usize,
    pub expired: usize,
    /// Left in the queue because the sender failed partway.
    pub remaining: usize,
}

/// Bounded FIFO of [`QueuedMessage`]s.
#[derive(Debug)]
pub struct OutboundQueue {
    messages: VecDeque<QueuedMessage>,
    capacity: usize,
    ttl: Duration,
}

impl OutboundQueue {
    /// Creates an empty queue. A capacity of 0 is treated as 1.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            messages: VecDeque::with_capacity(capacity),
            capacity,
            ttl,
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Appends an action. Never fails: a full queue evicts its oldest
    /// entry, which is returned.
    pub fn enqueue(
        &mut self,
        kind: impl Into<String>,
        payload: Value,
        now: Instant,
    ) -> Option<QueuedMessage> {
        let evicted = if self.messages.len() >= self.capacity {
            self.messages.pop_front()
        } else {
            None
        };
        if let Some(old) = &evicted {
            tracing::warn!(
                kind = %old.kind,
                capacity = self.capacity,
                "outbound queue full, evicting oldest action"
            );
        }

        self.messages.push_back(QueuedMessage {
            kind: kind.into(),
            payload,
            enqueued_at: now,
        });
        evicted
    }

    /// Sends everything still fresh, oldest first.
    ///
    /// Stale entries are dropped silently. If `send` fails, the message it
    /// failed on and everything behind it stay queued in order and the
    /// flush stops.
    pub fn flush<E>(
        &mut self,
        now: Instant,
        mut send: impl FnMut(&str, &Value) -> Result<(), E>,
    ) -> FlushReport {
        let mut report = FlushReport::default();

        while let Some(message) = self.messages.pop_front() {
            if message.is_stale(now, self.ttl) {
                report.expired += 1;
                continue;
            }
            if send(&message.kind, &message.payload).is_err() {
                self.messages.push_front(message);
                break;
            }
            report.sent += 1;
        }

        report.remaining = self.messages.len();
        report
    }

    /// Drops everything. Returns how many messages were discarded.
    pub fn clear(&mut self) -> usize {
        let dropped = self.messages.len();
        self.messages.clear();
        dropped
    }

    /// The queued messages, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &QueuedMessage> {
        self.messages.iter()
    }
}
