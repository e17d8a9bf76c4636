// src/publish/mod.rs

//! Live status distribution.
//!
//! - [`publisher`] keeps the latest snapshot per run in a `watch` channel and
//!   hands out subscriptions.
//! - [`subscription`] is the per-observer state machine: it reads the
//!   authoritative record from the store, drops duplicate frames and ends
//!   after a terminal status or when its error budget runs out.

use std::time::Duration;

pub mod publisher;
pub mod subscription;

pub use publisher::StatusPublisher;
pub use subscription::{READ_FAILED_MESSAGE, Subscription, SubscriptionEvent};

/// Pacing of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSettings {
    /// Upper bound on the wait between two reads when no change is pushed.
    pub poll_interval: Duration,
    /// Wait after a failed read before trying again.
    pub error_backoff: Duration,
    /// Consecutive failed reads after which the subscription ends.
    pub max_errors: u32,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            error_backoff: Duration::from_millis(1000),
            max_errors: 5,
        }
    }
}
