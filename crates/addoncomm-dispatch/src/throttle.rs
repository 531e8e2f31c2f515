use std::time::Duration;

use crate::config::TransportConfig;
use crate::queue::Priority;

/// Token bucket measured in bytes.
///
/// The bucket starts full, refills continuously at `rate` bytes per second
/// and never holds more than `capacity`. Spending may drive the balance
/// below zero, in which case later refills pay the debt off first.
#[derive(Debug, Clone)]
pub struct Throttle {
    available: f64,
    capacity: f64,
    rate: f64,
    bulk_multiplier: f64,
    last_update: Duration,
}

impl Throttle {
    /// Create a full bucket.
    pub fn new(rate: f64, capacity: f64, bulk_multiplier: f64, now: Duration) -> Self {
        Self {
            available: capacity,
            capacity,
            rate,
            bulk_multiplier,
            last_update: now,
        }
    }

    /// Create a full bucket from transport settings.
    pub fn from_config(config: &TransportConfig, now: Duration) -> Self {
        Self::new(config.rate, config.burst_capacity, config.bulk_multiplier, now)
    }

    /// Refill for the time elapsed since the last update and return the
    /// balance.
    pub fn available(&mut self, now: Duration) -> f64 {
        let elapsed = now.saturating_sub(self.last_update);
        self.last_update = self.last_update.max(now);
        self.available = (self.available + elapsed.as_secs_f64() * self.rate).min(self.capacity);
        self.available
    }

    /// Balance as of the last update, without refilling.
    pub fn balance(&self) -> f64 {
        self.available
    }

    /// Spend `amount` bytes of budget. The balance may go negative.
    pub fn consume(&mut self, amount: f64) {
        self.available -= amount;
    }

    /// Budget charged for sending `len` bytes at `priority`.
    pub fn cost(&self, priority: Priority, len: usize) -> f64 {
        let len = len as f64;
        match priority {
            Priority::Bulk => len * self.bulk_multiplier,
            Priority::Alert | Priority::Normal => len,
        }
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }
}
