//! Reconnect bookkeeping: attempt counting and exponential backoff.

use std::time::Duration;

use crate::models::ConnectionOptions;

/// Tracks reconnect attempts and the current backoff delay.
///
/// The delay starts at the configured base, is multiplied by the backoff
/// factor after each failed full cycle, and saturates at the configured
/// maximum. Reset to initial values on any successful connection and on a
/// new manual connect.
#[derive(Debug, Clone)]
pub(crate) struct ReconnectState {
    base_delay_ms: u64,
    factor: f64,
    max_delay_ms: u64,
    max_attempts: Option<u32>,
    attempts: u32,
    delay_ms: u64,
}

impl ReconnectState {
    pub fn from_options(options: &ConnectionOptions) -> Self {
        Self {
            base_delay_ms: options.reconnect_delay_ms,
            factor: options.reconnect_backoff_factor,
            max_delay_ms: options.max_reconnect_delay_ms,
            max_attempts: options.max_reconnect_attempts,
            attempts: 0,
            delay_ms: options.reconnect_delay_ms,
        }
    }

    /// Forget all progress: next failure starts over at the base delay.
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.delay_ms = self.base_delay_ms;
    }

    /// Record one failed full cycle.
    ///
    /// Returns the delay to wait before the next cycle, or `None` once the
    /// attempt limit is exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if let Some(max) = self.max_attempts {
            if self.attempts >= max {
                return None;
            }
        }
        self.attempts += 1;
        let current = self.delay_ms;
        let scaled = (self.delay_ms as f64 * self.factor) as u64;
        self.delay_ms = scaled.min(self.max_delay_ms);
        Some(Duration::from_millis(current))
    }

    /// Number of failed cycles recorded since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}
