//! Timeout configuration for sona-link client operations.
//!
//! Centralizes every time bound the client applies: connection
//! establishment, request acknowledgements, subscription acknowledgements,
//! and the post-reconnect settle poll.

use std::time::Duration;

/// Timeout configuration for sona-link client operations.
///
/// # Examples
///
/// ```rust
/// use sona_link::SonaLinkTimeouts;
/// use std::time::Duration;
///
/// // Defaults (recommended for most cases)
/// let timeouts = SonaLinkTimeouts::default();
///
/// // Custom bounds
/// let timeouts = SonaLinkTimeouts::builder()
///     .connection_timeout(Duration::from_secs(10))
///     .request_timeout(Duration::from_secs(15))
///     .build();
///
/// // Aggressive bounds for local development
/// let timeouts = SonaLinkTimeouts::fast();
/// ```
#[derive(Debug, Clone)]
pub struct SonaLinkTimeouts {
    /// Timeout for one port-connection attempt (TCP + WebSocket handshake).
    /// Set to 0 to wait indefinitely. Default: 5 seconds.
    pub connection_timeout: Duration,

    /// Timeout for a request to be acknowledged (get-state, ping).
    /// Default: 5 seconds.
    pub request_timeout: Duration,

    /// Timeout for subscribe/unsubscribe acknowledgements.
    /// Default: 5 seconds.
    pub subscribe_timeout: Duration,

    /// Interval between `is_connected` polls while the transport settles
    /// after a reconnect, before state is re-fetched.
    /// Default: 100 milliseconds.
    pub recovery_poll_interval: Duration,
}

impl Default for SonaLinkTimeouts {
    fn default() -> Self {
        Self {
            connection_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(5),
            subscribe_timeout: Duration::from_secs(5),
            recovery_poll_interval: Duration::from_millis(100),
        }
    }
}

impl SonaLinkTimeouts {
    /// Create a new builder for custom timeout configuration.
    pub fn builder() -> SonaLinkTimeoutsBuilder {
        SonaLinkTimeoutsBuilder::new()
    }

    /// Timeouts optimized for fast local development and tests.
    pub fn fast() -> Self {
        Self {
            connection_timeout: Duration::from_secs(1),
            request_timeout: Duration::from_secs(2),
            subscribe_timeout: Duration::from_secs(2),
            recovery_poll_interval: Duration::from_millis(20),
        }
    }

    /// Timeouts for slow machines where the service can take a while to
    /// accept connections (e.g. right after boot).
    pub fn relaxed() -> Self {
        Self {
            connection_timeout: Duration::from_secs(15),
            request_timeout: Duration::from_secs(15),
            subscribe_timeout: Duration::from_secs(15),
            recovery_poll_interval: Duration::from_millis(250),
        }
    }

    /// Check if a duration represents "no timeout" (zero or absurdly large).
    pub fn is_no_timeout(duration: Duration) -> bool {
        duration.is_zero() || duration > Duration::from_secs(86400 * 365)
    }
}

/// Builder for custom [`SonaLinkTimeouts`] configurations.
#[derive(Debug, Clone)]
pub struct SonaLinkTimeoutsBuilder {
    timeouts: SonaLinkTimeouts,
}

impl SonaLinkTimeoutsBuilder {
    fn new() -> Self {
        Self {
            timeouts: SonaLinkTimeouts::default(),
        }
    }

    /// Set the per-port connection timeout. Zero disables the bound.
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.connection_timeout = timeout;
        self
    }

    /// Set the request acknowledgement timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.request_timeout = timeout;
        self
    }

    /// Set the subscribe/unsubscribe acknowledgement timeout.
    pub fn subscribe_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.subscribe_timeout = timeout;
        self
    }

    /// Set the post-reconnect settle poll interval.
    pub fn recovery_poll_interval(mut self, interval: Duration) -> Self {
        self.timeouts.recovery_poll_interval = interval;
        self
    }

    /// Build the timeout configuration.
    pub fn build(self) -> SonaLinkTimeouts {
        self.timeouts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timeouts() {
        let timeouts = SonaLinkTimeouts::default();
        assert_eq!(timeouts.connection_timeout, Duration::from_secs(5));
        assert_eq!(timeouts.request_timeout, Duration::from_secs(5));
        assert_eq!(timeouts.subscribe_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_builder() {
        let timeouts = SonaLinkTimeouts::builder()
            .connection_timeout(Duration::from_secs(10))
            .request_timeout(Duration::from_secs(20))
            .build();

        assert_eq!(timeouts.connection_timeout, Duration::from_secs(10));
        assert_eq!(timeouts.request_timeout, Duration::from_secs(20));
        // Untouched fields keep their defaults.
        assert_eq!(timeouts.subscribe_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_fast_preset() {
        let timeouts = SonaLinkTimeouts::fast();
        assert!(timeouts.connection_timeout <= Duration::from_secs(2));
        assert!(timeouts.request_timeout <= Duration::from_secs(2));
    }

    #[test]
    fn test_is_no_timeout() {
        assert!(SonaLinkTimeouts::is_no_timeout(Duration::ZERO));
        assert!(!SonaLinkTimeouts::is_no_timeout(Duration::from_secs(5)));
    }
}
