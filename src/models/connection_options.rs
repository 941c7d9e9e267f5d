use serde::{Deserialize, Serialize};

use super::topic::Topic;

/// Fixed host the service listens on.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Ordered port candidates, tried strictly in sequence per connect cycle.
pub const DEFAULT_PORTS: [u16; 3] = [50190, 50191, 50192];

/// Connection-level options for the client.
///
/// Controls endpoint discovery, reconnection behavior, and the topics the
/// client subscribes to on its own.
///
/// # Example
///
/// ```rust
/// use sona_link::{ConnectionOptions, Topic};
///
/// let options = ConnectionOptions::new()
///     .with_auto_reconnect(true)
///     .with_max_reconnect_attempts(Some(10))
///     .with_auto_subscribe_topics(vec![Topic::Devices, Topic::InCall]);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionOptions {
    /// Host the service is reachable on.
    /// Default: `127.0.0.1`.
    #[serde(default = "default_host")]
    pub host: String,

    /// Ordered port candidates, tried in sequence per connect cycle.
    /// Default: `[50190, 50191, 50192]`.
    #[serde(default = "default_ports")]
    pub ports: Vec<u16>,

    /// Reconnect automatically when the connection is lost or a connect
    /// cycle fails.
    /// Default: `true`.
    #[serde(default = "default_auto_reconnect")]
    pub auto_reconnect: bool,

    /// Initial delay in milliseconds before the first reconnect cycle.
    /// Default: 1000.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Multiplier applied to the delay after each failed full cycle.
    /// Default: 1.5.
    #[serde(default = "default_reconnect_backoff_factor")]
    pub reconnect_backoff_factor: f64,

    /// Upper bound on the reconnect delay in milliseconds.
    /// Default: 30000.
    #[serde(default = "default_max_reconnect_delay_ms")]
    pub max_reconnect_delay_ms: u64,

    /// Maximum number of full reconnect cycles before giving up.
    /// Default: `None` (unbounded). A later manual connect resets the
    /// counter and starts over.
    #[serde(default)]
    pub max_reconnect_attempts: Option<u32>,

    /// Subscribe to [`auto_subscribe_topics`](Self::auto_subscribe_topics)
    /// after the first successful connect.
    /// Default: `true`.
    #[serde(default = "default_auto_subscribe")]
    pub auto_subscribe: bool,

    /// Topics subscribed automatically, and the fallback set used by the
    /// post-reconnect recovery sequence when nothing was confirmed before
    /// the connection dropped.
    /// Default: all four topics.
    #[serde(default = "default_auto_subscribe_topics")]
    pub auto_subscribe_topics: Vec<Topic>,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_ports() -> Vec<u16> {
    DEFAULT_PORTS.to_vec()
}

fn default_auto_reconnect() -> bool {
    true
}

fn default_reconnect_delay_ms() -> u64 {
    1000
}

fn default_reconnect_backoff_factor() -> f64 {
    1.5
}

fn default_max_reconnect_delay_ms() -> u64 {
    30000
}

fn default_auto_subscribe() -> bool {
    true
}

fn default_auto_subscribe_topics() -> Vec<Topic> {
    Topic::ALL.to_vec()
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            host: default_host(),
            ports: default_ports(),
            auto_reconnect: true,
            reconnect_delay_ms: 1000,
            reconnect_backoff_factor: 1.5,
            max_reconnect_delay_ms: 30000,
            max_reconnect_attempts: None,
            auto_subscribe: true,
            auto_subscribe_topics: default_auto_subscribe_topics(),
        }
    }
}

impl ConnectionOptions {
    /// Create new connection options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the service host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Override the ordered port candidate list.
    pub fn with_ports(mut self, ports: Vec<u16>) -> Self {
        self.ports = ports;
        self
    }

    /// Set whether to automatically reconnect on connection loss.
    pub fn with_auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    /// Set the initial reconnect delay (in milliseconds).
    pub fn with_reconnect_delay_ms(mut self, delay_ms: u64) -> Self {
        self.reconnect_delay_ms = delay_ms;
        self
    }

    /// Set the backoff multiplier applied after each failed cycle.
    pub fn with_reconnect_backoff_factor(mut self, factor: f64) -> Self {
        self.reconnect_backoff_factor = factor;
        self
    }

    /// Set the maximum reconnect delay (in milliseconds).
    pub fn with_max_reconnect_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_reconnect_delay_ms = max_delay_ms;
        self
    }

    /// Set the maximum number of reconnect cycles.
    /// Pass `None` for unbounded retries.
    pub fn with_max_reconnect_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_reconnect_attempts = max_attempts;
        self
    }

    /// Set whether to subscribe automatically after the first connect.
    pub fn with_auto_subscribe(mut self, enabled: bool) -> Self {
        self.auto_subscribe = enabled;
        self
    }

    /// Set the auto-subscribe (and recovery fallback) topic list.
    pub fn with_auto_subscribe_topics(mut self, topics: Vec<Topic>) -> Self {
        self.auto_subscribe_topics = topics;
        self
    }
}
