//! Engine configuration

use std::time::Duration;

use parley_protocol::{Credentials, Implementation, DEFAULT_PROTOCOL_VERSION};

/// Default per-request deadline
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Delay before the first reconnect attempt; doubles on each further attempt
pub const DEFAULT_RECONNECT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Reconnect attempts before giving up
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Capacity of the protocol event broadcast channel
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Automatic reconnection after an unexpected close
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub enabled: bool,
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            base_delay: DEFAULT_RECONNECT_BASE_DELAY,
        }
    }
}

impl ReconnectPolicy {
    /// Backoff before attempt `attempt` (1-indexed): `base * 2^(attempt-1)`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay.saturating_mul(1u32 << exponent)
    }
}

/// Protocol engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Deadline applied to requests that do not pass their own
    pub request_timeout: Duration,
    pub reconnect: ReconnectPolicy,
    /// Protocol revision sent in `initialize`
    pub protocol_version: String,
    /// `clientInfo` sent in `initialize`
    pub client_info: Implementation,
    /// When set, `authenticate` runs after `initialize` and must succeed
    pub credentials: Option<Credentials>,
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            reconnect: ReconnectPolicy::default(),
            protocol_version: DEFAULT_PROTOCOL_VERSION.into(),
            client_info: Implementation::new("parley", env!("CARGO_PKG_VERSION")),
            credentials: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}
