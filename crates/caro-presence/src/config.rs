use serde::{Deserialize, Serialize};

/// Timeouts for a connection's life.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceConfig {
    /// Seconds a new connection has to send its handshake before it is
    /// dropped.
    pub handshake_timeout_secs: u64,

    /// Seconds without any inbound frame (heartbeats included) before the
    /// connection is considered dead. `0` disables the check.
    pub idle_timeout_secs: u64,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            handshake_timeout_secs: 10,
            idle_timeout_secs: 60,
        }
    }
}
