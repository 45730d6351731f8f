use std::time::Duration;

/// Tunables for a server instance
///
/// The binary fills this from command-line arguments; tests build it
/// directly with shortened durations.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the TCP listener binds to
    pub addr: String,
    /// Period of the per-game lifecycle tick
    pub tick_interval: Duration,
    /// How long a disconnected player may stay away before resigning
    pub disconnect_grace: Duration,
    /// How long a created game waits for its first player
    pub join_timeout: Duration,
    /// Age after which the sweeper deletes a game regardless of state
    pub stale_after: Duration,
    pub sweep_interval: Duration,
    /// Maximum number of attached game streams
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8080".to_string(),
            tick_interval: Duration::from_secs(1),
            disconnect_grace: Duration::from_secs(shared::DISCONNECT_GRACE_SECS),
            join_timeout: Duration::from_secs(600),
            stale_after: Duration::from_secs(24 * 60 * 60),
            sweep_interval: Duration::from_secs(60 * 60),
            max_connections: 256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.addr, "127.0.0.1:8080");
        assert_eq!(config.tick_interval, Duration::from_secs(1));
        assert_eq!(config.disconnect_grace, Duration::from_secs(60));
        assert_eq!(config.join_timeout, Duration::from_secs(600));
        assert!(config.sweep_interval < config.stale_after);
    }
}
