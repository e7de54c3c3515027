//! Client configuration: deadlines for each declaration stage, and the
//! management API settings used by [`crate::ManagementClient`].

use std::time::Duration;

/// Deadlines and connection settings for [`crate::TopologyClient`].
#[derive(Debug, Clone)]
pub struct TopologyConfig {
    /// Deadline for dialing the broker and for opening the channel.
    pub connect_timeout: Duration,
    /// Deadline for the declare call itself.
    pub bind_timeout: Duration,
    /// Upper bound on releasing the channel and connection.
    pub close_timeout: Duration,
    /// Connection name reported to the broker (visible in its UI).
    pub connection_name: String,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            bind_timeout: Duration::from_secs(10),
            close_timeout: Duration::from_secs(2),
            connection_name: "rmq-topology".to_string(),
        }
    }
}

/// Management HTTP API settings. Used for introspection only.
#[derive(Debug, Clone)]
pub struct ManagementConfig {
    /// `http` or `https`.
    pub scheme: String,
    pub request_timeout: Duration,
}

impl Default for ManagementConfig {
    fn default() -> Self {
        Self {
            scheme: "http".to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topology_config_defaults() {
        let config = TopologyConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.bind_timeout, Duration::from_secs(10));
        assert_eq!(config.close_timeout, Duration::from_secs(2));
        assert_eq!(config.connection_name, "rmq-topology");
    }

    #[test]
    fn management_config_defaults() {
        let config = ManagementConfig::default();
        assert_eq!(config.scheme, "http");
        assert_eq!(config.request_timeout, Duration::from_secs(10));
    }
}
