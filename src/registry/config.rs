//! Registry configuration

use std::time::Duration;

/// Configuration for the client registry
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Upper bound on a single client write during fan-out
    ///
    /// A client that cannot accept a frame within this time is treated as
    /// failed and pruned, so one stuck socket delays a broadcast by at most
    /// this much.
    pub write_timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            write_timeout: Duration::from_secs(5),
        }
    }
}

impl RegistryConfig {
    /// Set the per-client write timeout
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        assert_eq!(RegistryConfig::default().write_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_builder_write_timeout() {
        let config = RegistryConfig::default().write_timeout(Duration::from_millis(250));
        assert_eq!(config.write_timeout, Duration::from_millis(250));
    }
}
