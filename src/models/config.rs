// Net Status Monitor - Application Configuration
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Application configuration model.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Honour the observed NetworkManager state.
    ///
    /// When disabled the monitor always reports the network as reachable.
    #[serde(default = "default_true")]
    pub managed_network: bool,

    /// Count site/local-only connectivity as connected.
    #[serde(default)]
    pub accept_limited_connectivity: bool,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Bus liveness check interval in seconds.
    #[serde(default = "default_bus_check_interval")]
    pub bus_check_interval_secs: u32,

    /// Consecutive failed bus pings before the connection is dropped.
    #[serde(default = "default_bus_failure_threshold")]
    pub bus_failure_threshold: u32,
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_bus_check_interval() -> u32 {
    10
}

fn default_bus_failure_threshold() -> u32 {
    3
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            managed_network: true,
            accept_limited_connectivity: false,
            log_level: default_log_level(),
            bus_check_interval_secs: default_bus_check_interval(),
            bus_failure_threshold: default_bus_failure_threshold(),
        }
    }
}

impl AppConfig {
    /// Load configuration from TOML file.
    pub fn load_from_file(path: &std::path::Path) -> Result<Self, super::Error> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to TOML file with restrictive permissions (0600).
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), super::Error> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600));
        }
        Ok(())
    }

    /// Bus liveness check interval, never shorter than one second.
    pub fn bus_check_interval(&self) -> Duration {
        Duration::from_secs(self.bus_check_interval_secs.max(1) as u64)
    }

    /// Failure threshold, never zero.
    pub fn bus_failure_threshold(&self) -> u32 {
        self.bus_failure_threshold.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert!(config.managed_network);
        assert!(!config.accept_limited_connectivity);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.bus_check_interval(), Duration::from_secs(10));
        assert_eq!(config.bus_failure_threshold(), 3);
    }

    #[test]
    fn test_missing_keys_use_defaults() {
        let config: AppConfig = toml::from_str("managed_network = false\n").unwrap();
        assert!(!config.managed_network);
        assert_eq!(config.bus_check_interval_secs, 10);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_zero_values_are_clamped() {
        let config = AppConfig {
            bus_check_interval_secs: 0,
            bus_failure_threshold: 0,
            ..AppConfig::default()
        };
        assert_eq!(config.bus_check_interval(), Duration::from_secs(1));
        assert_eq!(config.bus_failure_threshold(), 1);
    }
}
