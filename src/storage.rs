// Net Status Monitor - Settings Storage
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Persisted settings for the monitor.
//!
//! The managed-network flag is read on every status query, so changes made
//! through the store take effect immediately.
//!
//! This module uses RwLock for access. Lock poisoning is handled gracefully
//! by recovering the inner value.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{error, info, warn};

use crate::models::{AppConfig, Result, CONFIG_DIR_NAME};

/// Source of the network policy flags.
pub trait ManagedNetworkPolicy {
    /// Whether the observed network status is honoured.
    fn managed_network(&self) -> bool;

    /// Whether limited connectivity counts as connected.
    fn accept_limited_connectivity(&self) -> bool {
        false
    }
}

/// Settings backed by a TOML file.
#[derive(Debug)]
pub struct SettingsStore {
    /// Settings file path.
    settings_file: PathBuf,
    /// Application settings.
    settings: RwLock<AppConfig>,
}

impl SettingsStore {
    /// Create a store using the default config directory.
    pub fn new() -> Self {
        Self::with_config_dir(default_config_dir())
    }

    /// Create a store in a specific config directory.
    pub fn with_config_dir(config_dir: PathBuf) -> Self {
        if let Err(e) = fs::create_dir_all(&config_dir) {
            error!("Failed to create config directory: {}", e);
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&config_dir, fs::Permissions::from_mode(0o700));
        }
        Self::with_settings_file(config_dir.join("settings.toml"))
    }

    /// Create a store for an explicit settings file.
    pub fn with_settings_file(settings_file: PathBuf) -> Self {
        let store = Self {
            settings_file,
            settings: RwLock::new(AppConfig::default()),
        };
        store.reload();
        store
    }

    /// Read the configuration at `path` (or the default location) without
    /// creating a store. Missing or unreadable files yield `None`.
    pub fn load_config(path: Option<&Path>) -> Option<AppConfig> {
        let settings_file = match path {
            Some(path) => path.to_path_buf(),
            None => default_config_dir().join("settings.toml"),
        };

        if settings_file.exists() {
            AppConfig::load_from_file(&settings_file).ok()
        } else {
            None
        }
    }

    /// Re-read settings from disk. Keeps the current values on failure.
    pub fn reload(&self) {
        if !self.settings_file.exists() {
            return;
        }

        match AppConfig::load_from_file(&self.settings_file) {
            Ok(config) => {
                self.write(|s| *s = config);
                info!("Loaded settings from {:?}", self.settings_file);
            }
            Err(e) => {
                error!("Failed to load settings: {}", e);
            }
        }
    }

    /// Get the current settings.
    pub fn settings(&self) -> AppConfig {
        self.read(|s| s.clone())
    }

    /// Replace the settings and save them.
    #[allow(dead_code)]
    pub fn update_settings(&self, settings: AppConfig) -> Result<()> {
        self.write(|s| *s = settings);
        self.save()
    }

    /// Enable or disable the managed-network policy and save.
    #[allow(dead_code)]
    pub fn set_managed_network(&self, managed: bool) -> Result<()> {
        self.write(|s| s.managed_network = managed);
        self.save()
    }

    /// Enable or disable the managed-network policy for this session only.
    pub fn override_managed_network(&self, managed: bool) {
        self.write(|s| s.managed_network = managed);
    }

    /// Save settings to disk.
    pub fn save(&self) -> Result<()> {
        let settings = self.settings();
        settings.save_to_file(&self.settings_file)
    }

    /// Settings file path.
    #[allow(dead_code)]
    pub fn settings_file(&self) -> &Path {
        &self.settings_file
    }

    fn read<R>(&self, reader: impl FnOnce(&AppConfig) -> R) -> R {
        match self.settings.read() {
            Ok(guard) => reader(&*guard),
            Err(poisoned) => {
                warn!("RwLock poisoned reading settings, recovering");
                reader(&*poisoned.into_inner())
            }
        }
    }

    fn write(&self, writer: impl FnOnce(&mut AppConfig)) {
        match self.settings.write() {
            Ok(mut guard) => writer(&mut *guard),
            Err(poisoned) => {
                warn!("RwLock poisoned writing settings, recovering");
                writer(&mut *poisoned.into_inner())
            }
        }
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ManagedNetworkPolicy for SettingsStore {
    fn managed_network(&self) -> bool {
        self.read(|s| s.managed_network)
    }

    fn accept_limited_connectivity(&self) -> bool {
        self.read(|s| s.accept_limited_connectivity)
    }
}

fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::with_config_dir(dir.path().to_path_buf());
        assert_eq!(store.settings(), AppConfig::default());
        assert!(store.managed_network());
        assert!(!store.settings_file().exists());
    }

    #[test]
    fn test_set_managed_network_persists() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::with_config_dir(dir.path().to_path_buf());
        store.set_managed_network(false).unwrap();
        assert!(!store.managed_network());

        let reopened = SettingsStore::with_config_dir(dir.path().to_path_buf());
        assert!(!reopened.managed_network());
    }

    #[test]
    fn test_override_is_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::with_config_dir(dir.path().to_path_buf());
        store.override_managed_network(false);
        assert!(!store.managed_network());
        assert!(!store.settings_file().exists());
    }

    #[test]
    fn test_reload_picks_up_external_edits() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("custom.toml");
        let store = SettingsStore::with_settings_file(file.clone());
        assert!(!store.accept_limited_connectivity());

        fs::write(&file, "accept_limited_connectivity = true\n").unwrap();
        store.reload();
        assert!(store.accept_limited_connectivity());
        assert!(store.managed_network());
    }

    #[test]
    fn test_invalid_file_keeps_current_values() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("settings.toml");
        fs::write(&file, "managed_network = \"maybe\"\n").unwrap();

        let store = SettingsStore::with_settings_file(file.clone());
        assert!(store.managed_network());
        assert!(SettingsStore::load_config(Some(&file)).is_none());
    }

    #[test]
    fn test_load_config_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("settings.toml");
        fs::write(&file, "log_level = \"debug\"\n").unwrap();

        let config = SettingsStore::load_config(Some(&file)).unwrap();
        assert_eq!(config.log_level, "debug");
    }
}
