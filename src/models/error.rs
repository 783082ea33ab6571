// Net Status Monitor - Error Types
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Shared error types for the network status monitor.

use thiserror::Error;

use super::BusKind;

/// Result type alias for monitor operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for monitor operations.
#[derive(Debug, Error)]
pub enum Error {
    // ========================================
    // D-Bus Errors
    // ========================================
    #[error("D-Bus error: {0}")]
    Dbus(String),

    #[error("NetworkManager D-Bus error: {0}")]
    NetworkManagerDbus(String),

    #[error("D-Bus connection failed: {0}")]
    DbusConnectionFailed(String),

    #[error("No {0} bus connection available")]
    BusUnavailable(BusKind),

    #[error("Match rule registration failed: {0}")]
    MatchRuleFailed(String),

    // ========================================
    // Storage Errors
    // ========================================
    #[error("Failed to write configuration: {0}")]
    ConfigWriteFailed(String),

    #[error("Failed to parse configuration: {0}")]
    ConfigParseFailed(String),

    // ========================================
    // System Errors
    // ========================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Check if this error means the bus itself is gone or unreachable.
    #[allow(dead_code)]
    pub fn is_bus_unavailable(&self) -> bool {
        matches!(self, Self::BusUnavailable(_) | Self::DbusConnectionFailed(_))
    }
}

// Convert from zbus errors
impl From<zbus::Error> for Error {
    fn from(err: zbus::Error) -> Self {
        match err {
            zbus::Error::MethodError(name, detail, _) => Error::NetworkManagerDbus(match detail {
                Some(detail) => format!("{}: {}", name, detail),
                None => name.to_string(),
            }),
            other => Error::Dbus(other.to_string()),
        }
    }
}

// Convert from toml parse errors
impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::ConfigParseFailed(err.to_string())
    }
}

// Convert from toml serialize errors
impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::ConfigWriteFailed(err.to_string())
    }
}

// Convert from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Other(err.to_string())
    }
}
