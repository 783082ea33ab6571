// Net Status Monitor - Shared Models
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! # Shared Models
//!
//! Types shared by the bus layer, the monitor and the command-line front end:
//!
//! - **Status**: reachability, NetworkManager state codes, replies
//! - **Config**: persisted settings, including the managed-network policy
//! - **Error**: shared error types

pub mod config;
pub mod error;
pub mod status;

use std::fmt;

pub use config::AppConfig;
pub use error::{Error, Result};
pub use status::{NetworkStatus, NmState, StateReply, StatusSnapshot};

/// Configuration directory name (under XDG_CONFIG_HOME).
pub const CONFIG_DIR_NAME: &str = "net-status-monitor";

/// NetworkManager well-known bus name.
pub const NM_DBUS_SERVICE: &str = "org.freedesktop.NetworkManager";

/// NetworkManager object path.
pub const NM_DBUS_PATH: &str = "/org/freedesktop/NetworkManager";

/// NetworkManager main interface.
pub const NM_DBUS_INTERFACE: &str = "org.freedesktop.NetworkManager";

/// Method returning the daemon state as `u32`.
pub const NM_STATE_METHOD: &str = "state";

/// Which message bus a connection belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusKind {
    System,
    #[allow(dead_code)]
    Session,
}

impl BusKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Session => "session",
        }
    }
}

impl fmt::Display for BusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
