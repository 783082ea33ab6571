// Net Status Monitor - Status Types
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Network status and NetworkManager state codes.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Last known reachability as observed on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NetworkStatus {
    /// Network reachable. Optimistic default until a reply says otherwise.
    #[default]
    Up,
    /// Network unreachable.
    Down,
}

impl NetworkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

/// NetworkManager daemon state.
///
/// Older daemons (0.6/0.7) report small sequential codes, current ones
/// report multiples of ten. The two ranges do not overlap apart from `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NmState {
    Unknown,
    Asleep,
    Disconnected,
    Disconnecting,
    Connecting,
    /// Only local network access.
    ConnectedLocal,
    /// Site-wide access but no route to the internet.
    ConnectedSite,
    /// Full connectivity.
    Connected,
}

impl NmState {
    /// Classify a raw state code from either API generation.
    pub fn from_code(code: u32) -> Self {
        match code {
            // Legacy API
            1 => Self::Asleep,
            2 => Self::Connecting,
            3 => Self::Connected,
            4 => Self::Disconnected,
            // Current API
            10 => Self::Asleep,
            20 => Self::Disconnected,
            30 => Self::Disconnecting,
            40 => Self::Connecting,
            50 => Self::ConnectedLocal,
            60 => Self::ConnectedSite,
            70 => Self::Connected,
            _ => Self::Unknown,
        }
    }

    /// Map to reachability.
    ///
    /// Limited connectivity only counts when `accept_limited` is set.
    pub fn network_status(&self, accept_limited: bool) -> NetworkStatus {
        match self {
            Self::Connected => NetworkStatus::Up,
            Self::ConnectedLocal | Self::ConnectedSite if accept_limited => NetworkStatus::Up,
            _ => NetworkStatus::Down,
        }
    }
}

/// Outcome of a `state` request as delivered by the bus layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateReply {
    /// Method return carrying a `u32` state code.
    State(u32),
    /// Method return whose body is not a single `u32`.
    Malformed(String),
    /// Error reply or transport failure.
    Failed(String),
}

/// Point-in-time view of the monitor, for display and JSON output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Effective status after the managed-network policy.
    pub online: bool,
    /// Status as last observed from NetworkManager.
    pub observed: NetworkStatus,
    /// Whether the managed-network policy is enabled.
    pub managed: bool,
    /// Whether the monitor is attached to the system bus.
    pub attached: bool,
    /// When the last reply was applied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_checked: Option<DateTime<Local>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_up() {
        assert_eq!(NetworkStatus::default(), NetworkStatus::Up);
    }

    #[test]
    fn test_legacy_codes() {
        assert_eq!(NmState::from_code(3), NmState::Connected);
        assert_eq!(NmState::from_code(2), NmState::Connecting);
        assert_eq!(NmState::from_code(4), NmState::Disconnected);
        assert_eq!(NmState::from_code(1), NmState::Asleep);
    }

    #[test]
    fn test_current_codes() {
        assert_eq!(NmState::from_code(70), NmState::Connected);
        assert_eq!(NmState::from_code(60), NmState::ConnectedSite);
        assert_eq!(NmState::from_code(20), NmState::Disconnected);
        assert_eq!(NmState::from_code(0), NmState::Unknown);
        assert_eq!(NmState::from_code(9999), NmState::Unknown);
    }

    #[test]
    fn test_only_connected_is_up_by_default() {
        assert_eq!(NmState::from_code(70).network_status(false), NetworkStatus::Up);
        assert_eq!(NmState::from_code(3).network_status(false), NetworkStatus::Up);
        for code in [0, 1, 2, 4, 10, 20, 30, 40, 50, 60] {
            assert_eq!(
                NmState::from_code(code).network_status(false),
                NetworkStatus::Down,
                "code {}",
                code
            );
        }
    }

    #[test]
    fn test_limited_connectivity_policy() {
        assert_eq!(NmState::ConnectedSite.network_status(true), NetworkStatus::Up);
        assert_eq!(NmState::ConnectedLocal.network_status(true), NetworkStatus::Up);
        assert_eq!(NmState::Connecting.network_status(true), NetworkStatus::Down);
    }

    #[test]
    fn test_snapshot_json() {
        let snapshot = StatusSnapshot {
            online: false,
            observed: NetworkStatus::Down,
            managed: true,
            attached: true,
            last_checked: None,
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        assert_eq!(
            json,
            r#"{"online":false,"observed":"down","managed":true,"attached":true}"#
        );
    }
}
