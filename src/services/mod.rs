// Net Status Monitor - Services
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Event-driven services.
//!
//! - Bus provider: owns bus connections and keeps them alive
//! - Signal filter: dispatch table for NetworkManager signals
//! - Net monitor: tracks network reachability

pub mod bus_provider;
pub mod net_monitor;
pub mod signal_filter;

#[cfg(test)]
pub(crate) mod testing;

pub use bus_provider::DbusProvider;
pub use net_monitor::NetMonitor;
