// Net Status Monitor - Bus Connection Provider
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Owner of the message bus connections.
//!
//! The provider hands out borrowed handles to its connections and announces
//! when a connection appears or goes away. Consumers never own a connection
//! and must stop using their handle once `Disconnected` is announced.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use zbus::Connection;

use crate::dbus_client::{DbusNetworkManager, NetworkManagerBus};
use crate::models::{BusKind, Error, Result};

/// Event channel depth. Slow receivers resync on lag.
const EVENT_CAPACITY: usize = 16;

/// Connection lifecycle announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusEvent {
    Connected(BusKind),
    Disconnected(BusKind),
}

/// Source of bus connections and their lifecycle events.
pub trait BusConnectionProvider {
    /// Current connection for `kind`, if one is established.
    fn connection(&self, kind: BusKind) -> Option<Rc<dyn NetworkManagerBus>>;

    /// Subscribe to connect/disconnect announcements.
    fn subscribe(&self) -> broadcast::Receiver<BusEvent>;
}

/// A held connection and the handle lent out for it.
///
/// The handle is created once per connection. Consumers compare handles by
/// identity to notice a replaced connection.
struct HeldConnection {
    connection: Connection,
    handle: Rc<dyn NetworkManagerBus>,
}

impl HeldConnection {
    fn new(connection: Connection) -> Self {
        let handle: Rc<dyn NetworkManagerBus> =
            Rc::new(DbusNetworkManager::new(connection.clone()));
        Self { connection, handle }
    }
}

/// zbus-backed provider.
pub struct DbusProvider {
    connections: RefCell<HashMap<BusKind, HeldConnection>>,
    events: broadcast::Sender<BusEvent>,
}

impl DbusProvider {
    /// Create a provider with no connections.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            connections: RefCell::new(HashMap::new()),
            events,
        }
    }

    /// Open a connection to `kind` and announce it.
    pub async fn connect(&self, kind: BusKind) -> Result<()> {
        let result = match kind {
            BusKind::System => Connection::system().await,
            BusKind::Session => Connection::session().await,
        };

        match result {
            Ok(conn) => {
                info!("Connected to {} D-Bus", kind);
                self.connections
                    .borrow_mut()
                    .insert(kind, HeldConnection::new(conn));
                let _ = self.events.send(BusEvent::Connected(kind));
                Ok(())
            }
            Err(e) => {
                warn!("Failed to connect to {} D-Bus: {}", kind, e);
                Err(Error::DbusConnectionFailed(e.to_string()))
            }
        }
    }

    /// Drop the connection to `kind`, announcing it if one was held.
    pub fn disconnect(&self, kind: BusKind) -> bool {
        let removed = self.connections.borrow_mut().remove(&kind).is_some();
        if removed {
            info!("Disconnected from {} D-Bus", kind);
            let _ = self.events.send(BusEvent::Disconnected(kind));
        }
        removed
    }

    /// Check if a connection to `kind` is held.
    pub fn is_connected(&self, kind: BusKind) -> bool {
        self.connections.borrow().contains_key(&kind)
    }

    /// Ping the bus daemon over the connection to `kind`.
    pub async fn ping(&self, kind: BusKind) -> Result<()> {
        let conn = self
            .connections
            .borrow()
            .get(&kind)
            .map(|held| held.connection.clone())
            .ok_or(Error::BusUnavailable(kind))?;

        conn.call_method(
            Some("org.freedesktop.DBus"),
            "/org/freedesktop/DBus",
            Some("org.freedesktop.DBus.Peer"),
            "Ping",
            &(),
        )
        .await?;
        Ok(())
    }

    /// Keep the connection to `kind` alive.
    ///
    /// Runs until the task is aborted. A connection that fails `threshold`
    /// consecutive pings is dropped; while no connection is held a reconnect
    /// is attempted every `interval`.
    pub async fn supervise(self: Rc<Self>, kind: BusKind, interval: Duration, threshold: u32) {
        let mut liveness = Liveness::new(threshold);
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        debug!("Supervising {} D-Bus every {:?}", kind, interval);

        loop {
            ticker.tick().await;

            if self.is_connected(kind) {
                let ok = match self.ping(kind).await {
                    Ok(()) => true,
                    Err(e) => {
                        debug!("{} D-Bus ping failed: {}", kind, e);
                        false
                    }
                };
                match liveness.record(ok) {
                    LivenessVerdict::Alive => {}
                    LivenessVerdict::Degraded(failures) => {
                        warn!("{} D-Bus ping failed ({}/{})", kind, failures, threshold.max(1));
                    }
                    LivenessVerdict::Lost => {
                        warn!("{} D-Bus stopped responding, dropping connection", kind);
                        self.disconnect(kind);
                    }
                }
            } else if self.connect(kind).await.is_ok() {
                liveness.reset();
            }
        }
    }
}

impl Default for DbusProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl BusConnectionProvider for DbusProvider {
    fn connection(&self, kind: BusKind) -> Option<Rc<dyn NetworkManagerBus>> {
        self.connections
            .borrow()
            .get(&kind)
            .map(|held| held.handle.clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.events.subscribe()
    }
}

/// Outcome of a liveness probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessVerdict {
    Alive,
    Degraded(u32),
    Lost,
}

/// Consecutive-failure counter for bus pings.
#[derive(Debug)]
pub struct Liveness {
    failures: u32,
    threshold: u32,
}

impl Liveness {
    pub fn new(threshold: u32) -> Self {
        Self {
            failures: 0,
            threshold: threshold.max(1),
        }
    }

    /// Record one probe. Reaching the threshold resets the counter.
    pub fn record(&mut self, ok: bool) -> LivenessVerdict {
        if ok {
            self.failures = 0;
            return LivenessVerdict::Alive;
        }

        self.failures += 1;
        if self.failures >= self.threshold {
            self.failures = 0;
            LivenessVerdict::Lost
        } else {
            LivenessVerdict::Degraded(self.failures)
        }
    }

    pub fn reset(&mut self) {
        self.failures = 0;
    }

    #[allow(dead_code)]
    pub fn failures(&self) -> u32 {
        self.failures
    }
}
