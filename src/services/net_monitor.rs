// Net Status Monitor - Network Status Monitor
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Network reachability monitor driven by NetworkManager.
//!
//! The monitor borrows the system bus from a [`BusConnectionProvider`],
//! listens for NetworkManager state-change signals and asks the daemon for
//! its state whenever one arrives. Replies update the observed status and
//! notify listeners.
//!
//! Everything runs on a single thread inside a tokio `LocalSet`: requests
//! and the signal filter are local tasks, and monitor state lives in
//! `Cell`/`RefCell` without locking.
//!
//! Overlapping requests are not ordered: the last reply to arrive wins.
//! Replies issued before a detach are discarded once they arrive.

use chrono::{DateTime, Local};
use futures_util::future::LocalBoxFuture;
use futures_util::StreamExt;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::bus_provider::{BusConnectionProvider, BusEvent};
use super::signal_filter::{dispatch, FilterResult, SignalAction, SignalMessage};
use crate::dbus_client::{NetworkManagerBus, Subscription};
use crate::models::{BusKind, NetworkStatus, NmState, StateReply, StatusSnapshot};
use crate::storage::ManagedNetworkPolicy;

/// Identifies a registered status listener.
pub type ListenerId = u64;

type StatusListener = Rc<dyn Fn(bool)>;

/// Live attachment to the system bus.
struct Attachment {
    bus: Rc<dyn NetworkManagerBus>,
    filter: JoinHandle<()>,
}

struct Inner {
    provider: Rc<dyn BusConnectionProvider>,
    policy: Rc<dyn ManagedNetworkPolicy>,
    status: Cell<NetworkStatus>,
    attachment: RefCell<Option<Attachment>>,
    /// Bumped on every attach and detach.
    epoch: Cell<u64>,
    in_flight: Cell<usize>,
    last_checked: Cell<Option<DateTime<Local>>>,
    listeners: RefCell<Vec<(ListenerId, StatusListener)>>,
    next_listener_id: Cell<ListenerId>,
    bus_events: RefCell<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(attachment) = self.attachment.get_mut().take() {
            attachment.filter.abort();
        }
        if let Some(task) = self.bus_events.get_mut().take() {
            task.abort();
        }
    }
}

/// Network status monitor.
///
/// Cloning yields another handle to the same monitor.
#[derive(Clone)]
pub struct NetMonitor {
    inner: Rc<Inner>,
}

impl NetMonitor {
    /// Create a detached monitor. Call [`NetMonitor::startup`] to begin.
    pub fn new(
        provider: Rc<dyn BusConnectionProvider>,
        policy: Rc<dyn ManagedNetworkPolicy>,
    ) -> Self {
        debug!("NetMonitor initialising");
        Self {
            inner: Rc::new(Inner {
                provider,
                policy,
                status: Cell::new(NetworkStatus::Up),
                attachment: RefCell::new(None),
                epoch: Cell::new(0),
                in_flight: Cell::new(0),
                last_checked: Cell::new(None),
                listeners: RefCell::new(Vec::new()),
                next_listener_id: Cell::new(1),
                bus_events: RefCell::new(None),
            }),
        }
    }

    /// Attach to the system bus, follow provider events and run the first
    /// check. Must be called from within a `LocalSet`.
    pub fn startup(&self) {
        info!("NetMonitor starting up");

        self.attach();
        self.listen_bus_events();

        if self.is_attached() {
            self.check_network();
        }
    }

    /// Detach from the bus and stop following provider events.
    /// The observed status is left as it is.
    pub fn shutdown(&self) {
        self.detach();
        if let Some(task) = self.inner.bus_events.borrow_mut().take() {
            task.abort();
        }
        info!("NetMonitor shutdown");
    }

    /// Attach to the system bus if the provider has a connection.
    ///
    /// If the provider now holds a different connection than the one the
    /// monitor is attached to, the old attachment is dropped first.
    pub fn attach(&self) {
        debug!("NetMonitor is trying to attach to system bus");

        let Some(bus) = self.inner.provider.connection(BusKind::System) else {
            debug!("No system bus connection, network assumed up");
            return;
        };

        if self.is_attached_to(&bus) {
            debug!("NetMonitor already attached to system bus");
            return;
        }
        if self.is_attached() {
            info!("System bus connection was replaced, re-attaching");
            self.detach();
        }

        self.inner.epoch.set(self.inner.epoch.get() + 1);

        let subscription = bus.subscribe();
        let weak = Rc::downgrade(&self.inner);
        let filter = tokio::task::spawn_local(run_filter(weak, subscription));

        *self.inner.attachment.borrow_mut() = Some(Attachment { bus, filter });
        info!("NetMonitor attached to system bus");
    }

    /// Remove the signal filter and release the bus handle.
    pub fn detach(&self) {
        debug!("NetMonitor is trying to detach from system bus");

        let Some(attachment) = self.inner.attachment.borrow_mut().take() else {
            return;
        };
        attachment.filter.abort();
        self.inner.epoch.set(self.inner.epoch.get() + 1);

        if self.inner.in_flight.get() > 0 {
            debug!(
                "{} state request(s) still pending, their replies will be ignored",
                self.inner.in_flight.get()
            );
        }
        info!("NetMonitor detached from system bus");
    }

    /// Ask NetworkManager for its state without waiting for the answer.
    ///
    /// Does nothing while detached.
    pub fn check_network(&self) {
        let bus = match self.inner.attachment.borrow().as_ref() {
            Some(attachment) => attachment.bus.clone(),
            None => {
                debug!("NetMonitor not attached, skipping network check");
                return;
            }
        };

        debug!("NetMonitor checking network");

        let pending = self.inner.in_flight.get() + 1;
        self.inner.in_flight.set(pending);
        if pending > 1 {
            debug!("{} state requests in flight, the last reply to arrive wins", pending);
        }

        let epoch = self.inner.epoch.get();
        let request = bus.request_state();
        let weak = Rc::downgrade(&self.inner);
        tokio::task::spawn_local(async move {
            let reply = request.await;
            if let Some(inner) = weak.upgrade() {
                NetMonitor { inner }.on_reply(epoch, reply);
            }
        });
    }

    /// Filter entry point for bus messages.
    pub fn on_signal(&self, message: &SignalMessage) -> FilterResult {
        match dispatch(message) {
            Some(SignalAction::CheckNetwork) => {
                debug!("NetMonitor caught {:?} signal", message.nm_signal());
                self.check_network();
                FilterResult::Handled
            }
            None => FilterResult::NotYetHandled,
        }
    }

    /// The provider established a bus connection.
    pub fn on_bus_connected(&self, kind: BusKind) {
        if kind != BusKind::System {
            return;
        }
        debug!("NetMonitor connecting to system bus");
        self.attach();
        self.check_network();
    }

    /// The provider lost a bus connection.
    pub fn on_bus_disconnected(&self, kind: BusKind) {
        if kind != BusKind::System {
            return;
        }
        debug!("NetMonitor disconnected from system bus");
        self.detach();
    }

    /// Whether the network should be treated as reachable.
    ///
    /// Always true unless the managed-network policy is enabled.
    pub fn get_status(&self) -> bool {
        !self.inner.policy.managed_network() || self.inner.status.get() != NetworkStatus::Down
    }

    /// Status as last observed from NetworkManager, ignoring policy.
    pub fn observed_status(&self) -> NetworkStatus {
        self.inner.status.get()
    }

    /// Check if attached to the system bus.
    pub fn is_attached(&self) -> bool {
        self.inner.attachment.borrow().is_some()
    }

    fn is_attached_to(&self, bus: &Rc<dyn NetworkManagerBus>) -> bool {
        match self.inner.attachment.borrow().as_ref() {
            // Compare data pointers only; vtable pointers may differ per codegen unit.
            Some(attachment) => {
                Rc::as_ptr(&attachment.bus) as *const () == Rc::as_ptr(bus) as *const ()
            }
            None => false,
        }
    }

    /// Number of state requests awaiting a reply.
    #[allow(dead_code)]
    pub fn pending_requests(&self) -> usize {
        self.inner.in_flight.get()
    }

    /// Current state for display.
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            online: self.get_status(),
            observed: self.observed_status(),
            managed: self.inner.policy.managed_network(),
            attached: self.is_attached(),
            last_checked: self.inner.last_checked.get(),
        }
    }

    /// Register a callback receiving the effective status after each update.
    pub fn on_status_changed<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(bool) + 'static,
    {
        let id = self.inner.next_listener_id.get();
        self.inner.next_listener_id.set(id + 1);
        let listener: StatusListener = Rc::new(callback);
        self.inner.listeners.borrow_mut().push((id, listener));
        id
    }

    /// Remove a listener. Returns false if it was not registered.
    #[allow(dead_code)]
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.inner.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    fn on_reply(&self, epoch: u64, reply: StateReply) {
        debug!("NetMonitor getting response from D-Bus");

        self.inner
            .in_flight
            .set(self.inner.in_flight.get().saturating_sub(1));

        if epoch != self.inner.epoch.get() {
            debug!("Discarding state reply from a previous attachment");
            return;
        }

        match reply {
            StateReply::State(code) => {
                let state = NmState::from_code(code);
                let status = state.network_status(self.inner.policy.accept_limited_connectivity());
                debug!(
                    "NetMonitor guesses the network is {} (state {} = {:?})",
                    status.as_str(),
                    code,
                    state
                );
                self.set_net_status(status);
            }
            StateReply::Malformed(reason) => {
                warn!("Ignoring malformed NetworkManager state reply: {}", reason);
            }
            StateReply::Failed(reason) => {
                debug!("NetworkManager state request failed: {}", reason);
            }
        }
    }

    fn set_net_status(&self, status: NetworkStatus) {
        info!(
            "NetMonitor turning to {} mode",
            if status != NetworkStatus::Down { "online" } else { "offline" }
        );

        self.inner.status.set(status);
        self.inner.last_checked.set(Some(Local::now()));

        let online = self.get_status();
        let listeners: Vec<StatusListener> = self
            .inner
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(online);
        }
    }

    fn listen_bus_events(&self) {
        let mut events = self.inner.provider.subscribe();
        let weak = Rc::downgrade(&self.inner);

        let task = tokio::task::spawn_local(async move {
            loop {
                let event = events.recv().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let monitor = NetMonitor { inner };

                match event {
                    Ok(BusEvent::Connected(kind)) => monitor.on_bus_connected(kind),
                    Ok(BusEvent::Disconnected(kind)) => monitor.on_bus_disconnected(kind),
                    Err(RecvError::Lagged(missed)) => {
                        warn!("Missed {} bus events, resynchronising", missed);
                        monitor.resync();
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        if let Some(previous) = self.inner.bus_events.borrow_mut().replace(task) {
            previous.abort();
        }
    }

    /// Match the attachment to whatever the provider currently holds.
    fn resync(&self) {
        match self.inner.provider.connection(BusKind::System) {
            Some(bus) if !self.is_attached_to(&bus) => self.on_bus_connected(BusKind::System),
            None if self.is_attached() => self.on_bus_disconnected(BusKind::System),
            _ => {}
        }
    }
}

async fn run_filter(
    monitor: Weak<Inner>,
    subscription: LocalBoxFuture<'static, Subscription>,
) {
    let Subscription { mut messages, narrowed } = subscription.await;
    if !narrowed {
        debug!("Filtering unnarrowed message stream");
    }

    while let Some(message) = messages.next().await {
        let Some(inner) = monitor.upgrade() else {
            break;
        };
        NetMonitor { inner }.on_signal(&message);
    }

    debug!("System bus message stream ended");
}
