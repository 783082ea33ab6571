// Net Status Monitor - Test Doubles
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! In-process stand-ins for the bus, the provider and the policy.

use futures_util::future::{FutureExt, LocalBoxFuture};
use futures_util::stream::{self, StreamExt};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use tokio::sync::{broadcast, mpsc, oneshot};

use super::bus_provider::{BusConnectionProvider, BusEvent};
use super::signal_filter::SignalMessage;
use crate::dbus_client::{NetworkManagerBus, Subscription};
use crate::models::{BusKind, StateReply};
use crate::storage::ManagedNetworkPolicy;

/// Let spawned local tasks run until they block.
pub async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

/// Bus whose replies and signals are driven by the test.
#[derive(Default)]
pub struct FakeBus {
    pending: RefCell<VecDeque<oneshot::Sender<StateReply>>>,
    requests: Cell<usize>,
    signals: RefCell<Option<mpsc::UnboundedSender<SignalMessage>>>,
    subscriptions: Cell<usize>,
    /// Subscriptions report a connection-wide stream.
    unnarrowed: Cell<bool>,
}

impl FakeBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bus whose match rule registration fails.
    pub fn unnarrowed() -> Self {
        let bus = Self::default();
        bus.unnarrowed.set(true);
        bus
    }

    /// Total `state` requests issued so far.
    pub fn requests(&self) -> usize {
        self.requests.get()
    }

    /// Total subscriptions opened so far.
    pub fn subscriptions(&self) -> usize {
        self.subscriptions.get()
    }

    /// Answer the oldest outstanding request.
    pub fn reply_next(&self, reply: StateReply) -> bool {
        match self.pending.borrow_mut().pop_front() {
            Some(tx) => tx.send(reply).is_ok(),
            None => false,
        }
    }

    /// Answer the newest outstanding request.
    pub fn reply_last(&self, reply: StateReply) -> bool {
        match self.pending.borrow_mut().pop_back() {
            Some(tx) => tx.send(reply).is_ok(),
            None => false,
        }
    }

    /// Deliver a message to the current subscriber.
    pub fn emit(&self, message: SignalMessage) -> bool {
        match self.signals.borrow().as_ref() {
            Some(tx) => tx.send(message).is_ok(),
            None => false,
        }
    }
}

impl NetworkManagerBus for FakeBus {
    fn request_state(&self) -> LocalBoxFuture<'static, StateReply> {
        let (tx, rx) = oneshot::channel();
        self.pending.borrow_mut().push_back(tx);
        self.requests.set(self.requests.get() + 1);

        async move {
            rx.await
                .unwrap_or_else(|_| StateReply::Failed("request dropped".to_string()))
        }
        .boxed_local()
    }

    fn subscribe(&self) -> LocalBoxFuture<'static, Subscription> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.signals.borrow_mut() = Some(tx);
        self.subscriptions.set(self.subscriptions.get() + 1);

        let messages = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|message| (message, rx))
        })
        .boxed_local();
        let narrowed = !self.unnarrowed.get();

        async move {
            Subscription { messages, narrowed }
        }
        .boxed_local()
    }
}

/// Provider whose connections are added and removed by the test.
pub struct FakeProvider {
    buses: RefCell<HashMap<BusKind, Rc<FakeBus>>>,
    events: broadcast::Sender<BusEvent>,
}

impl FakeProvider {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            buses: RefCell::new(HashMap::new()),
            events,
        }
    }

    pub fn with_system_bus(bus: Rc<FakeBus>) -> Self {
        let provider = Self::new();
        provider.buses.borrow_mut().insert(BusKind::System, bus);
        provider
    }

    pub fn connect(&self, kind: BusKind, bus: Rc<FakeBus>) {
        self.buses.borrow_mut().insert(kind, bus);
        let _ = self.events.send(BusEvent::Connected(kind));
    }

    pub fn disconnect(&self, kind: BusKind) {
        if self.buses.borrow_mut().remove(&kind).is_some() {
            let _ = self.events.send(BusEvent::Disconnected(kind));
        }
    }
}

impl BusConnectionProvider for FakeProvider {
    fn connection(&self, kind: BusKind) -> Option<Rc<dyn NetworkManagerBus>> {
        self.buses
            .borrow()
            .get(&kind)
            .map(|bus| bus.clone() as Rc<dyn NetworkManagerBus>)
    }

    fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.events.subscribe()
    }
}

/// Policy flags that tests can flip.
pub struct FakePolicy {
    managed: Cell<bool>,
    accept_limited: Cell<bool>,
}

impl FakePolicy {
    pub fn new(managed: bool) -> Self {
        Self {
            managed: Cell::new(managed),
            accept_limited: Cell::new(false),
        }
    }

    pub fn set_managed(&self, managed: bool) {
        self.managed.set(managed);
    }

    pub fn set_accept_limited(&self, accept: bool) {
        self.accept_limited.set(accept);
    }
}

impl ManagedNetworkPolicy for FakePolicy {
    fn managed_network(&self) -> bool {
        self.managed.get()
    }

    fn accept_limited_connectivity(&self) -> bool {
        self.accept_limited.get()
    }
}
