// Net Status Monitor - Signal Filter
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Dispatch table for NetworkManager bus signals.
//!
//! Incoming messages are reduced to the header fields the monitor cares
//! about and looked up in a static table keyed by [`NmSignal`].

use zbus::message::Type as MessageType;
use zbus::MatchRule;

use crate::models::NM_DBUS_INTERFACE;

/// Match rule narrowing the subscription to NetworkManager signals.
pub const NM_MATCH_RULE: &str = "type='signal',interface='org.freedesktop.NetworkManager'";

/// Build the match rule registered with the bus daemon.
pub fn nm_match_rule() -> zbus::Result<MatchRule<'static>> {
    Ok(MatchRule::builder()
        .msg_type(MessageType::Signal)
        .interface(NM_DBUS_INTERFACE)?
        .build())
}

/// Signals on the NetworkManager interface the monitor reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NmSignal {
    /// Legacy daemons (0.6/0.7).
    StateChange,
    /// Current daemons.
    StateChanged,
}

impl NmSignal {
    pub fn member(&self) -> &'static str {
        match self {
            Self::StateChange => "StateChange",
            Self::StateChanged => "StateChanged",
        }
    }
}

/// What the monitor should do for a recognised signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    /// Ask NetworkManager for its current state.
    CheckNetwork,
}

/// Whether a filter consumed a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterResult {
    Handled,
    NotYetHandled,
}

const DISPATCH: &[(NmSignal, SignalAction)] = &[
    (NmSignal::StateChange, SignalAction::CheckNetwork),
    (NmSignal::StateChanged, SignalAction::CheckNetwork),
];

/// Kind of bus message, mirroring the wire-level message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    MethodCall,
    MethodReturn,
    Error,
    Signal,
    Other,
}

impl From<MessageType> for MessageKind {
    fn from(kind: MessageType) -> Self {
        match kind {
            MessageType::MethodCall => Self::MethodCall,
            MessageType::MethodReturn => Self::MethodReturn,
            MessageType::Error => Self::Error,
            MessageType::Signal => Self::Signal,
            #[allow(unreachable_patterns)]
            _ => Self::Other,
        }
    }
}

/// Header fields of a bus message relevant to signal dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalMessage {
    pub kind: MessageKind,
    pub interface: Option<String>,
    pub member: Option<String>,
}

impl SignalMessage {
    /// Build a signal view from known fields.
    #[cfg(test)]
    pub fn signal(interface: &str, member: &str) -> Self {
        Self {
            kind: MessageKind::Signal,
            interface: Some(interface.to_string()),
            member: Some(member.to_string()),
        }
    }

    /// Identify the NetworkManager signal this message carries, if any.
    pub fn nm_signal(&self) -> Option<NmSignal> {
        if self.kind != MessageKind::Signal {
            return None;
        }
        if self.interface.as_deref() != Some(NM_DBUS_INTERFACE) {
            return None;
        }
        let member = self.member.as_deref()?;
        DISPATCH
            .iter()
            .map(|(signal, _)| *signal)
            .find(|signal| signal.member() == member)
    }
}

impl From<&zbus::Message> for SignalMessage {
    fn from(msg: &zbus::Message) -> Self {
        let header = msg.header();
        Self {
            kind: header.message_type().into(),
            interface: header.interface().map(|i| i.to_string()),
            member: header.member().map(|m| m.to_string()),
        }
    }
}

/// Look up the action for a message.
pub fn dispatch(message: &SignalMessage) -> Option<SignalAction> {
    let signal = message.nm_signal()?;
    DISPATCH
        .iter()
        .find(|(s, _)| *s == signal)
        .map(|(_, action)| *action)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_state_signals_trigger_check() {
        for member in ["StateChange", "StateChanged"] {
            let msg = SignalMessage::signal(NM_DBUS_INTERFACE, member);
            assert_eq!(dispatch(&msg), Some(SignalAction::CheckNetwork), "{}", member);
        }
    }

    #[test]
    fn test_other_members_pass_through() {
        let msg = SignalMessage::signal(NM_DBUS_INTERFACE, "DeviceAdded");
        assert_eq!(msg.nm_signal(), None);
        assert_eq!(dispatch(&msg), None);
    }

    #[test]
    fn test_other_interfaces_pass_through() {
        let msg = SignalMessage::signal("org.freedesktop.NetworkManager.Device", "StateChanged");
        assert_eq!(dispatch(&msg), None);
    }

    #[test]
    fn test_method_calls_are_not_signals() {
        let msg = SignalMessage {
            kind: MessageKind::MethodCall,
            interface: Some(NM_DBUS_INTERFACE.to_string()),
            member: Some("StateChanged".to_string()),
        };
        assert_eq!(dispatch(&msg), None);
    }

    #[test]
    fn test_missing_member() {
        let msg = SignalMessage {
            kind: MessageKind::Signal,
            interface: Some(NM_DBUS_INTERFACE.to_string()),
            member: None,
        };
        assert_eq!(msg.nm_signal(), None);
    }

    #[test]
    fn test_match_rule_fields() {
        let rule = nm_match_rule().unwrap();
        assert_eq!(rule.msg_type(), Some(MessageType::Signal));
        assert_eq!(rule.interface().map(|i| i.as_str()), Some(NM_DBUS_INTERFACE));
    }
}
