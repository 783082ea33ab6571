//! Async D-Bus access to NetworkManager used by the status monitor.

use futures_util::future::{FutureExt, LocalBoxFuture};
use futures_util::stream::{LocalBoxStream, StreamExt};
use tracing::{debug, warn};
use zbus::{Connection, MessageStream};

use crate::models::{
    Error, StateReply, NM_DBUS_INTERFACE, NM_DBUS_PATH, NM_DBUS_SERVICE, NM_STATE_METHOD,
};
use crate::services::signal_filter::{nm_match_rule, SignalMessage, NM_MATCH_RULE};

/// Incoming messages after the match rule, reduced to their headers.
pub struct Subscription {
    /// Messages delivered to the filter. Ends when the connection closes.
    pub messages: LocalBoxStream<'static, SignalMessage>,
    /// False when the match rule could not be registered and the stream
    /// carries every message the connection receives.
    pub narrowed: bool,
}

/// Handle to a bus connection able to talk to NetworkManager.
///
/// Both futures are lazy: nothing goes on the wire until they are polled.
pub trait NetworkManagerBus {
    /// Ask NetworkManager for its current state.
    fn request_state(&self) -> LocalBoxFuture<'static, StateReply>;

    /// Register the NetworkManager match rule and open the message stream.
    fn subscribe(&self) -> LocalBoxFuture<'static, Subscription>;
}

/// zbus-backed NetworkManager bus handle.
#[derive(Clone)]
pub struct DbusNetworkManager {
    connection: Connection,
}

impl DbusNetworkManager {
    /// Wrap an established connection.
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }
}

impl NetworkManagerBus for DbusNetworkManager {
    fn request_state(&self) -> LocalBoxFuture<'static, StateReply> {
        let conn = self.connection.clone();
        async move {
            debug!("Calling {}.{}", NM_DBUS_INTERFACE, NM_STATE_METHOD);

            let result = conn
                .call_method(
                    Some(NM_DBUS_SERVICE),
                    NM_DBUS_PATH,
                    Some(NM_DBUS_INTERFACE),
                    NM_STATE_METHOD,
                    &(),
                )
                .await;

            match result {
                Ok(reply) => parse_state_reply(&reply),
                Err(e) => StateReply::Failed(Error::from(e).to_string()),
            }
        }
        .boxed_local()
    }

    fn subscribe(&self) -> LocalBoxFuture<'static, Subscription> {
        let conn = self.connection.clone();
        async move {
            let registered = match nm_match_rule() {
                Ok(rule) => MessageStream::for_match_rule(rule, &conn, None).await,
                Err(e) => Err(e),
            };

            let (stream, narrowed) = narrow_or_fallback(registered, || MessageStream::from(&conn));
            Subscription {
                messages: into_signal_stream(stream),
                narrowed,
            }
        }
        .boxed_local()
    }
}

/// Use the match-rule stream if it was registered, otherwise the
/// connection-wide stream. The flag tells which one was picked.
fn narrow_or_fallback<S>(
    registered: zbus::Result<S>,
    fallback: impl FnOnce() -> S,
) -> (S, bool) {
    match registered {
        Ok(stream) => {
            debug!("Registered match rule {}", NM_MATCH_RULE);
            (stream, true)
        }
        Err(e) => {
            warn!(
                "Cannot register NetworkManager signal handler: {}",
                Error::MatchRuleFailed(e.to_string())
            );
            (fallback(), false)
        }
    }
}

/// Decode a `state` method return.
fn parse_state_reply(reply: &zbus::Message) -> StateReply {
    match reply.body().deserialize::<u32>() {
        Ok(code) => StateReply::State(code),
        Err(e) => StateReply::Malformed(e.to_string()),
    }
}

fn into_signal_stream(stream: MessageStream) -> LocalBoxStream<'static, SignalMessage> {
    stream
        .filter_map(|item| async move {
            match item {
                Ok(msg) => Some(SignalMessage::from(&msg)),
                Err(e) => {
                    debug!("Dropping undecodable bus message: {}", e);
                    None
                }
            }
        })
        .boxed_local()
}
