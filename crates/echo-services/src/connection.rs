//! Connection table — live transports and their outbound channels.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tracing::debug;

use echo_core::{ConnectionId, OutboundEvent, UserId};

/// Per-connection outbound queue; the transport drains it into the socket.
pub type OutboundSender = mpsc::UnboundedSender<OutboundEvent>;

struct ConnectionEntry {
    sender: OutboundSender,
    user_id: Option<UserId>,
}

#[derive(Default)]
pub struct ConnectionTable {
    connections: HashMap<ConnectionId, ConnectionEntry>,
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, connection_id: ConnectionId, sender: OutboundSender) {
        self.connections.insert(
            connection_id,
            ConnectionEntry {
                sender,
                user_id: None,
            },
        );
    }

    /// Forget a connection. Returns the user id it was bound to, if any.
    pub fn remove(&mut self, connection_id: &ConnectionId) -> Option<UserId> {
        self.connections
            .remove(connection_id)
            .and_then(|e| e.user_id)
    }

    /// Queue an event for one connection. Returns false if the connection
    /// is unknown or its transport has gone away.
    pub fn send(&self, connection_id: &ConnectionId, event: OutboundEvent) -> bool {
        let Some(entry) = self.connections.get(connection_id) else {
            debug!(connection = %connection_id, "send to unknown connection dropped");
            return false;
        };
        if entry.sender.send(event).is_err() {
            debug!(connection = %connection_id, "outbound channel closed");
            return false;
        }
        true
    }

    pub fn broadcast(&self, event: &OutboundEvent) {
        for (id, entry) in &self.connections {
            if entry.sender.send(event.clone()).is_err() {
                debug!(connection = %id, "outbound channel closed during broadcast");
            }
        }
    }

    pub fn set_user(&mut self, connection_id: &ConnectionId, user_id: &str) {
        if let Some(entry) = self.connections.get_mut(connection_id) {
            entry.user_id = Some(user_id.to_string());
        }
    }

    pub fn user_of(&self, connection_id: &ConnectionId) -> Option<&str> {
        self.connections
            .get(connection_id)
            .and_then(|e| e.user_id.as_deref())
    }

    /// Registered and its transport is still accepting events.
    pub fn is_live(&self, connection_id: &ConnectionId) -> bool {
        self.connections
            .get(connection_id)
            .is_some_and(|e| !e.sender.is_closed())
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
