//! Live-connection registry owned by the server loop.

use std::collections::BTreeMap;

use crate::connection::{ConnectionId, ConnectionState};

/// One registered connection: its socket, peer identity and lifecycle state.
#[derive(Debug)]
pub struct ConnectionRecord<S> {
    pub(crate) stream: S,
    peer: String,
    state: ConnectionState,
}

impl<S> ConnectionRecord<S> {
    /// Remote `address:port`.
    #[must_use]
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// The socket and the peer name, borrowed together.
    pub(crate) fn io_parts(&mut self) -> (&mut S, &str) {
        (&mut self.stream, &self.peer)
    }
}

/// Connections keyed by [`ConnectionId`], iterated in accept order.
///
/// Socket and handshake state live in one record, so they cannot drift apart.
/// Removing a record drops (and thereby closes) its socket.
#[derive(Debug)]
pub struct Registry<S> {
    next_id: u64,
    records: BTreeMap<ConnectionId, ConnectionRecord<S>>,
}

impl<S> Default for Registry<S> {
    fn default() -> Self {
        Self {
            next_id: 1,
            records: BTreeMap::new(),
        }
    }
}

impl<S> Registry<S> {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly accepted socket in the `Accepted` state.
    pub fn insert(&mut self, stream: S, peer: impl Into<String>) -> ConnectionId {
        let id = ConnectionId::new(self.next_id);
        self.next_id += 1;
        self.records.insert(
            id,
            ConnectionRecord {
                stream,
                peer: peer.into(),
                state: ConnectionState::Accepted,
            },
        );
        id
    }

    /// Move an `Accepted` connection to `Open`.
    ///
    /// Returns `false` if the connection is unknown or not in `Accepted`.
    pub fn mark_open(&mut self, id: ConnectionId) -> bool {
        match self.records.get_mut(&id) {
            Some(record) if record.state.can_transition_to(ConnectionState::Open) => {
                record.state = ConnectionState::Open;
                true
            }
            _ => false,
        }
    }

    /// Drop a connection. Returns the record if it was registered.
    pub fn remove(&mut self, id: ConnectionId) -> Option<ConnectionRecord<S>> {
        self.records.remove(&id)
    }

    /// Lifecycle state; unknown ids report `Closed`.
    #[must_use]
    pub fn state(&self, id: ConnectionId) -> ConnectionState {
        self.records
            .get(&id)
            .map_or(ConnectionState::Closed, |record| record.state)
    }

    /// Look up a record.
    #[must_use]
    pub fn get(&self, id: ConnectionId) -> Option<&ConnectionRecord<S>> {
        self.records.get(&id)
    }

    /// Look up a record mutably.
    pub fn get_mut(&mut self, id: ConnectionId) -> Option<&mut ConnectionRecord<S>> {
        self.records.get_mut(&id)
    }

    /// Iterate records in accept order.
    pub fn iter(&self) -> impl Iterator<Item = (ConnectionId, &ConnectionRecord<S>)> {
        self.records.iter().map(|(id, record)| (*id, record))
    }

    /// Number of registered connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no connections are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
