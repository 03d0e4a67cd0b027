//! Connection lifecycle state.

/// Where a connection is in its one-way lifecycle.
///
/// `Accepted -> Open -> Closed`. A connection may also go straight from
/// `Accepted` to `Closed` when the handshake fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// Socket registered, waiting for the upgrade request.
    #[default]
    Accepted,
    /// Handshake done, frames are being exchanged.
    Open,
    /// Removed from the registry.
    Closed,
}

impl ConnectionState {
    /// Whether the connection is still registered.
    #[must_use]
    #[inline]
    pub const fn is_active(&self) -> bool {
        !matches!(self, ConnectionState::Closed)
    }

    /// Whether the next readable data is a frame rather than a handshake.
    #[must_use]
    #[inline]
    pub const fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    /// Whether `next` is a legal successor of this state.
    #[must_use]
    pub const fn can_transition_to(&self, next: ConnectionState) -> bool {
        matches!(
            (self, next),
            (ConnectionState::Accepted, ConnectionState::Open)
                | (ConnectionState::Accepted, ConnectionState::Closed)
                | (ConnectionState::Open, ConnectionState::Closed)
        )
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Accepted => write!(f, "Accepted"),
            ConnectionState::Open => write!(f, "Open"),
            ConnectionState::Closed => write!(f, "Closed"),
        }
    }
}
