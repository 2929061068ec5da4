#![forbid(unsafe_code)]

//! Directive connection state machine.
//!
//! ```text
//!   Connected --set(false)--> Disconnected   (fires on_disconnected)
//!   Disconnected --set(true)--> Connected    (fires on_reconnected)
//!   anything else                            (no-op)
//! ```
//!
//! Repeated identical signals produce at most one callback in total.

/// Whether a directive currently sits in live output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    #[default]
    Connected,
    Disconnected,
}

/// The callback a transition requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    Disconnect,
    Reconnect,
}

impl ConnectionState {
    #[inline]
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Apply a connection signal, returning the callback to fire if the
    /// state actually changed.
    pub fn set_connected(&mut self, is_connected: bool) -> Option<Transition> {
        match (*self, is_connected) {
            (Self::Connected, false) => {
                *self = Self::Disconnected;
                Some(Transition::Disconnect)
            }
            (Self::Disconnected, true) => {
                *self = Self::Connected;
                Some(Transition::Reconnect)
            }
            _ => None,
        }
    }
}
