#![forbid(unsafe_code)]

//! Directives and their connection lifecycle.
//!
//! A [`Directive`] renders a leaf value into the slot that hosts it. A
//! [`DisconnectableDirective`] additionally wants to know when the region
//! embedding it leaves or re-enters live output, for example to pause a
//! subscription while hidden.
//!
//! # Invariants
//!
//! 1. A directive starts connected.
//! 2. `on_disconnected` / `on_reconnected` fire only on an actual state
//!    change, so each callback alternates with the other.
//! 3. Rendering forces the connected state first; a directive that produces
//!    output is live.
//!
//! # Failure Modes
//!
//! - A hook that panics unwinds through the render or update call that
//!   triggered it. The tree makes no attempt to catch it.

pub mod state;

use std::fmt;

use tracing::trace;

pub use state::{ConnectionState, Transition};

use crate::tree::{DirectiveId, NodeId, PartTree};

/// A unit of rendering behavior committed into a slot.
pub trait Directive {
    /// Produce the leaf value to commit.
    fn render(&mut self) -> String;
}

/// A directive that must hear about connection changes.
pub trait DisconnectableDirective: Directive {
    /// The hosting region left live output.
    fn on_disconnected(&mut self);

    /// The hosting region is live again.
    fn on_reconnected(&mut self);
}

/// Stored directive behavior.
pub enum DirectiveKind {
    Plain(Box<dyn Directive>),
    Disconnectable(Box<dyn DisconnectableDirective>),
}

impl DirectiveKind {
    pub fn plain(directive: impl Directive + 'static) -> Self {
        Self::Plain(Box::new(directive))
    }

    pub fn disconnectable(directive: impl DisconnectableDirective + 'static) -> Self {
        Self::Disconnectable(Box::new(directive))
    }

    #[inline]
    #[must_use]
    pub fn is_disconnectable(&self) -> bool {
        matches!(self, Self::Disconnectable(_))
    }

    fn render(&mut self) -> String {
        match self {
            Self::Plain(directive) => directive.render(),
            Self::Disconnectable(directive) => directive.render(),
        }
    }
}

impl fmt::Debug for DirectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(_) => f.write_str("Plain"),
            Self::Disconnectable(_) => f.write_str("Disconnectable"),
        }
    }
}

/// Arena record for a committed directive.
#[derive(Debug)]
pub struct DirectiveEntry {
    pub(crate) slot: NodeId,
    pub(crate) state: ConnectionState,
    pub(crate) kind: DirectiveKind,
}

impl DirectiveEntry {
    pub(crate) fn new(slot: NodeId, kind: DirectiveKind) -> Self {
        Self {
            slot,
            state: ConnectionState::Connected,
            kind,
        }
    }

    /// The slot hosting this directive.
    #[must_use]
    pub fn slot(&self) -> NodeId {
        self.slot
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    #[must_use]
    pub fn is_disconnectable(&self) -> bool {
        self.kind.is_disconnectable()
    }

    /// Run the state machine; fires the matching hook on a real change.
    fn set_connected(&mut self, is_connected: bool) -> Option<Transition> {
        let DirectiveKind::Disconnectable(hooks) = &mut self.kind else {
            return None;
        };
        let transition = self.state.set_connected(is_connected)?;
        match transition {
            Transition::Disconnect => hooks.on_disconnected(),
            Transition::Reconnect => hooks.on_reconnected(),
        }
        Some(transition)
    }

    /// Force connected, then render.
    fn resolve(&mut self) -> String {
        self.set_connected(true);
        self.kind.render()
    }
}

impl PartTree {
    /// Drive one directive's state machine. Plain directives and unknown ids
    /// are ignored.
    pub(crate) fn set_directive_state(
        &mut self,
        directive: DirectiveId,
        is_connected: bool,
    ) -> Option<Transition> {
        let entry = self.directives.get_mut(directive)?;
        let transition = entry.set_connected(is_connected);
        if let Some(transition) = transition {
            trace!(?directive, ?transition, "directive connection changed");
        }
        transition
    }

    /// Render a directive, forcing it connected first.
    pub(crate) fn render_directive(&mut self, directive: DirectiveId) -> Option<String> {
        let entry = self.directives.get_mut(directive)?;
        let was_connected = entry.state.is_connected();
        let output = entry.resolve();
        if !was_connected {
            trace!(?directive, "directive reconnected by render");
        }
        Some(output)
    }
}
