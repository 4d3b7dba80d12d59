//! Core types for vigil liveness components.
//!
//! This crate provides the foundational types for the event-driven design:
//!
//! - [`Event`]: All possible inputs to a liveness state machine
//! - [`Action`]: All possible outputs from a liveness state machine
//! - [`StateMachine`]: The trait those state machines implement
//! - [`Communicator`] / [`HeartbeatTimeoutHandler`]: the collaborators a
//!   runner executes actions against
//!
//! # Architecture
//!
//! ```text
//! Events → StateMachine::handle() → Actions → runner → collaborators
//! ```
//!
//! The state machine is:
//! - **Synchronous**: No async, no .await
//! - **Deterministic**: Same state + event = same actions
//! - **Pure-ish**: Mutates self, but performs no I/O
//!
//! All I/O is handled by the runner, which delivers events one at a time and
//! executes the returned actions before delivering the next event.

mod action;
mod event;
mod traits;

pub use action::Action;
pub use event::Event;
pub use traits::{Communicator, HeartbeatTimeoutHandler, StateMachine};

use std::fmt;

/// The part a node plays in the current view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Proposes in the view and proves liveness to followers.
    Leader,
    /// Watches the leader and reports it when it falls silent.
    Follower,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Leader => f.write_str("leader"),
            Role::Follower => f.write_str("follower"),
        }
    }
}
