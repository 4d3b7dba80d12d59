//! Event types for liveness state machines.

use crate::Role;
use std::time::Duration;
use vigil_messages::ConsensusMessage;
use vigil_types::ValidatorId;

/// All possible events a liveness state machine can receive.
///
/// Events are **passive data** - they describe something that happened.
/// The state machine processes events and returns actions.
#[derive(Debug, Clone)]
pub enum Event {
    /// The clock advanced. `now` is the reading delivered by the clock source,
    /// measured from the source's own epoch and never decreasing.
    Tick { now: Duration },

    /// The consensus engine assigned a new role.
    ///
    /// For [`Role::Leader`], `peer` is the local node; for [`Role::Follower`],
    /// it is the leader being watched.
    RoleChanged {
        role: Role,
        view: u64,
        peer: ValidatorId,
    },

    /// A protocol message arrived from `sender`.
    MessageReceived {
        sender: ValidatorId,
        message: ConsensusMessage,
    },
}

impl Event {
    /// Label for logging and spans.
    pub fn type_name(&self) -> &'static str {
        match self {
            Event::Tick { .. } => "Tick",
            Event::RoleChanged { .. } => "RoleChanged",
            Event::MessageReceived { .. } => "MessageReceived",
        }
    }
}
