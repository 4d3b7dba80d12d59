//! State machine and collaborator traits.

use crate::{Action, Event};
use vigil_messages::ConsensusMessage;
use vigil_types::ValidatorId;

/// A synchronous, deterministic state machine driven by [`Event`]s.
pub trait StateMachine {
    /// Process one event and return the actions it produced.
    fn handle(&mut self, event: Event) -> Vec<Action>;
}

/// Outbound side of the network layer.
///
/// Broadcasts are fire-and-forget: delivery failures are the implementation's
/// concern and are never reported back.
pub trait Communicator: Send + Sync {
    fn broadcast(&self, message: ConsensusMessage);
}

/// Receives liveness failures of the watched leader.
///
/// Called synchronously from the monitor's event loop; implementations must
/// return promptly or they delay subsequent ticks.
pub trait HeartbeatTimeoutHandler: Send + Sync {
    fn on_heartbeat_timeout(&self, view: u64, leader: ValidatorId);
}
