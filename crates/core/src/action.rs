//! Action types for liveness state machines.

use vigil_messages::ConsensusMessage;
use vigil_types::ValidatorId;

/// Actions the state machine wants to perform.
///
/// Actions are **commands** - they describe something to do.
/// The runner executes them against its collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Broadcast a message to all other nodes.
    Broadcast { message: ConsensusMessage },

    /// Report that the watched leader of `view` stopped proving liveness.
    ReportTimeout { view: u64, leader: ValidatorId },
}

impl Action {
    /// Label for logging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Action::Broadcast { .. } => "Broadcast",
            Action::ReportTimeout { .. } => "ReportTimeout",
        }
    }
}
