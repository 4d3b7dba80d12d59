//! Network messages for the consensus protocol.
//!
//! Every message travels inside a [`ConsensusMessage`] envelope tagged by its
//! [`MessageKind`]. Liveness components only look inside envelopes tagged
//! [`MessageKind::HeartBeat`]; all other kinds are opaque to them.

mod consensus;
mod heartbeat;

pub use consensus::{Commit, ConsensusMessage, MessageKind, PrePrepare, Prepare, ViewChange};
pub use heartbeat::HeartBeat;
