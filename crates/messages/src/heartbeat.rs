//! Leader heartbeat payload.

use serde::{Deserialize, Serialize};

/// Liveness proof broadcast by the leader of a view.
///
/// `seq` is the latest proposal sequence the leader has reached in `view`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HeartBeat {
    pub view: u64,
    pub seq: u64,
}

impl HeartBeat {
    pub fn new(view: u64, seq: u64) -> Self {
        Self { view, seq }
    }

    /// How far this heartbeat claims to be ahead of `local_seq`.
    ///
    /// Zero when the sender is at or behind the local sequence.
    pub fn seq_ahead_of(&self, local_seq: u64) -> u64 {
        self.seq.saturating_sub(local_seq)
    }
}
