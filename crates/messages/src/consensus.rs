//! Consensus message envelope.

use crate::HeartBeat;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tag identifying the content of a [`ConsensusMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    PrePrepare,
    Prepare,
    Commit,
    ViewChange,
    HeartBeat,
}

impl MessageKind {
    /// Stable label used in logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::PrePrepare => "consensus.pre_prepare",
            MessageKind::Prepare => "consensus.prepare",
            MessageKind::Commit => "consensus.commit",
            MessageKind::ViewChange => "consensus.view_change",
            MessageKind::HeartBeat => "consensus.heartbeat",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Leader proposal for a sequence in a view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrePrepare {
    pub view: u64,
    pub seq: u64,
    /// Opaque proposal payload.
    pub payload: Vec<u8>,
}

/// Follower acknowledgement of a proposal digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prepare {
    pub view: u64,
    pub seq: u64,
    pub digest: String,
}

/// Commit vote for a proposal digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub view: u64,
    pub seq: u64,
    pub digest: String,
}

/// Request to move to `next_view`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewChange {
    pub next_view: u64,
    pub reason: String,
}

/// Envelope for every message exchanged between consensus nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsensusMessage {
    PrePrepare(PrePrepare),
    Prepare(Prepare),
    Commit(Commit),
    ViewChange(ViewChange),
    HeartBeat(HeartBeat),
}

impl ConsensusMessage {
    /// Build a heartbeat envelope.
    pub fn heartbeat(view: u64, seq: u64) -> Self {
        HeartBeat::new(view, seq).into()
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            ConsensusMessage::PrePrepare(_) => MessageKind::PrePrepare,
            ConsensusMessage::Prepare(_) => MessageKind::Prepare,
            ConsensusMessage::Commit(_) => MessageKind::Commit,
            ConsensusMessage::ViewChange(_) => MessageKind::ViewChange,
            ConsensusMessage::HeartBeat(_) => MessageKind::HeartBeat,
        }
    }

    /// Label for logging.
    pub fn type_name(&self) -> &'static str {
        self.kind().as_str()
    }

    /// View the message refers to.
    ///
    /// For a view change this is the requested next view.
    pub fn view(&self) -> u64 {
        match self {
            ConsensusMessage::PrePrepare(m) => m.view,
            ConsensusMessage::Prepare(m) => m.view,
            ConsensusMessage::Commit(m) => m.view,
            ConsensusMessage::ViewChange(m) => m.next_view,
            ConsensusMessage::HeartBeat(m) => m.view,
        }
    }

    /// The heartbeat payload, if this envelope carries one.
    pub fn as_heartbeat(&self) -> Option<&HeartBeat> {
        match self {
            ConsensusMessage::HeartBeat(hb) => Some(hb),
            _ => None,
        }
    }
}

impl From<HeartBeat> for ConsensusMessage {
    fn from(hb: HeartBeat) -> Self {
        ConsensusMessage::HeartBeat(hb)
    }
}
