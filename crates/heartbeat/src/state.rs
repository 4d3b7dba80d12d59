//! Heartbeat state machine.
//!
//! Tracks the local node's role in the current view and turns clock ticks and
//! inbound messages into [`Action`]s:
//!
//! - As **leader**, every tick broadcasts a heartbeat carrying the current
//!   proposal sequence, unless the view has been abandoned.
//! - As **follower**, a deadline is kept against the delivered clock readings.
//!   Crossing it reports the leader once; a qualifying heartbeat or a role
//!   change re-arms it.
//!
//! Time is whatever the clock source delivers: the state never reads a wall
//! clock, so it is fully deterministic under synthetic ticks.

use crate::config::HeartbeatConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};
use vigil_core::{Action, Event, Role, StateMachine};
use vigil_messages::{ConsensusMessage, HeartBeat};
use vigil_types::{ValidatorId, ViewSequenceSource};

/// A leader may be at most this many proposals ahead of what we have seen.
const MAX_PLAUSIBLE_SEQ_AHEAD: u64 = 1;

/// Watchdog state for one node.
///
/// Owned exclusively by whoever drives it (the monitor's event loop in
/// production), so it needs no internal synchronization. The shared
/// [`ViewSequence`](vigil_types::ViewSequence) is read through
/// `view_sequences` at each decision.
pub struct HeartbeatState {
    /// Follower timeout window.
    timeout: Duration,

    /// Shared view/sequence state owned by the consensus engine.
    view_sequences: Arc<dyn ViewSequenceSource>,

    /// Current role. `None` until the first role change.
    role: Option<Role>,

    /// Current view.
    view: u64,

    /// Leader: our own identity. Follower: the leader being watched.
    peer: ValidatorId,

    /// Latest clock reading. `None` until the first tick.
    now: Option<Duration>,

    /// Follower only: when the watched leader is reported if no qualifying
    /// heartbeat arrives first. `None` while waiting for the first tick.
    deadline: Option<Duration>,

    /// Follower only: a timeout was reported for the current arming.
    reported: bool,
}

impl std::fmt::Debug for HeartbeatState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeartbeatState")
            .field("role", &self.role)
            .field("view", &self.view)
            .field("peer", &self.peer)
            .field("now", &self.now)
            .field("deadline", &self.deadline)
            .field("reported", &self.reported)
            .finish()
    }
}

impl HeartbeatState {
    /// Create an idle state. Call [`HeartbeatConfig::validate`] beforehand.
    pub fn new(config: &HeartbeatConfig, view_sequences: Arc<dyn ViewSequenceSource>) -> Self {
        Self {
            timeout: config.leader_heartbeat_timeout,
            view_sequences,
            role: None,
            view: 0,
            peer: ValidatorId::default(),
            now: None,
            deadline: None,
            reported: false,
        }
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn view(&self) -> u64 {
        self.view
    }

    pub fn peer(&self) -> ValidatorId {
        self.peer
    }

    /// Follower deadline, if armed.
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    /// Whether a timeout was already reported for the current arming.
    pub fn timeout_reported(&self) -> bool {
        self.reported
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Event handlers
    // ═══════════════════════════════════════════════════════════════════════

    /// Replace role, view and peer, and re-arm from scratch.
    pub fn on_role_change(&mut self, role: Role, view: u64, peer: ValidatorId) {
        self.role = Some(role);
        self.view = view;
        self.peer = peer;
        self.reported = false;
        self.deadline = match role {
            Role::Follower => self.fresh_deadline(),
            Role::Leader => None,
        };

        info!(
            %role,
            view,
            peer = %peer,
            deadline = ?self.deadline,
            "Heartbeat monitor role changed"
        );
    }

    /// Advance the clock and act on the current role.
    pub fn on_tick(&mut self, now: Duration) -> Vec<Action> {
        self.now = Some(now);

        match self.role {
            Some(Role::Leader) => self.leader_tick(now),
            Some(Role::Follower) => self.follower_tick(now),
            None => {
                trace!(?now, "Tick while idle");
                vec![]
            }
        }
    }

    /// Inspect an inbound message; only qualifying heartbeats have an effect.
    pub fn on_message(&mut self, sender: ValidatorId, message: &ConsensusMessage) {
        if self.role != Some(Role::Follower) {
            return;
        }
        let Some(heartbeat) = message.as_heartbeat() else {
            return;
        };
        if !self.is_good_heartbeat(sender, heartbeat) {
            return;
        }

        self.deadline = self.fresh_deadline();
        self.reported = false;
        trace!(
            view = self.view,
            seq = heartbeat.seq,
            deadline = ?self.deadline,
            "Heartbeat from leader, deadline reset"
        );
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Leader
    // ═══════════════════════════════════════════════════════════════════════

    fn leader_tick(&self, now: Duration) -> Vec<Action> {
        let vs = self.view_sequences.snapshot();
        if !vs.view_active {
            trace!(view = self.view, "View inactive, not sending heartbeat");
            return vec![];
        }

        debug!(
            view = self.view,
            seq = vs.proposal_seq,
            ?now,
            "Broadcasting heartbeat"
        );

        vec![Action::Broadcast {
            message: ConsensusMessage::heartbeat(self.view, vs.proposal_seq),
        }]
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Follower
    // ═══════════════════════════════════════════════════════════════════════

    fn follower_tick(&mut self, now: Duration) -> Vec<Action> {
        let Some(deadline) = self.deadline else {
            // First tick since arming without a clock reading.
            self.deadline = Some(now.saturating_add(self.timeout));
            trace!(deadline = ?self.deadline, "Follower deadline armed");
            return vec![];
        };

        if self.reported || now < deadline {
            return vec![];
        }

        self.reported = true;
        warn!(
            view = self.view,
            leader = %self.peer,
            timeout = ?self.timeout,
            overdue = ?now.saturating_sub(deadline),
            "Heartbeat timeout expired, reporting leader"
        );

        vec![Action::ReportTimeout {
            view: self.view,
            leader: self.peer,
        }]
    }

    /// Sender, view and sequence-plausibility checks.
    fn is_good_heartbeat(&self, sender: ValidatorId, heartbeat: &HeartBeat) -> bool {
        if sender != self.peer {
            debug!(
                sender = %sender,
                leader = %self.peer,
                "Ignoring heartbeat from non-leader"
            );
            return false;
        }
        if heartbeat.view != self.view {
            debug!(
                sender = %sender,
                heartbeat_view = heartbeat.view,
                view = self.view,
                "Ignoring heartbeat for another view"
            );
            return false;
        }

        let vs = self.view_sequences.snapshot();
        if vs.view_active && heartbeat.seq_ahead_of(vs.proposal_seq) > MAX_PLAUSIBLE_SEQ_AHEAD {
            debug!(
                sender = %sender,
                heartbeat_seq = heartbeat.seq,
                local_seq = vs.proposal_seq,
                "Ignoring heartbeat from leader too far ahead"
            );
            return false;
        }

        true
    }

    fn fresh_deadline(&self) -> Option<Duration> {
        self.now.map(|now| now.saturating_add(self.timeout))
    }
}

impl StateMachine for HeartbeatState {
    fn handle(&mut self, event: Event) -> Vec<Action> {
        match event {
            Event::Tick { now } => self.on_tick(now),
            Event::RoleChanged { role, view, peer } => {
                self.on_role_change(role, view, peer);
                vec![]
            }
            Event::MessageReceived { sender, message } => {
                self.on_message(sender, &message);
                vec![]
            }
        }
    }
}
