//! Integration tests for the heartbeat monitor event loop.
//!
//! All tests run on a paused tokio clock. `settle()` sleeps on that clock,
//! which only advances once every task is idle, so after it returns the
//! monitor has processed everything queued so far. The monitor itself only
//! sees the synthetic clock readings sent on its tick channel.

use parking_lot::Mutex;
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use vigil_core::{Communicator, HeartbeatTimeoutHandler, Role};
use vigil_heartbeat::{ConfigError, HeartbeatConfig, HeartbeatMonitor, MonitorError};
use vigil_messages::{ConsensusMessage, HeartBeat, PrePrepare};
use vigil_types::{ValidatorId, ViewSequence, ViewSequenceCell};

const HEARTBEAT_COUNT: u32 = 10;
const INCREMENT: Duration = Duration::from_secs(6);
const LEADER: ValidatorId = ValidatorId(12);

// ============================================================================
// Test collaborators
// ============================================================================

#[derive(Default)]
struct RecordingComm {
    sent: Mutex<Vec<ConsensusMessage>>,
}

impl RecordingComm {
    fn heartbeats(&self) -> Vec<HeartBeat> {
        self.sent
            .lock()
            .iter()
            .filter_map(|m| m.as_heartbeat().copied())
            .collect()
    }
}

impl Communicator for RecordingComm {
    fn broadcast(&self, message: ConsensusMessage) {
        self.sent.lock().push(message);
    }
}

#[derive(Default)]
struct RecordingHandler {
    calls: Mutex<Vec<(u64, ValidatorId)>>,
}

impl RecordingHandler {
    fn calls(&self) -> Vec<(u64, ValidatorId)> {
        self.calls.lock().clone()
    }
}

impl HeartbeatTimeoutHandler for RecordingHandler {
    fn on_heartbeat_timeout(&self, view: u64, leader: ValidatorId) {
        self.calls.lock().push((view, leader));
    }
}

struct PanickingComm;

impl Communicator for PanickingComm {
    fn broadcast(&self, _message: ConsensusMessage) {
        panic!("network layer crashed");
    }
}

/// Delivers broadcasts straight into another monitor, as `sender`.
struct ForwardingComm {
    sender: ValidatorId,
    target: OnceLock<Weak<HeartbeatMonitor>>,
}

impl ForwardingComm {
    fn new(sender: ValidatorId) -> Self {
        Self {
            sender,
            target: OnceLock::new(),
        }
    }

    fn connect(&self, target: &Arc<HeartbeatMonitor>) {
        let _ = self.target.set(Arc::downgrade(target));
    }
}

impl Communicator for ForwardingComm {
    fn broadcast(&self, message: ConsensusMessage) {
        if let Some(target) = self.target.get().and_then(Weak::upgrade) {
            target.process_msg(self.sender, message);
        }
    }
}

// ============================================================================
// Harness
// ============================================================================

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Let the monitor drain every queued event.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

struct Harness {
    monitor: Arc<HeartbeatMonitor>,
    ticks: mpsc::Sender<Duration>,
    comm: Arc<RecordingComm>,
    handler: Arc<RecordingHandler>,
    view_sequences: ViewSequenceCell,
}

impl Harness {
    fn new(initial: ViewSequence) -> Self {
        init_tracing();

        let (ticks, tick_rx) = mpsc::channel(16);
        let comm = Arc::new(RecordingComm::default());
        let handler = Arc::new(RecordingHandler::default());
        let view_sequences = ViewSequenceCell::new(initial);

        let monitor = HeartbeatMonitor::builder()
            .ticks(tick_rx)
            .config(HeartbeatConfig::default())
            .communicator(comm.clone())
            .timeout_handler(handler.clone())
            .view_sequences(Arc::new(view_sequences.clone()))
            .build()
            .expect("valid monitor configuration");

        Self {
            monitor: Arc::new(monitor),
            ticks,
            comm,
            handler,
            view_sequences,
        }
    }

    async fn tick(&self, now: Duration) {
        self.ticks.send(now).await.expect("monitor stopped");
        settle().await;
    }

    async fn change_role(&self, role: Role, view: u64, peer: ValidatorId) {
        self.monitor.change_role(role, view, peer);
        settle().await;
    }

    async fn deliver(&self, sender: ValidatorId, message: ConsensusMessage) {
        self.monitor.process_msg(sender, message);
        settle().await;
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_new_and_close() {
    let h = Harness::new(ViewSequence::default());
    assert!(!h.monitor.is_closed());

    h.monitor.close().await;

    assert!(h.monitor.is_closed());
}

#[tokio::test(start_paused = true)]
async fn test_close_is_idempotent() {
    let h = Harness::new(ViewSequence::active(0));

    h.monitor.close().await;
    h.monitor.close().await;

    // Requests after close are silently dropped.
    h.monitor.change_role(Role::Leader, 1, ValidatorId(1));
    h.monitor.process_msg(ValidatorId(2), ConsensusMessage::heartbeat(1, 0));

    // The clock registration was released.
    assert!(h.ticks.send(INCREMENT).await.is_err());
    assert!(h.comm.heartbeats().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_close() {
    let h = Harness::new(ViewSequence::default());

    let closers: Vec<_> = (0..4)
        .map(|_| {
            let monitor = h.monitor.clone();
            tokio::spawn(async move { monitor.close().await })
        })
        .collect();
    for closer in closers {
        closer.await.expect("close panicked");
    }

    h.monitor.close().await;
    assert!(h.monitor.is_closed());
}

#[tokio::test(start_paused = true)]
async fn test_no_timeout_after_close() {
    let h = Harness::new(ViewSequence::default());
    h.change_role(Role::Follower, 10, LEADER).await;
    h.tick(Duration::ZERO).await;

    h.monitor.close().await;

    assert!(h.ticks.send(Duration::from_secs(120)).await.is_err());
    settle().await;
    assert!(h.handler.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_drop_stops_event_loop() {
    let Harness { monitor, ticks, .. } = Harness::new(ViewSequence::default());

    drop(monitor);

    tokio::time::timeout(Duration::from_secs(1), ticks.closed())
        .await
        .expect("event loop still running after drop");
}

#[tokio::test(start_paused = true)]
async fn test_close_survives_panicking_collaborator() {
    init_tracing();
    let (ticks, tick_rx) = mpsc::channel(16);
    let monitor = HeartbeatMonitor::builder()
        .ticks(tick_rx)
        .communicator(Arc::new(PanickingComm))
        .timeout_handler(Arc::new(RecordingHandler::default()))
        .view_sequences(Arc::new(ViewSequenceCell::new(ViewSequence::active(0))))
        .build()
        .expect("valid monitor configuration");

    monitor.change_role(Role::Leader, 1, ValidatorId(1));
    settle().await;
    ticks.send(Duration::ZERO).await.expect("monitor running");
    settle().await;

    monitor.close().await;
    monitor.close().await;
    assert!(monitor.is_closed());
}

#[tokio::test(start_paused = true)]
async fn test_build_rejects_invalid_config() {
    let (_ticks, tick_rx) = mpsc::channel(1);

    let result = HeartbeatMonitor::builder()
        .ticks(tick_rx)
        .config(HeartbeatConfig::default().with_leader_heartbeat_timeout(Duration::ZERO))
        .communicator(Arc::new(RecordingComm::default()))
        .timeout_handler(Arc::new(RecordingHandler::default()))
        .view_sequences(Arc::new(ViewSequenceCell::default()))
        .build();

    assert!(matches!(
        result,
        Err(MonitorError::Config(ConfigError::ZeroTimeout))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_build_requires_collaborators() {
    let (_ticks, tick_rx) = mpsc::channel(1);

    let result = HeartbeatMonitor::builder()
        .ticks(tick_rx)
        .timeout_handler(Arc::new(RecordingHandler::default()))
        .view_sequences(Arc::new(ViewSequenceCell::default()))
        .build();
    assert!(matches!(
        result,
        Err(MonitorError::MissingField("communicator"))
    ));

    let result = HeartbeatMonitor::builder()
        .communicator(Arc::new(RecordingComm::default()))
        .timeout_handler(Arc::new(RecordingHandler::default()))
        .view_sequences(Arc::new(ViewSequenceCell::default()))
        .build();
    assert!(matches!(result, Err(MonitorError::MissingField("ticks"))));
}

// ============================================================================
// Leader
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_leader_stops_heartbeats_when_view_inactive() {
    let h = Harness::new(ViewSequence::active(0));
    let mut now = Duration::ZERO;

    h.change_role(Role::Leader, 10, LEADER).await;
    for _ in 0..11 {
        now += INCREMENT;
        h.tick(now).await;
    }
    let sent = h.comm.heartbeats();
    assert_eq!(sent.len(), 11);
    assert!(sent.iter().all(|hb| hb.view == 10));

    h.change_role(Role::Leader, 20, LEADER).await;
    for _ in 0..10 {
        now += INCREMENT;
        h.tick(now).await;
    }
    let sent = h.comm.heartbeats();
    assert_eq!(sent.len(), 21);
    assert_eq!(sent.iter().filter(|hb| hb.view == 20).count(), 10);

    // View is stopped.
    h.view_sequences.store(ViewSequence::inactive(0));
    for _ in 0..10 {
        now += INCREMENT;
        h.tick(now).await;
    }
    assert_eq!(h.comm.heartbeats().len(), 21);

    // And resumed.
    h.view_sequences.store(ViewSequence::active(1));
    now += INCREMENT;
    h.tick(now).await;
    assert_eq!(h.comm.heartbeats().last(), Some(&HeartBeat::new(20, 1)));

    h.monitor.close().await;
}

// ============================================================================
// Follower
// ============================================================================

/// Follower of leader 12 at view 10. One good heartbeat at T=0, then
/// `message` from `sender` after each of 20 ticks spaced one heartbeat
/// interval apart (T≈13s .. T≈127s). Returns the reported timeouts.
async fn run_follower(
    initial: ViewSequence,
    sender: ValidatorId,
    message: Option<ConsensusMessage>,
    event: impl FnOnce(&HeartbeatMonitor),
) -> Vec<(u64, ValidatorId)> {
    let h = Harness::new(initial);

    h.change_role(Role::Follower, 10, LEADER).await;
    h.tick(Duration::ZERO).await;
    h.deliver(LEADER, ConsensusMessage::heartbeat(10, 10)).await;
    event(h.monitor.as_ref());
    settle().await;

    let start = INCREMENT + Duration::from_secs(1);
    for i in 1..=HEARTBEAT_COUNT * 2 {
        h.tick(start + INCREMENT * i + Duration::from_millis(1)).await;
        if let Some(message) = &message {
            h.deliver(sender, message.clone()).await;
        }
    }
    h.monitor.close().await;

    h.handler.calls()
}

fn noop(_: &HeartbeatMonitor) {}

#[tokio::test(start_paused = true)]
async fn test_follower_timeout_expires() {
    let calls = run_follower(ViewSequence::default(), LEADER, None, noop).await;
    assert_eq!(calls, vec![(10, LEADER)]);
}

#[tokio::test(start_paused = true)]
async fn test_follower_heartbeats_prevent_timeout() {
    let calls = run_follower(
        ViewSequence::default(),
        LEADER,
        Some(ConsensusMessage::heartbeat(10, 10)),
        noop,
    )
    .await;
    assert!(calls.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_follower_bad_heartbeats_do_not_prevent_timeout() {
    let proposal = ConsensusMessage::PrePrepare(PrePrepare {
        view: 10,
        seq: 11,
        payload: vec![0xab],
    });
    let calls = run_follower(ViewSequence::default(), LEADER, Some(proposal), noop).await;
    assert_eq!(calls, vec![(10, LEADER)]);
}

#[tokio::test(start_paused = true)]
async fn test_follower_heartbeats_not_from_leader_do_not_prevent_timeout() {
    let calls = run_follower(
        ViewSequence::default(),
        ValidatorId(13),
        Some(ConsensusMessage::heartbeat(10, 10)),
        noop,
    )
    .await;
    assert_eq!(calls, vec![(10, LEADER)]);
}

#[tokio::test(start_paused = true)]
async fn test_follower_heartbeats_from_leader_too_far_ahead_lead_to_timeout() {
    let calls = run_follower(
        ViewSequence::active(10),
        LEADER,
        Some(ConsensusMessage::heartbeat(10, 15)),
        noop,
    )
    .await;
    assert_eq!(calls, vec![(10, LEADER)]);
}

#[tokio::test(start_paused = true)]
async fn test_follower_heartbeats_from_leader_one_ahead_prevent_timeout() {
    let calls = run_follower(
        ViewSequence::active(14),
        LEADER,
        Some(ConsensusMessage::heartbeat(10, 15)),
        noop,
    )
    .await;
    assert!(calls.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_follower_far_ahead_heartbeats_on_inactive_view_prevent_timeout() {
    let calls = run_follower(
        ViewSequence::inactive(10),
        LEADER,
        Some(ConsensusMessage::heartbeat(10, 15)),
        noop,
    )
    .await;
    assert!(calls.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_follower_view_change_to_dead_leader() {
    let calls = run_follower(ViewSequence::default(), LEADER, None, |monitor| {
        monitor.change_role(Role::Follower, 11, LEADER);
    })
    .await;
    assert_eq!(calls, vec![(11, LEADER)]);
}

#[tokio::test(start_paused = true)]
async fn test_follower_heartbeat_at_30s_moves_deadline_to_90s() {
    let h = Harness::new(ViewSequence::default());
    h.change_role(Role::Follower, 10, LEADER).await;

    for s in 0..=30 {
        h.tick(Duration::from_secs(s)).await;
    }
    h.deliver(LEADER, ConsensusMessage::heartbeat(10, 10)).await;

    for s in 31..=89 {
        h.tick(Duration::from_secs(s)).await;
    }
    assert!(h.handler.calls().is_empty());

    h.tick(Duration::from_secs(90)).await;
    assert_eq!(h.handler.calls(), vec![(10, LEADER)]);

    for s in 91..=150 {
        h.tick(Duration::from_secs(s)).await;
    }
    assert_eq!(h.handler.calls().len(), 1);

    h.monitor.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_messages_from_many_threads() {
    let h = Harness::new(ViewSequence::default());
    h.change_role(Role::Follower, 10, LEADER).await;
    h.tick(Duration::ZERO).await;
    h.tick(Duration::from_secs(30)).await;

    let senders: Vec<_> = (0..8u64)
        .map(|i| {
            let monitor = h.monitor.clone();
            std::thread::spawn(move || {
                for _ in 0..50 {
                    // Only the watched leader's heartbeats count.
                    let heartbeat = ConsensusMessage::heartbeat(10, 0);
                    monitor.process_msg(ValidatorId(100 + i), heartbeat.clone());
                    monitor.process_msg(LEADER, heartbeat);
                }
            })
        })
        .collect();
    for sender in senders {
        sender.join().expect("sender thread panicked");
    }
    settle().await;

    h.tick(Duration::from_secs(61)).await;
    assert!(h.handler.calls().is_empty());

    h.tick(Duration::from_secs(90)).await;
    assert_eq!(h.handler.calls(), vec![(10, LEADER)]);

    h.monitor.close().await;
}

// ============================================================================
// Leader and follower together
// ============================================================================

struct Node {
    monitor: Arc<HeartbeatMonitor>,
    ticks: mpsc::Sender<Duration>,
    handler: Arc<RecordingHandler>,
}

fn connected_node(id: ValidatorId) -> (Node, Arc<ForwardingComm>) {
    let (ticks, tick_rx) = mpsc::channel(16);
    let comm = Arc::new(ForwardingComm::new(id));
    let handler = Arc::new(RecordingHandler::default());

    let monitor = HeartbeatMonitor::builder()
        .ticks(tick_rx)
        .communicator(comm.clone())
        .timeout_handler(handler.clone())
        .view_sequences(Arc::new(ViewSequenceCell::new(ViewSequence::active(0))))
        .node(id)
        .build()
        .expect("valid monitor configuration");

    (
        Node {
            monitor: Arc::new(monitor),
            ticks,
            handler,
        },
        comm,
    )
}

async fn advance(now: &mut Duration, ticks: u32, nodes: &[&Node]) {
    for _ in 0..ticks {
        *now += INCREMENT;
        for node in nodes {
            node.ticks.send(*now).await.expect("monitor stopped");
        }
        settle().await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_leader_and_follower() {
    init_tracing();

    let (node1, comm1) = connected_node(ValidatorId(1));
    let (node2, comm2) = connected_node(ValidatorId(2));
    comm1.connect(&node2.monitor);
    comm2.connect(&node1.monitor);

    let mut now = Duration::ZERO;

    node1.monitor.change_role(Role::Leader, 10, ValidatorId(1));
    node2.monitor.change_role(Role::Follower, 10, ValidatorId(1));
    settle().await;
    advance(&mut now, HEARTBEAT_COUNT * 2, &[&node1, &node2]).await;

    node1.monitor.change_role(Role::Follower, 11, ValidatorId(2));
    node2.monitor.change_role(Role::Leader, 11, ValidatorId(2));
    settle().await;
    advance(&mut now, HEARTBEAT_COUNT * 2, &[&node1, &node2]).await;

    // Node 2 leads view 12 but dies immediately.
    node1.monitor.change_role(Role::Follower, 12, ValidatorId(2));
    node2.monitor.change_role(Role::Leader, 12, ValidatorId(2));
    settle().await;
    node2.monitor.close().await;
    advance(&mut now, HEARTBEAT_COUNT * 2, &[&node1]).await;
    node1.monitor.close().await;

    assert_eq!(node1.handler.calls(), vec![(12, ValidatorId(2))]);
    assert!(node2.handler.calls().is_empty());
}
