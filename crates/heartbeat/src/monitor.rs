//! Heartbeat monitor runner.
//!
//! Wraps [`HeartbeatState`] with async I/O using the event aggregator
//! pattern: a single task owns the state and receives ticks, role changes and
//! inbound messages over channels. Public operations only enqueue, so they
//! never block on watchdog work and can be called from any thread.

use crate::config::{ConfigError, HeartbeatConfig};
use crate::state::HeartbeatState;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, trace, Instrument};
use vigil_core::{Action, Communicator, Event, HeartbeatTimeoutHandler, Role, StateMachine};
use vigil_messages::ConsensusMessage;
use vigil_types::{ValidatorId, ViewSequenceSource};

/// Errors from building a heartbeat monitor.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("Invalid heartbeat configuration: {0}")]
    Config(#[from] ConfigError),
}

struct RoleChange {
    role: Role,
    view: u64,
    peer: ValidatorId,
}

struct InboundMessage {
    sender: ValidatorId,
    message: ConsensusMessage,
}

/// Builder for constructing a [`HeartbeatMonitor`].
///
/// Required fields:
/// - `ticks` - Clock source; each value is the current time since the
///   source's epoch
/// - `communicator` - Outbound broadcast of leader heartbeats
/// - `timeout_handler` - Notified when the watched leader times out
/// - `view_sequences` - Shared view/sequence state of the consensus engine
///
/// Optional fields:
/// - `config` - Timing parameters (defaults to [`HeartbeatConfig::default`])
/// - `node` - Local identity recorded on the monitor's tracing span
///
/// # Example
///
/// ```no_run
/// use vigil_heartbeat::{HeartbeatConfig, HeartbeatMonitor, Ticker};
/// use vigil_core::Role;
/// use vigil_types::{ValidatorId, ViewSequenceCell};
/// use std::sync::Arc;
///
/// # async fn example(
/// #     comm: Arc<dyn vigil_core::Communicator>,
/// #     handler: Arc<dyn vigil_core::HeartbeatTimeoutHandler>,
/// # ) -> Result<(), Box<dyn std::error::Error>> {
/// let config = HeartbeatConfig::default();
/// let (_ticker, ticks) = Ticker::spawn(config.heartbeat_interval());
/// let view_sequences = ViewSequenceCell::default();
///
/// let monitor = HeartbeatMonitor::builder()
///     .ticks(ticks)
///     .config(config)
///     .communicator(comm)
///     .timeout_handler(handler)
///     .view_sequences(Arc::new(view_sequences.clone()))
///     .node(ValidatorId(3))
///     .build()?;
///
/// monitor.change_role(Role::Follower, 1, ValidatorId(1));
/// // ...
/// monitor.close().await;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct HeartbeatMonitorBuilder {
    ticks: Option<mpsc::Receiver<Duration>>,
    config: HeartbeatConfig,
    communicator: Option<Arc<dyn Communicator>>,
    timeout_handler: Option<Arc<dyn HeartbeatTimeoutHandler>>,
    view_sequences: Option<Arc<dyn ViewSequenceSource>>,
    node: Option<ValidatorId>,
}

impl HeartbeatMonitorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the clock source.
    pub fn ticks(mut self, ticks: mpsc::Receiver<Duration>) -> Self {
        self.ticks = Some(ticks);
        self
    }

    /// Set the timing configuration.
    pub fn config(mut self, config: HeartbeatConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the communicator used to broadcast heartbeats.
    pub fn communicator(mut self, communicator: Arc<dyn Communicator>) -> Self {
        self.communicator = Some(communicator);
        self
    }

    /// Set the handler notified about leader timeouts.
    pub fn timeout_handler(mut self, handler: Arc<dyn HeartbeatTimeoutHandler>) -> Self {
        self.timeout_handler = Some(handler);
        self
    }

    /// Set the source of view/sequence snapshots.
    pub fn view_sequences(mut self, source: Arc<dyn ViewSequenceSource>) -> Self {
        self.view_sequences = Some(source);
        self
    }

    /// Set the local node identity used in log output.
    pub fn node(mut self, node: ValidatorId) -> Self {
        self.node = Some(node);
        self
    }

    /// Validate the configuration and start the event loop.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if a required field is missing or the configuration
    /// is invalid. Nothing is spawned in that case.
    pub fn build(self) -> Result<HeartbeatMonitor, MonitorError> {
        self.config.validate()?;

        let ticks = self.ticks.ok_or(MonitorError::MissingField("ticks"))?;
        let communicator = self
            .communicator
            .ok_or(MonitorError::MissingField("communicator"))?;
        let timeout_handler = self
            .timeout_handler
            .ok_or(MonitorError::MissingField("timeout_handler"))?;
        let view_sequences = self
            .view_sequences
            .ok_or(MonitorError::MissingField("view_sequences"))?;

        let (role_tx, role_rx) = mpsc::unbounded_channel();
        let (message_tx, message_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let event_loop = EventLoop {
            state: HeartbeatState::new(&self.config, view_sequences),
            ticks,
            role_rx,
            message_rx,
            cancel: cancel.clone(),
            communicator,
            timeout_handler,
        };

        let span = info_span!("heartbeat_monitor", node = self.node.map(|n| n.as_u64()));
        info!(
            parent: &span,
            timeout = ?self.config.leader_heartbeat_timeout,
            heartbeat_count = self.config.leader_heartbeat_count,
            "Starting heartbeat monitor"
        );
        let task = tokio::spawn(event_loop.run().instrument(span));

        Ok(HeartbeatMonitor {
            role_tx,
            message_tx,
            cancel,
            task: Mutex::new(Some(task)),
        })
    }
}

/// Leader-liveness watchdog.
///
/// As leader, broadcasts heartbeats on clock ticks while the local view is
/// active. As follower, reports the watched leader to the
/// [`HeartbeatTimeoutHandler`] once per arming when no qualifying heartbeat
/// arrives within the timeout window.
///
/// Every method takes `&self`; share the monitor behind an `Arc` to call it
/// from several tasks or threads.
///
/// Dropping the monitor cancels its event loop without waiting for it; use
/// [`close`](Self::close) to also wait until it has stopped.
pub struct HeartbeatMonitor {
    role_tx: mpsc::UnboundedSender<RoleChange>,
    message_tx: mpsc::UnboundedSender<InboundMessage>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl HeartbeatMonitor {
    pub fn builder() -> HeartbeatMonitorBuilder {
        HeartbeatMonitorBuilder::new()
    }

    /// Switch to `role` in `view`.
    ///
    /// For [`Role::Leader`], `peer` is the local node; for
    /// [`Role::Follower`], the leader to watch. Always re-arms the watchdog
    /// with a fresh timeout window, even for the same role and view.
    pub fn change_role(&self, role: Role, view: u64, peer: ValidatorId) {
        // A closed monitor is inert; dropping the request is the intended outcome.
        let _ = self.role_tx.send(RoleChange { role, view, peer });
    }

    /// Feed an inbound protocol message from `sender`.
    ///
    /// Messages of any kind are accepted; everything but a qualifying
    /// heartbeat from the watched leader is ignored.
    pub fn process_msg(&self, sender: ValidatorId, message: ConsensusMessage) {
        let _ = self.message_tx.send(InboundMessage { sender, message });
    }

    /// Stop the event loop and wait for it to finish.
    ///
    /// After this returns no further broadcasts or timeout notifications are
    /// emitted, and the clock source receiver has been dropped. Calling it
    /// again is a no-op. Never fails: a loop that died from a panicking
    /// collaborator is logged and treated as stopped.
    pub async fn close(&self) {
        self.cancel.cancel();

        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!(error = %e, "Heartbeat monitor event loop failed");
            }
        }
    }

    /// Whether [`close`](Self::close) was called or the monitor is shutting down.
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for HeartbeatMonitor {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// The task that owns the heartbeat state.
struct EventLoop {
    state: HeartbeatState,
    ticks: mpsc::Receiver<Duration>,
    role_rx: mpsc::UnboundedReceiver<RoleChange>,
    message_rx: mpsc::UnboundedReceiver<InboundMessage>,
    cancel: CancellationToken,
    communicator: Arc<dyn Communicator>,
    timeout_handler: Arc<dyn HeartbeatTimeoutHandler>,
}

impl EventLoop {
    async fn run(mut self) {
        loop {
            // Biased select for priority ordering:
            // 1. Shutdown (always first)
            // 2. Clock ticks
            // 3. Role changes
            // 4. Inbound messages
            let event = tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    info!("Heartbeat monitor stopped");
                    break;
                }

                Some(now) = self.ticks.recv() => Event::Tick { now },

                Some(change) = self.role_rx.recv() => Event::RoleChanged {
                    role: change.role,
                    view: change.view,
                    peer: change.peer,
                },

                Some(inbound) = self.message_rx.recv() => Event::MessageReceived {
                    sender: inbound.sender,
                    message: inbound.message,
                },
            };

            trace!(event.type = event.type_name(), "Handling event");
            for action in self.state.handle(event) {
                self.execute(action);
            }
        }
        // Dropping `self` releases the clock source.
    }

    fn execute(&self, action: Action) {
        trace!(action.type = action.type_name(), "Executing action");
        match action {
            Action::Broadcast { message } => {
                debug!(message.type = message.type_name(), "Sending broadcast");
                self.communicator.broadcast(message);
            }
            Action::ReportTimeout { view, leader } => {
                self.timeout_handler.on_heartbeat_timeout(view, leader);
            }
        }
    }
}
