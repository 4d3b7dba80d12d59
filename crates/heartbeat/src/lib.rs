//! Leader-liveness heartbeat monitor.
//!
//! In a view-based BFT protocol every node is either the leader of the current
//! view or a follower. This crate keeps both sides honest:
//!
//! - The **leader** broadcasts a heartbeat carrying its latest proposal
//!   sequence on every clock tick, and falls silent as soon as the consensus
//!   engine marks its view inactive.
//! - A **follower** keeps a deadline. A qualifying heartbeat from the watched
//!   leader pushes it out by one timeout window; crossing it notifies the
//!   [`HeartbeatTimeoutHandler`](vigil_core::HeartbeatTimeoutHandler) exactly
//!   once until the watchdog is re-armed.
//!
//! # Qualifying heartbeats
//!
//! A message resets the follower deadline only if it is a heartbeat, comes
//! from the watched leader, carries the current view and, while the local view
//! is active, claims at most one proposal more than the local node has seen.
//! Everything else is ignored without error.
//!
//! # Architecture
//!
//! ```text
//!  Ticker / test clock ──┐
//!  change_role() ────────┼──► EventLoop (one task) ──► HeartbeatState::handle()
//!  process_msg() ────────┘            │                          │
//!                                     ◄──────── Vec<Action> ─────┘
//!                                     ├──► Communicator::broadcast
//!                                     └──► HeartbeatTimeoutHandler::on_heartbeat_timeout
//! ```
//!
//! [`HeartbeatState`] is synchronous and deterministic; [`HeartbeatMonitor`]
//! owns it on a single tokio task so it never needs a lock.

mod config;
mod monitor;
mod state;
mod ticker;

pub use config::{ConfigError, HeartbeatConfig};
pub use monitor::{HeartbeatMonitor, HeartbeatMonitorBuilder, MonitorError};
pub use state::HeartbeatState;
pub use ticker::Ticker;
