//! Shared view/sequence snapshot.
//!
//! The consensus engine owns the current view's liveness and its latest
//! proposal sequence. Liveness components only ever read it, and always as a
//! single value: `view_active` and `proposal_seq` are never observed from two
//! different writes.

use std::sync::Arc;
use tokio::sync::watch;

/// Whether the local view is still live, and the latest proposal sequence
/// known in that view.
///
/// The default value describes a node that has not yet started a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ViewSequence {
    /// False once the view has been abandoned (e.g. a view change started).
    pub view_active: bool,
    /// Latest proposal sequence observed in the view.
    pub proposal_seq: u64,
}

impl ViewSequence {
    /// Snapshot of an active view at the given proposal sequence.
    pub fn active(proposal_seq: u64) -> Self {
        Self {
            view_active: true,
            proposal_seq,
        }
    }

    /// Snapshot of an abandoned view that stopped at the given sequence.
    pub fn inactive(proposal_seq: u64) -> Self {
        Self {
            view_active: false,
            proposal_seq,
        }
    }
}

/// Read side of the shared view/sequence state.
///
/// Implementations must be linearizable: `snapshot` returns one coherent
/// value, never a mix of two writes.
pub trait ViewSequenceSource: Send + Sync {
    /// Take a snapshot of the current view/sequence state.
    fn snapshot(&self) -> ViewSequence;
}

/// Single-writer, multi-reader cell publishing [`ViewSequence`] values.
///
/// Backed by a `tokio::sync::watch` channel, so writers replace the whole
/// value in one step and readers can also await changes via [`subscribe`].
///
/// Cloning the cell shares the same underlying value.
///
/// [`subscribe`]: ViewSequenceCell::subscribe
#[derive(Debug, Clone)]
pub struct ViewSequenceCell {
    tx: Arc<watch::Sender<ViewSequence>>,
}

impl ViewSequenceCell {
    /// Create a cell holding `initial`.
    pub fn new(initial: ViewSequence) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    /// Publish a new value, replacing the previous one.
    pub fn store(&self, value: ViewSequence) {
        self.tx.send_replace(value);
    }

    /// Atomically modify the current value.
    pub fn update<F>(&self, modify: F)
    where
        F: FnOnce(&mut ViewSequence),
    {
        self.tx.send_modify(modify);
    }

    /// Receiver that observes every subsequent publish.
    pub fn subscribe(&self) -> watch::Receiver<ViewSequence> {
        self.tx.subscribe()
    }
}

impl Default for ViewSequenceCell {
    fn default() -> Self {
        Self::new(ViewSequence::default())
    }
}

impl ViewSequenceSource for ViewSequenceCell {
    fn snapshot(&self) -> ViewSequence {
        *self.tx.borrow()
    }
}

impl ViewSequenceSource for watch::Receiver<ViewSequence> {
    fn snapshot(&self) -> ViewSequence {
        *self.borrow()
    }
}
