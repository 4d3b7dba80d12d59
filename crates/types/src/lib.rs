//! Core types for vigil.
//!
//! This crate provides the foundational types used by the liveness
//! components:
//!
//! - **Identifiers**: [`ValidatorId`]
//! - **Shared protocol state**: [`ViewSequence`], published by the consensus
//!   engine through a [`ViewSequenceCell`] and read through [`ViewSequenceSource`]
//!
//! # Design Philosophy
//!
//! This crate does not depend on any other workspace crates, making it the
//! foundation layer.

mod identifiers;
mod view_sequence;

pub use identifiers::ValidatorId;
pub use view_sequence::{ViewSequence, ViewSequenceCell, ViewSequenceSource};
