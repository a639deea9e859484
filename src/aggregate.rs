// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! The fold contract every aggregate type implements.

use alloc::vec::Vec;
use core::fmt::Debug;
use serde::Serialize;

use crate::error::KernelResult;
use crate::event::DomainEvent;
use crate::types::id::Version;

/// Materialized state built by folding a stream's events in order.
///
/// `apply` is a pure fold step: no clock, no I/O, no randomness. It must
/// validate before mutating, so an `Err` leaves the state exactly as it was.
/// `handle` turns a command into the events it would emit against the
/// current state without mutating anything.
pub trait Aggregate: Clone + Default + Debug + Serialize + Send + Sync + 'static {
    type Event: DomainEvent;
    type Command: Clone + Debug + Send + Sync + 'static;

    /// Short name of the aggregate type, used in proofs and logs.
    const KIND: &'static str;

    fn apply(&mut self, event: &Self::Event) -> KernelResult<()>;

    fn handle(&self, command: &Self::Command) -> KernelResult<Vec<Self::Event>>;

    /// Number of events folded so far.
    fn version(&self) -> Version;

    /// BLAKE3 digest of the canonical state.
    fn digest(&self) -> [u8; 32];
}
