// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Event-Sourced Persistence Layer
//!
//! # Architecture
//! - Stream log files = primary truth (append-only, durable)
//! - Snapshots = performance optimization (disposable)
//! - Commit barrier = the only path from commands to envelopes
//!
//! # Guarantees
//! - Envelopes are fsync'd before they become visible
//! - Crash-symmetric recovery via replay
//! - No partial batches
//! - Deterministic across architectures

pub use cim_log::event_log;
pub mod event_replay;
pub mod event_commit;
pub mod event_proof;

pub use event_log::{read_stream_log, EventLogWriter};
pub use event_replay::recover_streams;
pub use event_commit::{CommandOutcome, EventCommitter};
pub use event_proof::generate_proof;
