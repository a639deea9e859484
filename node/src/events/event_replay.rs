// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Stream Recovery
//!
//! Rebuilds the store's in-memory index from the log directory.
//! The log always wins; snapshots are never persisted, so there is nothing
//! else to reconcile.
//!
//! # Invariants
//! - Corrupted frame → fail closed
//! - Torn trailing frame → discarded, file truncated
//! - Log without a complete header → removed (it never held an envelope)
//! - Broken chain → fail closed (when verification is enabled)

use cim_kernel::envelope::Envelope;
use cim_kernel::types::id::StreamId;
use cim_kernel::verify::{verify_chain, ChainBreak, VerificationResult};
use cim_log::layout::list_staging;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::events::event_log::{EventLogError, EventLogWriter};

pub use cim_log::layout::{list_logs, sealed_marker, SEALED_EXTENSION};

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Log {path:?} unreadable: {source}")]
    Log {
        path: PathBuf,
        #[source]
        source: EventLogError,
    },

    #[error("Stream {0} has more than one log file")]
    DuplicateStream(StreamId),

    #[error("Chain of stream {stream_id} broken at sequence {}", chain_break.sequence)]
    ChainMismatch {
        stream_id: StreamId,
        chain_break: ChainBreak,
    },
}

pub type Result<T> = std::result::Result<T, ReplayError>;

pub struct RecoveredStream {
    pub stream_id: StreamId,
    pub writer: EventLogWriter,
    pub envelopes: Vec<Envelope>,
    pub sealed: bool,
}

/// Removes a log that was torn before its header was complete.
fn discard_headerless(path: &Path, len: usize) -> Result<()> {
    tracing::warn!("Discarding log {:?} with incomplete header ({} bytes)", path, len);
    std::fs::remove_file(path)?;
    let marker = sealed_marker(path);
    if marker.exists() {
        std::fs::remove_file(marker)?;
    }
    metrics::increment_counter!("cim_discarded_logs_total");
    Ok(())
}

/// Opens every stream log under `dir` for appending.
pub fn recover_streams(dir: &Path, fsync: bool, verify: bool) -> Result<Vec<RecoveredStream>> {
    let start = std::time::Instant::now();
    let mut seen = HashSet::new();
    let mut recovered = Vec::new();

    for staged in list_staging(dir)? {
        tracing::warn!("Removing leftover staging file {:?}", staged);
        std::fs::remove_file(&staged)?;
    }

    for path in list_logs(dir)? {
        let (writer, contents) = match EventLogWriter::open(&path, fsync) {
            Ok(opened) => opened,
            Err(EventLogError::IncompleteHeader { len }) => {
                discard_headerless(&path, len)?;
                continue;
            }
            Err(source) => {
                return Err(ReplayError::Log {
                    path: path.clone(),
                    source,
                })
            }
        };

        if !seen.insert(contents.stream_id.clone()) {
            return Err(ReplayError::DuplicateStream(contents.stream_id));
        }

        if verify {
            if let VerificationResult::Broken(chain_break) = verify_chain(&contents.stream_id, &contents.envelopes) {
                tracing::error!(
                    "Chain of stream {} broken at sequence {} ({:?})",
                    contents.stream_id,
                    chain_break.sequence,
                    chain_break.kind
                );
                metrics::increment_counter!("cim_chain_breaks_total");
                return Err(ReplayError::ChainMismatch {
                    stream_id: contents.stream_id,
                    chain_break,
                });
            }
        }

        let sealed = sealed_marker(&path).exists();
        tracing::debug!(
            "Recovered stream {} ({} envelopes{})",
            contents.stream_id,
            contents.envelopes.len(),
            if sealed { ", sealed" } else { "" }
        );

        recovered.push(RecoveredStream {
            stream_id: contents.stream_id,
            writer,
            envelopes: contents.envelopes,
            sealed,
        });
    }

    metrics::histogram!("cim_recovery_duration_seconds", start.elapsed().as_secs_f64());
    tracing::info!("Recovered {} streams from {:?} in {:?}", recovered.len(), dir, start.elapsed());
    Ok(recovered)
}
