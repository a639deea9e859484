// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Stream Store
//!
//! Append-only envelopes keyed by stream. One writer at a time per stream
//! (a per-stream mutex), any number of concurrent readers. Each append is a
//! compare-and-swap on the stream head CID:
//!
//! ```text
//! lock writer → compare head → seal envelopes → persist (fsync) → publish → unlock
//! ```
//!
//! Readers only ever see the published prefix, so a partially written batch
//! is never observable.
//!
//! Every published envelope is also indexed by CID. A CID commits to its
//! stream and sequence, so it names exactly one envelope in the store.

use cim_kernel::cid::Cid;
use cim_kernel::envelope::Envelope;
use cim_kernel::event::EventPayload;
use cim_kernel::types::id::StreamId;
use cim_kernel::types::Sequence;
use cim_kernel::verify::{verify_chain, VerificationResult};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use crate::config::{RetentionPolicy, StoreConfig};
use crate::errors::{StoreError, StoreResult};
use crate::events::event_log::{log_file_name, EventLogError, EventLogWriter};
use crate::events::event_replay::{recover_streams, sealed_marker};

pub use cim_log::export::{ExportedEnvelope, StreamExport};

struct StreamWriter {
    log: Option<EventLogWriter>,
    sealed: bool,
}

impl StreamWriter {
    /// Marks the stream sealed, persisting a marker next to its log file.
    fn seal(&mut self, stream_id: &StreamId) -> StoreResult<()> {
        if let Some(file) = self.log.as_ref() {
            std::fs::write(sealed_marker(file.path()), stream_id.as_str().as_bytes()).map_err(EventLogError::from)?;
        }
        self.sealed = true;
        Ok(())
    }
}

pub(crate) struct StreamLog {
    stream_id: StreamId,
    writer: Mutex<StreamWriter>,
    published: RwLock<Vec<Arc<Envelope>>>,
}

impl StreamLog {
    fn new(stream_id: StreamId, log: Option<EventLogWriter>, envelopes: Vec<Envelope>, sealed: bool) -> Self {
        Self {
            stream_id,
            writer: Mutex::new(StreamWriter { log, sealed }),
            published: RwLock::new(envelopes.into_iter().map(Arc::new).collect()),
        }
    }

    fn len(&self) -> u64 {
        self.published.read().len() as u64
    }

    fn head(&self) -> Option<Arc<Envelope>> {
        self.published.read().last().cloned()
    }

    fn get(&self, sequence: Sequence) -> Option<Arc<Envelope>> {
        let index = usize::try_from(sequence).ok()?;
        self.published.read().get(index).cloned()
    }
}

/// Lazy, ordered, restartable iterator over a stream range.
///
/// The upper bound is fixed when the range is created; envelopes appended
/// afterwards are not included.
#[derive(Clone)]
pub struct EnvelopeRange {
    log: Arc<StreamLog>,
    start: Sequence,
    end: Sequence,
    cursor: Sequence,
}

impl EnvelopeRange {
    pub fn stream_id(&self) -> &StreamId {
        &self.log.stream_id
    }

    /// First sequence in the range.
    pub fn start(&self) -> Sequence {
        self.start
    }

    /// One past the last sequence in the range.
    pub fn end(&self) -> Sequence {
        self.end
    }

    /// Rewinds to the first envelope of the range.
    pub fn restart(&mut self) {
        self.cursor = self.start;
    }
}

impl Iterator for EnvelopeRange {
    type Item = Arc<Envelope>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.end {
            return None;
        }
        let envelope = self.log.get(self.cursor)?;
        self.cursor += 1;
        Some(envelope)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.end.saturating_sub(self.cursor) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for EnvelopeRange {}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub streams: usize,
    pub envelopes: u64,
    pub sealed: usize,
}

type CidIndex = HashMap<Cid, (StreamId, Sequence)>;

pub struct StreamStore {
    config: StoreConfig,
    streams: RwLock<HashMap<StreamId, Arc<StreamLog>>>,
    cids: RwLock<CidIndex>,
    closed: AtomicBool,
}

fn index_envelopes<'a>(index: &mut CidIndex, envelopes: impl IntoIterator<Item = &'a Envelope>) {
    for envelope in envelopes {
        if let Some((stream_id, sequence)) = index.get(&envelope.cid) {
            tracing::warn!(
                "CID {} of {} at {} already indexed for {} at {}",
                envelope.cid,
                envelope.stream_id,
                envelope.sequence,
                stream_id,
                sequence
            );
            continue;
        }
        index.insert(envelope.cid, (envelope.stream_id.clone(), envelope.sequence));
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl StreamStore {
    /// Opens the store, recovering every stream under `data_dir` if one is set.
    pub fn open(config: StoreConfig) -> StoreResult<Self> {
        let mut streams = HashMap::new();
        let mut cids = CidIndex::new();

        if let Some(dir) = &config.data_dir {
            std::fs::create_dir_all(dir).map_err(EventLogError::from)?;
            for recovered in recover_streams(dir, config.fsync, config.verify_on_open)? {
                index_envelopes(&mut cids, &recovered.envelopes);
                let log = StreamLog::new(
                    recovered.stream_id.clone(),
                    Some(recovered.writer),
                    recovered.envelopes,
                    recovered.sealed,
                );
                streams.insert(recovered.stream_id, Arc::new(log));
            }
        }

        Ok(Self {
            config,
            streams: RwLock::new(streams),
            cids: RwLock::new(cids),
            closed: AtomicBool::new(false),
        })
    }

    /// A store that keeps everything in memory.
    pub fn in_memory() -> Self {
        Self {
            config: StoreConfig::default(),
            streams: RwLock::new(HashMap::new()),
            cids: RwLock::new(CidIndex::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn log(&self, stream_id: &StreamId) -> Option<Arc<StreamLog>> {
        self.streams.read().get(stream_id).cloned()
    }

    fn log_or_create(&self, stream_id: &StreamId) -> Arc<StreamLog> {
        if let Some(log) = self.log(stream_id) {
            return log;
        }
        self.streams
            .write()
            .entry(stream_id.clone())
            .or_insert_with(|| Arc::new(StreamLog::new(stream_id.clone(), None, Vec::new(), false)))
            .clone()
    }

    fn known_log(&self, stream_id: &StreamId) -> StoreResult<Arc<StreamLog>> {
        match self.log(stream_id) {
            Some(log) if log.len() > 0 => Ok(log),
            _ => Err(StoreError::UnknownStream(stream_id.clone())),
        }
    }

    /// Appends one payload, retrying on head races.
    pub fn append(&self, stream_id: &StreamId, payload: EventPayload) -> StoreResult<Arc<Envelope>> {
        let mut envelopes = self.append_batch(stream_id, vec![payload])?;
        envelopes.pop().ok_or(StoreError::EmptyBatch)
    }

    /// Appends payloads as one atomic batch, retrying on head races up to
    /// `max_append_retries` times.
    pub fn append_batch(&self, stream_id: &StreamId, payloads: Vec<EventPayload>) -> StoreResult<Vec<Arc<Envelope>>> {
        let mut attempt = 0;
        loop {
            let expected = self.head(stream_id).map(|e| e.cid);
            match self.append_expected(stream_id, expected.as_ref(), payloads.clone()) {
                Err(StoreError::ConcurrentAppendConflict { .. }) if attempt < self.config.max_append_retries => {
                    attempt += 1;
                    tracing::debug!("Append to {} lost head race, retry {}", stream_id, attempt);
                    std::thread::yield_now();
                }
                other => return other,
            }
        }
    }

    /// Compare-and-swap append: succeeds only if the head CID is still `expected`.
    ///
    /// `expected == None` means the caller believes the stream is empty.
    pub fn append_expected(
        &self,
        stream_id: &StreamId,
        expected: Option<&Cid>,
        payloads: Vec<EventPayload>,
    ) -> StoreResult<Vec<Arc<Envelope>>> {
        if payloads.is_empty() {
            return Err(StoreError::EmptyBatch);
        }
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }

        let log = match (self.log(stream_id), expected) {
            (Some(log), _) => log,
            // A stream nobody has appended to has no head to match.
            (None, Some(expected)) => {
                metrics::increment_counter!("cim_append_conflicts_total");
                return Err(StoreError::ConcurrentAppendConflict {
                    stream_id: stream_id.clone(),
                    expected: Some(*expected),
                    actual: None,
                });
            }
            (None, None) => self.log_or_create(stream_id),
        };
        let mut writer = log.writer.lock();

        if writer.sealed {
            return Err(StoreError::StreamArchived(stream_id.clone()));
        }

        let (head, next_sequence) = {
            let published = log.published.read();
            (published.last().map(|e| e.cid), published.len() as u64)
        };
        if head.as_ref() != expected {
            metrics::increment_counter!("cim_append_conflicts_total");
            return Err(StoreError::ConcurrentAppendConflict {
                stream_id: stream_id.clone(),
                expected: expected.copied(),
                actual: head,
            });
        }

        let count = payloads.len() as u64;
        if let RetentionPolicy::SealAfter(limit) = self.config.retention {
            if next_sequence + count > limit {
                return Err(StoreError::StreamArchived(stream_id.clone()));
            }
        }

        let start = Instant::now();
        let recorded_at = now_millis();
        let mut envelopes = Vec::with_capacity(payloads.len());
        let mut previous = head;
        for (i, payload) in payloads.into_iter().enumerate() {
            let envelope = Envelope::seal(stream_id.clone(), next_sequence + i as u64, previous, payload, recorded_at);
            previous = Some(envelope.cid);
            envelopes.push(envelope);
        }

        if let Some(dir) = &self.config.data_dir {
            if writer.log.is_none() {
                let path = dir.join(log_file_name(stream_id));
                writer.log = Some(EventLogWriter::create(&path, stream_id, self.config.fsync)?);
            }
        }
        if let Some(file) = writer.log.as_mut() {
            file.append_batch(&envelopes)?;
        }

        let envelopes: Vec<Arc<Envelope>> = envelopes.into_iter().map(Arc::new).collect();
        log.published.write().extend(envelopes.iter().cloned());
        index_envelopes(&mut self.cids.write(), envelopes.iter().map(|e| e.as_ref()));

        if let RetentionPolicy::SealAfter(limit) = self.config.retention {
            if next_sequence + count >= limit {
                // The batch is already durable; a missing marker only loses the flag on restart.
                if let Err(e) = writer.seal(stream_id) {
                    tracing::warn!("Failed to persist seal of {}: {}", stream_id, e);
                    writer.sealed = true;
                }
                tracing::info!("Stream {} reached {} envelopes and is now sealed", stream_id, limit);
            }
        }

        metrics::counter!("cim_envelopes_appended_total", count);
        metrics::histogram!("cim_append_duration_seconds", start.elapsed().as_secs_f64());
        tracing::debug!(
            "Appended {} envelope(s) to {} at sequence {}",
            count,
            stream_id,
            next_sequence
        );

        Ok(envelopes)
    }

    /// Envelopes `from..=to`, clamped to the head at call time.
    pub fn read(&self, stream_id: &StreamId, from: Sequence, to: Sequence) -> StoreResult<EnvelopeRange> {
        let log = self.known_log(stream_id)?;
        let len = log.len();
        let end = to.saturating_add(1).min(len);
        let start = from.min(end);
        Ok(EnvelopeRange {
            log,
            start,
            end,
            cursor: start,
        })
    }

    /// Every envelope published so far.
    pub fn read_all(&self, stream_id: &StreamId) -> StoreResult<EnvelopeRange> {
        self.read(stream_id, 0, Sequence::MAX)
    }

    /// Latest envelope, or `None` for a stream that has never been appended to.
    pub fn head(&self, stream_id: &StreamId) -> Option<Arc<Envelope>> {
        self.log(stream_id).and_then(|log| log.head())
    }

    pub fn envelope_at(&self, stream_id: &StreamId, sequence: Sequence) -> Option<Arc<Envelope>> {
        self.log(stream_id).and_then(|log| log.get(sequence))
    }

    /// Stream and sequence of the envelope with this CID.
    pub fn locate(&self, cid: &Cid) -> Option<(StreamId, Sequence)> {
        self.cids.read().get(cid).cloned()
    }

    pub fn envelope_by_cid(&self, cid: &Cid) -> Option<Arc<Envelope>> {
        let (stream_id, sequence) = self.locate(cid)?;
        self.envelope_at(&stream_id, sequence)
    }

    /// The envelope with this CID and up to `max_depth` of its predecessors,
    /// oldest first.
    pub fn read_ancestry(&self, cid: &Cid, max_depth: u64) -> StoreResult<EnvelopeRange> {
        let (stream_id, sequence) = self.locate(cid).ok_or(StoreError::UnknownCid(*cid))?;
        self.read(&stream_id, sequence.saturating_sub(max_depth), sequence)
    }

    /// Number of envelopes in the stream (0 if unknown).
    pub fn len(&self, stream_id: &StreamId) -> u64 {
        self.log(stream_id).map_or(0, |log| log.len())
    }

    pub fn contains(&self, stream_id: &StreamId) -> bool {
        self.len(stream_id) > 0
    }

    /// Walks the stream prefix visible now and checks every link and CID.
    pub fn verify(&self, stream_id: &StreamId) -> StoreResult<VerificationResult> {
        let range = self.read_all(stream_id)?;
        let result = verify_chain(stream_id, range);
        if let VerificationResult::Broken(chain_break) = &result {
            metrics::increment_counter!("cim_chain_breaks_total");
            tracing::error!(
                "Chain of stream {} broken at sequence {} ({:?})",
                stream_id,
                chain_break.sequence,
                chain_break.kind
            );
        }
        Ok(result)
    }

    /// Seals the stream: it stays readable but rejects appends.
    pub fn archive(&self, stream_id: &StreamId) -> StoreResult<()> {
        let log = self.known_log(stream_id)?;
        let mut writer = log.writer.lock();
        if writer.sealed {
            return Ok(());
        }
        writer.seal(stream_id)?;
        tracing::info!("Archived stream {}", stream_id);
        Ok(())
    }

    pub fn is_sealed(&self, stream_id: &StreamId) -> bool {
        self.log(stream_id).map_or(false, |log| log.writer.lock().sealed)
    }

    /// Identifiers of every non-empty stream, sorted.
    pub fn stream_ids(&self) -> Vec<StreamId> {
        let mut ids: Vec<StreamId> = self
            .streams
            .read()
            .values()
            .filter(|log| log.len() > 0)
            .map(|log| log.stream_id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn stats(&self) -> StoreStats {
        let streams = self.streams.read();
        let mut stats = StoreStats::default();
        for log in streams.values() {
            let len = log.len();
            if len == 0 {
                continue;
            }
            stats.streams += 1;
            stats.envelopes += len;
            if log.writer.lock().sealed {
                stats.sealed += 1;
            }
        }
        stats
    }

    pub fn export(&self, stream_id: &StreamId) -> StoreResult<StreamExport> {
        let envelopes: Vec<Arc<Envelope>> = self.read_all(stream_id)?.collect();
        Ok(StreamExport::full(
            stream_id.clone(),
            envelopes.iter().map(|e| e.as_ref()),
            self.is_sealed(stream_id),
        ))
    }

    /// Export of the envelope with CID `root` and up to `max_depth` of its
    /// predecessors.
    pub fn export_from(&self, root: &Cid, max_depth: u64) -> StoreResult<StreamExport> {
        let range = self.read_ancestry(root, max_depth)?;
        let stream_id = range.stream_id().clone();
        let length = self.len(&stream_id);
        Ok(StreamExport {
            head_cid: self.head(&stream_id).map(|e| e.cid),
            sealed: self.is_sealed(&stream_id),
            root_cid: Some(*root),
            envelopes: range.map(|e| ExportedEnvelope::from(e.as_ref())).collect(),
            stream_id,
            length,
        })
    }

    /// fsyncs every stream log.
    pub fn flush(&self) -> StoreResult<()> {
        let logs: Vec<Arc<StreamLog>> = self.streams.read().values().cloned().collect();
        for log in logs {
            if let Some(file) = log.writer.lock().log.as_mut() {
                file.sync()?;
            }
        }
        Ok(())
    }

    /// Flushes and stops accepting appends. Reads keep working.
    pub fn close(&self) -> StoreResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.flush()?;
        tracing::info!("Stream store closed");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
