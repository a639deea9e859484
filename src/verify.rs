// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Hash-chain verification.

use core::borrow::Borrow;
use serde::{Deserialize, Serialize};

use crate::cid::Cid;
use crate::envelope::Envelope;
use crate::types::id::StreamId;
use crate::types::Sequence;

/// What went wrong at the first divergent envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakKind {
    /// Envelope belongs to a different stream.
    ForeignStream,
    /// Sequence number skips or repeats.
    SequenceGap,
    /// `previous_cid` does not match the prior envelope's `cid`.
    LinkMismatch,
    /// Recomputed CID differs from the stored one.
    ContentMismatch,
}

/// First point where a stream stops being a valid chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainBreak {
    pub sequence: Sequence,
    pub kind: BreakKind,
    pub expected: Option<Cid>,
    pub actual: Option<Cid>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationResult {
    Intact { length: u64, head: Option<Cid> },
    Broken(ChainBreak),
}

impl VerificationResult {
    pub fn is_intact(&self) -> bool {
        matches!(self, VerificationResult::Intact { .. })
    }

    pub fn chain_break(&self) -> Option<&ChainBreak> {
        match self {
            VerificationResult::Broken(b) => Some(b),
            VerificationResult::Intact { .. } => None,
        }
    }
}

/// Incremental verifier: feed envelopes in order, stop at the first break.
#[derive(Clone, Debug)]
pub struct ChainVerifier {
    stream_id: StreamId,
    next_sequence: Sequence,
    previous: Option<Cid>,
}

impl ChainVerifier {
    pub fn new(stream_id: StreamId) -> Self {
        Self {
            stream_id,
            next_sequence: 0,
            previous: None,
        }
    }

    /// Checks one envelope against everything seen so far.
    pub fn check(&mut self, envelope: &Envelope) -> Result<(), ChainBreak> {
        let sequence = self.next_sequence;

        if envelope.stream_id != self.stream_id {
            return Err(ChainBreak {
                sequence,
                kind: BreakKind::ForeignStream,
                expected: None,
                actual: Some(envelope.cid),
            });
        }

        if envelope.sequence != sequence {
            return Err(ChainBreak {
                sequence,
                kind: BreakKind::SequenceGap,
                expected: None,
                actual: Some(envelope.cid),
            });
        }

        if envelope.previous_cid != self.previous {
            return Err(ChainBreak {
                sequence,
                kind: BreakKind::LinkMismatch,
                expected: self.previous,
                actual: envelope.previous_cid,
            });
        }

        let recomputed = envelope.expected_cid();
        if recomputed != envelope.cid {
            return Err(ChainBreak {
                sequence,
                kind: BreakKind::ContentMismatch,
                expected: Some(recomputed),
                actual: Some(envelope.cid),
            });
        }

        self.previous = Some(envelope.cid);
        self.next_sequence += 1;
        Ok(())
    }

    pub fn length(&self) -> u64 {
        self.next_sequence
    }

    pub fn head(&self) -> Option<Cid> {
        self.previous
    }

    pub fn finish(self) -> VerificationResult {
        VerificationResult::Intact {
            length: self.next_sequence,
            head: self.previous,
        }
    }
}

/// Walks `envelopes` in order and reports the first mismatch, if any.
pub fn verify_chain<I, E>(stream_id: &StreamId, envelopes: I) -> VerificationResult
where
    I: IntoIterator<Item = E>,
    E: Borrow<Envelope>,
{
    let mut verifier = ChainVerifier::new(stream_id.clone());
    for envelope in envelopes {
        if let Err(chain_break) = verifier.check(envelope.borrow()) {
            return VerificationResult::Broken(chain_break);
        }
    }
    verifier.finish()
}
