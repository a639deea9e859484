// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Deterministic Replay Logic.

use core::borrow::Borrow;

use crate::aggregate::Aggregate;
use crate::envelope::Envelope;
use crate::error::KernelError;
use crate::types::Sequence;

/// A durable envelope that the fold refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayFailure {
    pub sequence: Sequence,
    pub cause: KernelError,
}

/// Decodes one envelope and folds it into `state`.
pub fn apply_envelope<A: Aggregate>(state: &mut A, envelope: &Envelope) -> Result<(), ReplayFailure> {
    let fail = |cause| ReplayFailure {
        sequence: envelope.sequence,
        cause,
    };
    let event: A::Event = envelope.decode().map_err(fail)?;
    state.apply(&event).map_err(fail)
}

/// Folds `envelopes` on top of `base`.
pub fn replay_from<A, I, E>(mut base: A, envelopes: I) -> Result<A, ReplayFailure>
where
    A: Aggregate,
    I: IntoIterator<Item = E>,
    E: Borrow<Envelope>,
{
    for envelope in envelopes {
        apply_envelope(&mut base, envelope.borrow())?;
    }
    Ok(base)
}

/// Rebuilds an aggregate from sequence 0.
pub fn replay<A, I, E>(envelopes: I) -> Result<A, ReplayFailure>
where
    A: Aggregate,
    I: IntoIterator<Item = E>,
    E: Borrow<Envelope>,
{
    replay_from(A::default(), envelopes)
}
