// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Core value types shared by envelopes and aggregates.

pub mod id;
pub mod enums;
pub mod scalar;
pub mod attrs;

/// Position of an envelope within its stream, starting at 0.
pub type Sequence = u64;

/// Wall-clock milliseconds since the Unix epoch.
pub type TimestampMs = u64;
