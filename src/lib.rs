// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
#![no_std]

//! cim-kernel: content-addressed event envelopes, hash-chain verification and
//! deterministic aggregate folds. No I/O, no clock, no global state.

extern crate alloc;

#[cfg(test)]
#[macro_use]
extern crate std;

pub mod config;
pub mod error;
pub mod fxp;
pub mod types;
pub mod cid;
pub mod event;
pub mod envelope;
pub mod verify;
pub mod aggregate;
pub mod replay;
pub mod graph;
pub mod dialog;
pub mod digest;
pub mod proof;

#[cfg(test)]
pub mod tests;
