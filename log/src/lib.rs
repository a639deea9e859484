// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! On-disk stream logs.
//!
//! The file format and directory layout shared by the node (which appends)
//! and the offline verifier (which only reads). Depends on the kernel alone.

pub mod event_log;
pub mod export;
pub mod layout;

pub use event_log::{log_file_name, read_stream_log, EventLogError, EventLogWriter, LogContents};
pub use export::{ExportedEnvelope, StreamExport};
pub use layout::{list_logs, sealed_marker, SEALED_EXTENSION};
