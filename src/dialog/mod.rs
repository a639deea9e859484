// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Dialog aggregate: an ordered transcript of turns with derived metrics.

pub mod events;
pub mod metrics;
pub mod state;

pub use events::{DialogCommand, DialogEvent};
pub use metrics::{CumulativePolicy, DialogMetrics, EmaPolicy, MetricsPolicy};
pub use state::{DialogState, Turn};
