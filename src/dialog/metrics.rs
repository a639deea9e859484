// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Incremental dialog metrics.
//!
//! Every counter is updated in O(1) per turn. Averages are kept as exact
//! integer totals; only the sentiment trend and coherence are Q16.16.

use core::fmt::Debug;
use serde::Serialize;

use crate::dialog::state::Turn;
use crate::fxp::ops::{fxp_add, fxp_mul, fxp_ratio, fxp_sub};
use crate::types::enums::SpeakerRole;
use crate::types::scalar::FxpScalar;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DialogMetrics {
    pub turns: u64,
    pub tokens_total: u64,
    /// Sum of user-to-assistant response gaps.
    pub response_total_ms: u64,
    pub response_samples: u64,
    pub sentiment_samples: u64,
    pub sentiment_trend: FxpScalar,
    /// Turns whose speaker differs from the previous turn's.
    pub alternating_turns: u64,
    pub coherence: FxpScalar,
}

impl DialogMetrics {
    /// Running average response time, if any response has been observed.
    pub fn average_response_ms(&self) -> Option<u64> {
        if self.response_samples == 0 {
            None
        } else {
            Some(self.response_total_ms / self.response_samples)
        }
    }
}

/// How turn observations fold into [`DialogMetrics`].
///
/// Implementations choose the sentiment smoothing; turn, token, response-time
/// and coherence accounting are shared.
pub trait MetricsPolicy: Clone + Default + Debug + Send + Sync + 'static {
    const NAME: &'static str;

    /// New sentiment trend after observing `sample`.
    /// `seen` is the number of samples folded before this one.
    fn blend_sentiment(&self, trend: FxpScalar, seen: u64, sample: FxpScalar) -> FxpScalar;

    fn observe(&self, metrics: &mut DialogMetrics, previous: Option<&Turn>, turn: &Turn) {
        metrics.turns += 1;
        metrics.tokens_total += turn.tokens as u64;

        let alternates = previous.map_or(true, |p| p.role != turn.role);
        if alternates {
            metrics.alternating_turns += 1;
        }
        metrics.coherence = fxp_ratio(metrics.alternating_turns, metrics.turns);

        if let Some(prev) = previous {
            if prev.role == SpeakerRole::User && turn.role == SpeakerRole::Assistant {
                metrics.response_total_ms += turn.at_ms.saturating_sub(prev.at_ms);
                metrics.response_samples += 1;
            }
        }

        if let Some(sample) = turn.sentiment {
            metrics.sentiment_trend = if metrics.sentiment_samples == 0 {
                sample
            } else {
                self.blend_sentiment(metrics.sentiment_trend, metrics.sentiment_samples, sample)
            };
            metrics.sentiment_samples += 1;
        }
    }
}

/// Exponential moving average: `trend += alpha * (sample - trend)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EmaPolicy {
    pub alpha: FxpScalar,
}

impl Default for EmaPolicy {
    fn default() -> Self {
        Self { alpha: FxpScalar::HALF }
    }
}

impl MetricsPolicy for EmaPolicy {
    const NAME: &'static str = "ema";

    fn blend_sentiment(&self, trend: FxpScalar, _seen: u64, sample: FxpScalar) -> FxpScalar {
        fxp_add(trend, fxp_mul(self.alpha, fxp_sub(sample, trend)))
    }
}

/// Plain running mean of every sample.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CumulativePolicy;

impl MetricsPolicy for CumulativePolicy {
    const NAME: &'static str = "cumulative";

    fn blend_sentiment(&self, trend: FxpScalar, seen: u64, sample: FxpScalar) -> FxpScalar {
        let weight = fxp_ratio(1, seen + 1);
        fxp_add(trend, fxp_mul(weight, fxp_sub(sample, trend)))
    }
}
