//! Two-bar breakout/retracement detector
//!
//! For each candle pair `(prev, curr)` the detector asks whether `curr` broke
//! `prev`'s high (Up) or low (Down) and how much of `prev`'s range it gave back.
//! Only pairs with three candles of look-ahead after `curr` are examined, so every
//! emitted event can be classified by [`super::ForwardTargetClassifier`].

use std::{collections::HashMap, iter::FusedIterator};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::helpers::{
    is_breakout, opened_beyond, pct_of_range, usable_prev, DEFAULT_GAP_THRESHOLD,
    DEFAULT_QUALIFYING_THRESHOLD, DEFAULT_TIER_MAX, DEFAULT_TIER_STEP, LOOKAHEAD,
};
use crate::{
    params::{get_checked, ParamMeta, ParameterizedDetector},
    resample::Timeframe,
    series::{Candle, CandleSeries},
    stats::{tier_count, TierLadder},
    Direction, Percent, Result,
};

impl_with_defaults!(RetracementDetector);

// ============================================================
// POLICY FLAGS
// ============================================================

/// How a gap open beyond the prior extreme is judged to be "already retraced".
///
/// `AsWritten` measures the pre-retracement from the prior extreme to the open
/// (`prev.high − curr.open` for Up, `curr.open − prev.low` for Down). For any open
/// beyond that extreme the measure is negative, so this rule never flags a gap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapRule {
    #[default]
    AsWritten,
    /// The gap itself spans at least `gap_threshold` percent of the prior range
    GapMagnitude,
    Disabled,
}

/// Distance measured for `retrace_pct`, relative to the prior candle's range
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetraceBasis {
    /// Up: `prev.high − curr.low`; Down: `curr.high − prev.low`
    #[default]
    FromPriorExtreme,
    /// `curr.high − curr.low` for both directions
    CandleRange,
}

// ============================================================
// EVENTS
// ============================================================

/// A qualifying breakout/retracement at `index`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PatternEvent {
    pub timeframe: Timeframe,
    pub direction: Direction,
    /// Index of the breakout candle; the prior candle is `index - 1`
    pub index: usize,
    pub timestamp: NaiveDateTime,
    pub is_gap: bool,
    /// Retracement as a percentage of the prior candle's range
    pub retrace_pct: f64,
}

// ============================================================
// DETECTOR
// ============================================================

/// Configurable breakout/retracement detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetracementDetector {
    pub qualifying_threshold: Percent,
    pub gap_threshold: Percent,
    pub gap_rule: GapRule,
    pub retrace_basis: RetraceBasis,
    pub tier_step: Percent,
    pub tier_max: Percent,
}

impl Default for RetracementDetector {
    fn default() -> Self {
        Self {
            qualifying_threshold: Percent::new_const(DEFAULT_QUALIFYING_THRESHOLD),
            gap_threshold: Percent::new_const(DEFAULT_GAP_THRESHOLD),
            gap_rule: GapRule::default(),
            retrace_basis: RetraceBasis::default(),
            tier_step: Percent::new_const(DEFAULT_TIER_STEP),
            tier_max: Percent::new_const(DEFAULT_TIER_MAX),
        }
    }
}

impl RetracementDetector {
    /// Lazily scan `series` for `direction` events.
    ///
    /// Indices `1..=len-4` are examined; shorter series yield nothing.
    pub fn detect<'a>(
        &'a self,
        series: &'a CandleSeries,
        timeframe: Timeframe,
        direction: Direction,
    ) -> PatternEvents<'a> {
        PatternEvents {
            detector: self,
            series,
            timeframe,
            direction,
            next: 1,
            end: series.len().saturating_sub(LOOKAHEAD),
        }
    }

    /// Evaluate the pair `(index - 1, index)` without the look-ahead bound
    pub fn detect_at(
        &self,
        series: &CandleSeries,
        timeframe: Timeframe,
        direction: Direction,
        index: usize,
    ) -> Option<PatternEvent> {
        if index < 1 {
            return None;
        }
        let prev = series.get(index - 1)?;
        let curr = series.get(index)?;

        if !usable_prev(prev) {
            trace!(index, "flat previous candle skipped");
            return None;
        }

        let is_gap = self.gap_qualifies(prev, curr, direction);
        if !is_breakout(prev, curr, direction) && !is_gap {
            return None;
        }

        let retrace_pct = self.retrace_pct(prev, curr, direction)?;
        if retrace_pct < self.qualifying_threshold.get() && !is_gap {
            return None;
        }

        Some(PatternEvent {
            timeframe,
            direction,
            index,
            timestamp: curr.timestamp,
            is_gap,
            retrace_pct,
        })
    }

    /// Retracement of `curr` relative to `prev.range`, per [`RetraceBasis`]
    pub fn retrace_pct(&self, prev: &Candle, curr: &Candle, direction: Direction) -> Option<f64> {
        let distance = match (self.retrace_basis, direction) {
            (RetraceBasis::FromPriorExtreme, Direction::Up) => prev.high - curr.low,
            (RetraceBasis::FromPriorExtreme, Direction::Down) => curr.high - prev.low,
            (RetraceBasis::CandleRange, _) => curr.high - curr.low,
        };
        pct_of_range(distance, prev.high - prev.low)
    }

    /// Gap-open qualification, per [`GapRule`]
    pub fn gap_qualifies(&self, prev: &Candle, curr: &Candle, direction: Direction) -> bool {
        if !opened_beyond(prev, curr, direction) {
            return false;
        }
        let measured = match (self.gap_rule, direction) {
            (GapRule::Disabled, _) => return false,
            (GapRule::AsWritten, Direction::Up) => prev.high - curr.open,
            (GapRule::AsWritten, Direction::Down) => curr.open - prev.low,
            (GapRule::GapMagnitude, Direction::Up) => curr.open - prev.high,
            (GapRule::GapMagnitude, Direction::Down) => prev.low - curr.open,
        };
        pct_of_range(measured, prev.high - prev.low)
            .is_some_and(|pct| pct >= self.gap_threshold.get())
    }

    /// Tier ladder described by `tier_step` and `tier_max`
    pub fn ladder(&self) -> Result<TierLadder> {
        TierLadder::new(self.tier_step, self.tier_max)
    }

    pub fn validate_config(&self) -> Result<()> {
        tier_count(self.tier_step, self.tier_max).map(|_| ())
    }
}

// ============================================================
// EVENT ITERATOR
// ============================================================

/// One-pass iterator over the events of a series; see [`RetracementDetector::detect`]
#[derive(Debug, Clone)]
pub struct PatternEvents<'a> {
    detector: &'a RetracementDetector,
    series: &'a CandleSeries,
    timeframe: Timeframe,
    direction: Direction,
    next: usize,
    end: usize,
}

impl<'a> Iterator for PatternEvents<'a> {
    type Item = PatternEvent;

    fn next(&mut self) -> Option<Self::Item> {
        while self.next < self.end {
            let index = self.next;
            self.next += 1;
            if let Some(event) =
                self.detector
                    .detect_at(self.series, self.timeframe, self.direction, index)
            {
                return Some(event);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.end.saturating_sub(self.next)))
    }
}

impl<'a> FusedIterator for PatternEvents<'a> {}

// ============================================================
// PARAMETER METADATA
// ============================================================

static RETRACEMENT_PARAMS: &[ParamMeta] = &[
    ParamMeta {
        name: "qualifying_threshold",
        default: DEFAULT_QUALIFYING_THRESHOLD,
        range: (25.0, 150.0, 25.0),
        description: "Minimum retracement as percent of prior range",
    },
    ParamMeta {
        name: "gap_threshold",
        default: DEFAULT_GAP_THRESHOLD,
        range: (0.0, 200.0, 25.0),
        description: "Percent of prior range a gap open must cover",
    },
    ParamMeta {
        name: "tier_step",
        default: DEFAULT_TIER_STEP,
        range: (5.0, 100.0, 5.0),
        description: "Spacing of retracement tiers",
    },
    ParamMeta {
        name: "tier_max",
        default: DEFAULT_TIER_MAX,
        range: (25.0, 400.0, 25.0),
        description: "Highest retracement tier",
    },
];

impl ParameterizedDetector for RetracementDetector {
    fn param_meta() -> &'static [ParamMeta] {
        RETRACEMENT_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        let detector = Self {
            qualifying_threshold: get_checked(params, &RETRACEMENT_PARAMS[0])?,
            gap_threshold: get_checked(params, &RETRACEMENT_PARAMS[1])?,
            tier_step: get_checked(params, &RETRACEMENT_PARAMS[2])?,
            tier_max: get_checked(params, &RETRACEMENT_PARAMS[3])?,
            ..Self::default()
        };
        detector.validate_config()?;
        Ok(detector)
    }

    fn detector_name() -> &'static str {
        "RETRACEMENT_2BAR"
    }
}
