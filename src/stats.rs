//! Tier and outcome aggregation
//!
//! Statistics are produced by folding a finished event stream into an immutable
//! value; nothing is accumulated across passes.

use serde::Serialize;

use crate::{
    detectors::{MoveScan, PatternEvent, TargetOutcome},
    resample::Timeframe,
    AnalysisError, Direction, Percent, Result,
};

/// `count / total * 100`, or 0 when `total == 0`
#[inline]
pub fn rate(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64 * 100.0
    }
}

// ============================================================
// TIER LADDER
// ============================================================

/// Cumulative percentage thresholds `step, 2*step, ..., max`
#[derive(Debug, Clone, PartialEq)]
pub struct TierLadder {
    thresholds: Vec<f64>,
}

impl Default for TierLadder {
    fn default() -> Self {
        Self {
            thresholds: (1..=8).map(|k| k as f64 * 25.0).collect(),
        }
    }
}

/// Upper bound on the number of tiers a ladder may hold
pub const MAX_TIERS: usize = 1_000;

/// Number of tiers `step, 2*step, ..., max` describes, validated
pub fn tier_count(step: Percent, max: Percent) -> Result<usize> {
    let (step, max) = (step.get(), max.get());
    if step <= 0.0 {
        return Err(AnalysisError::InvalidConfig(
            "tier step must be > 0".to_string(),
        ));
    }
    if max < step {
        return Err(AnalysisError::InvalidConfig(format!(
            "tier max ({max}) below tier step ({step})"
        )));
    }
    let count = (max / step + 1e-9).floor();
    if count > MAX_TIERS as f64 {
        return Err(AnalysisError::InvalidConfig(format!(
            "tier step {step} up to {max} gives more than {MAX_TIERS} tiers"
        )));
    }
    Ok(count as usize)
}

impl TierLadder {
    pub fn new(step: Percent, max: Percent) -> Result<Self> {
        let count = tier_count(step, max)?;
        let step = step.get();
        // multiply rather than accumulate so 25 * 7 stays exactly 175
        Ok(Self {
            thresholds: (1..=count).map(|k| k as f64 * step).collect(),
        })
    }

    pub fn thresholds(&self) -> &[f64] {
        &self.thresholds
    }

    /// Number of tiers `pct` reaches
    #[inline]
    pub fn hits(&self, pct: f64) -> usize {
        self.thresholds.iter().take_while(|&&t| pct >= t).count()
    }

    fn zeroed(&self) -> Vec<TierCount> {
        self.thresholds
            .iter()
            .map(|&threshold| TierCount { threshold, hits: 0 })
            .collect()
    }
}

/// Hits at one tier threshold
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TierCount {
    pub threshold: f64,
    pub hits: usize,
}

fn record_tiers(tiers: &mut [TierCount], hit: usize) {
    for tier in &mut tiers[..hit] {
        tier.hits += 1;
    }
}

// ============================================================
// OUTCOME COUNTS
// ============================================================

/// Events per forward outcome bucket
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeCounts {
    pub same_candle: usize,
    pub within_2: usize,
    pub within_3: usize,
    pub never: usize,
}

impl OutcomeCounts {
    pub fn record(mut self, outcome: TargetOutcome) -> Self {
        match outcome {
            TargetOutcome::SameCandle => self.same_candle += 1,
            TargetOutcome::Within2 => self.within_2 += 1,
            TargetOutcome::Within3 => self.within_3 += 1,
            TargetOutcome::Never => self.never += 1,
        }
        self
    }

    pub fn get(&self, outcome: TargetOutcome) -> usize {
        match outcome {
            TargetOutcome::SameCandle => self.same_candle,
            TargetOutcome::Within2 => self.within_2,
            TargetOutcome::Within3 => self.within_3,
            TargetOutcome::Never => self.never,
        }
    }

    #[inline]
    pub fn cum_within_2(&self) -> usize {
        self.same_candle + self.within_2
    }

    #[inline]
    pub fn cum_within_3(&self) -> usize {
        self.cum_within_2() + self.within_3
    }

    #[inline]
    pub fn total(&self) -> usize {
        self.cum_within_3() + self.never
    }
}

// ============================================================
// TIER STATISTICS
// ============================================================

/// Aggregate for one (timeframe, direction) pass
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierStatistics {
    timeframe: Timeframe,
    direction: Direction,
    total: usize,
    gap_count: usize,
    outcomes: OutcomeCounts,
    tiers: Vec<TierCount>,
}

impl TierStatistics {
    /// Fold classified events into statistics
    pub fn aggregate<I>(
        timeframe: Timeframe,
        direction: Direction,
        ladder: &TierLadder,
        events: I,
    ) -> Self
    where
        I: IntoIterator<Item = (PatternEvent, TargetOutcome)>,
    {
        let empty = Self {
            timeframe,
            direction,
            total: 0,
            gap_count: 0,
            outcomes: OutcomeCounts::default(),
            tiers: ladder.zeroed(),
        };

        events.into_iter().fold(empty, |mut acc, (event, outcome)| {
            acc.total += 1;
            acc.gap_count += usize::from(event.is_gap);
            acc.outcomes = acc.outcomes.record(outcome);
            record_tiers(&mut acc.tiers, ladder.hits(event.retrace_pct));
            acc
        })
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn gap_count(&self) -> usize {
        self.gap_count
    }

    pub fn outcomes(&self) -> OutcomeCounts {
        self.outcomes
    }

    pub fn tiers(&self) -> &[TierCount] {
        &self.tiers
    }

    pub fn cum_within_2(&self) -> usize {
        self.outcomes.cum_within_2()
    }

    pub fn cum_within_3(&self) -> usize {
        self.outcomes.cum_within_3()
    }

    /// Percentage of events landing in `outcome`
    pub fn outcome_rate(&self, outcome: TargetOutcome) -> f64 {
        rate(self.outcomes.get(outcome), self.total)
    }

    /// Percentage of events reaching the tier at `index`
    pub fn tier_rate(&self, index: usize) -> f64 {
        self.tiers
            .get(index)
            .map_or(0.0, |tier| rate(tier.hits, self.total))
    }

    /// Flat row for table/CSV collaborators
    pub fn row(&self, instrument: &str) -> StatsRow {
        let o = &self.outcomes;
        let total = self.total;
        StatsRow {
            instrument: instrument.to_string(),
            timeframe: self.timeframe.to_string(),
            direction: self.direction,
            total,
            gap_count: self.gap_count,
            gap_pct: rate(self.gap_count, total),
            same_count: o.same_candle,
            same_pct: rate(o.same_candle, total),
            within_2_count: o.within_2,
            within_2_pct: rate(o.within_2, total),
            within_3_count: o.within_3,
            within_3_pct: rate(o.within_3, total),
            never_count: o.never,
            never_pct: rate(o.never, total),
            cum2_count: o.cum_within_2(),
            cum2_pct: rate(o.cum_within_2(), total),
            cum3_count: o.cum_within_3(),
            cum3_pct: rate(o.cum_within_3(), total),
        }
    }
}

/// One output row: counts plus their percentages of `total`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsRow {
    pub instrument: String,
    pub timeframe: String,
    pub direction: Direction,
    pub total: usize,
    pub gap_count: usize,
    pub gap_pct: f64,
    pub same_count: usize,
    pub same_pct: f64,
    pub within_2_count: usize,
    pub within_2_pct: f64,
    pub within_3_count: usize,
    pub within_3_pct: f64,
    pub never_count: usize,
    pub never_pct: f64,
    pub cum2_count: usize,
    pub cum2_pct: f64,
    pub cum3_count: usize,
    pub cum3_pct: f64,
}

// ============================================================
// MOVE STATISTICS
// ============================================================

/// Mean / median / max / min of a sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub mean: f64,
    pub median: f64,
    pub max: f64,
    pub min: f64,
}

impl Summary {
    /// `None` for an empty sample
    pub fn of(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let n = sorted.len();
        let median = if n % 2 == 1 {
            sorted[n / 2]
        } else {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        };
        Some(Self {
            mean: sorted.iter().sum::<f64>() / n as f64,
            median,
            max: sorted[n - 1],
            min: sorted[0],
        })
    }
}

/// Aggregate of the single-bar absolute-move family for one direction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoveStatistics {
    direction: Direction,
    count: usize,
    skipped_flat: usize,
    tiers: Vec<TierCount>,
    moves: Option<Summary>,
    move_pcts: Option<Summary>,
}

impl MoveStatistics {
    pub fn aggregate(direction: Direction, ladder: &TierLadder, scan: MoveScan) -> Self {
        let tiers = scan.events.iter().fold(ladder.zeroed(), |mut tiers, event| {
            record_tiers(&mut tiers, ladder.hits(event.move_pct));
            tiers
        });
        let moves: Vec<f64> = scan.events.iter().map(|e| e.move_points).collect();
        let pcts: Vec<f64> = scan.events.iter().map(|e| e.move_pct).collect();

        Self {
            direction,
            count: scan.events.len(),
            skipped_flat: scan.skipped_flat,
            tiers,
            moves: Summary::of(&moves),
            move_pcts: Summary::of(&pcts),
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn skipped_flat(&self) -> usize {
        self.skipped_flat
    }

    pub fn tiers(&self) -> &[TierCount] {
        &self.tiers
    }

    pub fn tier_rate(&self, index: usize) -> f64 {
        self.tiers
            .get(index)
            .map_or(0.0, |tier| rate(tier.hits, self.count))
    }

    /// Summary of points moved past the open
    pub fn moves(&self) -> Option<Summary> {
        self.moves
    }

    /// Summary of moves as a percentage of the target distance
    pub fn move_pcts(&self) -> Option<Summary> {
        self.move_pcts
    }
}
