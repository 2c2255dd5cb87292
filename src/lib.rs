//! # retrace-stats
//!
//! Two-bar breakout/retracement statistics for OHLCV candle series.
//!
//! A raw candle stream is resampled to one or more fixed timeframes. On each
//! timeframe the detector looks for candles that break the prior candle's high
//! (or low) and give back at least a qualifying share of the prior range, then
//! classifies how quickly price reaches the prior candle's opposite extreme.
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::{NaiveDate, TimeDelta};
//! use retrace_stats::prelude::*;
//!
//! let start = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap().and_hms_opt(0, 0, 0).unwrap();
//! let candles: Vec<Candle> = (0..48)
//!     .map(|i| {
//!         let base = 100.0 + (i % 7) as f64;
//!         Candle::new(start + TimeDelta::hours(i), base, base + 2.0, base - 2.0, base + 1.0, 10.0)
//!     })
//!     .collect();
//! let series = CandleSeries::new(candles).unwrap();
//!
//! let analyzer = AnalyzerBuilder::new()
//!     .timeframe("4h".parse().unwrap())
//!     .build()
//!     .unwrap();
//!
//! let report = analyzer.analyze("MNQ", &series).unwrap();
//! for row in report.rows() {
//!     println!("{} {} {}", row.timeframe, row.direction.label(), row.total);
//! }
//! ```

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use tracing::{debug, warn};

pub mod detectors;
pub mod params;
pub mod resample;
pub mod series;
pub mod stats;

pub mod prelude {
    pub use crate::{
        // Detectors
        detectors::*,
        // Parameters
        params::{get_percent, ParamMeta, ParameterizedDetector},
        // Resampling
        resample::{resample, Origin, Timeframe},
        // Series
        series::{Candle, CandleSeries, RangeAudit, TimeGap},
        // Statistics
        stats::{MoveStatistics, OutcomeCounts, StatsRow, Summary, TierCount, TierLadder, TierStatistics},
        // Parallel
        analyze_parallel,
        AnalysisConfig,
        AnalysisFailure,
        // Errors
        AnalysisError,
        AnalysisReport,
        // Engine
        Analyzer,
        AnalyzerBuilder,
        Direction,
        MoveReport,
        // Core traits
        OHLCVExt,
        Percent,
        Result,
        OHLCV,
    };
}

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Errors that can occur while building series or configuring the analysis
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnalysisError {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid candle at index {index}: {reason}")]
    InvalidCandle { index: usize, reason: &'static str },

    #[error("Timestamps not strictly increasing at index {index}")]
    UnorderedTimestamps { index: usize },

    #[error("Invalid interval: {0}")]
    InvalidInterval(String),
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Percentage value (finite, >= 0). 50.0 means half of the reference range.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Percent(f64);

impl Percent {
    /// Create a new Percent, validating the value is finite and non-negative
    pub fn new(value: f64) -> Result<Self> {
        if value.is_nan() || value.is_infinite() {
            return Err(AnalysisError::InvalidValue(
                "Percent cannot be NaN or infinite",
            ));
        }
        if value < 0.0 {
            return Err(AnalysisError::OutOfRange {
                field: "Percent",
                value,
                min: 0.0,
                max: f64::MAX,
            });
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl serde::Serialize for Percent {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Percent {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(d)?;
        Percent::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// OHLCV TRAITS
// ============================================================

/// Core OHLCV data trait, implemented by [`series::Candle`] and by loader row types
pub trait OHLCV {
    fn timestamp(&self) -> NaiveDateTime;
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;
    fn volume(&self) -> f64;
}

/// Extension trait with computed properties for OHLCV data
pub trait OHLCVExt: OHLCV {
    #[inline]
    fn range(&self) -> f64 {
        self.high() - self.low()
    }

    /// A flat candle has zero range and cannot serve as a retracement denominator
    #[inline]
    fn is_flat(&self) -> bool {
        self.range() <= 0.0
    }

    /// Validate OHLCV data consistency
    fn validate(&self) -> Result<()> {
        let prices = [self.open(), self.high(), self.low(), self.close()];
        if prices.iter().any(|p| p.is_nan()) {
            return Err(AnalysisError::InvalidCandle {
                index: 0,
                reason: "NaN in OHLC",
            });
        }
        if prices.iter().any(|p| p.is_infinite()) {
            return Err(AnalysisError::InvalidCandle {
                index: 0,
                reason: "Infinite value in OHLC",
            });
        }
        if prices.iter().any(|&p| p <= 0.0) {
            return Err(AnalysisError::InvalidCandle {
                index: 0,
                reason: "non-positive price",
            });
        }
        if self.high() < self.low() {
            return Err(AnalysisError::InvalidCandle {
                index: 0,
                reason: "high < low",
            });
        }
        if self.open() > self.high() || self.open() < self.low() {
            return Err(AnalysisError::InvalidCandle {
                index: 0,
                reason: "open outside high-low range",
            });
        }
        if self.close() > self.high() || self.close() < self.low() {
            return Err(AnalysisError::InvalidCandle {
                index: 0,
                reason: "close outside high-low range",
            });
        }
        if !self.volume().is_finite() || self.volume() < 0.0 {
            return Err(AnalysisError::InvalidCandle {
                index: 0,
                reason: "volume must be finite and non-negative",
            });
        }
        Ok(())
    }
}

impl<T: OHLCV> OHLCVExt for T {}

// ============================================================
// DIRECTION
// ============================================================

/// Breakout side of a two-bar pattern
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Current high takes out the prior high, then price comes back down
    Up,
    /// Current low takes out the prior low, then price comes back up
    Down,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::Up, Direction::Down];

    #[inline]
    pub fn is_up(self) -> bool {
        matches!(self, Direction::Up)
    }

    #[inline]
    pub fn is_down(self) -> bool {
        matches!(self, Direction::Down)
    }

    /// Short pattern label ("2U" / "2D")
    pub fn label(self) -> &'static str {
        match self {
            Direction::Up => "2U",
            Direction::Down => "2D",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Direction::Up => "up",
            Direction::Down => "down",
        })
    }
}

// ============================================================
// ANALYZER
// ============================================================

use detectors::{
    helpers::MIN_BARS, ForwardTargetClassifier, MoveDetector, PatternEvent, RetracementDetector,
    TargetOutcome,
};
use resample::{resample, Origin, Timeframe};
use series::CandleSeries;
use stats::{MoveStatistics, StatsRow, TierLadder, TierStatistics};

/// Analysis configuration
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Timeframes each instrument is resampled to before detection
    pub timeframes: Vec<Timeframe>,
    /// Bucket alignment used by the resampler
    pub origin: Origin,
    pub detector: RetracementDetector,
}

/// Per-instrument retracement statistics keyed by (timeframe, direction)
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub instrument: String,
    pub stats: BTreeMap<(Timeframe, Direction), TierStatistics>,
}

impl AnalysisReport {
    pub fn get(&self, timeframe: Timeframe, direction: Direction) -> Option<&TierStatistics> {
        self.stats.get(&(timeframe, direction))
    }

    /// Flat rows ordered by timeframe, then direction
    pub fn rows(&self) -> Vec<StatsRow> {
        self.stats
            .values()
            .map(|s| s.row(&self.instrument))
            .collect()
    }
}

/// Per-instrument absolute-move statistics keyed by (timeframe, direction)
#[derive(Debug, Clone)]
pub struct MoveReport {
    pub instrument: String,
    pub stats: BTreeMap<(Timeframe, Direction), MoveStatistics>,
}

impl MoveReport {
    pub fn get(&self, timeframe: Timeframe, direction: Direction) -> Option<&MoveStatistics> {
        self.stats.get(&(timeframe, direction))
    }
}

/// Main analysis engine
#[derive(Debug, Clone)]
pub struct Analyzer {
    config: AnalysisConfig,
    ladder: TierLadder,
    classifier: ForwardTargetClassifier,
    moves: MoveDetector,
}

impl Analyzer {
    /// Build an analyzer from a deserialized config, validating it
    pub fn from_config(config: AnalysisConfig) -> Result<Self> {
        if config.timeframes.is_empty() {
            return Err(AnalysisError::InvalidConfig(
                "at least one timeframe is required".to_string(),
            ));
        }
        config.detector.validate_config()?;
        let ladder = config.detector.ladder()?;
        Ok(Self {
            config,
            ladder,
            classifier: ForwardTargetClassifier::default(),
            moves: MoveDetector::default(),
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn ladder(&self) -> &TierLadder {
        &self.ladder
    }

    // ===========================================
    // LOW-LEVEL: one series, one direction
    // ===========================================

    /// Detected events paired with their forward outcome, for a series already at `timeframe`
    pub fn events(
        &self,
        series: &CandleSeries,
        timeframe: Timeframe,
        direction: Direction,
    ) -> Vec<(PatternEvent, TargetOutcome)> {
        self.classified(series, timeframe, direction).collect()
    }

    /// Statistics for a series already at `timeframe`
    pub fn analyze_direction(
        &self,
        series: &CandleSeries,
        timeframe: Timeframe,
        direction: Direction,
    ) -> TierStatistics {
        let stats = TierStatistics::aggregate(
            timeframe,
            direction,
            &self.ladder,
            self.classified(series, timeframe, direction),
        );
        debug!(
            timeframe = %timeframe,
            direction = %direction,
            total = stats.total(),
            gaps = stats.gap_count(),
            "retracement pass complete"
        );
        stats
    }

    // ===========================================
    // HIGH-LEVEL: resample + both directions
    // ===========================================

    /// Resample `series` to every configured timeframe and collect both directions
    pub fn analyze(&self, instrument: &str, series: &CandleSeries) -> Result<AnalysisReport> {
        let mut stats = BTreeMap::new();

        for &timeframe in &self.config.timeframes {
            let resampled = self.resample(instrument, series, timeframe)?;
            for direction in Direction::ALL {
                stats.insert(
                    (timeframe, direction),
                    self.analyze_direction(&resampled, timeframe, direction),
                );
            }
        }

        Ok(AnalysisReport {
            instrument: instrument.to_string(),
            stats,
        })
    }

    /// Absolute-move statistics on every configured timeframe
    pub fn analyze_moves(&self, instrument: &str, series: &CandleSeries) -> Result<MoveReport> {
        let mut stats = BTreeMap::new();

        for &timeframe in &self.config.timeframes {
            let resampled = self.resample(instrument, series, timeframe)?;
            for direction in Direction::ALL {
                let scan = self.moves.scan(&resampled, direction);
                stats.insert(
                    (timeframe, direction),
                    MoveStatistics::aggregate(direction, &self.ladder, scan),
                );
            }
        }

        Ok(MoveReport {
            instrument: instrument.to_string(),
            stats,
        })
    }

    // ===========================================
    // Internal helpers
    // ===========================================

    fn classified<'a>(
        &'a self,
        series: &'a CandleSeries,
        timeframe: Timeframe,
        direction: Direction,
    ) -> impl Iterator<Item = (PatternEvent, TargetOutcome)> + 'a {
        self.config
            .detector
            .detect(series, timeframe, direction)
            .filter_map(move |event| {
                self.classifier
                    .classify(series, &event)
                    .map(|outcome| (event, outcome))
            })
    }

    fn resample(
        &self,
        instrument: &str,
        series: &CandleSeries,
        timeframe: Timeframe,
    ) -> Result<CandleSeries> {
        let resampled = resample(series, timeframe, self.config.origin)?;
        let audit = resampled.range_audit(0.0);
        if audit.flat > 0 {
            debug!(
                instrument,
                timeframe = %timeframe,
                flat = audit.flat,
                "flat candles after resampling"
            );
        }
        if resampled.len() < MIN_BARS {
            debug!(
                instrument,
                timeframe = %timeframe,
                candles = resampled.len(),
                "too few candles to detect on"
            );
        }
        Ok(resampled)
    }
}

// ============================================================
// BUILDER
// ============================================================

/// Builder for creating Analyzer instances
#[derive(Debug, Clone, Default)]
pub struct AnalyzerBuilder {
    config: AnalysisConfig,
}

impl AnalyzerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a timeframe to resample to
    pub fn timeframe(mut self, timeframe: Timeframe) -> Self {
        if !self.config.timeframes.contains(&timeframe) {
            self.config.timeframes.push(timeframe);
        }
        self
    }

    /// Add several timeframes
    pub fn timeframes(self, timeframes: impl IntoIterator<Item = Timeframe>) -> Self {
        timeframes.into_iter().fold(self, Self::timeframe)
    }

    /// Set bucket alignment for resampling
    pub fn origin(mut self, origin: Origin) -> Self {
        self.config.origin = origin;
        self
    }

    /// Replace the detector configuration
    pub fn detector(mut self, detector: RetracementDetector) -> Self {
        self.config.detector = detector;
        self
    }

    /// Set the minimum retracement (percent of prior range) for an event to qualify
    pub fn qualifying_threshold(mut self, threshold: f64) -> Result<Self> {
        self.config.detector.qualifying_threshold = Percent::new(threshold)?;
        Ok(self)
    }

    /// Set the tier ladder step and upper bound
    pub fn tiers(mut self, step: f64, max: f64) -> Result<Self> {
        self.config.detector.tier_step = Percent::new(step)?;
        self.config.detector.tier_max = Percent::new(max)?;
        Ok(self)
    }

    /// Build the analyzer
    pub fn build(self) -> Result<Analyzer> {
        Analyzer::from_config(self.config)
    }
}

// ============================================================
// PARALLEL ANALYSIS
// ============================================================

use rayon::prelude::*;

/// Error from analyzing a single instrument
#[derive(Debug)]
pub struct AnalysisFailure {
    pub instrument: String,
    pub error: AnalysisError,
}

/// Run independent per-instrument passes in parallel
pub fn analyze_parallel<'a, I>(
    analyzer: &Analyzer,
    instruments: I,
) -> (Vec<AnalysisReport>, Vec<AnalysisFailure>)
where
    I: IntoParallelIterator<Item = (&'a str, &'a CandleSeries)>,
{
    let results: Vec<_> = instruments
        .into_par_iter()
        .map(|(instrument, series)| {
            analyzer
                .analyze(instrument, series)
                .map_err(|error| AnalysisFailure {
                    instrument: instrument.to_string(),
                    error,
                })
        })
        .collect();

    let mut successes = Vec::new();
    let mut errors = Vec::new();

    for result in results {
        match result {
            Ok(r) => successes.push(r),
            Err(e) => {
                warn!(instrument = %e.instrument, error = %e.error, "instrument analysis failed");
                errors.push(e);
            }
        }
    }

    (successes, errors)
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::Candle;
    use chrono::{NaiveDate, TimeDelta};

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    /// Hourly candles: (open, high, low, close)
    fn hourly(rows: &[(f64, f64, f64, f64)]) -> CandleSeries {
        let candles = rows
            .iter()
            .enumerate()
            .map(|(i, &(o, h, l, c))| {
                Candle::new(start() + TimeDelta::hours(i as i64), o, h, l, c, 100.0)
            })
            .collect();
        CandleSeries::new(candles).unwrap()
    }

    fn one_hour() -> Timeframe {
        Timeframe::new(TimeDelta::hours(1)).unwrap()
    }

    #[test]
    fn test_percent_validation() {
        assert!(Percent::new(0.0).is_ok());
        assert!(Percent::new(50.0).is_ok());
        assert!(Percent::new(250.0).is_ok());
        assert!(Percent::new(-0.1).is_err());
        assert!(Percent::new(f64::NAN).is_err());
        assert!(Percent::new(f64::INFINITY).is_err());
    }

    #[test]
    fn test_direction_labels() {
        assert_eq!(Direction::Up.label(), "2U");
        assert_eq!(Direction::Down.label(), "2D");
        assert_eq!(Direction::Up.to_string(), "up");
        assert!(Direction::Down.is_down());
    }

    #[test]
    fn test_builder_requires_timeframe() {
        let err = AnalyzerBuilder::new().build().unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidConfig(_)));
    }

    #[test]
    fn test_builder_dedups_timeframes() {
        let analyzer = AnalyzerBuilder::new()
            .timeframes([one_hour(), one_hour()])
            .build()
            .unwrap();
        assert_eq!(analyzer.config().timeframes.len(), 1);
    }

    #[test]
    fn test_builder_rejects_bad_tiers() {
        let result = AnalyzerBuilder::new()
            .timeframe(one_hour())
            .tiers(0.0, 200.0)
            .and_then(AnalyzerBuilder::build);
        assert!(result.is_err());
    }

    #[test]
    fn test_config_rejects_unbounded_ladder() {
        let config: AnalysisConfig = serde_json::from_str(
            r#"{"timeframes":["1h"],"detector":{"tier_step":1e-300,"tier_max":1e300}}"#,
        )
        .unwrap();
        let err = Analyzer::from_config(config).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidConfig(_)));
    }

    #[test]
    fn test_analyze_collects_both_directions() {
        let series = hourly(&[
            (105.0, 110.0, 100.0, 106.0),
            (108.0, 115.0, 103.0, 104.0), // up breakout, 70% retrace
            (104.0, 106.0, 99.0, 100.0),  // reaches 100 within 2
            (100.0, 102.0, 98.0, 101.0),
            (101.0, 103.0, 99.0, 102.0),
        ]);
        let analyzer = AnalyzerBuilder::new().timeframe(one_hour()).build().unwrap();
        let report = analyzer.analyze("MNQ", &series).unwrap();

        assert_eq!(report.stats.len(), 2);
        let up = report.get(one_hour(), Direction::Up).unwrap();
        assert_eq!(up.total(), 1);
        assert_eq!(up.outcomes().within_2, 1);

        let rows = report.rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].instrument, "MNQ");
        assert_eq!(rows[0].direction, Direction::Up);
        assert_eq!(rows[0].timeframe, "1h");
    }

    #[test]
    fn test_analyze_short_series_is_empty_not_error() {
        let series = hourly(&[(105.0, 110.0, 100.0, 106.0), (108.0, 115.0, 103.0, 104.0)]);
        let analyzer = AnalyzerBuilder::new().timeframe(one_hour()).build().unwrap();
        let report = analyzer.analyze("MES", &series).unwrap();
        assert!(report.stats.values().all(|s| s.total() == 0));
    }

    #[test]
    fn test_analyze_moves() {
        let series = hourly(&[
            (105.0, 110.0, 100.0, 106.0),
            (108.0, 115.0, 103.0, 104.0),
            (104.0, 106.0, 99.0, 100.0),
        ]);
        let analyzer = AnalyzerBuilder::new().timeframe(one_hour()).build().unwrap();
        let report = analyzer.analyze_moves("MNQ", &series).unwrap();
        let up = report.get(one_hour(), Direction::Up).unwrap();
        // open 108, low 103, prev low 100 -> 5 / 8
        assert_eq!(up.count(), 1);
        assert!((up.move_pcts().unwrap().max - 62.5).abs() < 1e-9);
    }

    #[test]
    fn test_parallel_analysis() {
        let a = hourly(&[
            (105.0, 110.0, 100.0, 106.0),
            (108.0, 115.0, 103.0, 104.0),
            (104.0, 106.0, 99.0, 100.0),
            (100.0, 102.0, 98.0, 101.0),
            (101.0, 103.0, 99.0, 102.0),
        ]);
        let b = hourly(&[(100.0, 101.0, 99.0, 100.5); 8]);
        let analyzer = AnalyzerBuilder::new().timeframe(one_hour()).build().unwrap();

        let instruments: Vec<(&str, &CandleSeries)> = vec![("MNQ", &a), ("MES", &b)];
        let (reports, errors) = analyze_parallel(&analyzer, instruments);
        assert_eq!(reports.len(), 2);
        assert!(errors.is_empty());
    }
}
