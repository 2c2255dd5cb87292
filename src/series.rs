//! Candle data model
//!
//! [`CandleSeries`] is the validated, immutable input to every analysis pass.
//! Construction is fail-fast: a single bad candle or out-of-order timestamp
//! rejects the whole series.

use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::{AnalysisError, OHLCVExt, Result, OHLCV};

// ============================================================
// CANDLE
// ============================================================

/// OHLCV candle for one time bucket
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(
        timestamp: NaiveDateTime,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

impl OHLCV for Candle {
    fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    fn open(&self) -> f64 {
        self.open
    }

    fn high(&self) -> f64 {
        self.high
    }

    fn low(&self) -> f64 {
        self.low
    }

    fn close(&self) -> f64 {
        self.close
    }

    fn volume(&self) -> f64 {
        self.volume
    }
}

// ============================================================
// SERIES
// ============================================================

/// Ordered, validated candle sequence with strictly increasing timestamps
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CandleSeries {
    candles: Vec<Candle>,
}

impl CandleSeries {
    /// Validate and wrap `candles`. Rejects the whole series on the first violation.
    pub fn new(candles: Vec<Candle>) -> Result<Self> {
        for (i, candle) in candles.iter().enumerate() {
            candle.validate().map_err(|e| match e {
                AnalysisError::InvalidCandle { reason, .. } => {
                    AnalysisError::InvalidCandle { index: i, reason }
                }
                other => other,
            })?;
        }
        if let Some(i) = candles
            .windows(2)
            .position(|w| w[1].timestamp <= w[0].timestamp)
        {
            return Err(AnalysisError::UnorderedTimestamps { index: i + 1 });
        }
        Ok(Self { candles })
    }

    /// Build a series from any OHLCV rows (e.g. a loader's own row type)
    pub fn from_bars<T: OHLCV>(bars: &[T]) -> Result<Self> {
        Self::new(
            bars.iter()
                .map(|b| {
                    Candle::new(
                        b.timestamp(),
                        b.open(),
                        b.high(),
                        b.low(),
                        b.close(),
                        b.volume(),
                    )
                })
                .collect(),
        )
    }

    /// Combine candles from several sources (e.g. overlapping export files).
    ///
    /// Candles are ordered by timestamp; for duplicated timestamps the one from the
    /// later source wins.
    pub fn merge<I>(sources: I) -> Result<Self>
    where
        I: IntoIterator<Item = Vec<Candle>>,
    {
        let mut all: Vec<Candle> = sources.into_iter().flatten().collect();
        // stable: equal timestamps keep source order
        all.sort_by_key(|c| c.timestamp);

        let mut merged: Vec<Candle> = Vec::with_capacity(all.len());
        for candle in all {
            match merged.last_mut() {
                Some(last) if last.timestamp == candle.timestamp => *last = candle,
                _ => merged.push(candle),
            }
        }
        Self::new(merged)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.candles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&Candle> {
        self.candles.get(index)
    }

    #[inline]
    pub fn as_slice(&self) -> &[Candle] {
        &self.candles
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Candle> {
        self.candles.iter()
    }

    pub fn first(&self) -> Option<&Candle> {
        self.candles.first()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    pub fn into_inner(self) -> Vec<Candle> {
        self.candles
    }

    /// Count flat (zero-range) and tiny-range (`0 < range < tiny`) candles
    pub fn range_audit(&self, tiny: f64) -> RangeAudit {
        let mut audit = RangeAudit {
            total: self.candles.len(),
            ..RangeAudit::default()
        };
        for (i, candle) in self.candles.iter().enumerate() {
            let range = candle.range();
            if candle.is_flat() {
                audit.flat += 1;
                audit.flat_indices.push(i);
            } else if range < tiny {
                audit.tiny += 1;
                audit.tiny_indices.push(i);
            }
        }
        audit
    }

    /// Spacing between consecutive candles larger than `expected_step`
    pub fn gaps(&self, expected_step: TimeDelta) -> Vec<TimeGap> {
        self.candles
            .windows(2)
            .enumerate()
            .filter_map(|(i, w)| {
                let duration = w[1].timestamp - w[0].timestamp;
                (duration > expected_step).then(|| TimeGap {
                    index: i + 1,
                    start: w[0].timestamp,
                    end: w[1].timestamp,
                    duration,
                })
            })
            .collect()
    }
}

impl std::ops::Index<usize> for CandleSeries {
    type Output = Candle;

    fn index(&self, index: usize) -> &Candle {
        &self.candles[index]
    }
}

impl<'a> IntoIterator for &'a CandleSeries {
    type Item = &'a Candle;
    type IntoIter = std::slice::Iter<'a, Candle>;

    fn into_iter(self) -> Self::IntoIter {
        self.candles.iter()
    }
}

impl<'de> Deserialize<'de> for CandleSeries {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let candles = Vec::<Candle>::deserialize(d)?;
        CandleSeries::new(candles).map_err(serde::de::Error::custom)
    }
}

/// Result of [`CandleSeries::range_audit`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RangeAudit {
    pub total: usize,
    pub flat: usize,
    pub tiny: usize,
    pub flat_indices: Vec<usize>,
    pub tiny_indices: Vec<usize>,
}

/// Missing stretch of data between two consecutive candles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeGap {
    /// Index of the candle after the gap
    pub index: usize,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub duration: TimeDelta,
}
