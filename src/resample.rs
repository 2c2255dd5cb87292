//! Fixed-interval resampling of candle series
//!
//! Buckets are `[origin + k * interval, origin + (k + 1) * interval)`. Each
//! non-empty bucket becomes one candle stamped with the bucket start; buckets
//! without contributing candles are dropped.

use std::{fmt, str::FromStr};

use chrono::{NaiveDateTime, NaiveTime, TimeDelta};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    series::{Candle, CandleSeries},
    AnalysisError, Result,
};

const MS_PER_SECOND: i64 = 1_000;
const MS_PER_MINUTE: i64 = 60 * MS_PER_SECOND;
const MS_PER_HOUR: i64 = 60 * MS_PER_MINUTE;
const MS_PER_DAY: i64 = 24 * MS_PER_HOUR;
const MS_PER_WEEK: i64 = 7 * MS_PER_DAY;

// ============================================================
// TIMEFRAME
// ============================================================

/// Resampling interval (positive, millisecond resolution)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timeframe(TimeDelta);

impl Timeframe {
    /// Create a new Timeframe, validating the duration is a positive whole number of milliseconds
    pub fn new(duration: TimeDelta) -> Result<Self> {
        let ms = duration.num_milliseconds();
        if ms <= 0 {
            return Err(AnalysisError::InvalidInterval(format!(
                "interval must be a positive duration, got {duration}"
            )));
        }
        if TimeDelta::try_milliseconds(ms) != Some(duration) {
            return Err(AnalysisError::InvalidInterval(format!(
                "interval must be a whole number of milliseconds, got {duration}"
            )));
        }
        Ok(Self(duration))
    }

    #[inline]
    pub fn duration(self) -> TimeDelta {
        self.0
    }

    #[inline]
    pub fn as_millis(self) -> i64 {
        self.0.num_milliseconds()
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ms = self.as_millis();
        let (value, unit) = [
            (MS_PER_WEEK, "w"),
            (MS_PER_DAY, "d"),
            (MS_PER_HOUR, "h"),
            (MS_PER_MINUTE, "min"),
            (MS_PER_SECOND, "s"),
        ]
        .into_iter()
        .find(|(unit_ms, _)| ms % unit_ms == 0)
        .map(|(unit_ms, unit)| (ms / unit_ms, unit))
        .unwrap_or((ms, "ms"));
        write!(f, "{value}{unit}")
    }
}

impl FromStr for Timeframe {
    type Err = AnalysisError;

    /// Parses `<count><unit>` with unit one of `ms`, `s`, `min`/`m`/`t`, `h`, `d`, `w`
    /// (case-insensitive). A missing count means 1.
    fn from_str(s: &str) -> Result<Self> {
        let text = s.trim().to_ascii_lowercase();
        let split = text
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(text.len());
        let (digits, unit) = text.split_at(split);

        let unit_ms = match unit.trim() {
            "ms" => 1,
            "s" | "sec" => MS_PER_SECOND,
            "min" | "m" | "t" => MS_PER_MINUTE,
            "h" | "hr" => MS_PER_HOUR,
            "d" => MS_PER_DAY,
            "w" => MS_PER_WEEK,
            _ => {
                return Err(AnalysisError::InvalidInterval(format!(
                    "unrecognised timeframe '{s}'"
                )))
            }
        };
        let count: i64 = if digits.is_empty() {
            1
        } else {
            digits.parse().map_err(|_| {
                AnalysisError::InvalidInterval(format!("unrecognised timeframe '{s}'"))
            })?
        };

        let duration = count
            .checked_mul(unit_ms)
            .and_then(TimeDelta::try_milliseconds)
            .ok_or_else(|| AnalysisError::InvalidInterval(format!("timeframe '{s}' overflows")))?;
        Timeframe::new(duration)
    }
}

impl Serialize for Timeframe {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timeframe {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(d)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================
// ORIGIN
// ============================================================

/// Reference point bucket boundaries are aligned to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// 1970-01-01T00:00:00
    Epoch,
    /// Midnight of the first candle's day
    #[default]
    StartDay,
    /// Explicit anchor
    At(NaiveDateTime),
}

impl Origin {
    fn anchor(self, first: NaiveDateTime) -> NaiveDateTime {
        match self {
            Origin::Epoch => NaiveDateTime::default(),
            Origin::StartDay => first.date().and_time(NaiveTime::default()),
            Origin::At(anchor) => anchor,
        }
    }
}

// ============================================================
// RESAMPLER
// ============================================================

/// Aggregate `series` into `timeframe` buckets aligned to `origin`.
///
/// `open` = first open, `high` = max high, `low` = min low, `close` = last close,
/// `volume` = summed volume. The result is re-validated as a [`CandleSeries`].
pub fn resample(series: &CandleSeries, timeframe: Timeframe, origin: Origin) -> Result<CandleSeries> {
    let Some(first) = series.first() else {
        return Ok(series.clone());
    };
    let anchor = origin.anchor(first.timestamp);
    let step = timeframe.as_millis();

    let mut out: Vec<Candle> = Vec::new();
    let mut current: Option<(i64, Candle)> = None;

    for candle in series {
        let offset = floor_millis(candle.timestamp.signed_duration_since(anchor));
        let bucket = offset.div_euclid(step);

        if let Some((key, acc)) = current.as_mut() {
            if *key == bucket {
                acc.high = acc.high.max(candle.high);
                acc.low = acc.low.min(candle.low);
                acc.close = candle.close;
                acc.volume += candle.volume;
                continue;
            }
        }
        if let Some((_, done)) = current.take() {
            out.push(done);
        }
        let start = bucket_start(anchor, bucket, step)?;
        current = Some((bucket, Candle { timestamp: start, ..*candle }));
    }
    if let Some((_, done)) = current {
        out.push(done);
    }

    debug!(
        timeframe = %timeframe,
        input = series.len(),
        output = out.len(),
        "resampled series"
    );
    CandleSeries::new(out)
}

/// Whole milliseconds in `delta`, rounded toward negative infinity
fn floor_millis(delta: TimeDelta) -> i64 {
    let ms = delta.num_milliseconds();
    match TimeDelta::try_milliseconds(ms) {
        Some(truncated) if truncated > delta => ms - 1,
        _ => ms,
    }
}

fn bucket_start(anchor: NaiveDateTime, bucket: i64, step: i64) -> Result<NaiveDateTime> {
    bucket
        .checked_mul(step)
        .and_then(TimeDelta::try_milliseconds)
        .and_then(|offset| anchor.checked_add_signed(offset))
        .ok_or_else(|| {
            AnalysisError::InvalidInterval(format!("bucket {bucket} of {step}ms out of range"))
        })
}
