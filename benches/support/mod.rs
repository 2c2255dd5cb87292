//! Deterministic candle generator shared by the benches and their smoke test.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use retrace_stats::prelude::*;

pub fn start() -> NaiveDateTime {
  NaiveDate::from_ymd_opt(2024, 1, 2).unwrap().and_hms_opt(0, 0, 0).unwrap()
}

/// Generate realistic minute candles, pulled back toward 100 so prices stay positive
pub fn generate_series(n: usize) -> CandleSeries {
  let mut candles = Vec::with_capacity(n);
  let mut price = 100.0;

  for i in 0..n {
    let change = ((i * 7 + 13) % 100) as f64 / 50.0 - 1.0; // Deterministic "random"
    let pull = (100.0 - price) * 0.05;
    let volatility = 2.0 + ((i * 3) % 10) as f64 / 5.0;

    let o = price;
    let c = price + change + pull;
    let h = o.max(c) + volatility * 0.5;
    let l = o.min(c) - volatility * 0.5;

    candles.push(Candle::new(start() + TimeDelta::minutes(i as i64), o, h, l, c, 1000.0));
    price = c;
  }

  CandleSeries::new(candles).unwrap()
}
