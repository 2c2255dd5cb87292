//! Breakout/retracement detectors
//!
//! # Pattern Families
//!
//! - **Retracement (two-bar, forward-looking)**: a candle breaks the prior high/low and
//!   gives back a qualifying share of the prior range; outcomes are classified over the
//!   next three candles.
//! - **Absolute move (single-bar)**: a breakout candle's excursion past its own open,
//!   relative to the distance from that open to the prior candle's opposite extreme.

pub mod helpers;

/// Generate `with_defaults()` -> `Self::default()` for multiple detector types.
macro_rules! impl_with_defaults {
  ($($detector:ty),* $(,)?) => {
    $(impl $detector {
      pub fn with_defaults() -> Self { Self::default() }
    })*
  };
}

pub mod forward;
pub mod moves;
pub mod retracement;

pub use forward::*;
pub use moves::*;
pub use retracement::*;
