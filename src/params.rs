//! Parameter metadata for detectors
//!
//! This module describes the numeric knobs of a detector, enabling:
//! - Threshold sweeps (grid generation)
//! - Parameter documentation
//! - Construction from loosely-typed key/value maps
//!
//! # Example
//!
//! ```rust
//! use retrace_stats::params::ParameterizedDetector;
//! use retrace_stats::prelude::*;
//!
//! for param in RetracementDetector::param_meta() {
//!     println!("{}: default {} grid {:?}", param.name, param.default, param.generate_grid());
//! }
//! ```

use std::collections::HashMap;

use crate::{AnalysisError, Percent, Result};

// ============================================================
// PARAMETER METADATA
// ============================================================

/// Metadata for a single percent-valued detector parameter
#[derive(Debug, Clone)]
pub struct ParamMeta {
  /// Parameter name (e.g., "qualifying_threshold")
  pub name: &'static str,
  /// Default value
  pub default: f64,
  /// Range for sweeps: (min, max, step)
  pub range: (f64, f64, f64),
  /// Human-readable description
  pub description: &'static str,
}

impl ParamMeta {
  pub const fn percent(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, default, range, description }
  }

  /// Generate all values for a sweep
  pub fn generate_grid(&self) -> Vec<f64> {
    let (min, max, step) = self.range;
    let mut values = Vec::new();
    let mut v = min;
    while v <= max + f64::EPSILON {
      values.push(v);
      v += step;
    }
    values
  }

  /// Validate a value for this parameter
  pub fn validate(&self, value: f64) -> Result<()> {
    let (min, max, _) = self.range;
    if value.is_nan() || value < min || value > max {
      return Err(AnalysisError::OutOfRange { field: self.name, value, min, max });
    }
    Ok(())
  }
}

// ============================================================
// PARAMETERIZED DETECTOR TRAIT
// ============================================================

/// Trait for detectors that support parameterization
pub trait ParameterizedDetector: Sized {
  /// Returns metadata for all configurable parameters
  fn param_meta() -> &'static [ParamMeta];

  /// Creates a detector with parameters from a HashMap
  ///
  /// Missing parameters use their default values; present ones are range-checked.
  fn with_params(params: &HashMap<&str, f64>) -> Result<Self>;

  /// Returns the detector name
  fn detector_name() -> &'static str;
}

// ============================================================
// PARAMETER VALUE HELPERS
// ============================================================

/// Helper to get a Percent from params with default fallback
pub fn get_percent(params: &HashMap<&str, f64>, key: &str, default: f64) -> Result<Percent> {
  let value = params.get(key).copied().unwrap_or(default);
  Percent::new(value)
}

/// Like [`get_percent`], additionally checked against the parameter's metadata range
pub fn get_checked(params: &HashMap<&str, f64>, meta: &ParamMeta) -> Result<Percent> {
  let value = get_percent(params, meta.name, meta.default)?;
  meta.validate(value.get())?;
  Ok(value)
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_param_meta_percent() {
    let meta = ParamMeta::percent("test_pct", 50.0, (25.0, 100.0, 25.0), "Test parameter");

    assert_eq!(meta.name, "test_pct");
    assert_eq!(meta.default, 50.0);
  }

  #[test]
  fn test_generate_grid() {
    let meta = ParamMeta::percent("test", 50.0, (25.0, 100.0, 25.0), "Test");

    let grid = meta.generate_grid();
    assert_eq!(grid, vec![25.0, 50.0, 75.0, 100.0]);
  }

  #[test]
  fn test_validate() {
    let meta = ParamMeta::percent("test", 50.0, (25.0, 100.0, 25.0), "Test");

    assert!(meta.validate(50.0).is_ok());
    assert!(meta.validate(25.0).is_ok());
    assert!(meta.validate(100.0).is_ok());
    assert!(meta.validate(10.0).is_err());
    assert!(meta.validate(125.0).is_err());
    assert!(meta.validate(f64::NAN).is_err());
  }

  #[test]
  fn test_get_percent_helper() {
    let mut params = HashMap::new();
    params.insert("key1", 75.0);

    assert_eq!(get_percent(&params, "key1", 50.0).unwrap().get(), 75.0);
    assert_eq!(get_percent(&params, "key2", 50.0).unwrap().get(), 50.0);
  }

  #[test]
  fn test_get_checked_helper() {
    let meta = ParamMeta::percent("key1", 50.0, (25.0, 100.0, 25.0), "Test");
    let mut params = HashMap::new();
    params.insert("key1", 150.0);

    assert!(get_checked(&params, &meta).is_err());
    assert_eq!(get_checked(&HashMap::new(), &meta).unwrap().get(), 50.0);
  }
}
