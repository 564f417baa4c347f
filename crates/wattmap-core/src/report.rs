//! Typed rows returned by the analytical queries.
//!
//! Every query returns a plain `Vec` of one of these — already filtered,
//! derived, and sorted. No pagination.

use serde::{Deserialize, Serialize};

/// Documented default for [`high_unserved`](crate::store::AccessStore::high_unserved).
pub const DEFAULT_UNSERVED_THRESHOLD: i64 = 1_000_000;

/// Documented default window for
/// [`most_improved`](crate::store::AccessStore::most_improved).
pub const DEFAULT_IMPROVEMENT_START: i32 = 1990;
pub const DEFAULT_IMPROVEMENT_END: i32 = 2016;

/// One row of the high-unserved report: people without access summed
/// across all years for one country.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnservedTotal {
  pub country:       String,
  pub total_without: i64,
}

/// One row of the yearly trend: people with access summed across all
/// countries for one year (clamped to be non-negative).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearlyAccess {
  pub year:       i32,
  pub total_with: i64,
}

/// One row of the per-country access report for a single year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryAccess {
  pub country:        String,
  pub population:     i64,
  pub people_without: i64,
  pub access_percent: f64,
}

/// One row of the regional comparison: population-weighted access
/// percentage for a region in a single year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionAccess {
  pub region:         String,
  pub access_percent: f64,
}

/// One side of a two-country comparison. All metrics are `None` when the
/// country has no usable data for the requested year — a placeholder row,
/// never an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryComparison {
  pub country:        String,
  pub access_percent: Option<f64>,
  pub population:     Option<i64>,
  pub people_with:    Option<i64>,
  pub people_without: Option<i64>,
}

impl CountryComparison {
  /// Placeholder for a country with no data in the requested year.
  pub fn missing(country: impl Into<String>) -> Self {
    Self {
      country:        country.into(),
      access_percent: None,
      population:     None,
      people_with:    None,
      people_without: None,
    }
  }
}

/// One row of the most-improved report: access percentage at the start and
/// end of the window, and the delta between them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Improvement {
  pub country:       String,
  pub start_percent: f64,
  pub end_percent:   f64,
  pub improvement:   f64,
}
