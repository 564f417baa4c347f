//! Raw-row normalisation — turning whatever shape the store hands back into
//! one canonical record.
//!
//! Different physical schemas for the access table produce joined rows of 4,
//! 5, or 6 fields, with numbers sometimes arriving as strings (including the
//! literal string `"None"`). The storage adapter wraps each row in a tagged
//! [`RawRow`] variant and [`normalize`] is a total function over it: a row
//! either becomes a [`NormalizedRecord`] or is dropped, never an error that
//! aborts the whole query.

use serde::{Deserialize, Serialize};

// ─── RawValue ────────────────────────────────────────────────────────────────

/// A loosely typed cell as read from the store.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
  Null,
  Int(i64),
  Real(f64),
  Text(String),
}

impl RawValue {
  /// Coerce to an integer: ints pass through, reals truncate, strings parse
  /// through `f64` then truncate (tolerating thousands separators). The
  /// string sentinel `"None"` (any case) and unparseable values yield
  /// `None` — coercion failure never aborts a row.
  pub fn as_int(&self) -> Option<i64> {
    match self {
      RawValue::Null => None,
      RawValue::Int(i) => Some(*i),
      RawValue::Real(f) => f.is_finite().then_some(f.trunc() as i64),
      RawValue::Text(s) => {
        let t = s.trim();
        if t.is_empty() || t.eq_ignore_ascii_case("none") {
          return None;
        }
        let cleaned: String = t.chars().filter(|c| *c != ',').collect();
        cleaned
          .parse::<f64>()
          .ok()
          .filter(|f| f.is_finite())
          .map(|f| f.trunc() as i64)
      }
    }
  }

  /// Coerce to a name/label. Only genuine text survives; numeric or null
  /// cells have no meaningful name.
  pub fn as_name(&self) -> Option<String> {
    match self {
      RawValue::Text(s) if !s.trim().is_empty() => Some(s.clone()),
      _ => None,
    }
  }

  fn as_year(&self) -> Option<i32> {
    self.as_int().map(|y| y as i32)
  }
}

// ─── RawRow ──────────────────────────────────────────────────────────────────

/// A row read from the access table join, tagged by arity.
///
/// The adapter decides the variant from the columns it actually selected, so
/// positional meaning is fixed per variant rather than guessed:
///
/// - `Six`:  (id, country, year, population, without, with)
/// - `Five`: (id, country, year, without, with)
/// - `Four`: (id, country, year, without)
/// - `Other`: anything else; normalised best-effort by position.
#[derive(Debug, Clone, PartialEq)]
pub enum RawRow {
  Four([RawValue; 4]),
  Five([RawValue; 5]),
  Six([RawValue; 6]),
  Other(Vec<RawValue>),
}

// ─── NormalizedRecord ────────────────────────────────────────────────────────

/// The canonical record shape every query works with.
///
/// `people_without` is never null (missing values default to 0);
/// `people_with` and `population` stay nullable so "unknown" is
/// distinguishable from "zero".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
  pub record_id:      Option<i64>,
  pub country:        Option<String>,
  pub year:           Option<i32>,
  pub population:     Option<i64>,
  pub people_without: i64,
  pub people_with:    Option<i64>,
}

impl NormalizedRecord {
  /// Re-encode as a six-field raw row. Normalising the result yields the
  /// same record back (normalisation is idempotent).
  pub fn to_raw(&self) -> RawRow {
    fn int(v: Option<i64>) -> RawValue {
      v.map_or(RawValue::Null, RawValue::Int)
    }
    RawRow::Six([
      int(self.record_id),
      self
        .country
        .clone()
        .map_or(RawValue::Null, RawValue::Text),
      int(self.year.map(i64::from)),
      int(self.population),
      RawValue::Int(self.people_without),
      int(self.people_with),
    ])
  }
}

/// Normalise one raw row. Returns `None` for rows that cannot be
/// destructured at all (the caller drops them and continues).
pub fn normalize(row: RawRow) -> Option<NormalizedRecord> {
  let (record_id, country, year, population, without, with) = match &row {
    RawRow::Six([id, country, year, population, without, with]) => (
      id.as_int(),
      country.as_name(),
      year.as_year(),
      population.as_int(),
      without.as_int(),
      with.as_int(),
    ),
    RawRow::Five([id, country, year, without, with]) => (
      id.as_int(),
      country.as_name(),
      year.as_year(),
      None,
      without.as_int(),
      with.as_int(),
    ),
    RawRow::Four([id, country, year, without]) => (
      id.as_int(),
      country.as_name(),
      year.as_year(),
      None,
      without.as_int(),
      None,
    ),
    RawRow::Other(fields) => {
      if fields.is_empty() {
        return None;
      }
      let at = |i: usize| fields.get(i);
      (
        at(0).and_then(RawValue::as_int),
        at(1).and_then(RawValue::as_name),
        at(2).and_then(|v| v.as_year()),
        at(3).and_then(RawValue::as_int),
        at(4).and_then(RawValue::as_int),
        at(5).and_then(RawValue::as_int),
      )
    }
  };

  Some(NormalizedRecord {
    record_id,
    country,
    year,
    population,
    people_without: without.unwrap_or(0),
    people_with: with,
  })
}

// ─── Tests ───────────────────────────────────────────────────────────────────
