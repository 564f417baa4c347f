//! Country — the shared parent entity for all per-year records.
//!
//! A country row holds only identity metadata; per-year figures live in
//! access and population records that reference it by id. Countries are
//! created on first reference and never deleted by this layer.

use serde::{Deserialize, Serialize};

/// A country (or, in dirty datasets, an aggregate entity that merely looks
/// like one — see [`crate::aggregate::AggregatePolicy`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Country {
  /// Surrogate key, stable for the lifetime of the row.
  pub country_id: i64,
  /// Natural external key; unique case-insensitively.
  pub name:       String,
  /// Optional free-text grouping label; `None` or "Unknown" when the
  /// source dataset carries no region information.
  pub region:     Option<String>,
}

impl Country {
  /// Case-insensitive, whitespace-trimmed name comparison — the matching
  /// rule used for upsert-by-name and country lookups everywhere.
  pub fn matches_name(&self, name: &str) -> bool {
    self.name.trim().eq_ignore_ascii_case(name.trim())
  }
}
