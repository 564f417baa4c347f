//! Schema mapping — adapting to whatever physical layout the store
//! currently has.
//!
//! Deployments of this dataset disagree on table and column names
//! (`Countries` vs `countries`, `people_without_electricity` vs
//! `num_without`, population embedded in the access table vs a separate
//! table). A [`SchemaMap`] is populated fresh on every call by the storage
//! backend's introspection and resolves logical roles to whatever physical
//! columns are present. Nothing is cached: the store's shape may change
//! between calls (e.g. an `ALTER TABLE` adding a population column).

use serde::Serialize;

/// Physical table-name candidates for each logical table, tried in order:
/// canonical CamelCase first, lowercase snake_case second.
pub const COUNTRY_TABLE_CANDIDATES: [&str; 2] = ["Countries", "countries"];
pub const ACCESS_TABLE_CANDIDATES: [&str; 2] =
  ["ElectricityAccess", "electricity_access"];
pub const POPULATION_TABLE_CANDIDATES: [&str; 2] =
  ["PopulationData", "population_data"];

/// Fallback physical name for the people-without column when no column
/// matches the role by substring.
pub const CANONICAL_WITHOUT_COL: &str = "people_without_electricity";

/// One physical table: its resolved name and declared column list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSchema {
  pub table:   String,
  pub columns: Vec<String>,
}

impl TableSchema {
  pub fn new(table: impl Into<String>, columns: Vec<String>) -> Self {
    Self { table: table.into(), columns }
  }

  /// First column whose name contains `needle` (case-insensitive).
  fn first_containing(&self, needle: &str) -> Option<&str> {
    self
      .columns
      .iter()
      .find(|c| c.to_lowercase().contains(needle))
      .map(String::as_str)
  }

  /// "id" role: first column containing `id`; fallback first column.
  pub fn id_col(&self) -> &str {
    self
      .first_containing("id")
      .or_else(|| self.columns.first().map(String::as_str))
      .unwrap_or("id")
  }

  /// "name" role: first column containing `name`; fallback to the second
  /// declared column (the canonical layouts put the name there).
  pub fn name_col(&self) -> &str {
    self
      .first_containing("name")
      .or_else(|| self.columns.get(1).map(String::as_str))
      .or_else(|| self.columns.first().map(String::as_str))
      .unwrap_or("name")
  }

  /// "region" role; `None` means regional features are unavailable.
  pub fn region_col(&self) -> Option<&str> {
    self.first_containing("region")
  }

  /// "year" role: exact match only (case-insensitive) — plenty of other
  /// columns contain the substring in dirty schemas.
  pub fn year_col(&self) -> &str {
    self
      .columns
      .iter()
      .find(|c| c.eq_ignore_ascii_case("year"))
      .map(String::as_str)
      .unwrap_or("year")
  }

  /// "without" role; falls back to the canonical column name.
  pub fn without_col(&self) -> &str {
    self
      .first_containing("without")
      .unwrap_or(CANONICAL_WITHOUT_COL)
  }

  /// "with" role: must contain `with` but not `without`, so the
  /// people-without column never shadows its counterpart. No fallback —
  /// absence means the value must be derived.
  pub fn with_col(&self) -> Option<&str> {
    self
      .columns
      .iter()
      .find(|c| {
        let lower = c.to_lowercase();
        lower.contains("with") && !lower.contains("without")
      })
      .map(String::as_str)
  }

  /// "population" role: `population` or the common abbreviation `pop`.
  pub fn population_col(&self) -> Option<&str> {
    self
      .first_containing("population")
      .or_else(|| self.first_containing("pop"))
  }

  /// "country foreign key" role.
  pub fn country_fk_col(&self) -> &str {
    self.first_containing("country").unwrap_or("country_id")
  }
}

/// The store's current physical layout for the three logical tables.
/// `None` means the table is absent; queries that need it return an empty
/// result set rather than raising.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaMap {
  pub countries:  Option<TableSchema>,
  pub access:     Option<TableSchema>,
  pub population: Option<TableSchema>,
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  fn table(cols: &[&str]) -> TableSchema {
    TableSchema::new("t", cols.iter().map(|c| c.to_string()).collect())
  }

  #[test]
  fn canonical_access_columns_resolve() {
    let t = table(&[
      "record_id",
      "country_id",
      "year",
      "population",
      "people_without_electricity",
      "people_with_electricity",
    ]);
    assert_eq!(t.id_col(), "record_id");
    assert_eq!(t.year_col(), "year");
    assert_eq!(t.without_col(), "people_without_electricity");
    assert_eq!(t.with_col(), Some("people_with_electricity"));
    assert_eq!(t.population_col(), Some("population"));
    assert_eq!(t.country_fk_col(), "country_id");
  }

  #[test]
  fn with_role_never_matches_the_without_column() {
    let t = table(&["record_id", "country_id", "Year", "people_without_electricity"]);
    assert_eq!(t.with_col(), None);
    assert_eq!(t.year_col(), "Year");
  }

  #[test]
  fn name_role_falls_back_to_second_column() {
    let t = table(&["cid", "label", "region"]);
    assert_eq!(t.name_col(), "label");
    assert_eq!(t.region_col(), Some("region"));
  }

  #[test]
  fn population_role_accepts_pop_abbreviation() {
    let t = table(&["rid", "country_id", "year", "pop_total", "num_without"]);
    assert_eq!(t.population_col(), Some("pop_total"));
    assert_eq!(t.without_col(), "num_without");
  }

  #[test]
  fn missing_roles_use_canonical_fallbacks() {
    let t = table(&["a", "b"]);
    assert_eq!(t.without_col(), CANONICAL_WITHOUT_COL);
    assert_eq!(t.country_fk_col(), "country_id");
    assert_eq!(t.year_col(), "year");
  }
}
