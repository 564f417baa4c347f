//! The `AccessStore` trait and supporting types.
//!
//! The trait is implemented by storage backends (e.g.
//! `wattmap-store-sqlite`). Higher layers (`wattmap-api`, `wattmap-cli`,
//! `wattmap-ingest`) depend on this abstraction, not on any concrete
//! backend.

use std::future::Future;

use crate::{
  country::Country,
  record::NormalizedRecord,
  report::{
    CountryAccess, CountryComparison, Improvement, RegionAccess,
    UnservedTotal, YearlyAccess,
  },
};

// ─── Write inputs ────────────────────────────────────────────────────────────

/// Partial update for [`AccessStore::update_access_record`]. Fields left
/// `None` are untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordPatch {
  pub people_without: Option<i64>,
  pub people_with:    Option<i64>,
  pub population:     Option<i64>,
}

impl RecordPatch {
  pub fn is_empty(&self) -> bool {
    self.people_without.is_none()
      && self.people_with.is_none()
      && self.population.is_none()
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over an electricity-access store backend.
///
/// Writes are individually atomic per call; per-year rows upsert on their
/// `(country, year)` uniqueness constraint. Read queries degrade to an
/// empty result when a required logical table is absent — an empty list is
/// "no data", never a masked error.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait AccessStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Countries ─────────────────────────────────────────────────────────

  /// Upsert a country by name (insert, or keep the existing row on a name
  /// conflict) and return the stored row.
  fn add_country<'a>(
    &'a self,
    name: &'a str,
    region: Option<&'a str>,
  ) -> impl Future<Output = Result<Country, Self::Error>> + Send + 'a;

  /// Case-insensitive, trimmed lookup by name. `None` if not found.
  fn find_country<'a>(
    &'a self,
    name: &'a str,
  ) -> impl Future<Output = Result<Option<Country>, Self::Error>> + Send + 'a;

  /// All countries, in insertion order.
  fn list_countries(
    &self,
  ) -> impl Future<Output = Result<Vec<Country>, Self::Error>> + Send + '_;

  // ── Access records ────────────────────────────────────────────────────

  /// Create (or reuse) the named country, then upsert the per-year record.
  /// Returns the record id. Failing to resolve or create the country is a
  /// fatal error for this call.
  fn add_access_record<'a>(
    &'a self,
    country_name: &'a str,
    year: i32,
    people_without: i64,
    people_with: Option<i64>,
    population: Option<i64>,
  ) -> impl Future<Output = Result<i64, Self::Error>> + Send + 'a;

  /// Apply a partial update to an existing record by id.
  fn update_access_record(
    &self,
    record_id: i64,
    patch: RecordPatch,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Delete one record by id. Never cascades to the country.
  fn delete_access_record(
    &self,
    record_id: i64,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// All records in normalised shape, optionally filtered by a
  /// case-insensitive substring of the country name.
  fn list_access_records<'a>(
    &'a self,
    search: Option<&'a str>,
  ) -> impl Future<Output = Result<Vec<NormalizedRecord>, Self::Error>> + Send + 'a;

  // ── Loader entry points ───────────────────────────────────────────────

  /// Upsert a per-year access row keyed on `(country_id, year)`.
  fn upsert_access(
    &self,
    country_id: i64,
    year: i32,
    people_without: i64,
    people_with: Option<i64>,
    population: Option<i64>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Upsert a per-year population row keyed on `(country_id, year)`.
  fn upsert_population(
    &self,
    country_id: i64,
    year: i32,
    population: i64,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Analytical queries ────────────────────────────────────────────────

  /// Per-country sum of people-without across all years, keeping sums
  /// above `threshold`, sorted descending.
  /// Documented default threshold:
  /// [`DEFAULT_UNSERVED_THRESHOLD`](crate::report::DEFAULT_UNSERVED_THRESHOLD).
  fn high_unserved(
    &self,
    threshold: i64,
  ) -> impl Future<Output = Result<Vec<UnservedTotal>, Self::Error>> + Send + '_;

  /// Per-year total of people with access, sorted ascending by year.
  /// Derived from population sources when no people-with column exists;
  /// empty when no population source exists at all.
  fn yearly_trend(
    &self,
  ) -> impl Future<Output = Result<Vec<YearlyAccess>, Self::Error>> + Send + '_;

  /// Per-country access percentage for one year, aggregate-filtered,
  /// sorted descending by percentage.
  fn access_percent_by_year(
    &self,
    year: i32,
  ) -> impl Future<Output = Result<Vec<CountryAccess>, Self::Error>> + Send + '_;

  /// Per-region population-weighted access percentage for one year,
  /// sorted descending.
  fn regional_comparison(
    &self,
    year: i32,
  ) -> impl Future<Output = Result<Vec<RegionAccess>, Self::Error>> + Send + '_;

  /// Look two countries up in the per-country report for `year`. Always
  /// returns exactly two rows; a country without data yields a
  /// placeholder with `None` metrics.
  fn two_country_compare<'a>(
    &'a self,
    year: i32,
    first: &'a str,
    second: &'a str,
  ) -> impl Future<Output = Result<Vec<CountryComparison>, Self::Error>> + Send + 'a;

  /// Access-percentage improvement between two years per country, sorted
  /// descending. Countries missing population data in either year are
  /// excluded entirely. Documented default window: 1990–2016.
  fn most_improved(
    &self,
    start_year: i32,
    end_year: i32,
  ) -> impl Future<Output = Result<Vec<Improvement>, Self::Error>> + Send + '_;
}
