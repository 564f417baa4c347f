//! Handlers for `/reports/*` — the analytical query set.
//!
//! | Path | Params |
//! |------|--------|
//! | `/reports/high-unserved` | `?threshold=` (default 1,000,000) |
//! | `/reports/yearly-trend` | none |
//! | `/reports/access-percent` | `?year=` (required) |
//! | `/reports/regional` | `?year=` (required) |
//! | `/reports/compare` | `?year=&first=&second=` |
//! | `/reports/most-improved` | `?start=&end=` (default 1990–2016) |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
};
use serde::Deserialize;
use wattmap_core::{
  report::{
    CountryAccess, CountryComparison, DEFAULT_IMPROVEMENT_END,
    DEFAULT_IMPROVEMENT_START, DEFAULT_UNSERVED_THRESHOLD, Improvement,
    RegionAccess, UnservedTotal, YearlyAccess,
  },
  store::AccessStore,
};

use crate::error::ApiError;

// ─── High unserved ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
pub struct HighUnservedParams {
  pub threshold: Option<i64>,
}

/// `GET /reports/high-unserved[?threshold=N]`
pub async fn high_unserved<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<HighUnservedParams>,
) -> Result<Json<Vec<UnservedTotal>>, ApiError>
where
  S: AccessStore,
{
  let threshold = params.threshold.unwrap_or(DEFAULT_UNSERVED_THRESHOLD);
  let rows = store
    .high_unserved(threshold)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(rows))
}

// ─── Yearly trend ─────────────────────────────────────────────────────────────

/// `GET /reports/yearly-trend`
pub async fn yearly_trend<S>(
  State(store): State<Arc<S>>,
) -> Result<Json<Vec<YearlyAccess>>, ApiError>
where
  S: AccessStore,
{
  let rows = store.yearly_trend().await.map_err(ApiError::from_store)?;
  Ok(Json(rows))
}

// ─── Per-country access percentage ────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct YearParams {
  pub year: i32,
}

/// `GET /reports/access-percent?year=N`
pub async fn access_percent<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<YearParams>,
) -> Result<Json<Vec<CountryAccess>>, ApiError>
where
  S: AccessStore,
{
  let rows = store
    .access_percent_by_year(params.year)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(rows))
}

// ─── Regional comparison ──────────────────────────────────────────────────────

/// `GET /reports/regional?year=N`
pub async fn regional<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<YearParams>,
) -> Result<Json<Vec<RegionAccess>>, ApiError>
where
  S: AccessStore,
{
  let rows = store
    .regional_comparison(params.year)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(rows))
}

// ─── Two-country comparison ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CompareParams {
  pub year:   i32,
  pub first:  String,
  pub second: String,
}

/// `GET /reports/compare?year=N&first=A&second=B`
pub async fn compare<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<CompareParams>,
) -> Result<Json<Vec<CountryComparison>>, ApiError>
where
  S: AccessStore,
{
  let rows = store
    .two_country_compare(params.year, &params.first, &params.second)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(rows))
}

// ─── Most improved ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
pub struct ImprovedParams {
  pub start: Option<i32>,
  pub end:   Option<i32>,
}

/// `GET /reports/most-improved[?start=N&end=M]`
pub async fn most_improved<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<ImprovedParams>,
) -> Result<Json<Vec<Improvement>>, ApiError>
where
  S: AccessStore,
{
  let rows = store
    .most_improved(
      params.start.unwrap_or(DEFAULT_IMPROVEMENT_START),
      params.end.unwrap_or(DEFAULT_IMPROVEMENT_END),
    )
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(rows))
}
