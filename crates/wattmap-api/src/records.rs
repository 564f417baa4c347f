//! Handlers for `/records` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/records` | Optional `?search=<country substring>` |
//! | `POST`   | `/records` | Upserts on `(country, year)`; creates the country |
//! | `PATCH`  | `/records/:id` | Partial update; 404 if unknown |
//! | `DELETE` | `/records/:id` | 404 if unknown |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use wattmap_core::{
  record::NormalizedRecord,
  store::{AccessStore, RecordPatch},
};

use crate::error::ApiError;

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
pub struct ListParams {
  pub search: Option<String>,
}

/// `GET /records[?search=<substring>]`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<NormalizedRecord>>, ApiError>
where
  S: AccessStore,
{
  let records = store
    .list_access_records(params.search.as_deref())
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(records))
}

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub country:        String,
  pub year:           i32,
  pub people_without: i64,
  pub people_with:    Option<i64>,
  pub population:     Option<i64>,
}

/// `POST /records` — body:
/// `{"country":"Kenya","year":2016,"people_without":250000,"population":1000000}`
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AccessStore,
{
  let record_id = store
    .add_access_record(
      &body.country,
      body.year,
      body.people_without,
      body.people_with,
      body.population,
    )
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(json!({ "record_id": record_id }))))
}

// ─── Update ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
pub struct UpdateBody {
  pub people_without: Option<i64>,
  pub people_with:    Option<i64>,
  pub population:     Option<i64>,
}

/// `PATCH /records/:id` — any subset of the value fields.
pub async fn update<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
  Json(body): Json<UpdateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AccessStore,
{
  let patch = RecordPatch {
    people_without: body.people_without,
    people_with:    body.people_with,
    population:     body.population,
  };
  store
    .update_access_record(id, patch)
    .await
    .map_err(ApiError::from_store)?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /records/:id`
pub async fn remove<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AccessStore,
{
  store
    .delete_access_record(id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(StatusCode::NO_CONTENT)
}
