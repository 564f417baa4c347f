//! Handlers for `/countries` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/countries` | All countries in insertion order |
//! | `POST` | `/countries` | Body: `{"name":"Kenya","region":"Africa"}`; upserts by name |

use std::sync::Arc;

use axum::{
  Json,
  extract::State,
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use wattmap_core::{country::Country, store::AccessStore};

use crate::error::ApiError;

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /countries`
pub async fn list<S>(
  State(store): State<Arc<S>>,
) -> Result<Json<Vec<Country>>, ApiError>
where
  S: AccessStore,
{
  let countries = store
    .list_countries()
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(countries))
}

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub name:   String,
  pub region: Option<String>,
}

/// `POST /countries` — body: `{"name":"Kenya","region":"Africa"}`
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AccessStore,
{
  let country = store
    .add_country(&body.name, body.region.as_deref())
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(country)))
}
