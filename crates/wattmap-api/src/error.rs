//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Map a store error onto an HTTP status by walking its source chain
  /// for the domain error it wraps. Anything unrecognised is a 500.
  pub fn from_store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    let mut cursor: Option<&(dyn std::error::Error + 'static)> = Some(&e);
    while let Some(err) = cursor {
      if let Some(core) = err.downcast_ref::<wattmap_core::Error>() {
        return match core {
          wattmap_core::Error::RecordNotFound(id) => {
            ApiError::NotFound(format!("record {id} not found"))
          }
          wattmap_core::Error::UnresolvableCountry(name) => {
            ApiError::BadRequest(format!("cannot resolve country {name:?}"))
          }
          wattmap_core::Error::EmptyCountryName => {
            ApiError::BadRequest("country name must not be blank".to_owned())
          }
        };
      }
      cursor = err.source();
    }
    ApiError::Store(Box::new(e))
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
