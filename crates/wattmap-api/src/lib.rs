//! JSON REST API for wattmap.
//!
//! Exposes an axum [`Router`] backed by any
//! [`wattmap_core::store::AccessStore`]. Auth, TLS, and transport concerns
//! are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", wattmap_api::api_router(store.clone()))
//! ```

pub mod countries;
pub mod error;
pub mod records;
pub mod reports;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, patch},
};
use wattmap_core::store::AccessStore;

pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router
/// regardless of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: AccessStore + Clone + Send + Sync + 'static,
{
  Router::new()
    // Countries
    .route(
      "/countries",
      get(countries::list::<S>).post(countries::create::<S>),
    )
    // Records
    .route(
      "/records",
      get(records::list::<S>).post(records::create::<S>),
    )
    .route(
      "/records/{id}",
      patch(records::update::<S>).delete(records::remove::<S>),
    )
    // Reports
    .route("/reports/high-unserved", get(reports::high_unserved::<S>))
    .route("/reports/yearly-trend", get(reports::yearly_trend::<S>))
    .route("/reports/access-percent", get(reports::access_percent::<S>))
    .route("/reports/regional", get(reports::regional::<S>))
    .route("/reports/compare", get(reports::compare::<S>))
    .route("/reports/most-improved", get(reports::most_improved::<S>))
    .with_state(store)
}
