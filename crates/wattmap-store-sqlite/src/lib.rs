//! SQLite backend for the wattmap electricity-access store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime. The backend adapts at
//! runtime to divergent physical schemas via per-call introspection.

mod audit;
mod introspect;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
