//! Core types and trait definitions for the wattmap electricity-access store.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

pub mod aggregate;
pub mod country;
pub mod derive;
pub mod error;
pub mod record;
pub mod report;
pub mod schema;
pub mod store;

pub use error::{Error, Result};
