//! Error types for `wattmap-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// `add_access_record` was given a country name that could neither be
  /// found nor created. This is fatal to the call: it indicates a
  /// data-integrity problem upstream and must not be silently ignored.
  #[error("could not resolve or create country {0:?}")]
  UnresolvableCountry(String),

  #[error("access record not found: {0}")]
  RecordNotFound(i64),

  #[error("country name must not be empty")]
  EmptyCountryName,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
