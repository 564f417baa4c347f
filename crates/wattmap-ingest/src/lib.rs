//! CSV loaders for the wattmap datasets.
//!
//! Two input files are supported:
//!
//! - the electricity dataset (`Entity`, `Code`, `Year`, plus a long-named
//!   people-without column that is sniffed from the header row), and
//! - the Kaggle-style wide population dataset (`Country Name`,
//!   `Country Code`, then one column per year).
//!
//! Both loaders are idempotent: every write is an upsert keyed on
//! `(country, year)`, so re-running a load never duplicates rows.

pub mod electricity;
pub mod error;
pub mod population;

use wattmap_core::{record::RawValue, store::AccessStore};

pub use electricity::load_electricity;
pub use error::{Error, Result};
pub use population::PopulationTable;

/// Rows seen / written / skipped for one loader pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
  pub seen:    usize,
  pub written: usize,
  pub skipped: usize,
}

/// Combined outcome of [`load_dataset`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DatasetReport {
  pub electricity: IngestReport,
  pub population:  IngestReport,
}

/// Load the electricity dataset, and optionally the population dataset,
/// into `store`.
///
/// Countries are keyed by the electricity file's `Entity` column; the
/// `Code` column links entities to the population file's ISO3 codes. The
/// population file alone cannot be loaded — without the electricity pass
/// there are no countries to attach its rows to.
pub async fn load_dataset<S>(
  store: &S,
  electricity_csv: impl std::io::Read,
  population_csv: Option<impl std::io::Read>,
) -> Result<DatasetReport>
where
  S: AccessStore,
{
  let populations = match population_csv {
    Some(reader) => Some(PopulationTable::from_reader(reader)?),
    None => None,
  };

  let (electricity, codes) =
    load_electricity(store, electricity_csv, populations.as_ref()).await?;

  let population = match populations.as_ref() {
    Some(table) => population::load_population(store, table, &codes).await?,
    None => IngestReport::default(),
  };

  Ok(DatasetReport { electricity, population })
}

/// Parse one CSV cell as a count, tolerating thousands separators, float
/// notation, and the `"None"` sentinel some exports carry.
pub(crate) fn parse_count(raw: &str) -> Option<i64> {
  RawValue::Text(raw.to_owned()).as_int()
}

#[cfg(test)]
mod tests;
