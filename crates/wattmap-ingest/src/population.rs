//! Kaggle-style wide population file: `Country Name`, `Country Code`, then
//! one column per year.

use std::{collections::HashMap, io::Read, ops::RangeInclusive};

use wattmap_core::store::AccessStore;

use crate::{
  IngestReport,
  electricity::CodeIndex,
  error::{Error, Result},
  parse_count,
};

/// Years imported from the population file, matching the coverage of the
/// electricity dataset.
pub const POPULATION_YEARS: RangeInclusive<i32> = 1990..=2016;

/// In-memory population figures keyed by ISO3 code and year.
#[derive(Debug, Default)]
pub struct PopulationTable {
  pub(crate) by_code: HashMap<String, HashMap<i32, i64>>,
}

impl PopulationTable {
  /// Parse the wide CSV. Year columns outside [`POPULATION_YEARS`] and
  /// blank or unparseable cells are dropped. A file without a
  /// `Country Code` column yields an empty table.
  pub fn from_reader(reader: impl Read) -> Result<Self> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = rdr.headers()?.clone();

    let year_cols: Vec<(usize, i32)> = headers
      .iter()
      .enumerate()
      .filter_map(|(idx, h)| h.trim().parse::<i32>().ok().map(|y| (idx, y)))
      .filter(|(_, year)| POPULATION_YEARS.contains(year))
      .collect();
    let Some(code_idx) = headers
      .iter()
      .position(|h| h.trim().eq_ignore_ascii_case("country code"))
    else {
      return Ok(Self::default());
    };

    let mut by_code: HashMap<String, HashMap<i32, i64>> = HashMap::new();
    for record in rdr.records() {
      let record = record?;
      let code = record.get(code_idx).unwrap_or("").trim();
      if code.is_empty() {
        continue;
      }
      let years = by_code.entry(code.to_owned()).or_default();
      for (idx, year) in &year_cols {
        let Some(value) = record.get(*idx) else { continue };
        if let Some(population) = parse_count(value) {
          years.insert(*year, population);
        }
      }
    }
    Ok(Self { by_code })
  }

  pub fn get(&self, code: &str, year: i32) -> Option<i64> {
    self.by_code.get(code)?.get(&year).copied()
  }

  pub fn is_empty(&self) -> bool {
    self.by_code.is_empty()
  }
}

/// Upsert the table's figures for every country whose ISO3 code was seen
/// during the electricity pass.
pub async fn load_population<S>(
  store: &S,
  table: &PopulationTable,
  codes: &CodeIndex,
) -> Result<IngestReport>
where
  S: AccessStore,
{
  let mut report = IngestReport::default();

  for (code, years) in &table.by_code {
    report.seen += years.len();
    let Some(country_ids) = codes.get(code) else {
      report.skipped += years.len();
      continue;
    };
    for country_id in country_ids {
      for (&year, &population) in years {
        store
          .upsert_population(*country_id, year, population)
          .await
          .map_err(Error::store)?;
        report.written += 1;
      }
    }
  }

  tracing::info!(
    seen = report.seen,
    written = report.written,
    skipped = report.skipped,
    "population load complete"
  );
  Ok(report)
}
