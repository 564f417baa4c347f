//! Electricity dataset loader: `Entity`, `Code`, `Year`, plus a long-named
//! people-without column.

use std::{collections::HashMap, io::Read};

use wattmap_core::store::AccessStore;

use crate::{
  IngestReport,
  error::{Error, Result},
  parse_count,
  population::PopulationTable,
};

/// ISO3 code to country ids, built during the electricity pass. One code
/// may map to multiple rows when entities share a code.
pub type CodeIndex = HashMap<String, Vec<i64>>;

struct Columns {
  entity:  usize,
  code:    Option<usize>,
  year:    Option<usize>,
  without: usize,
}

/// Sniff the column layout from the header row. The people-without column
/// is whichever header mentions `without`, falling back to one mentioning
/// `access` or `electricity` (the published header is a full sentence and
/// varies between dataset revisions).
fn resolve_columns(headers: &csv::StringRecord) -> Result<Columns> {
  let exact = |name: &str| {
    headers
      .iter()
      .position(|h| h.trim().eq_ignore_ascii_case(name))
  };

  let without = headers
    .iter()
    .position(|h| h.to_lowercase().contains("without"))
    .or_else(|| {
      headers.iter().position(|h| {
        let h = h.to_lowercase();
        h.contains("access") || h.contains("electricity")
      })
    })
    .ok_or_else(|| {
      Error::MissingWithoutColumn(headers.iter().map(str::to_owned).collect())
    })?;

  Ok(Columns {
    entity: exact("entity").unwrap_or(0),
    code: exact("code"),
    year: exact("year"),
    without,
  })
}

/// Load the electricity file into `store`.
///
/// Entities upsert as countries; each data row upserts one per-year access
/// record. Rows with an unparseable year are skipped. When `populations`
/// carries a figure for the row's code and year it is written alongside,
/// with people-with derived as `population - without` when non-negative.
///
/// Returns the load report and the [`CodeIndex`] needed to attach
/// population rows afterwards.
pub async fn load_electricity<S>(
  store: &S,
  reader: impl Read,
  populations: Option<&PopulationTable>,
) -> Result<(IngestReport, CodeIndex)>
where
  S: AccessStore,
{
  let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
  let headers = rdr.headers()?.clone();
  let cols = resolve_columns(&headers)?;

  let mut report = IngestReport::default();
  let mut countries: HashMap<String, i64> = HashMap::new();
  let mut codes = CodeIndex::new();

  for record in rdr.records() {
    let record = record?;
    report.seen += 1;

    // blank entities collapse into a single placeholder country
    let entity = match record.get(cols.entity).map(str::trim) {
      Some("") | None => "NONE",
      Some(entity) => entity,
    };
    let code = cols
      .code
      .and_then(|idx| record.get(idx))
      .map(str::trim)
      .unwrap_or("");

    // the country registers even when the rest of the row is unusable
    let key = entity.to_lowercase();
    let country_id = match countries.get(&key) {
      Some(id) => *id,
      None => {
        let country =
          store.add_country(entity, None).await.map_err(Error::store)?;
        countries.insert(key, country.country_id);
        country.country_id
      }
    };
    if !code.is_empty() {
      let ids = codes.entry(code.to_owned()).or_default();
      if !ids.contains(&country_id) {
        ids.push(country_id);
      }
    }

    let Some(year) = cols
      .year
      .and_then(|idx| record.get(idx))
      .and_then(parse_count)
      .and_then(|y| i32::try_from(y).ok())
    else {
      report.skipped += 1;
      continue;
    };
    let people_without = record
      .get(cols.without)
      .and_then(parse_count)
      .unwrap_or(0);

    let population = match (populations, code) {
      (Some(table), code) if !code.is_empty() => table.get(code, year),
      _ => None,
    };
    let people_with = population.and_then(|pop| {
      let with = pop - people_without;
      (with >= 0).then_some(with)
    });

    store
      .upsert_access(country_id, year, people_without, people_with, population)
      .await
      .map_err(Error::store)?;
    report.written += 1;
  }

  tracing::info!(
    seen = report.seen,
    written = report.written,
    skipped = report.skipped,
    countries = countries.len(),
    "electricity load complete"
  );
  Ok((report, codes))
}
