//! Loader tests against an in-memory store.

use wattmap_core::store::AccessStore;
use wattmap_store_sqlite::SqliteStore;

use crate::{Error, PopulationTable, load_dataset, load_electricity};

const ELECTRICITY_CSV: &str = "\
Entity,Code,Year,Number of people without access to electricity (people without electricity access)
Testland,TST,2015,400000
Testland,TST,2016,250000
Gridland,GRD,2016,0
Nowhere,NWH,not-a-year,123
";

const POPULATION_CSV: &str = "\
Country Name,Country Code,1960,2015,2016
Testland,TST,500000,900000,1000000
Gridland,GRD,100,150,200
Orphan,ORP,1,2,3
";

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

#[tokio::test]
async fn loads_both_files_end_to_end() {
  let s = store().await;
  let report = load_dataset(
    &s,
    ELECTRICITY_CSV.as_bytes(),
    Some(POPULATION_CSV.as_bytes()),
  )
  .await
  .unwrap();

  // one malformed-year row skipped, three written
  assert_eq!(report.electricity.seen, 4);
  assert_eq!(report.electricity.written, 3);
  assert_eq!(report.electricity.skipped, 1);
  // ORP has no matching country; two years per matched code
  assert_eq!(report.population.written, 4);
  assert_eq!(report.population.skipped, 2);

  // the malformed row still created its country, but no record
  assert_eq!(s.list_countries().await.unwrap().len(), 3);

  let percents = s.access_percent_by_year(2016).await.unwrap();
  assert_eq!(percents.len(), 2);
  assert_eq!(percents[0].country, "Gridland");
  assert_eq!(percents[0].access_percent, 100.00);
  assert_eq!(percents[1].country, "Testland");
  assert_eq!(percents[1].access_percent, 75.00);
}

#[tokio::test]
async fn reload_is_idempotent() {
  let s = store().await;
  for _ in 0..2 {
    load_dataset(
      &s,
      ELECTRICITY_CSV.as_bytes(),
      Some(POPULATION_CSV.as_bytes()),
    )
    .await
    .unwrap();
  }

  assert_eq!(s.list_countries().await.unwrap().len(), 3);
  assert_eq!(s.list_access_records(None).await.unwrap().len(), 3);
}

#[tokio::test]
async fn electricity_loads_without_population_file() {
  let s = store().await;
  let (report, codes) =
    load_electricity(&s, ELECTRICITY_CSV.as_bytes(), None)
      .await
      .unwrap();

  assert_eq!(report.written, 3);
  assert_eq!(codes.len(), 3);

  let records = s.list_access_records(Some("Testland")).await.unwrap();
  assert_eq!(records.len(), 2);
  assert_eq!(records[1].year, Some(2016));
  assert_eq!(records[1].people_without, 250_000);
  assert_eq!(records[1].population, None);
}

#[tokio::test]
async fn derives_people_with_from_population() {
  let s = store().await;
  load_dataset(
    &s,
    ELECTRICITY_CSV.as_bytes(),
    Some(POPULATION_CSV.as_bytes()),
  )
  .await
  .unwrap();

  let records = s.list_access_records(Some("Testland")).await.unwrap();
  let r2016 = records.iter().find(|r| r.year == Some(2016)).unwrap();
  assert_eq!(r2016.population, Some(1_000_000));
  assert_eq!(r2016.people_with, Some(750_000));
}

#[tokio::test]
async fn without_column_sniffs_by_fallback_keywords() {
  let s = store().await;
  let csv = "\
Entity,Code,Year,Share lacking electricity access
Testland,TST,2016,42
";
  let (report, _) = load_electricity(&s, csv.as_bytes(), None).await.unwrap();
  assert_eq!(report.written, 1);
  assert_eq!(
    s.list_access_records(None).await.unwrap()[0].people_without,
    42
  );
}

#[tokio::test]
async fn unrecognisable_header_is_an_error() {
  let s = store().await;
  let csv = "Entity,Code,Year,Widgets\nTestland,TST,2016,1\n";
  let err = load_electricity(&s, csv.as_bytes(), None).await.unwrap_err();
  assert!(matches!(err, Error::MissingWithoutColumn(_)));
}

#[tokio::test]
async fn population_table_honours_year_window_and_sentinels() {
  let csv = "\
Country Name,Country Code,1960,2016,2017
Testland,TST,111,\"1,000,000\",222
Blankland,BLK,,None,
";
  let table = PopulationTable::from_reader(csv.as_bytes()).unwrap();

  // 1960 and 2017 fall outside the import window
  assert_eq!(table.get("TST", 1960), None);
  assert_eq!(table.get("TST", 2017), None);
  assert_eq!(table.get("TST", 2016), Some(1_000_000));
  // blank and sentinel cells are absent, not zero
  assert_eq!(table.get("BLK", 2016), None);
}

#[tokio::test]
async fn blank_entities_collapse_into_placeholder() {
  let s = store().await;
  let csv = "\
Entity,Code,Year,people without electricity
,,2015,10
 ,,2016,20
";
  let (report, _) = load_electricity(&s, csv.as_bytes(), None).await.unwrap();
  assert_eq!(report.written, 2);

  let countries = s.list_countries().await.unwrap();
  assert_eq!(countries.len(), 1);
  assert_eq!(countries[0].name, "NONE");
}
