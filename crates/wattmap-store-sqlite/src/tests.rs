//! Integration tests for `SqliteStore` against an in-memory database.

use wattmap_core::{
  aggregate::AggregatePolicy,
  report::DEFAULT_UNSERVED_THRESHOLD,
  store::{AccessStore, RecordPatch},
};

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

/// A store adopting a pre-existing lowercase schema, as produced by other
/// tooling, never touched by the canonical DDL.
async fn legacy_store(ddl: &str) -> SqliteStore {
  let conn = tokio_rusqlite::Connection::open_in_memory()
    .await
    .expect("in-memory connection");
  let s = SqliteStore::from_connection(conn)
    .await
    .expect("adopted store");
  s.execute_batch(ddl).await.expect("legacy seed");
  s
}

// ─── Countries ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_and_find_country() {
  let s = store().await;

  let c = s.add_country("Testland", Some("Testia")).await.unwrap();
  assert_eq!(c.name, "Testland");
  assert_eq!(c.region.as_deref(), Some("Testia"));

  let found = s.find_country("  testland ").await.unwrap().unwrap();
  assert_eq!(found.country_id, c.country_id);
}

#[tokio::test]
async fn add_country_is_idempotent_and_keeps_region() {
  let s = store().await;

  let first = s.add_country("Testland", Some("Testia")).await.unwrap();
  let again = s.add_country(" TESTLAND ", Some("Elsewhere")).await.unwrap();

  assert_eq!(again.country_id, first.country_id);
  assert_eq!(again.region.as_deref(), Some("Testia"));
  assert_eq!(s.list_countries().await.unwrap().len(), 1);
}

#[tokio::test]
async fn add_country_rejects_blank_name() {
  let s = store().await;
  let err = s.add_country("   ", None).await.unwrap_err();
  assert!(matches!(
    err,
    Error::Core(wattmap_core::Error::EmptyCountryName)
  ));
}

#[tokio::test]
async fn find_country_missing_returns_none() {
  let s = store().await;
  assert!(s.find_country("Atlantis").await.unwrap().is_none());
}

// ─── Records ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_record_creates_country_and_upserts_on_conflict() {
  let s = store().await;

  let id = s
    .add_access_record("Testland", 2020, 250_000, None, Some(1_000_000))
    .await
    .unwrap();
  let id_again = s
    .add_access_record("Testland", 2020, 200_000, None, Some(1_000_000))
    .await
    .unwrap();
  assert_eq!(id, id_again);

  let records = s.list_access_records(None).await.unwrap();
  assert_eq!(records.len(), 1);
  let rec = &records[0];
  assert_eq!(rec.country.as_deref(), Some("Testland"));
  assert_eq!(rec.year, Some(2020));
  assert_eq!(rec.people_without, 200_000);
  assert_eq!(rec.population, Some(1_000_000));
}

#[tokio::test]
async fn update_record_applies_partial_patch() {
  let s = store().await;
  let id = s
    .add_access_record("Testland", 2020, 250_000, None, Some(1_000_000))
    .await
    .unwrap();

  s.update_access_record(id, RecordPatch {
    people_without: Some(100_000),
    ..Default::default()
  })
  .await
  .unwrap();

  let records = s.list_access_records(None).await.unwrap();
  assert_eq!(records[0].people_without, 100_000);
  // untouched fields survive
  assert_eq!(records[0].population, Some(1_000_000));
}

#[tokio::test]
async fn update_unknown_record_is_not_found() {
  let s = store().await;
  let err = s
    .update_access_record(9999, RecordPatch {
      people_without: Some(1),
      ..Default::default()
    })
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Core(wattmap_core::Error::RecordNotFound(9999))
  ));
}

#[tokio::test]
async fn delete_record_then_delete_again_is_not_found() {
  let s = store().await;
  let id = s
    .add_access_record("Testland", 2020, 250_000, None, None)
    .await
    .unwrap();

  s.delete_access_record(id).await.unwrap();
  assert!(s.list_access_records(None).await.unwrap().is_empty());
  // the country row never cascades away
  assert_eq!(s.list_countries().await.unwrap().len(), 1);

  let err = s.delete_access_record(id).await.unwrap_err();
  assert!(matches!(
    err,
    Error::Core(wattmap_core::Error::RecordNotFound(_))
  ));
}

#[tokio::test]
async fn list_records_filters_by_country_substring() {
  let s = store().await;
  s.add_access_record("Testland", 2020, 10, None, None)
    .await
    .unwrap();
  s.add_access_record("Gridland", 2020, 20, None, None)
    .await
    .unwrap();

  let all = s.list_access_records(None).await.unwrap();
  assert_eq!(all.len(), 2);

  let hits = s.list_access_records(Some("GRID")).await.unwrap();
  assert_eq!(hits.len(), 1);
  assert_eq!(hits[0].country.as_deref(), Some("Gridland"));

  assert!(s.list_access_records(Some("xyz")).await.unwrap().is_empty());
}

// ─── Analytics: access percentage ────────────────────────────────────────────

#[tokio::test]
async fn access_percent_end_to_end() {
  let s = store().await;
  s.add_access_record("Testland", 2020, 250_000, None, Some(1_000_000))
    .await
    .unwrap();

  let report = s.access_percent_by_year(2020).await.unwrap();
  assert_eq!(report.len(), 1);
  assert_eq!(report[0].country, "Testland");
  assert_eq!(report[0].access_percent, 75.00);
  assert_eq!(report[0].people_without, 250_000);
}

#[tokio::test]
async fn access_percent_skips_aggregates_and_missing_population() {
  let s = store().await;
  s.add_access_record("Testland", 2020, 250_000, None, Some(1_000_000))
    .await
    .unwrap();
  s.add_access_record("World", 2020, 700_000_000, None, Some(7_000_000_000))
    .await
    .unwrap();
  s.add_access_record("High income", 2020, 1, None, Some(1_000_000))
    .await
    .unwrap();
  // no population from any source: excluded, not reported as 0%
  s.add_access_record("Popless", 2020, 500, None, None)
    .await
    .unwrap();

  let report = s.access_percent_by_year(2020).await.unwrap();
  assert_eq!(report.len(), 1);
  assert_eq!(report[0].country, "Testland");
}

#[tokio::test]
async fn access_percent_prefers_population_table_over_embedded() {
  let s = store().await;
  let c = s.add_country("Testland", None).await.unwrap();
  s.add_access_record("Testland", 2020, 250_000, None, Some(1_000_000))
    .await
    .unwrap();
  s.upsert_population(c.country_id, 2020, 2_000_000).await.unwrap();

  let report = s.access_percent_by_year(2020).await.unwrap();
  assert_eq!(report[0].population, 2_000_000);
  assert_eq!(report[0].access_percent, 87.50);
}

#[tokio::test]
async fn access_percent_clamps_corrupt_without() {
  let s = store().await;
  s.add_access_record("Testland", 2020, 1_500_000, None, Some(1_000_000))
    .await
    .unwrap();

  let report = s.access_percent_by_year(2020).await.unwrap();
  assert_eq!(report[0].access_percent, 0.00);
  assert_eq!(report[0].people_without, 1_000_000);
}

#[tokio::test]
async fn extended_aggregate_policy_filters_more_names() {
  let extra = AggregatePolicy::with_extra(vec!["testland".to_owned()]);
  let s = store().await.with_policy(extra);
  s.add_access_record("Testland", 2020, 250_000, None, Some(1_000_000))
    .await
    .unwrap();

  assert!(s.access_percent_by_year(2020).await.unwrap().is_empty());
}

// ─── Analytics: unserved totals and trend ────────────────────────────────────

#[tokio::test]
async fn high_unserved_sums_filters_and_sorts() {
  let s = store().await;
  s.add_access_record("Alpha", 2019, 600_000, None, None)
    .await
    .unwrap();
  s.add_access_record("Alpha", 2020, 600_000, None, None)
    .await
    .unwrap();
  s.add_access_record("Beta", 2020, 400_000, None, None)
    .await
    .unwrap();
  s.add_access_record("Gamma", 2020, 2_000_000, None, None)
    .await
    .unwrap();
  s.add_access_record("World", 2020, 5_000_000_000, None, None)
    .await
    .unwrap();

  let rows = s.high_unserved(DEFAULT_UNSERVED_THRESHOLD).await.unwrap();
  let names: Vec<&str> = rows.iter().map(|r| r.country.as_str()).collect();
  assert_eq!(names, ["Gamma", "Alpha"]);
  assert_eq!(rows[1].total_without, 1_200_000);
}

#[tokio::test]
async fn yearly_trend_sums_stored_with_column() {
  let s = store().await;
  s.add_access_record("Alpha", 2019, 300, Some(700), None)
    .await
    .unwrap();
  s.add_access_record("Alpha", 2020, 200, Some(800), None)
    .await
    .unwrap();
  s.add_access_record("Beta", 2020, 800, Some(200), None)
    .await
    .unwrap();

  let trend = s.yearly_trend().await.unwrap();
  assert_eq!(trend.len(), 2);
  assert_eq!((trend[0].year, trend[0].total_with), (2019, 700));
  assert_eq!((trend[1].year, trend[1].total_with), (2020, 1000));
}

#[tokio::test]
async fn yearly_trend_derives_from_population_when_with_is_absent() {
  let s = legacy_store(
    "CREATE TABLE countries (id INTEGER PRIMARY KEY, name TEXT, region TEXT);
     CREATE TABLE electricity_access (
       rec_id INTEGER PRIMARY KEY,
       country_id INTEGER,
       year INTEGER,
       population INTEGER,
       people_without_electricity INTEGER
     );
     INSERT INTO countries VALUES (1, 'Testland', 'Testia');
     INSERT INTO electricity_access VALUES (1, 1, 2019, 1000, 400);
     INSERT INTO electricity_access VALUES (2, 1, 2020, 1000, 250);",
  )
  .await;

  let trend = s.yearly_trend().await.unwrap();
  assert_eq!((trend[0].year, trend[0].total_with), (2019, 600));
  assert_eq!((trend[1].year, trend[1].total_with), (2020, 750));
}

// ─── Analytics: regions, comparison, improvement ─────────────────────────────

#[tokio::test]
async fn regional_comparison_is_population_weighted() {
  let s = store().await;
  s.add_country("Alpha", Some("Testia")).await.unwrap();
  s.add_country("Beta", Some("Testia")).await.unwrap();
  // A: 100% access at pop 100, B: 0% at pop 900; weighted = 10%, not 50%
  s.add_access_record("Alpha", 2020, 0, None, Some(100))
    .await
    .unwrap();
  s.add_access_record("Beta", 2020, 900, None, Some(900))
    .await
    .unwrap();

  let regions = s.regional_comparison(2020).await.unwrap();
  assert_eq!(regions.len(), 1);
  assert_eq!(regions[0].region, "Testia");
  assert_eq!(regions[0].access_percent, 10.00);
}

#[tokio::test]
async fn regional_comparison_drops_blank_regions() {
  let s = store().await;
  // no region recorded: the country lands in the blank group, which is
  // dropped from the report
  s.add_access_record("Alpha", 2020, 0, None, Some(100))
    .await
    .unwrap();

  assert!(s.regional_comparison(2020).await.unwrap().is_empty());
}

#[tokio::test]
async fn two_country_compare_always_returns_two_rows() {
  let s = store().await;
  s.add_access_record("Testland", 2020, 250_000, None, Some(1_000_000))
    .await
    .unwrap();

  let rows = s
    .two_country_compare(2020, " testland ", "Atlantis")
    .await
    .unwrap();
  assert_eq!(rows.len(), 2);

  assert_eq!(rows[0].country, "Testland");
  assert_eq!(rows[0].access_percent, Some(75.00));
  assert_eq!(rows[0].people_with, Some(750_000));

  assert_eq!(rows[1].country, "Atlantis");
  assert_eq!(rows[1].access_percent, None);
  assert_eq!(rows[1].population, None);
}

#[tokio::test]
async fn most_improved_ranks_by_percentage_delta() {
  let s = store().await;
  s.add_access_record("Gridland", 1990, 500, None, Some(1000))
    .await
    .unwrap();
  s.add_access_record("Gridland", 2016, 100, None, Some(1000))
    .await
    .unwrap();
  s.add_access_record("Slowland", 1990, 500, None, Some(1000))
    .await
    .unwrap();
  s.add_access_record("Slowland", 2016, 400, None, Some(1000))
    .await
    .unwrap();
  // missing population in the start year: excluded entirely
  s.add_access_record("Lateland", 2016, 100, None, Some(1000))
    .await
    .unwrap();
  // aggregates never rank
  s.add_access_record("World", 1990, 900, None, Some(1000))
    .await
    .unwrap();
  s.add_access_record("World", 2016, 100, None, Some(1000))
    .await
    .unwrap();

  let rows = s.most_improved(1990, 2016).await.unwrap();
  let names: Vec<&str> = rows.iter().map(|r| r.country.as_str()).collect();
  assert_eq!(names, ["Gridland", "Slowland"]);

  assert_eq!(rows[0].start_percent, 50.00);
  assert_eq!(rows[0].end_percent, 90.00);
  assert_eq!(rows[0].improvement, 40.00);
  assert_eq!(rows[1].improvement, 10.00);
}

// ─── Schema adaptation ───────────────────────────────────────────────────────

#[tokio::test]
async fn adopts_lowercase_schema_for_reads() {
  let s = legacy_store(
    "CREATE TABLE countries (id INTEGER PRIMARY KEY, name TEXT, region TEXT);
     CREATE TABLE electricity_access (
       rec_id INTEGER PRIMARY KEY,
       country_id INTEGER,
       year INTEGER,
       population INTEGER,
       people_without_electricity INTEGER
     );
     INSERT INTO countries VALUES (1, 'Testland', 'Testia');
     INSERT INTO electricity_access VALUES (1, 1, 2020, 1000000, 250000);",
  )
  .await;

  let report = s.access_percent_by_year(2020).await.unwrap();
  assert_eq!(report.len(), 1);
  assert_eq!(report[0].country, "Testland");
  assert_eq!(report[0].access_percent, 75.00);

  let records = s.list_access_records(None).await.unwrap();
  assert_eq!(records[0].record_id, Some(1));
  assert_eq!(records[0].year, Some(2020));
}

#[tokio::test]
async fn adopted_schema_accepts_writes() {
  let s = legacy_store(
    "CREATE TABLE countries (id INTEGER PRIMARY KEY, name TEXT, region TEXT);
     CREATE TABLE electricity_access (
       rec_id INTEGER PRIMARY KEY,
       country_id INTEGER,
       year INTEGER,
       population INTEGER,
       people_without_electricity INTEGER,
       UNIQUE (country_id, year)
     );",
  )
  .await;

  s.add_access_record("Testland", 2020, 250_000, None, Some(1_000_000))
    .await
    .unwrap();
  s.add_access_record("Testland", 2020, 100_000, None, Some(1_000_000))
    .await
    .unwrap();

  let records = s.list_access_records(None).await.unwrap();
  assert_eq!(records.len(), 1);
  assert_eq!(records[0].people_without, 100_000);
}

#[tokio::test]
async fn tolerates_text_cells_and_none_sentinel() {
  let s = legacy_store(
    "CREATE TABLE countries (id INTEGER PRIMARY KEY, name TEXT);
     CREATE TABLE electricity_access (
       rec_id INTEGER PRIMARY KEY,
       country_id INTEGER,
       year INTEGER,
       population TEXT,
       people_without_electricity TEXT
     );
     INSERT INTO countries VALUES (1, 'Testland');
     INSERT INTO electricity_access VALUES (1, 1, 2020, '1,000,000', 'None');",
  )
  .await;

  let records = s.list_access_records(None).await.unwrap();
  assert_eq!(records.len(), 1);
  assert_eq!(records[0].population, Some(1_000_000));
  assert_eq!(records[0].people_without, 0);
}

#[tokio::test]
async fn write_to_sparse_schema_adds_value_columns() {
  // a minimal legacy table with no population or people-with columns
  let s = legacy_store(
    "CREATE TABLE countries (id INTEGER PRIMARY KEY, name TEXT);
     CREATE TABLE electricity_access (
       rec_id INTEGER PRIMARY KEY,
       country_id INTEGER,
       year INTEGER,
       people_without_electricity INTEGER,
       UNIQUE (country_id, year)
     );",
  )
  .await;

  s.add_access_record("Testland", 2020, 250_000, Some(750_000), Some(1_000_000))
    .await
    .unwrap();

  let records = s.list_access_records(None).await.unwrap();
  assert_eq!(records[0].population, Some(1_000_000));
  assert_eq!(records[0].people_with, Some(750_000));
}

#[tokio::test]
async fn reads_degrade_to_empty_without_tables() {
  let conn = tokio_rusqlite::Connection::open_in_memory()
    .await
    .expect("in-memory connection");
  let s = SqliteStore::from_connection(conn).await.unwrap();

  assert!(s.list_countries().await.unwrap().is_empty());
  assert!(s.list_access_records(None).await.unwrap().is_empty());
  assert!(s.high_unserved(0).await.unwrap().is_empty());
  assert!(s.yearly_trend().await.unwrap().is_empty());
  assert!(s.access_percent_by_year(2020).await.unwrap().is_empty());
  assert!(s.regional_comparison(2020).await.unwrap().is_empty());
  assert!(s.most_improved(1990, 2016).await.unwrap().is_empty());
}

// ─── Audit log ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn query_logger_appends_entries() {
  let conn = tokio_rusqlite::Connection::open_in_memory()
    .await
    .expect("in-memory connection");
  conn
    .call(|conn| {
      conn.execute_batch(crate::schema::QUERY_LOG_SCHEMA)?;
      Ok(())
    })
    .await
    .unwrap();

  let logger = crate::audit::QueryLogger::spawn(conn.clone());
  logger.record("high_unserved", "threshold=1000000");

  // the write is fire-and-forget; poll briefly for it to land
  for _ in 0..100 {
    let row: Option<(String, String)> = conn
      .call(|conn| {
        use rusqlite::OptionalExtension as _;
        Ok(
          conn
            .query_row(
              "SELECT query, params FROM QueryLog ORDER BY log_id LIMIT 1",
              [],
              |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?,
        )
      })
      .await
      .unwrap();
    if let Some((query, params)) = row {
      assert_eq!(query, "high_unserved");
      assert_eq!(params, "threshold=1000000");
      return;
    }
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
  }
  panic!("audit entry never landed in QueryLog");
}

#[tokio::test]
async fn audit_failure_never_surfaces_to_callers() {
  let s = store().await;
  // break the audit table out from under the logger
  s.execute_batch("DROP TABLE QueryLog;").await.unwrap();

  // the analytical query itself still succeeds
  s.high_unserved(DEFAULT_UNSERVED_THRESHOLD).await.unwrap();
}
