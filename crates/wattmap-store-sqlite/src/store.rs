//! [`SqliteStore`] — the SQLite implementation of [`AccessStore`].
//!
//! Every operation detects the physical schema fresh inside its own
//! `conn.call` round-trip, builds SQL from the resolved names, and does the
//! clamping/derivation arithmetic in Rust. Read queries degrade to an
//! empty `Vec` when a required logical table is absent.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension as _, Statement};

use wattmap_core::{
  aggregate::AggregatePolicy,
  country::Country,
  derive::{access_percent, clamp_without, round2, weighted_percent},
  record::{NormalizedRecord, RawRow, RawValue, normalize},
  report::{
    CountryAccess, CountryComparison, Improvement, RegionAccess,
    UnservedTotal, YearlyAccess,
  },
  schema::{SchemaMap, TableSchema},
  store::{AccessStore, RecordPatch},
};

use crate::{
  Error, Result,
  audit::QueryLogger,
  introspect::{detect_schema, table_columns},
  schema::{
    ACCESS_TABLE_DDL, COUNTRIES_TABLE_DDL, POPULATION_TABLE_DDL,
    QUERY_LOG_SCHEMA, SCHEMA,
  },
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// An electricity-access store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn:   tokio_rusqlite::Connection,
  audit:  QueryLogger,
  policy: AggregatePolicy,
}

impl SqliteStore {
  /// Open (or create) a store at `path`. A fresh database gets the full
  /// canonical schema.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn, true).await
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn, true).await
  }

  /// Adopt a caller-owned connection without applying the canonical DDL.
  ///
  /// Used for databases produced by other tools whose table and column
  /// names differ from the canonical ones; the per-call schema resolution
  /// adapts to whatever is there. Only the `QueryLog` side table is
  /// ensured.
  pub async fn from_connection(conn: tokio_rusqlite::Connection) -> Result<Self> {
    Self::init(conn, false).await
  }

  async fn init(conn: tokio_rusqlite::Connection, canonical: bool) -> Result<Self> {
    conn
      .call(move |conn| {
        if canonical {
          conn.execute_batch(SCHEMA)?;
        }
        conn.execute_batch(QUERY_LOG_SCHEMA)?;
        Ok(())
      })
      .await?;

    let audit = QueryLogger::spawn(conn.clone());
    Ok(Self { conn, audit, policy: AggregatePolicy::default() })
  }

  /// Replace the aggregate-filter policy (deployments may extend the
  /// keyword list).
  pub fn with_policy(mut self, policy: AggregatePolicy) -> Self {
    self.policy = policy;
    self
  }

  /// Run an arbitrary SQL batch — the escape hatch for migrations and
  /// ad-hoc maintenance (e.g. `ALTER TABLE` between calls; the next call
  /// re-resolves the schema and picks the change up).
  pub async fn execute_batch(&self, sql: impl Into<String>) -> Result<()> {
    let sql = sql.into();
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(&sql)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── Closure-side helpers ────────────────────────────────────────────────────

/// Read one cell as a loosely typed [`RawValue`]; bad cells become `Null`
/// rather than aborting the whole row set.
fn raw_cell(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<RawValue> {
  use rusqlite::types::ValueRef;
  Ok(match row.get_ref(idx)? {
    ValueRef::Null => RawValue::Null,
    ValueRef::Integer(i) => RawValue::Int(i),
    ValueRef::Real(f) => RawValue::Real(f),
    ValueRef::Text(t) => RawValue::Text(String::from_utf8_lossy(t).into_owned()),
    ValueRef::Blob(_) => RawValue::Null,
  })
}

fn missing_table(which: &str) -> tokio_rusqlite::Error {
  tokio_rusqlite::Error::Other(
    format!("logical table {which} unavailable after DDL").into(),
  )
}

/// Writes need the countries and access tables; create the canonical ones
/// only when no variant of them exists at all.
fn ensure_core_tables(
  conn: &Connection,
) -> std::result::Result<SchemaMap, tokio_rusqlite::Error> {
  let map = detect_schema(conn)?;
  if map.countries.is_some() && map.access.is_some() {
    return Ok(map);
  }
  if map.countries.is_none() {
    conn.execute_batch(COUNTRIES_TABLE_DDL)?;
  }
  if map.access.is_none() {
    conn.execute_batch(ACCESS_TABLE_DDL)?;
  }
  Ok(detect_schema(conn)?)
}

/// Add the population / people-with columns to the access table when a
/// write carries values for them and no column resolves to the role.
fn ensure_value_columns(
  conn: &Connection,
  access: &TableSchema,
  need_with: bool,
  need_population: bool,
) -> rusqlite::Result<TableSchema> {
  let mut altered = false;
  if need_population && access.population_col().is_none() {
    conn.execute(
      &format!("ALTER TABLE {} ADD COLUMN population INTEGER", access.table),
      [],
    )?;
    altered = true;
  }
  if need_with && access.with_col().is_none() {
    conn.execute(
      &format!(
        "ALTER TABLE {} ADD COLUMN people_with_electricity INTEGER",
        access.table
      ),
      [],
    )?;
    altered = true;
  }
  if !altered {
    return Ok(access.clone());
  }
  Ok(TableSchema::new(
    access.table.clone(),
    table_columns(conn, &access.table)?,
  ))
}

/// `SELECT id, name, region` with a `NULL` placeholder when the table has
/// no region column.
fn country_select(c: &TableSchema) -> String {
  let (table, id, name) = (&c.table, c.id_col(), c.name_col());
  match c.region_col() {
    Some(region) => format!("SELECT {id}, {name}, {region} FROM {table}"),
    None => format!("SELECT {id}, {name}, NULL FROM {table}"),
  }
}

fn country_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Country> {
  Ok(Country {
    country_id: row.get(0)?,
    name:       row.get::<_, Option<String>>(1)?.unwrap_or_default(),
    region:     row.get(2)?,
  })
}

fn find_country_row(
  conn: &Connection,
  c: &TableSchema,
  name: &str,
) -> rusqlite::Result<Option<Country>> {
  let sql = format!(
    "{} WHERE lower(trim({})) = lower(trim(?1))",
    country_select(c),
    c.name_col(),
  );
  conn
    .query_row(&sql, rusqlite::params![name], country_from_row)
    .optional()
}

fn insert_country_row(
  conn: &Connection,
  c: &TableSchema,
  name: &str,
  region: Option<&str>,
) -> rusqlite::Result<()> {
  let (table, name_col) = (&c.table, c.name_col());
  match (c.region_col(), region) {
    (Some(region_col), Some(region)) => conn.execute(
      &format!("INSERT INTO {table} ({name_col}, {region_col}) VALUES (?1, ?2)"),
      rusqlite::params![name, region],
    )?,
    _ => conn.execute(
      &format!("INSERT INTO {table} ({name_col}) VALUES (?1)"),
      rusqlite::params![name],
    )?,
  };
  Ok(())
}

/// Upsert one per-year access row keyed on `(country_fk, year)`, writing
/// only the value columns that are both supplied and present.
fn upsert_access_row(
  conn: &Connection,
  e: &TableSchema,
  country_id: i64,
  year: i32,
  people_without: i64,
  people_with: Option<i64>,
  population: Option<i64>,
) -> rusqlite::Result<()> {
  use rusqlite::types::Value;

  let (fk, year_col, without_col) =
    (e.country_fk_col(), e.year_col(), e.without_col());

  let mut cols = vec![fk.to_owned(), year_col.to_owned(), without_col.to_owned()];
  let mut vals: Vec<Value> =
    vec![country_id.into(), i64::from(year).into(), people_without.into()];
  let mut updates = vec![format!("{without_col} = excluded.{without_col}")];

  if let (Some(pop), Some(col)) = (population, e.population_col()) {
    cols.push(col.to_owned());
    vals.push(pop.into());
    updates.push(format!("{col} = excluded.{col}"));
  }
  if let (Some(with), Some(col)) = (people_with, e.with_col()) {
    cols.push(col.to_owned());
    vals.push(with.into());
    updates.push(format!("{col} = excluded.{col}"));
  }

  let placeholders: Vec<String> = (1..=cols.len()).map(|i| format!("?{i}")).collect();
  let sql = format!(
    "INSERT INTO {} ({}) VALUES ({})
     ON CONFLICT({fk}, {year_col}) DO UPDATE SET {}",
    e.table,
    cols.join(", "),
    placeholders.join(", "),
    updates.join(", "),
  );
  conn.execute(&sql, rusqlite::params_from_iter(vals))?;
  Ok(())
}

/// Fetch `(population, people_without)` for one country and year, with the
/// dedicated population table taking precedence over the embedded column.
fn pop_without_lookup(
  pop_stmt: &mut Option<Statement<'_>>,
  embedded_pop_stmt: &mut Option<Statement<'_>>,
  without_stmt: &mut Statement<'_>,
  country_id: i64,
  year: i32,
) -> rusqlite::Result<(Option<i64>, Option<i64>)> {
  let params = rusqlite::params![country_id, i64::from(year)];

  let mut population = match pop_stmt {
    Some(stmt) => stmt
      .query_row(params, |r| raw_cell(r, 0))
      .optional()?
      .and_then(|v| v.as_int()),
    None => None,
  };
  if population.is_none() {
    if let Some(stmt) = embedded_pop_stmt {
      population = stmt
        .query_row(params, |r| raw_cell(r, 0))
        .optional()?
        .and_then(|v| v.as_int());
    }
  }

  let without = without_stmt
    .query_row(params, |r| raw_cell(r, 0))
    .optional()?
    .and_then(|v| v.as_int());

  Ok((population, without))
}

// ─── AccessStore impl ────────────────────────────────────────────────────────

impl AccessStore for SqliteStore {
  type Error = Error;

  // ── Countries ─────────────────────────────────────────────────────────────

  async fn add_country(&self, name: &str, region: Option<&str>) -> Result<Country> {
    let name = name.trim().to_owned();
    if name.is_empty() {
      return Err(Error::Core(wattmap_core::Error::EmptyCountryName));
    }
    let region = region
      .map(|r| r.trim().to_owned())
      .filter(|r| !r.is_empty());

    let country = self
      .conn
      .call(move |conn| {
        let map = ensure_core_tables(conn)?;
        let c = map.countries.as_ref().ok_or_else(|| missing_table("countries"))?;

        // Upsert-by-name: an existing row wins, its region untouched.
        if let Some(existing) = find_country_row(conn, c, &name)? {
          return Ok(existing);
        }
        insert_country_row(conn, c, &name, region.as_deref())?;
        find_country_row(conn, c, &name)?.ok_or_else(|| missing_table("countries"))
      })
      .await?;

    Ok(country)
  }

  async fn find_country(&self, name: &str) -> Result<Option<Country>> {
    let name = name.trim().to_owned();
    if name.is_empty() {
      return Ok(None);
    }

    let found = self
      .conn
      .call(move |conn| {
        let map = detect_schema(conn)?;
        let Some(c) = map.countries.as_ref() else {
          return Ok(None);
        };
        Ok(find_country_row(conn, c, &name)?)
      })
      .await?;

    Ok(found)
  }

  async fn list_countries(&self) -> Result<Vec<Country>> {
    let countries = self
      .conn
      .call(|conn| {
        let map = detect_schema(conn)?;
        let Some(c) = map.countries.as_ref() else {
          return Ok(Vec::new());
        };
        let sql = format!("{} ORDER BY {}", country_select(c), c.id_col());
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([], country_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(countries)
  }

  // ── Access records ────────────────────────────────────────────────────────

  async fn add_access_record(
    &self,
    country_name: &str,
    year: i32,
    people_without: i64,
    people_with: Option<i64>,
    population: Option<i64>,
  ) -> Result<i64> {
    let name = country_name.trim().to_owned();
    if name.is_empty() {
      return Err(Error::Core(wattmap_core::Error::UnresolvableCountry(
        country_name.to_owned(),
      )));
    }

    let record_id = self
      .conn
      .call(move |conn| {
        let map = ensure_core_tables(conn)?;
        let c = map.countries.as_ref().ok_or_else(|| missing_table("countries"))?;
        let e = map.access.as_ref().ok_or_else(|| missing_table("access"))?;

        let country_id = match find_country_row(conn, c, &name)? {
          Some(country) => country.country_id,
          None => {
            insert_country_row(conn, c, &name, None)?;
            match find_country_row(conn, c, &name)? {
              Some(country) => country.country_id,
              None => return Ok(None),
            }
          }
        };

        let e = ensure_value_columns(
          conn,
          e,
          people_with.is_some(),
          population.is_some(),
        )?;
        upsert_access_row(
          conn,
          &e,
          country_id,
          year,
          people_without,
          people_with,
          population,
        )?;

        let record_id: i64 = conn.query_row(
          &format!(
            "SELECT {} FROM {} WHERE {} = ?1 AND {} = ?2",
            e.id_col(),
            e.table,
            e.country_fk_col(),
            e.year_col(),
          ),
          rusqlite::params![country_id, i64::from(year)],
          |r| r.get(0),
        )?;
        Ok(Some(record_id))
      })
      .await?;

    record_id.ok_or_else(|| {
      Error::Core(wattmap_core::Error::UnresolvableCountry(
        country_name.to_owned(),
      ))
    })
  }

  async fn update_access_record(
    &self,
    record_id: i64,
    patch: RecordPatch,
  ) -> Result<()> {
    let updated = self
      .conn
      .call(move |conn| {
        let map = detect_schema(conn)?;
        let Some(e) = map.access.as_ref() else {
          return Ok(false);
        };
        let id_col = e.id_col();

        let exists = conn
          .query_row(
            &format!("SELECT 1 FROM {} WHERE {id_col} = ?1", e.table),
            rusqlite::params![record_id],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if !exists {
          return Ok(false);
        }
        if patch.is_empty() {
          return Ok(true);
        }

        let e = ensure_value_columns(
          conn,
          e,
          patch.people_with.is_some(),
          patch.population.is_some(),
        )?;
        let id_col = e.id_col();

        if let Some(without) = patch.people_without {
          conn.execute(
            &format!(
              "UPDATE {} SET {} = ?1 WHERE {id_col} = ?2",
              e.table,
              e.without_col(),
            ),
            rusqlite::params![without, record_id],
          )?;
        }
        if let (Some(with), Some(col)) = (patch.people_with, e.with_col()) {
          conn.execute(
            &format!("UPDATE {} SET {col} = ?1 WHERE {id_col} = ?2", e.table),
            rusqlite::params![with, record_id],
          )?;
        }
        if let (Some(pop), Some(col)) = (patch.population, e.population_col()) {
          conn.execute(
            &format!("UPDATE {} SET {col} = ?1 WHERE {id_col} = ?2", e.table),
            rusqlite::params![pop, record_id],
          )?;
        }
        Ok(true)
      })
      .await?;

    if updated {
      Ok(())
    } else {
      Err(Error::Core(wattmap_core::Error::RecordNotFound(record_id)))
    }
  }

  async fn delete_access_record(&self, record_id: i64) -> Result<()> {
    let deleted = self
      .conn
      .call(move |conn| {
        let map = detect_schema(conn)?;
        let Some(e) = map.access.as_ref() else {
          return Ok(0);
        };
        let rows = conn.execute(
          &format!("DELETE FROM {} WHERE {} = ?1", e.table, e.id_col()),
          rusqlite::params![record_id],
        )?;
        Ok(rows)
      })
      .await?;

    if deleted == 0 {
      return Err(Error::Core(wattmap_core::Error::RecordNotFound(record_id)));
    }
    Ok(())
  }

  async fn list_access_records(
    &self,
    search: Option<&str>,
  ) -> Result<Vec<NormalizedRecord>> {
    let raws = self
      .conn
      .call(|conn| {
        let map = detect_schema(conn)?;
        let (Some(e), Some(c)) = (map.access.as_ref(), map.countries.as_ref())
        else {
          return Ok(Vec::new());
        };

        let has_population = e.population_col().is_some();
        let has_with = e.with_col().is_some();

        let mut select = vec![
          format!("e.{}", e.id_col()),
          format!("c.{}", c.name_col()),
          format!("e.{}", e.year_col()),
        ];
        if let Some(col) = e.population_col() {
          select.push(format!("e.{col}"));
        }
        select.push(format!("e.{}", e.without_col()));
        if let Some(col) = e.with_col() {
          select.push(format!("e.{col}"));
        }

        let arity = select.len();
        let sql = format!(
          "SELECT {} FROM {} e JOIN {} c ON e.{} = c.{} ORDER BY c.{}, e.{}",
          select.join(", "),
          e.table,
          c.table,
          e.country_fk_col(),
          c.id_col(),
          c.name_col(),
          e.year_col(),
        );

        let mut stmt = conn.prepare(&sql)?;
        let cells = stmt
          .query_map([], |row| {
            let mut vals = Vec::with_capacity(arity);
            for i in 0..arity {
              vals.push(raw_cell(row, i)?);
            }
            Ok(vals)
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        // Tag each row by the columns that were actually selected.
        let rows = cells
          .into_iter()
          .map(|vals| match (has_population, has_with) {
            (true, true) => match <[RawValue; 6]>::try_from(vals) {
              Ok(a) => RawRow::Six(a),
              Err(v) => RawRow::Other(v),
            },
            (false, true) => match <[RawValue; 5]>::try_from(vals) {
              Ok(a) => RawRow::Five(a),
              Err(v) => RawRow::Other(v),
            },
            // (id, country, year, population, without): positionally the
            // same as a six-field row with the trailing field missing.
            (true, false) => RawRow::Other(vals),
            (false, false) => match <[RawValue; 4]>::try_from(vals) {
              Ok(a) => RawRow::Four(a),
              Err(v) => RawRow::Other(v),
            },
          })
          .collect::<Vec<_>>();
        Ok(rows)
      })
      .await?;

    let needle = search
      .map(|s| s.trim().to_lowercase())
      .filter(|s| !s.is_empty());

    let records = raws
      .into_iter()
      .filter_map(normalize)
      .filter(|rec| match (&needle, &rec.country) {
        (None, _) => true,
        (Some(needle), Some(country)) => {
          country.to_lowercase().contains(needle.as_str())
        }
        (Some(_), None) => false,
      })
      .collect();

    Ok(records)
  }

  // ── Loader entry points ───────────────────────────────────────────────────

  async fn upsert_access(
    &self,
    country_id: i64,
    year: i32,
    people_without: i64,
    people_with: Option<i64>,
    population: Option<i64>,
  ) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        let map = ensure_core_tables(conn)?;
        let e = map.access.as_ref().ok_or_else(|| missing_table("access"))?;
        let e = ensure_value_columns(
          conn,
          e,
          people_with.is_some(),
          population.is_some(),
        )?;
        upsert_access_row(
          conn,
          &e,
          country_id,
          year,
          people_without,
          people_with,
          population,
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn upsert_population(
    &self,
    country_id: i64,
    year: i32,
    population: i64,
  ) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        let mut map = detect_schema(conn)?;
        if map.population.is_none() {
          conn.execute_batch(POPULATION_TABLE_DDL)?;
          map = detect_schema(conn)?;
        }
        let p = map
          .population
          .as_ref()
          .ok_or_else(|| missing_table("population"))?;

        let (fk, year_col) = (p.country_fk_col(), p.year_col());
        let value_col = p.population_col().unwrap_or("population");
        conn.execute(
          &format!(
            "INSERT INTO {} ({fk}, {year_col}, {value_col}) VALUES (?1, ?2, ?3)
             ON CONFLICT({fk}, {year_col})
             DO UPDATE SET {value_col} = excluded.{value_col}",
            p.table,
          ),
          rusqlite::params![country_id, i64::from(year), population],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Analytical queries ────────────────────────────────────────────────────

  async fn high_unserved(&self, threshold: i64) -> Result<Vec<UnservedTotal>> {
    let policy = self.policy.clone();

    let rows = self
      .conn
      .call(move |conn| {
        let map = detect_schema(conn)?;
        let (Some(e), Some(c)) = (map.access.as_ref(), map.countries.as_ref())
        else {
          return Ok(Vec::new());
        };

        let sql = format!(
          "SELECT c.{name} AS country,
                  SUM(COALESCE(e.{without}, 0)) AS total_without
           FROM {etbl} e
           JOIN {ctbl} c ON e.{fk} = c.{cid}
           GROUP BY c.{name}
           HAVING total_without > ?1
           ORDER BY total_without DESC",
          name = c.name_col(),
          without = e.without_col(),
          etbl = e.table,
          ctbl = c.table,
          fk = e.country_fk_col(),
          cid = c.id_col(),
        );

        let mut stmt = conn.prepare(&sql)?;
        let raw = stmt
          .query_map(rusqlite::params![threshold], |row| {
            Ok((raw_cell(row, 0)?, raw_cell(row, 1)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut out = Vec::with_capacity(raw.len());
        for (name, total) in raw {
          let Some(country) = name.as_name() else { continue };
          if policy.is_aggregate(Some(&country)) {
            continue;
          }
          let Some(total_without) = total.as_int() else { continue };
          out.push(UnservedTotal { country, total_without });
        }
        Ok(out)
      })
      .await?;

    self.audit.record("high_unserved", format!("threshold={threshold}"));
    Ok(rows)
  }

  async fn yearly_trend(&self) -> Result<Vec<YearlyAccess>> {
    let rows = self
      .conn
      .call(|conn| {
        let map = detect_schema(conn)?;
        let Some(e) = map.access.as_ref() else {
          return Ok(Vec::new());
        };

        let (etbl, year_col, without_col) =
          (&e.table, e.year_col(), e.without_col());

        // Pick the strongest available source for the per-year totals:
        // a stored people-with column, then population joins of
        // decreasing quality. With no population source at all the trend
        // is undefined and stays empty.
        let sql = if let Some(with_col) = e.with_col() {
          format!(
            "SELECT e.{year_col} AS year,
                    SUM(COALESCE(e.{with_col}, 0)) AS total_with
             FROM {etbl} e
             GROUP BY e.{year_col}
             ORDER BY e.{year_col}",
          )
        } else {
          let embedded = e.population_col();
          match (map.population.as_ref(), embedded) {
            (Some(p), Some(pop_col)) => format!(
              "SELECT e.{year_col} AS year,
                      SUM(COALESCE(p.{pval}, e.{pop_col}, 0)
                          - COALESCE(e.{without_col}, 0)) AS total_with
               FROM {etbl} e
               LEFT JOIN {ptbl} p
                 ON p.{pfk} = e.{efk} AND p.{pyear} = e.{year_col}
               GROUP BY e.{year_col}
               ORDER BY e.{year_col}",
              ptbl = p.table,
              pval = p.population_col().unwrap_or("population"),
              pfk = p.country_fk_col(),
              pyear = p.year_col(),
              efk = e.country_fk_col(),
            ),
            (None, Some(pop_col)) => format!(
              "SELECT {year_col} AS year,
                      SUM(COALESCE({pop_col}, 0)
                          - COALESCE({without_col}, 0)) AS total_with
               FROM {etbl}
               GROUP BY {year_col}
               ORDER BY {year_col}",
            ),
            (Some(p), None) => format!(
              "SELECT e.{year_col} AS year,
                      SUM(COALESCE(p.{pval}, 0)
                          - COALESCE(e.{without_col}, 0)) AS total_with
               FROM {etbl} e
               LEFT JOIN {ptbl} p
                 ON p.{pfk} = e.{efk} AND p.{pyear} = e.{year_col}
               GROUP BY e.{year_col}
               ORDER BY e.{year_col}",
              ptbl = p.table,
              pval = p.population_col().unwrap_or("population"),
              pfk = p.country_fk_col(),
              pyear = p.year_col(),
              efk = e.country_fk_col(),
            ),
            (None, None) => return Ok(Vec::new()),
          }
        };

        let mut stmt = conn.prepare(&sql)?;
        let raw = stmt
          .query_map([], |row| Ok((raw_cell(row, 0)?, raw_cell(row, 1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut out = Vec::with_capacity(raw.len());
        for (year, total) in raw {
          let Some(year) = year.as_int() else { continue };
          // negative derived totals are nonsense; clamp to 0
          let total_with = total.as_int().unwrap_or(0).max(0);
          out.push(YearlyAccess { year: year as i32, total_with });
        }
        Ok(out)
      })
      .await?;

    self.audit.record("yearly_trend", String::new());
    Ok(rows)
  }

  async fn access_percent_by_year(&self, year: i32) -> Result<Vec<CountryAccess>> {
    let policy = self.policy.clone();

    let mut rows = self
      .conn
      .call(move |conn| {
        let map = detect_schema(conn)?;
        let (Some(e), Some(c)) = (map.access.as_ref(), map.countries.as_ref())
        else {
          return Ok(Vec::new());
        };

        let (etbl, ctbl) = (&e.table, &c.table);
        let (name_col, cid) = (c.name_col(), c.id_col());
        let (fk, year_col, without_col) =
          (e.country_fk_col(), e.year_col(), e.without_col());

        // Population source selection mirrors the trend query; with no
        // source the percentage is undefined for every row.
        let sql = match (map.population.as_ref(), e.population_col()) {
          (Some(p), Some(pop_col)) => format!(
            "SELECT c.{name_col}, COALESCE(p.{pval}, e.{pop_col}),
                    COALESCE(e.{without_col}, 0)
             FROM {etbl} e
             JOIN {ctbl} c ON e.{fk} = c.{cid}
             LEFT JOIN {ptbl} p
               ON e.{fk} = p.{pfk} AND e.{year_col} = p.{pyear}
             WHERE e.{year_col} = ?1",
            ptbl = p.table,
            pval = p.population_col().unwrap_or("population"),
            pfk = p.country_fk_col(),
            pyear = p.year_col(),
          ),
          (Some(p), None) => format!(
            "SELECT c.{name_col}, p.{pval}, COALESCE(e.{without_col}, 0)
             FROM {etbl} e
             JOIN {ctbl} c ON e.{fk} = c.{cid}
             LEFT JOIN {ptbl} p
               ON e.{fk} = p.{pfk} AND e.{year_col} = p.{pyear}
             WHERE e.{year_col} = ?1",
            ptbl = p.table,
            pval = p.population_col().unwrap_or("population"),
            pfk = p.country_fk_col(),
            pyear = p.year_col(),
          ),
          (None, Some(pop_col)) => format!(
            "SELECT c.{name_col}, e.{pop_col}, COALESCE(e.{without_col}, 0)
             FROM {etbl} e
             JOIN {ctbl} c ON e.{fk} = c.{cid}
             WHERE e.{year_col} = ?1",
          ),
          (None, None) => return Ok(Vec::new()),
        };

        let mut stmt = conn.prepare(&sql)?;
        let raw = stmt
          .query_map(rusqlite::params![i64::from(year)], |row| {
            Ok((raw_cell(row, 0)?, raw_cell(row, 1)?, raw_cell(row, 2)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut out = Vec::with_capacity(raw.len());
        for (name, population, without) in raw {
          let Some(country) = name.as_name() else { continue };
          if policy.is_aggregate(Some(&country)) {
            continue;
          }
          let Some(population) = population.as_int() else { continue };
          if population <= 0 {
            continue;
          }
          let without = clamp_without(without.as_int().unwrap_or(0), Some(population));
          let Some(pct) = access_percent(population, without) else {
            continue;
          };
          out.push(CountryAccess {
            country,
            population,
            people_without: without,
            access_percent: pct,
          });
        }
        Ok(out)
      })
      .await?;

    rows.sort_by(|a, b| {
      b.access_percent
        .partial_cmp(&a.access_percent)
        .unwrap_or(std::cmp::Ordering::Equal)
    });

    self.audit.record("access_percent_by_year", format!("year={year}"));
    Ok(rows)
  }

  async fn regional_comparison(&self, year: i32) -> Result<Vec<RegionAccess>> {
    let mut rows = self
      .conn
      .call(move |conn| {
        let map = detect_schema(conn)?;
        let (Some(e), Some(c)) = (map.access.as_ref(), map.countries.as_ref())
        else {
          return Ok(Vec::new());
        };
        // no region column: regional features are unavailable
        let Some(region_col) = c.region_col() else {
          return Ok(Vec::new());
        };

        let (etbl, ctbl) = (&e.table, &c.table);
        let cid = c.id_col();
        let (fk, year_col, without_col) =
          (e.country_fk_col(), e.year_col(), e.without_col());

        let sql = match (map.population.as_ref(), e.population_col()) {
          (Some(p), Some(pop_col)) => format!(
            "SELECT TRIM(COALESCE(c.{region_col}, '')) AS region,
                    SUM(COALESCE(p.{pval}, e.{pop_col}, 0)) AS total_pop,
                    SUM(COALESCE(e.{without_col}, 0)) AS total_without
             FROM {etbl} e
             JOIN {ctbl} c ON e.{fk} = c.{cid}
             LEFT JOIN {ptbl} p
               ON p.{pfk} = e.{fk} AND p.{pyear} = e.{year_col}
             WHERE e.{year_col} = ?1
             GROUP BY TRIM(COALESCE(c.{region_col}, ''))",
            ptbl = p.table,
            pval = p.population_col().unwrap_or("population"),
            pfk = p.country_fk_col(),
            pyear = p.year_col(),
          ),
          (None, Some(pop_col)) => format!(
            "SELECT TRIM(COALESCE(c.{region_col}, '')) AS region,
                    SUM(COALESCE(e.{pop_col}, 0)) AS total_pop,
                    SUM(COALESCE(e.{without_col}, 0)) AS total_without
             FROM {etbl} e
             JOIN {ctbl} c ON e.{fk} = c.{cid}
             WHERE e.{year_col} = ?1
             GROUP BY TRIM(COALESCE(c.{region_col}, ''))",
          ),
          (Some(p), None) => format!(
            "SELECT TRIM(COALESCE(c.{region_col}, '')) AS region,
                    SUM(COALESCE(p.{pval}, 0)) AS total_pop,
                    SUM(COALESCE(e.{without_col}, 0)) AS total_without
             FROM {etbl} e
             JOIN {ctbl} c ON e.{fk} = c.{cid}
             LEFT JOIN {ptbl} p
               ON p.{pfk} = e.{fk} AND p.{pyear} = e.{year_col}
             WHERE e.{year_col} = ?1
             GROUP BY TRIM(COALESCE(c.{region_col}, ''))",
            ptbl = p.table,
            pval = p.population_col().unwrap_or("population"),
            pfk = p.country_fk_col(),
            pyear = p.year_col(),
          ),
          (None, None) => return Ok(Vec::new()),
        };

        let mut stmt = conn.prepare(&sql)?;
        let raw = stmt
          .query_map(rusqlite::params![i64::from(year)], |row| {
            Ok((raw_cell(row, 0)?, raw_cell(row, 1)?, raw_cell(row, 2)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut out = Vec::with_capacity(raw.len());
        for (region, total_pop, total_without) in raw {
          let Some(region) = region.as_name() else { continue };
          let Some(total_pop) = total_pop.as_int() else { continue };
          let total_without = total_without.as_int().unwrap_or(0);
          let Some(pct) = weighted_percent(total_pop, total_without) else {
            continue;
          };
          out.push(RegionAccess { region, access_percent: pct });
        }
        Ok(out)
      })
      .await?;

    rows.sort_by(|a, b| {
      b.access_percent
        .partial_cmp(&a.access_percent)
        .unwrap_or(std::cmp::Ordering::Equal)
    });

    self.audit.record("regional_comparison", format!("year={year}"));
    Ok(rows)
  }

  async fn two_country_compare(
    &self,
    year: i32,
    first: &str,
    second: &str,
  ) -> Result<Vec<CountryComparison>> {
    // The per-country report is the canonical source, so this comparison
    // inherits its filtering and derivation.
    let report = self.access_percent_by_year(year).await?;

    let out = [first, second]
      .into_iter()
      .map(|requested| {
        let key = requested.trim().to_lowercase();
        match report
          .iter()
          .find(|row| row.country.trim().to_lowercase() == key)
        {
          Some(row) => CountryComparison {
            country:        row.country.clone(),
            access_percent: Some(row.access_percent),
            population:     Some(row.population),
            people_with:    Some((row.population - row.people_without).max(0)),
            people_without: Some(row.people_without),
          },
          None => CountryComparison::missing(requested),
        }
      })
      .collect();

    self
      .audit
      .record("two_country_compare", format!("year={year} a={first} b={second}"));
    Ok(out)
  }

  async fn most_improved(
    &self,
    start_year: i32,
    end_year: i32,
  ) -> Result<Vec<Improvement>> {
    let policy = self.policy.clone();

    let mut rows = self
      .conn
      .call(move |conn| {
        let map = detect_schema(conn)?;
        let (Some(e), Some(c)) = (map.access.as_ref(), map.countries.as_ref())
        else {
          return Ok(Vec::new());
        };

        let countries: Vec<(i64, Option<String>)> = {
          let mut stmt = conn.prepare(&format!(
            "SELECT {id}, {name} FROM {table} ORDER BY {name}",
            id = c.id_col(),
            name = c.name_col(),
            table = c.table,
          ))?;
          let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          rows
        };

        let mut pop_stmt = match map.population.as_ref() {
          Some(p) => Some(conn.prepare(&format!(
            "SELECT {val} FROM {table} WHERE {fk} = ?1 AND {year} = ?2",
            val = p.population_col().unwrap_or("population"),
            table = p.table,
            fk = p.country_fk_col(),
            year = p.year_col(),
          ))?),
          None => None,
        };
        let mut embedded_pop_stmt = match e.population_col() {
          Some(col) => Some(conn.prepare(&format!(
            "SELECT {col} FROM {table} WHERE {fk} = ?1 AND {year} = ?2",
            table = e.table,
            fk = e.country_fk_col(),
            year = e.year_col(),
          ))?),
          None => None,
        };
        let mut without_stmt = conn.prepare(&format!(
          "SELECT {col} FROM {table} WHERE {fk} = ?1 AND {year} = ?2",
          col = e.without_col(),
          table = e.table,
          fk = e.country_fk_col(),
          year = e.year_col(),
        ))?;

        let mut out = Vec::new();
        for (country_id, name) in countries {
          let Some(country) = name.filter(|n| !n.trim().is_empty()) else {
            continue;
          };
          if policy.is_aggregate(Some(&country)) {
            continue;
          }

          let (start_pop, start_without) = pop_without_lookup(
            &mut pop_stmt,
            &mut embedded_pop_stmt,
            &mut without_stmt,
            country_id,
            start_year,
          )?;
          let (end_pop, end_without) = pop_without_lookup(
            &mut pop_stmt,
            &mut embedded_pop_stmt,
            &mut without_stmt,
            country_id,
            end_year,
          )?;

          // missing population in either year excludes the country
          let (Some(start_pop), Some(end_pop)) = (start_pop, end_pop) else {
            continue;
          };
          let (Some(start_percent), Some(end_percent)) = (
            access_percent(start_pop, start_without.unwrap_or(0)),
            access_percent(end_pop, end_without.unwrap_or(0)),
          ) else {
            continue;
          };

          out.push(Improvement {
            country,
            start_percent,
            end_percent,
            improvement: round2(end_percent - start_percent),
          });
        }
        Ok(out)
      })
      .await?;

    rows.sort_by(|a, b| {
      b.improvement
        .partial_cmp(&a.improvement)
        .unwrap_or(std::cmp::Ordering::Equal)
    });

    self
      .audit
      .record("most_improved", format!("start={start_year} end={end_year}"));
    Ok(rows)
  }
}
