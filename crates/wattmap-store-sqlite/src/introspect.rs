//! Runtime schema detection.
//!
//! Builds a fresh [`SchemaMap`] from `sqlite_master` and
//! `PRAGMA table_info` on every call. Nothing is cached across calls:
//! the database shape may change underneath us (an `ALTER TABLE` adding a
//! population column, or a loader creating `PopulationData` mid-session),
//! and a stale map would silently misroute queries.

use rusqlite::Connection;
use wattmap_core::schema::{
  ACCESS_TABLE_CANDIDATES, COUNTRY_TABLE_CANDIDATES,
  POPULATION_TABLE_CANDIDATES, SchemaMap, TableSchema,
};

/// Detect the current physical layout of the three logical tables.
pub fn detect_schema(conn: &Connection) -> rusqlite::Result<SchemaMap> {
  let tables = list_tables(conn)?;

  Ok(SchemaMap {
    countries:  resolve(conn, &tables, &COUNTRY_TABLE_CANDIDATES)?,
    access:     resolve(conn, &tables, &ACCESS_TABLE_CANDIDATES)?,
    population: resolve(conn, &tables, &POPULATION_TABLE_CANDIDATES)?,
  })
}

/// All user table names currently in the database.
fn list_tables(conn: &Connection) -> rusqlite::Result<Vec<String>> {
  let mut stmt = conn.prepare(
    "SELECT name FROM sqlite_master
     WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
  )?;
  let names = stmt
    .query_map([], |row| row.get::<_, String>(0))?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(names)
}

/// Try each candidate name in order (canonical CamelCase first, snake_case
/// second) and return the first that exists, with its column list.
fn resolve(
  conn: &Connection,
  tables: &[String],
  candidates: &[&str],
) -> rusqlite::Result<Option<TableSchema>> {
  for candidate in candidates {
    if tables.iter().any(|t| t == candidate) {
      let columns = table_columns(conn, candidate)?;
      return Ok(Some(TableSchema::new(*candidate, columns)));
    }
  }
  Ok(None)
}

/// Declared column names for `table`, in declaration order.
pub(crate) fn table_columns(
  conn: &Connection,
  table: &str,
) -> rusqlite::Result<Vec<String>> {
  // Table names cannot be bound as parameters; the name comes from our own
  // fixed candidate list, never from caller input.
  let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
  let columns = stmt
    .query_map([], |row| row.get::<_, String>(1))?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(columns)
}
