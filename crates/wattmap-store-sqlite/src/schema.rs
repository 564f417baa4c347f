//! Canonical SQL schema for the wattmap SQLite store.
//!
//! These are the table and column names a fresh database gets. Existing
//! databases may carry older variants (lowercase snake_case tables, no
//! population column); those are adopted as-is and resolved through
//! [`crate::introspect`] instead of being migrated.

/// Full canonical DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS Countries (
    country_id   INTEGER PRIMARY KEY AUTOINCREMENT,
    country_name TEXT NOT NULL UNIQUE,
    region       TEXT
);

CREATE TABLE IF NOT EXISTS ElectricityAccess (
    record_id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    country_id                 INTEGER NOT NULL REFERENCES Countries(country_id),
    year                       INTEGER NOT NULL,
    population                 INTEGER,
    people_without_electricity INTEGER NOT NULL,
    people_with_electricity    INTEGER,
    UNIQUE (country_id, year)
);

-- Population figures from a dedicated source; when a row exists here it
-- takes precedence over ElectricityAccess.population for the same
-- (country, year).
CREATE TABLE IF NOT EXISTS PopulationData (
    pop_id     INTEGER PRIMARY KEY AUTOINCREMENT,
    country_id INTEGER NOT NULL REFERENCES Countries(country_id),
    year       INTEGER NOT NULL,
    population INTEGER NOT NULL,
    UNIQUE (country_id, year)
);

CREATE INDEX IF NOT EXISTS elec_country_year_idx
    ON ElectricityAccess(country_id, year);
CREATE INDEX IF NOT EXISTS pop_country_year_idx
    ON PopulationData(country_id, year);
";

/// Standalone creates used when an adopted legacy database is missing one
/// logical table but has the others. No foreign-key clauses here: the
/// adopted countries table may go by a different physical name, and a
/// dangling `REFERENCES Countries(...)` would break every insert.
pub const COUNTRIES_TABLE_DDL: &str = "
CREATE TABLE IF NOT EXISTS Countries (
    country_id   INTEGER PRIMARY KEY AUTOINCREMENT,
    country_name TEXT NOT NULL UNIQUE,
    region       TEXT
);
";

pub const ACCESS_TABLE_DDL: &str = "
CREATE TABLE IF NOT EXISTS ElectricityAccess (
    record_id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    country_id                 INTEGER NOT NULL,
    year                       INTEGER NOT NULL,
    population                 INTEGER,
    people_without_electricity INTEGER NOT NULL,
    people_with_electricity    INTEGER,
    UNIQUE (country_id, year)
);
";

pub const POPULATION_TABLE_DDL: &str = "
CREATE TABLE IF NOT EXISTS PopulationData (
    pop_id     INTEGER PRIMARY KEY AUTOINCREMENT,
    country_id INTEGER NOT NULL,
    year       INTEGER NOT NULL,
    population INTEGER NOT NULL,
    UNIQUE (country_id, year)
);
";

/// Audit side table; created unconditionally, including on adopted legacy
/// databases. Writes to it are best-effort (see [`crate::audit`]).
pub const QUERY_LOG_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS QueryLog (
    log_id    INTEGER PRIMARY KEY AUTOINCREMENT,
    query     TEXT NOT NULL,
    params    TEXT,
    logged_at TEXT NOT NULL
);
";
