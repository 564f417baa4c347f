//! `wattmap` — CLI and server for the electricity-access store.
//!
//! # Usage
//!
//! ```
//! wattmap add-country Kenya --region Africa
//! wattmap add-record Kenya 2016 --people-without 250000 --population 1000000
//! wattmap load electricity_dataset.csv --population population_dataset.csv
//! wattmap report access-percent 2016
//! wattmap serve --port 8080
//! ```
//!
//! Settings come from `wattmap.toml` (or `--config`), overridable through
//! `WATTMAP_*` environment variables.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use wattmap_core::{
  aggregate::AggregatePolicy,
  report::{
    DEFAULT_IMPROVEMENT_END, DEFAULT_IMPROVEMENT_START,
    DEFAULT_UNSERVED_THRESHOLD,
  },
  store::{AccessStore, RecordPatch},
};
use wattmap_store_sqlite::SqliteStore;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "wattmap", version, about = "Electricity-access data store")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "wattmap.toml")]
  config: PathBuf,

  /// Path to the SQLite database (overrides the config file).
  #[arg(long)]
  db: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the JSON API over HTTP.
  Serve {
    /// Bind host (overrides the config file).
    #[arg(long)]
    host: Option<String>,
    /// Bind port (overrides the config file).
    #[arg(long)]
    port: Option<u16>,
  },

  /// Add a country (upserts by name).
  AddCountry {
    name: String,
    #[arg(long)]
    region: Option<String>,
  },

  /// List all countries.
  Countries,

  /// Add or update one per-year access record.
  AddRecord {
    country: String,
    year:    i32,
    #[arg(long)]
    people_without: i64,
    #[arg(long)]
    people_with: Option<i64>,
    #[arg(long)]
    population: Option<i64>,
  },

  /// Update fields of an existing record by id.
  UpdateRecord {
    id: i64,
    #[arg(long)]
    people_without: Option<i64>,
    #[arg(long)]
    people_with: Option<i64>,
    #[arg(long)]
    population: Option<i64>,
  },

  /// Delete one record by id.
  DeleteRecord { id: i64 },

  /// List records, optionally filtered by country-name substring.
  Records {
    #[arg(long)]
    search: Option<String>,
  },

  /// Load the electricity CSV (and optionally the population CSV).
  Load {
    electricity: PathBuf,
    #[arg(long)]
    population: Option<PathBuf>,
  },

  /// Run one of the analytical reports.
  #[command(subcommand)]
  Report(Report),
}

#[derive(Subcommand)]
enum Report {
  /// Countries whose summed people-without exceeds a threshold.
  HighUnserved {
    #[arg(long, default_value_t = DEFAULT_UNSERVED_THRESHOLD)]
    threshold: i64,
  },
  /// Global people-with totals per year.
  Trend,
  /// Per-country access percentage for one year.
  AccessPercent { year: i32 },
  /// Population-weighted access percentage per region for one year.
  Regional { year: i32 },
  /// Side-by-side comparison of two countries for one year.
  Compare {
    year:   i32,
    first:  String,
    second: String,
  },
  /// Access-percentage improvement between two years.
  MostImproved {
    #[arg(long, default_value_t = DEFAULT_IMPROVEMENT_START)]
    start: i32,
    #[arg(long, default_value_t = DEFAULT_IMPROVEMENT_END)]
    end: i32,
  },
}

// ─── Config file ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
struct AppConfig {
  #[serde(default = "default_db_path")]
  db_path: PathBuf,
  #[serde(default = "default_host")]
  host:    String,
  #[serde(default = "default_port")]
  port:    u16,
  /// Extra names treated as aggregates on top of the built-in keyword list.
  #[serde(default)]
  aggregate_keywords: Vec<String>,
}

fn default_db_path() -> PathBuf {
  PathBuf::from("wattmap.db")
}
fn default_host() -> String {
  "127.0.0.1".to_owned()
}
fn default_port() -> u16 {
  8080
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config.clone()).required(false))
    .add_source(config::Environment::with_prefix("WATTMAP"))
    .build()
    .context("failed to read config file")?;
  let app_cfg: AppConfig = settings
    .try_deserialize()
    .context("failed to deserialise configuration")?;

  let db_path = cli.db.clone().unwrap_or_else(|| app_cfg.db_path.clone());
  let store = SqliteStore::open(&db_path)
    .await
    .with_context(|| format!("failed to open store at {db_path:?}"))?;
  let store = if app_cfg.aggregate_keywords.is_empty() {
    store
  } else {
    store.with_policy(AggregatePolicy::with_extra(
      app_cfg.aggregate_keywords.clone(),
    ))
  };

  match cli.command {
    Command::Serve { host, port } => {
      serve(
        store,
        host.unwrap_or_else(|| app_cfg.host.clone()),
        port.unwrap_or(app_cfg.port),
      )
      .await
    }
    command => run_command(&store, command).await,
  }
}

async fn serve(store: SqliteStore, host: String, port: u16) -> anyhow::Result<()> {
  let app = axum::Router::new()
    .nest("/api", wattmap_api::api_router(Arc::new(store)))
    .layer(TraceLayer::new_for_http());

  let address = format!("{host}:{port}");
  tracing::info!("listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;
  axum::serve(listener, app).await.context("server error")?;
  Ok(())
}

async fn run_command(store: &SqliteStore, command: Command) -> anyhow::Result<()> {
  match command {
    Command::Serve { .. } => unreachable!("handled by the caller"),

    Command::AddCountry { name, region } => {
      let country = store.add_country(&name, region.as_deref()).await?;
      print_json(&country)
    }
    Command::Countries => print_json(&store.list_countries().await?),

    Command::AddRecord {
      country,
      year,
      people_without,
      people_with,
      population,
    } => {
      let record_id = store
        .add_access_record(&country, year, people_without, people_with, population)
        .await?;
      print_json(&serde_json::json!({ "record_id": record_id }))
    }
    Command::UpdateRecord {
      id,
      people_without,
      people_with,
      population,
    } => {
      store
        .update_access_record(id, RecordPatch {
          people_without,
          people_with,
          population,
        })
        .await?;
      tracing::info!(id, "record updated");
      Ok(())
    }
    Command::DeleteRecord { id } => {
      store.delete_access_record(id).await?;
      tracing::info!(id, "record deleted");
      Ok(())
    }
    Command::Records { search } => {
      print_json(&store.list_access_records(search.as_deref()).await?)
    }

    Command::Load { electricity, population } => {
      let electricity_file = std::fs::File::open(&electricity)
        .with_context(|| format!("opening {}", electricity.display()))?;
      let population_file = match &population {
        Some(path) => Some(
          std::fs::File::open(path)
            .with_context(|| format!("opening {}", path.display()))?,
        ),
        None => None,
      };
      let report =
        wattmap_ingest::load_dataset(store, electricity_file, population_file)
          .await?;
      tracing::info!(
        electricity_written = report.electricity.written,
        electricity_skipped = report.electricity.skipped,
        population_written = report.population.written,
        "load complete"
      );
      Ok(())
    }

    Command::Report(report) => run_report(store, report).await,
  }
}

async fn run_report(store: &SqliteStore, report: Report) -> anyhow::Result<()> {
  match report {
    Report::HighUnserved { threshold } => {
      print_json(&store.high_unserved(threshold).await?)
    }
    Report::Trend => print_json(&store.yearly_trend().await?),
    Report::AccessPercent { year } => {
      print_json(&store.access_percent_by_year(year).await?)
    }
    Report::Regional { year } => {
      print_json(&store.regional_comparison(year).await?)
    }
    Report::Compare { year, first, second } => {
      print_json(&store.two_country_compare(year, &first, &second).await?)
    }
    Report::MostImproved { start, end } => {
      print_json(&store.most_improved(start, end).await?)
    }
  }
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}
