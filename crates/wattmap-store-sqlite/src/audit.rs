//! Best-effort query audit log.
//!
//! Analytical queries record their name and parameters into the `QueryLog`
//! table through a bounded channel drained by a background task. Logging
//! is strictly fire-and-forget: a full channel or a failed write is
//! reported through `tracing` and is never visible in the caller's
//! control flow.

use chrono::Utc;
use tokio::sync::mpsc;

const CHANNEL_CAPACITY: usize = 256;

struct LogEntry {
  query:  &'static str,
  params: String,
}

/// Handle for submitting audit entries. Cloning shares the channel.
#[derive(Clone)]
pub struct QueryLogger {
  tx: mpsc::Sender<LogEntry>,
}

impl QueryLogger {
  /// Spawn the drain task on the current runtime and return the sending
  /// handle. The task exits when every handle is dropped.
  pub fn spawn(conn: tokio_rusqlite::Connection) -> Self {
    let (tx, mut rx) = mpsc::channel::<LogEntry>(CHANNEL_CAPACITY);

    tokio::spawn(async move {
      while let Some(entry) = rx.recv().await {
        let logged_at = Utc::now().to_rfc3339();
        let result = conn
          .call(move |conn| {
            conn.execute(
              "INSERT INTO QueryLog (query, params, logged_at)
               VALUES (?1, ?2, ?3)",
              rusqlite::params![entry.query, entry.params, logged_at],
            )?;
            Ok(())
          })
          .await;

        if let Err(e) = result {
          tracing::warn!(error = %e, "query audit write failed; entry dropped");
        }
      }
    });

    Self { tx }
  }

  /// Queue one audit entry. Drops the entry (with a trace) when the
  /// channel is full or the drain task is gone.
  pub fn record(&self, query: &'static str, params: impl Into<String>) {
    let entry = LogEntry { query, params: params.into() };
    if self.tx.try_send(entry).is_err() {
      tracing::debug!(query, "query audit channel unavailable; entry dropped");
    }
  }
}
