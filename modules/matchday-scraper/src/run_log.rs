//! Run log — persisted JSON timeline of every action taken during a run.
//!
//! Each run produces a single `{DATA_DIR}/scrape-runs/{division}/{run_id}.json`
//! file containing an ordered list of events with timestamps. Persisting the
//! log is best-effort: a write failure is a warning, never a run failure.

use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::info;

use crate::metrics::ScrapeMetrics;

/// Root data directory, controlled by `DATA_DIR` env var (default: `"data"`).
pub fn data_dir() -> PathBuf {
    PathBuf::from(std::env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()))
}

// ---------------------------------------------------------------------------
// RunLog
// ---------------------------------------------------------------------------

pub struct RunLog {
    pub run_id: String,
    pub division: String,
    pub started_at: DateTime<Utc>,
    events: Vec<RunEvent>,
    seq: u32,
}

#[derive(Serialize)]
struct RunEvent {
    seq: u32,
    ts: DateTime<Utc>,
    #[serde(flatten)]
    kind: EventKind,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    Navigate {
        url: String,
        attempts: u32,
    },
    CalendarRange {
        start: NaiveDate,
        end: NaiveDate,
    },
    FilterApplied {
        filter: String,
        value: String,
        applied: bool,
    },
    ResultsLoaded {
        retried: bool,
    },
    RowsExtracted {
        records: u32,
        warnings: u32,
    },
    ScheduleUpserted {
        key: String,
        action: String,
    },
    ScoreUpdated {
        key: String,
    },
    DuplicateSkipped {
        key: String,
    },
    SubmissionFailed {
        key: String,
        cause: String,
    },
    Aborted {
        phase: String,
        cause: String,
    },
}

impl RunLog {
    pub fn new(run_id: String, division: String) -> Self {
        Self {
            run_id,
            division,
            started_at: Utc::now(),
            events: Vec::new(),
            seq: 0,
        }
    }

    pub fn log(&mut self, kind: EventKind) {
        self.events.push(RunEvent {
            seq: self.seq,
            ts: Utc::now(),
            kind,
        });
        self.seq += 1;
    }

    /// Serialize the run log to JSON and write to disk.
    /// Returns the file path on success.
    pub fn save(&self, metrics: &ScrapeMetrics) -> Result<PathBuf> {
        let dir = data_dir().join("scrape-runs").join(&self.division);
        std::fs::create_dir_all(&dir)?;

        let path = dir.join(format!("{}.json", self.run_id));

        let output = SerializedRunLog {
            run_id: &self.run_id,
            division: &self.division,
            started_at: self.started_at,
            finished_at: Utc::now(),
            metrics: SerializedMetrics::from(metrics),
            events: &self.events,
        };

        std::fs::write(&path, serde_json::to_string_pretty(&output)?)?;
        info!(path = %path.display(), events = self.events.len(), "Run log saved");

        Ok(path)
    }
}

// ---------------------------------------------------------------------------
// Serialization wrappers
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct SerializedRunLog<'a> {
    run_id: &'a str,
    division: &'a str,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    metrics: SerializedMetrics,
    events: &'a [RunEvent],
}

#[derive(Serialize)]
struct SerializedMetrics {
    matches_found: u32,
    matches_scored: u32,
    api_calls_succeeded: u32,
    api_calls_failed: u32,
    duplicates_skipped: u32,
    parse_warnings: u32,
    errors: Vec<String>,
    duration_ms: u64,
}

impl From<&ScrapeMetrics> for SerializedMetrics {
    fn from(m: &ScrapeMetrics) -> Self {
        Self {
            matches_found: m.matches_found,
            matches_scored: m.matches_scored,
            api_calls_succeeded: m.api_calls_succeeded,
            api_calls_failed: m.api_calls_failed,
            duplicates_skipped: m.duplicates_skipped,
            parse_warnings: m.parse_warnings,
            errors: m.errors.clone(),
            duration_ms: m.duration.as_millis() as u64,
        }
    }
}
