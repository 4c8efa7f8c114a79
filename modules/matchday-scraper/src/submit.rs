//! Submission pipeline: per-run duplicate suppression plus classified-retry
//! dispatch to the upstream schedule API. Partial-failure semantics
//! throughout — one bad record never blocks the rest of the batch, and the
//! pipeline reports failures instead of raising them.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};

use matchday_common::{MatchRecord, MatchStatus};

use crate::cancel::CancelToken;
use crate::metrics::ScrapeMetrics;
use crate::retry::{Recovery, RetryFailure, RetryPolicy};
use crate::run_log::{EventKind, RunLog};
use crate::traits::{ApiCallError, MatchApi, UpsertOutcome};

#[derive(Debug)]
pub struct SubmissionFailure {
    pub key: String,
    pub cause: String,
}

#[derive(Debug, Default)]
pub struct SubmissionReport {
    pub created: u32,
    pub updated: u32,
    pub duplicates_skipped: u32,
    pub failed: u32,
    pub failures: Vec<SubmissionFailure>,
}

impl std::fmt::Display for SubmissionReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Submission Complete ===")?;
        writeln!(f, "Created:            {}", self.created)?;
        writeln!(f, "Updated:            {}", self.updated)?;
        writeln!(f, "Duplicates skipped: {}", self.duplicates_skipped)?;
        writeln!(f, "Failed:             {}", self.failed)?;
        if !self.failures.is_empty() {
            writeln!(f, "\nFailures:")?;
            for failure in &self.failures {
                writeln!(f, "  {} - {}", failure.key, failure.cause)?;
            }
        }
        Ok(())
    }
}

enum DispatchError {
    Cancelled,
    Failed(String),
}

pub struct SubmissionPipeline<'a, A: MatchApi> {
    api: &'a A,
    policy: RetryPolicy,
}

impl<'a, A: MatchApi> SubmissionPipeline<'a, A> {
    pub fn new(api: &'a A) -> Self {
        Self {
            api,
            policy: RetryPolicy::SUBMISSION,
        }
    }

    pub async fn submit(
        &self,
        records: &[MatchRecord],
        metrics: &mut ScrapeMetrics,
        cancel: &CancelToken,
        run_log: &mut RunLog,
    ) -> SubmissionReport {
        // Dedup state is per run by construction. Cross-run duplicates are
        // the upstream's concern: the upsert is idempotent on the same key.
        let mut seen: HashSet<String> = HashSet::new();
        let mut report = SubmissionReport::default();

        for record in records {
            if cancel.is_cancelled() {
                warn!("Cancelled mid-batch, leaving remaining records for the next run");
                break;
            }

            let key = record.dedup_key();
            if !seen.insert(key.clone()) {
                debug!(key = key.as_str(), "Duplicate record skipped");
                report.duplicates_skipped += 1;
                metrics.duplicates_skipped += 1;
                run_log.log(EventKind::DuplicateSkipped { key });
                continue;
            }

            match self.dispatch(record, &key, metrics, cancel, run_log).await {
                Ok(UpsertOutcome::Created) => report.created += 1,
                Ok(UpsertOutcome::Updated) => report.updated += 1,
                Err(DispatchError::Cancelled) => {
                    warn!(key = key.as_str(), "Cancelled while submitting record");
                    break;
                }
                Err(DispatchError::Failed(cause)) => {
                    warn!(key = key.as_str(), cause = cause.as_str(), "Record submission failed");
                    report.failed += 1;
                    run_log.log(EventKind::SubmissionFailed {
                        key: key.clone(),
                        cause: cause.clone(),
                    });
                    report.failures.push(SubmissionFailure { key, cause });
                }
            }
        }

        info!(
            created = report.created,
            updated = report.updated,
            duplicates = report.duplicates_skipped,
            failed = report.failed,
            "Submission batch complete"
        );
        report
    }

    /// Schedule upsert always; score update additionally when the record
    /// carries one. Each call retries independently.
    async fn dispatch(
        &self,
        record: &MatchRecord,
        key: &str,
        metrics: &mut ScrapeMetrics,
        cancel: &CancelToken,
        run_log: &mut RunLog,
    ) -> Result<UpsertOutcome, DispatchError> {
        let api = self.api;

        let outcome = match self
            .policy
            .run("upsert_schedule", cancel, classify, move || async move {
                api.upsert_schedule(record).await
            })
            .await
        {
            Ok(attempted) => {
                metrics.api_calls_succeeded += 1;
                attempted.value
            }
            Err(failure) => {
                return Err(self.record_failure(failure, metrics));
            }
        };
        run_log.log(EventKind::ScheduleUpserted {
            key: key.to_string(),
            action: match outcome {
                UpsertOutcome::Created => "created".to_string(),
                UpsertOutcome::Updated => "updated".to_string(),
            },
        });

        if record.has_score() {
            match self
                .policy
                .run("update_score", cancel, classify, move || async move {
                    api.update_score(record).await
                })
                .await
            {
                Ok(_) => {
                    metrics.api_calls_succeeded += 1;
                    run_log.log(EventKind::ScoreUpdated {
                        key: key.to_string(),
                    });
                }
                Err(failure) => {
                    return Err(self.record_failure(failure, metrics));
                }
            }
        }

        Ok(outcome)
    }

    fn record_failure(&self, failure: RetryFailure, metrics: &mut ScrapeMetrics) -> DispatchError {
        match failure {
            RetryFailure::Cancelled => DispatchError::Cancelled,
            RetryFailure::Exhausted { attempts, cause } => {
                metrics.api_calls_failed += 1;
                DispatchError::Failed(format!("{cause} (after {attempts} attempts)"))
            }
            RetryFailure::Fatal { cause, .. } => {
                metrics.api_calls_failed += 1;
                DispatchError::Failed(cause)
            }
        }
    }
}

/// Recoverability: 4xx (except 429) means the payload or state is wrong and
/// a retry cannot help. 5xx and network failures are transient. 429 backs
/// off, honoring the server's Retry-After hint when one was provided.
fn classify(e: &ApiCallError) -> Recovery {
    match e {
        ApiCallError::Network(_) => Recovery::Retry,
        ApiCallError::Status {
            status: 429,
            retry_after: Some(hint),
            ..
        } => Recovery::RetryAfter(*hint),
        ApiCallError::Status { status: 429, .. } => Recovery::Retry,
        ApiCallError::Status { status, .. } if *status >= 500 => Recovery::Retry,
        ApiCallError::Status { .. } => Recovery::Fatal,
    }
}

// ---------------------------------------------------------------------------
// UpstreamApi — production MatchApi over the upstream REST service
// ---------------------------------------------------------------------------

pub struct UpstreamApi {
    client: reqwest::Client,
    base_url: String,
    /// Opaque bearer credential. Attached to every call, never logged.
    token: String,
}

#[derive(Serialize)]
struct SchedulePayload<'a> {
    key: &'a str,
    match_id: Option<&'a str>,
    home_team: &'a str,
    away_team: &'a str,
    date: NaiveDate,
    status: MatchStatus,
    competition: &'a str,
    division: &'a str,
    age_group: &'a str,
    club: &'a str,
}

#[derive(Serialize)]
struct ScorePayload<'a> {
    key: &'a str,
    home_score: u32,
    away_score: u32,
}

impl UpstreamApi {
    pub fn new(base_url: &str, token: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    async fn put<T: Serialize>(&self, path: &str, body: &T) -> Result<u16, ApiCallError> {
        let resp = self
            .client
            .put(format!("{}{path}", self.base_url))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .map_err(|e| ApiCallError::Network(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(status.as_u16());
        }

        let retry_after = resp
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs);
        let message = resp.text().await.unwrap_or_default();
        Err(ApiCallError::Status {
            status: status.as_u16(),
            retry_after,
            message,
        })
    }
}

#[async_trait]
impl MatchApi for UpstreamApi {
    async fn upsert_schedule(&self, record: &MatchRecord) -> Result<UpsertOutcome, ApiCallError> {
        let key = record.dedup_key();
        let payload = SchedulePayload {
            key: &key,
            match_id: record.match_id.as_deref(),
            home_team: &record.home_team,
            away_team: &record.away_team,
            date: record.date,
            status: record.status,
            competition: &record.competition,
            division: &record.division,
            age_group: &record.age_group,
            club: &record.club,
        };
        let status = self.put("/api/matches", &payload).await?;
        // The upstream answers 201 for a new key, 200 for an update.
        Ok(if status == 201 {
            UpsertOutcome::Created
        } else {
            UpsertOutcome::Updated
        })
    }

    async fn update_score(&self, record: &MatchRecord) -> Result<(), ApiCallError> {
        let (Some(home_score), Some(away_score)) = (record.home_score, record.away_score) else {
            debug!("No score on record, skipping score update");
            return Ok(());
        };
        let key = record.dedup_key();
        self.put(
            "/api/matches/score",
            &ScorePayload {
                key: &key,
                home_score,
                away_score,
            },
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_error(status: u16, retry_after: Option<Duration>) -> ApiCallError {
        ApiCallError::Status {
            status,
            retry_after,
            message: String::new(),
        }
    }

    #[test]
    fn server_and_network_failures_are_recoverable() {
        assert_eq!(classify(&status_error(500, None)), Recovery::Retry);
        assert_eq!(classify(&status_error(503, None)), Recovery::Retry);
        assert_eq!(
            classify(&ApiCallError::Network("reset".to_string())),
            Recovery::Retry
        );
    }

    #[test]
    fn client_errors_are_fatal_except_rate_limits() {
        assert_eq!(classify(&status_error(400, None)), Recovery::Fatal);
        assert_eq!(classify(&status_error(404, None)), Recovery::Fatal);
        assert_eq!(classify(&status_error(429, None)), Recovery::Retry);
        assert_eq!(
            classify(&status_error(429, Some(Duration::from_secs(2)))),
            Recovery::RetryAfter(Duration::from_secs(2))
        );
    }
}
