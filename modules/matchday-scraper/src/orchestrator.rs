//! Scrape orchestration state machine.
//!
//! `Idle → BrowserReady → FiltersApplied → ResultsLoaded → Extracted → Done`
//! with an `Aborted` terminal reachable from any non-terminal state. The
//! browser session is released exactly once on every exit path, and every
//! outcome — aborts included — carries the run's metrics.

use std::time::{Duration, Instant};

use chrono::NaiveDate;
use tracing::{info, warn};

use matchday_common::{MatchRecord, MatchStatus, ScrapeConfig, ScrapeError};

use crate::cancel::CancelToken;
use crate::dates::DateRange;
use crate::extractor;
use crate::filters::FilterApplier;
use crate::metrics::ScrapeMetrics;
use crate::retry::{Recovery, RetryFailure, RetryPolicy};
use crate::run_log::{EventKind, RunLog};
use crate::site;
use crate::traits::BrowserDriver;

/// Page chrome must render within this window after navigation.
const PAGE_TIMEOUT: Duration = Duration::from_secs(10);
/// How long the results table gets to appear once filters are applied.
const RESULTS_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapePhase {
    Idle,
    BrowserReady,
    FiltersApplied,
    ResultsLoaded,
    Extracted,
    Done,
    Aborted,
}

impl std::fmt::Display for ScrapePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ScrapePhase::Idle => "idle",
            ScrapePhase::BrowserReady => "browser_ready",
            ScrapePhase::FiltersApplied => "filters_applied",
            ScrapePhase::ResultsLoaded => "results_loaded",
            ScrapePhase::Extracted => "extracted",
            ScrapePhase::Done => "done",
            ScrapePhase::Aborted => "aborted",
        };
        write!(f, "{name}")
    }
}

/// Everything a run produces. Aborted runs still carry metrics reflecting
/// partial progress — callers never receive a bare error.
#[derive(Debug)]
pub struct ScrapeRun {
    pub records: Vec<MatchRecord>,
    pub metrics: ScrapeMetrics,
    pub outcome: Result<(), ScrapeError>,
}

pub struct Orchestrator<'a, B: BrowserDriver> {
    browser: &'a B,
    config: &'a ScrapeConfig,
    /// Reference date for the lookback window, injected for testability.
    today: NaiveDate,
}

impl<'a, B: BrowserDriver> Orchestrator<'a, B> {
    pub fn new(browser: &'a B, config: &'a ScrapeConfig, today: NaiveDate) -> Self {
        Self {
            browser,
            config,
            today,
        }
    }

    pub async fn run(&self, cancel: &CancelToken, run_log: &mut RunLog) -> ScrapeRun {
        let started = Instant::now();
        let mut metrics = ScrapeMetrics::default();
        let mut phase = ScrapePhase::Idle;

        let result = self.drive(&mut phase, &mut metrics, cancel, run_log).await;

        // The one invariant that holds on every exit path: the browser
        // session is released, exactly once.
        if let Err(e) = self.browser.close().await {
            warn!(error = %e, "Failed to close browser session");
        }

        metrics.duration = started.elapsed();

        match result {
            Ok(records) => {
                phase = ScrapePhase::Done;
                info!(phase = %phase, matches = records.len(), "Scrape complete");
                ScrapeRun {
                    records,
                    metrics,
                    outcome: Ok(()),
                }
            }
            Err(e) => {
                run_log.log(EventKind::Aborted {
                    phase: phase.to_string(),
                    cause: e.to_string(),
                });
                metrics.errors.push(e.to_string());
                warn!(phase = %phase, error = %e, "Scrape aborted");
                ScrapeRun {
                    records: Vec::new(),
                    metrics,
                    outcome: Err(e),
                }
            }
        }
    }

    /// Advance through the transitions. On error, `phase` holds the last
    /// state that was reached.
    async fn drive(
        &self,
        phase: &mut ScrapePhase,
        metrics: &mut ScrapeMetrics,
        cancel: &CancelToken,
        run_log: &mut RunLog,
    ) -> Result<Vec<MatchRecord>, ScrapeError> {
        // Configuration problems fail before any browser interaction.
        let range = DateRange::from_config(self.config, self.today)?;
        url::Url::parse(&self.config.schedule_url).map_err(|e| {
            ScrapeError::Config(format!(
                "invalid schedule URL '{}': {e}",
                self.config.schedule_url
            ))
        })?;

        cancel.check()?;

        // Idle → BrowserReady
        let browser = self.browser;
        let url = self.config.schedule_url.as_str();
        let nav = RetryPolicy::INTERACTION
            .run("navigate", cancel, |_| Recovery::Retry, move || async move {
                browser.navigate(url).await?;
                browser.wait_for(site::DATE_FIELD, PAGE_TIMEOUT).await
            })
            .await;
        let attempts = match nav {
            Ok(attempted) => attempted.attempts,
            Err(RetryFailure::Cancelled) => return Err(ScrapeError::Cancelled),
            Err(RetryFailure::Exhausted { attempts, cause })
            | Err(RetryFailure::Fatal { attempts, cause }) => {
                return Err(ScrapeError::Aborted {
                    phase: "navigation".to_string(),
                    attempts,
                    cause,
                })
            }
        };
        *phase = ScrapePhase::BrowserReady;
        run_log.log(EventKind::Navigate {
            url: url.to_string(),
            attempts,
        });

        // BrowserReady → FiltersApplied
        cancel.check()?;
        let applier = FilterApplier::new(self.browser);
        applier.apply(self.config, &range, cancel, run_log).await?;
        *phase = ScrapePhase::FiltersApplied;

        // FiltersApplied → ResultsLoaded. A timeout buys one retry of the
        // whole filter+wait sequence, then aborts.
        cancel.check()?;
        let mut retried = false;
        if let Err(first) = self.wait_results().await {
            warn!(error = %first, "Results table did not appear, retrying the filter sequence once");
            retried = true;
            cancel.check()?;
            applier.apply(self.config, &range, cancel, run_log).await?;
            self.wait_results().await.map_err(|e| ScrapeError::Aborted {
                phase: "results_loaded".to_string(),
                attempts: 2,
                cause: e.to_string(),
            })?;
        }
        *phase = ScrapePhase::ResultsLoaded;
        run_log.log(EventKind::ResultsLoaded { retried });

        // ResultsLoaded → Extracted. Extraction never aborts the run — an
        // empty or partially parsed table is valid output.
        cancel.check()?;
        let html = match self.browser.html(site::RESULTS_TABLE).await {
            Ok(html) => html,
            Err(e) => {
                warn!(error = %e, "Could not read results table, extraction degraded to empty");
                String::new()
            }
        };
        let extraction = extractor::extract(&html, self.config);
        for warning in &extraction.warnings {
            warn!(
                row = warning.row,
                reason = warning.reason.as_str(),
                "Row skipped or demoted"
            );
        }
        metrics.matches_found = extraction.records.len() as u32;
        metrics.matches_scored = extraction
            .records
            .iter()
            .filter(|r| r.status == MatchStatus::Completed)
            .count() as u32;
        metrics.parse_warnings = extraction.warnings.len() as u32;
        run_log.log(EventKind::RowsExtracted {
            records: metrics.matches_found,
            warnings: metrics.parse_warnings,
        });
        *phase = ScrapePhase::Extracted;

        Ok(extraction.records)
    }

    async fn wait_results(&self) -> Result<(), headless_client::HeadlessError> {
        self.browser
            .wait_for(site::RESULTS_TABLE, RESULTS_TIMEOUT)
            .await
    }
}
