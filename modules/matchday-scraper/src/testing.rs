// Test mocks for the scrape engine.
//
// Two mocks matching the two trait boundaries:
// - MockBrowser (BrowserDriver) — scripted selector→HTML map, per-selector
//   failure injection, interaction recording, close-call counting
// - MockApi (MatchApi) — scripted per-call failures with call counting
//
// Plus helpers for building configs, records, and results-table markup.
// These enable deterministic end-to-end tests: no browser service, no
// network. `cargo test` in seconds.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use headless_client::HeadlessError;
use matchday_common::{MatchRecord, MatchStatus, ScrapeConfig};

use crate::traits::{ApiCallError, BrowserDriver, MatchApi, UpsertOutcome};

// ---------------------------------------------------------------------------
// MockBrowser
// ---------------------------------------------------------------------------

/// Scripted browser session. Selectors resolve instantly unless told
/// otherwise; every interaction is recorded for assertions.
pub struct MockBrowser {
    html: Mutex<HashMap<String, String>>,
    navigate_failures: AtomicU32,
    wait_failures: Mutex<HashMap<String, u32>>,
    missing: Mutex<HashSet<String>>,
    actions: Mutex<Vec<String>>,
    close_calls: AtomicU32,
}

impl MockBrowser {
    pub fn new() -> Self {
        Self {
            html: Mutex::new(HashMap::new()),
            navigate_failures: AtomicU32::new(0),
            wait_failures: Mutex::new(HashMap::new()),
            missing: Mutex::new(HashSet::new()),
            actions: Mutex::new(Vec::new()),
            close_calls: AtomicU32::new(0),
        }
    }

    /// Serve `html` for `browser.html(selector)`.
    pub fn with_html(self, selector: &str, html: &str) -> Self {
        self.html
            .lock()
            .unwrap()
            .insert(selector.to_string(), html.to_string());
        self
    }

    /// Fail the first `times` navigations with a network error.
    pub fn fail_navigate_times(self, times: u32) -> Self {
        self.navigate_failures.store(times, Ordering::SeqCst);
        self
    }

    /// Time out the first `times` waits for `selector`.
    pub fn fail_wait_times(self, selector: &str, times: u32) -> Self {
        self.wait_failures
            .lock()
            .unwrap()
            .insert(selector.to_string(), times);
        self
    }

    /// `selector` never appears; every wait for it times out.
    pub fn never_find(self, selector: &str) -> Self {
        self.missing.lock().unwrap().insert(selector.to_string());
        self
    }

    pub fn close_count(&self) -> u32 {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn recorded(&self) -> Vec<String> {
        self.actions.lock().unwrap().clone()
    }

    fn record(&self, action: String) {
        self.actions.lock().unwrap().push(action);
    }
}

impl Default for MockBrowser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrowserDriver for MockBrowser {
    async fn navigate(&self, url: &str) -> Result<(), HeadlessError> {
        self.record(format!("navigate:{url}"));
        if self.navigate_failures.load(Ordering::SeqCst) > 0 {
            self.navigate_failures.fetch_sub(1, Ordering::SeqCst);
            return Err(HeadlessError::Network("connection refused".to_string()));
        }
        Ok(())
    }

    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<(), HeadlessError> {
        self.record(format!("wait_for:{selector}"));
        let timed_out = {
            if self.missing.lock().unwrap().contains(selector) {
                true
            } else {
                let mut failures = self.wait_failures.lock().unwrap();
                match failures.get_mut(selector) {
                    Some(remaining) if *remaining > 0 => {
                        *remaining -= 1;
                        true
                    }
                    _ => false,
                }
            }
        };
        if timed_out {
            return Err(HeadlessError::Timeout {
                selector: selector.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            });
        }
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<(), HeadlessError> {
        self.record(format!("click:{selector}"));
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<(), HeadlessError> {
        self.record(format!("fill:{selector}={value}"));
        Ok(())
    }

    async fn html(&self, selector: &str) -> Result<String, HeadlessError> {
        Ok(self
            .html
            .lock()
            .unwrap()
            .get(selector)
            .cloned()
            .unwrap_or_default())
    }

    async fn close(&self) -> Result<(), HeadlessError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockApi
// ---------------------------------------------------------------------------

struct ScriptedFailure {
    status: u16,
    remaining: u32,
}

/// Scripted upstream API. Call labels are `schedule:{key}` and
/// `score:{key}`; failures are injected per label.
pub struct MockApi {
    failures: Mutex<HashMap<String, ScriptedFailure>>,
    existing: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
}

impl MockApi {
    pub fn new() -> Self {
        Self {
            failures: Mutex::new(HashMap::new()),
            existing: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Fail the first `times` schedule upserts for `key` with `status`.
    /// Pass `u32::MAX` to fail every call.
    pub fn fail_schedule(self, key: &str, status: u16, times: u32) -> Self {
        self.failures.lock().unwrap().insert(
            format!("schedule:{key}"),
            ScriptedFailure {
                status,
                remaining: times,
            },
        );
        self
    }

    /// Fail the first `times` score updates for `key` with `status`.
    pub fn fail_score(self, key: &str, status: u16, times: u32) -> Self {
        self.failures.lock().unwrap().insert(
            format!("score:{key}"),
            ScriptedFailure {
                status,
                remaining: times,
            },
        );
        self
    }

    /// Treat `key` as already known upstream: its upsert answers Updated.
    pub fn already_known(self, key: &str) -> Self {
        self.existing.lock().unwrap().insert(key.to_string());
        self
    }

    pub fn recorded(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, label: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.as_str() == label)
            .count()
    }

    fn take_failure(&self, label: &str) -> Option<ApiCallError> {
        let mut failures = self.failures.lock().unwrap();
        let scripted = failures.get_mut(label)?;
        if scripted.remaining == 0 {
            return None;
        }
        scripted.remaining -= 1;
        let retry_after = (scripted.status == 429).then(|| Duration::from_millis(10));
        Some(ApiCallError::Status {
            status: scripted.status,
            retry_after,
            message: "scripted failure".to_string(),
        })
    }
}

impl Default for MockApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MatchApi for MockApi {
    async fn upsert_schedule(&self, record: &MatchRecord) -> Result<UpsertOutcome, ApiCallError> {
        let key = record.dedup_key();
        let label = format!("schedule:{key}");
        self.calls.lock().unwrap().push(label.clone());
        if let Some(err) = self.take_failure(&label) {
            return Err(err);
        }
        Ok(if self.existing.lock().unwrap().contains(&key) {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Created
        })
    }

    async fn update_score(&self, record: &MatchRecord) -> Result<(), ApiCallError> {
        let label = format!("score:{}", record.dedup_key());
        self.calls.lock().unwrap().push(label.clone());
        if let Some(err) = self.take_failure(&label) {
            return Err(err);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn test_config() -> ScrapeConfig {
    ScrapeConfig {
        schedule_url: "https://schedules.example.org/matches".to_string(),
        ..ScrapeConfig::default()
    }
}

pub fn scheduled(home: &str, away: &str, date: NaiveDate) -> MatchRecord {
    MatchRecord {
        match_id: None,
        home_team: home.to_string(),
        away_team: away.to_string(),
        date,
        status: MatchStatus::Scheduled,
        home_score: None,
        away_score: None,
        competition: "Spring League".to_string(),
        division: "Northeast".to_string(),
        age_group: "U14".to_string(),
        club: "none".to_string(),
    }
}

pub fn completed(home: &str, away: &str, date: NaiveDate, score: (u32, u32)) -> MatchRecord {
    MatchRecord {
        status: MatchStatus::Completed,
        home_score: Some(score.0),
        away_score: Some(score.1),
        ..scheduled(home, away, date)
    }
}

/// One `tr.match-row` in the site's markup.
pub fn match_row(
    match_id: Option<&str>,
    date: &str,
    home: &str,
    away: &str,
    result: &str,
) -> String {
    let id_attr = match_id
        .map(|id| format!(" data-match-id=\"{id}\""))
        .unwrap_or_default();
    format!(
        "<tr class=\"match-row\"{id_attr}>\
         <td class=\"match-date\">{date}</td>\
         <td class=\"home-team\">{home}</td>\
         <td class=\"result\">{result}</td>\
         <td class=\"away-team\">{away}</td>\
         </tr>"
    )
}

/// A full results table wrapping the given rows.
pub fn results_table(rows: &[String]) -> String {
    format!(
        "<table class=\"match-results\"><tbody>{}</tbody></table>",
        rows.join("")
    )
}
