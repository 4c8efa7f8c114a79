// Trait abstractions for the engine's two I/O boundaries.
//
// BrowserDriver — one stateful headless-browser session. The filter applier
//   and orchestrator depend on this contract only, never on a particular
//   automation service's API shape.
// MatchApi — the upstream schedule service. Call-level errors carry the
//   HTTP status so the submission pipeline can classify recoverability.
//
// These enable deterministic testing with MockBrowser and MockApi:
// no browser service, no network. `cargo test` in seconds.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use headless_client::{HeadlessError, HeadlessSession};
use matchday_common::MatchRecord;

// ---------------------------------------------------------------------------
// BrowserDriver
// ---------------------------------------------------------------------------

#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), HeadlessError>;
    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<(), HeadlessError>;
    async fn click(&self, selector: &str) -> Result<(), HeadlessError>;
    async fn fill(&self, selector: &str, value: &str) -> Result<(), HeadlessError>;
    /// Outer HTML of the first element matching `selector`.
    async fn html(&self, selector: &str) -> Result<String, HeadlessError>;
    /// Release the session. Safe to call on an already-closed session.
    async fn close(&self) -> Result<(), HeadlessError>;
}

#[async_trait]
impl BrowserDriver for HeadlessSession {
    async fn navigate(&self, url: &str) -> Result<(), HeadlessError> {
        HeadlessSession::navigate(self, url).await
    }

    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<(), HeadlessError> {
        HeadlessSession::wait_for(self, selector, timeout).await
    }

    async fn click(&self, selector: &str) -> Result<(), HeadlessError> {
        HeadlessSession::click(self, selector).await
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<(), HeadlessError> {
        HeadlessSession::fill(self, selector, value).await
    }

    async fn html(&self, selector: &str) -> Result<String, HeadlessError> {
        HeadlessSession::html(self, selector).await
    }

    async fn close(&self) -> Result<(), HeadlessError> {
        HeadlessSession::close(self).await
    }
}

// ---------------------------------------------------------------------------
// MatchApi
// ---------------------------------------------------------------------------

/// The schedule upsert is idempotent on the record's dedup key; the
/// upstream reports whether the key was new.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

#[derive(Debug, Error)]
pub enum ApiCallError {
    #[error("API error (status {status}): {message}")]
    Status {
        status: u16,
        /// Server-provided backoff hint, only ever present on 429.
        retry_after: Option<Duration>,
        message: String,
    },

    #[error("Network error: {0}")]
    Network(String),
}

#[async_trait]
pub trait MatchApi: Send + Sync {
    /// Create or update the schedule entry for a match.
    async fn upsert_schedule(&self, record: &MatchRecord) -> Result<UpsertOutcome, ApiCallError>;

    /// Attach a final score to an already-submitted match.
    async fn update_score(&self, record: &MatchRecord) -> Result<(), ApiCallError>;
}
