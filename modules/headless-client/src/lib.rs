pub mod error;

pub use error::{HeadlessError, Result};

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

/// Client for a Browserless-style headless session API. One `HeadlessClient`
/// per service; each scrape run opens its own [`HeadlessSession`].
pub struct HeadlessClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Deserialize)]
struct CreateSessionResponse {
    id: String,
}

impl HeadlessClient {
    pub fn new(base_url: &str, token: Option<&str>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(String::from),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        let mut url = format!("{}{path}", self.base_url);
        if let Some(ref token) = self.token {
            url.push_str(&format!("?token={token}"));
        }
        url
    }

    /// Open a fresh browser session. The session holds cookies and page
    /// state on the service side until [`HeadlessSession::close`] is called.
    pub async fn create_session(&self) -> Result<HeadlessSession> {
        let resp = self
            .client
            .post(self.endpoint("/session"))
            .header("Content-Type", "application/json")
            .json(&serde_json::json!({}))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(HeadlessError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let session: CreateSessionResponse = resp.json().await?;
        debug!(session_id = session.id.as_str(), "Browser session created");

        Ok(HeadlessSession {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: self.token.clone(),
            session_id: session.id,
        })
    }
}

/// Handle to one live browser session. All page interaction goes through
/// here; the session is stateful (cookies, loaded page, widget state) and
/// must be driven by one caller at a time.
pub struct HeadlessSession {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    session_id: String,
}

impl HeadlessSession {
    fn endpoint(&self, action: &str) -> String {
        let mut url = format!("{}/session/{}/{action}", self.base_url, self.session_id);
        if let Some(ref token) = self.token {
            url.push_str(&format!("?token={token}"));
        }
        url
    }

    async fn post_action(&self, action: &str, body: serde_json::Value) -> Result<String> {
        let resp = self
            .client
            .post(self.endpoint(action))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(HeadlessError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(resp.text().await?)
    }

    pub fn id(&self) -> &str {
        &self.session_id
    }

    /// Load a URL and wait for the navigation to settle.
    pub async fn navigate(&self, url: &str) -> Result<()> {
        self.post_action("navigate", serde_json::json!({ "url": url }))
            .await?;
        Ok(())
    }

    /// Wait until `selector` is present and visible, up to `timeout`.
    /// A 408 from the service maps to [`HeadlessError::Timeout`].
    pub async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<()> {
        let timeout_ms = timeout.as_millis() as u64;
        let result = self
            .post_action(
                "waitfor",
                serde_json::json!({ "selector": selector, "timeout_ms": timeout_ms }),
            )
            .await;

        match result {
            Err(HeadlessError::Api { status: 408, .. }) => Err(HeadlessError::Timeout {
                selector: selector.to_string(),
                timeout_ms,
            }),
            other => other.map(|_| ()),
        }
    }

    pub async fn click(&self, selector: &str) -> Result<()> {
        self.post_action("click", serde_json::json!({ "selector": selector }))
            .await?;
        Ok(())
    }

    pub async fn fill(&self, selector: &str, value: &str) -> Result<()> {
        self.post_action(
            "fill",
            serde_json::json!({ "selector": selector, "value": value }),
        )
        .await?;
        Ok(())
    }

    /// Outer HTML of the first element matching `selector`, or the whole
    /// document when `selector` is empty.
    pub async fn html(&self, selector: &str) -> Result<String> {
        let resp = self
            .client
            .get(self.endpoint("html"))
            .query(&[("selector", selector)])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(HeadlessError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(resp.text().await?)
    }

    /// Tear the session down on the service side. Idempotent: closing an
    /// already-closed session returns Ok.
    pub async fn close(&self) -> Result<()> {
        let mut url = format!("{}/session/{}", self.base_url, self.session_id);
        if let Some(ref token) = self.token {
            url.push_str(&format!("?token={token}"));
        }
        let resp = self.client.delete(url).send().await?;

        let status = resp.status();
        if !status.is_success() && status.as_u16() != 404 {
            let message = resp.text().await.unwrap_or_default();
            return Err(HeadlessError::Api {
                status: status.as_u16(),
                message,
            });
        }

        debug!(session_id = self.session_id.as_str(), "Browser session closed");
        Ok(())
    }
}
