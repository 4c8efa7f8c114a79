use std::env;

use chrono::NaiveDate;
use tracing::{info, warn};

/// One scrape run's configuration, loaded from environment variables.
///
/// Filter fields fall back to documented defaults with a warning rather
/// than failing the run — a typo'd `MATCHDAY_LOOKBACK_DAYS` should not
/// stop the nightly sync. Service endpoints and credentials are required.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    // Filters
    pub age_group: String,
    pub club: String,
    pub competition: String,
    pub division: String,

    // Date scoping
    pub lookback_days: i64,
    /// Explicit range override; when set, wins over `lookback_days`.
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,

    // Source site
    pub schedule_url: String,

    // Headless browser service
    pub browser_url: String,
    pub browser_token: Option<String>,

    // Upstream API
    pub api_base_url: String,
    pub api_token: String,
}

pub const DEFAULT_AGE_GROUP: &str = "U14";
pub const DEFAULT_DIVISION: &str = "Northeast";
pub const DEFAULT_LOOKBACK_DAYS: i64 = 1;
/// Sentinel meaning "leave this dropdown on its site default".
pub const FILTER_NONE: &str = "none";

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            age_group: DEFAULT_AGE_GROUP.to_string(),
            club: FILTER_NONE.to_string(),
            competition: FILTER_NONE.to_string(),
            division: DEFAULT_DIVISION.to_string(),
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            start_date: None,
            end_date: None,
            schedule_url: String::new(),
            browser_url: String::new(),
            browser_token: None,
            api_base_url: String::new(),
            api_token: String::new(),
        }
    }
}

impl ScrapeConfig {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        let mut config = Self {
            age_group: env_or("MATCHDAY_AGE_GROUP", DEFAULT_AGE_GROUP),
            club: env_or("MATCHDAY_CLUB", FILTER_NONE),
            competition: env_or("MATCHDAY_COMPETITION", FILTER_NONE),
            division: env_or("MATCHDAY_DIVISION", DEFAULT_DIVISION),
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            start_date: optional_date("MATCHDAY_START_DATE"),
            end_date: optional_date("MATCHDAY_END_DATE"),
            schedule_url: required_env("MATCHDAY_SCHEDULE_URL"),
            browser_url: env_or("BROWSER_URL", "http://localhost:3000"),
            browser_token: env::var("BROWSER_TOKEN").ok(),
            api_base_url: required_env("MATCHDAY_API_URL"),
            api_token: required_env("MATCHDAY_API_TOKEN"),
        };

        if let Ok(raw) = env::var("MATCHDAY_LOOKBACK_DAYS") {
            match raw.parse::<i64>() {
                Ok(days) => config.lookback_days = days,
                Err(_) => warn!(
                    value = raw.as_str(),
                    default = DEFAULT_LOOKBACK_DAYS,
                    "MATCHDAY_LOOKBACK_DAYS is not a number, using default"
                ),
            }
        }

        config
    }

    /// Log the effective configuration without the API credential.
    pub fn log_redacted(&self) {
        info!(
            age_group = self.age_group.as_str(),
            club = self.club.as_str(),
            competition = self.competition.as_str(),
            division = self.division.as_str(),
            lookback_days = self.lookback_days,
            schedule_url = self.schedule_url.as_str(),
            browser_url = self.browser_url.as_str(),
            api_base_url = self.api_base_url.as_str(),
            api_token = "***",
            "Scrape configuration"
        );
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn env_or(key: &str, default: &str) -> String {
    match env::var(key) {
        Ok(v) if !v.trim().is_empty() => v,
        Ok(_) => {
            warn!(key, default, "Environment variable is empty, using default");
            default.to_string()
        }
        Err(_) => default.to_string(),
    }
}

fn optional_date(key: &str) -> Option<NaiveDate> {
    let raw = env::var(key).ok()?;
    match NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(_) => {
            warn!(key, value = raw.as_str(), "Ignoring unparseable date override");
            None
        }
    }
}
