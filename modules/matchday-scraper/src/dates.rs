use chrono::{Duration, NaiveDate};

use matchday_common::{ScrapeConfig, ScrapeError};

/// Inclusive date window for one scrape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Resolve the configured window against an injected reference date.
    /// Explicit start/end overrides win over the lookback window.
    pub fn from_config(config: &ScrapeConfig, today: NaiveDate) -> Result<Self, ScrapeError> {
        match (config.start_date, config.end_date) {
            (Some(start), Some(end)) => {
                if start > end {
                    return Err(ScrapeError::Config(format!(
                        "start date {start} is after end date {end}"
                    )));
                }
                Ok(Self { start, end })
            }
            _ => date_range(config.lookback_days, today),
        }
    }
}

/// Map a lookback window to a concrete (start, end) pair. `today` is
/// injected by the caller; nothing here reads the system clock.
/// `lookback_days == 0` yields a single-day range.
pub fn date_range(lookback_days: i64, today: NaiveDate) -> Result<DateRange, ScrapeError> {
    if lookback_days < 0 {
        return Err(ScrapeError::Config(format!(
            "lookback_days must be >= 0, got {lookback_days}"
        )));
    }
    Ok(DateRange {
        start: today - Duration::days(lookback_days),
        end: today,
    })
}

/// The calendar widget's text encoding of a date.
pub fn format_for_widget(date: NaiveDate) -> String {
    date.format("%m/%d/%Y").to_string()
}
