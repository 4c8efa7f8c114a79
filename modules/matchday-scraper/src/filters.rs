//! Filter application: drives the schedule page's calendar widget and
//! dropdown filters through the `BrowserDriver` contract.
//!
//! Date scoping (steps 1-3) is fatal once retries are exhausted — without
//! it no meaningful extraction is possible. A missing dropdown option is
//! degraded-but-continue: the scrape proceeds on the site default.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use scraper::{Html, Selector};
use tracing::{debug, info, warn};

use matchday_common::{config::FILTER_NONE, ScrapeConfig, ScrapeError};

use crate::cancel::CancelToken;
use crate::dates::{format_for_widget, DateRange};
use crate::retry::{Recovery, RetryFailure, RetryPolicy};
use crate::run_log::{EventKind, RunLog};
use crate::site;
use crate::traits::BrowserDriver;

/// Calendar widget must render within this window once the date field opens.
const WIDGET_TIMEOUT: Duration = Duration::from_secs(5);
/// How long a day cell gets to appear before month navigation kicks in.
const DAY_CELL_TIMEOUT: Duration = Duration::from_secs(2);
/// Results-loading spinner must clear within this window after Apply.
const LOADING_TIMEOUT: Duration = Duration::from_secs(20);
const LOADING_POLL_INTERVAL: Duration = Duration::from_millis(250);
/// Dropdowns are part of the static page chrome.
const ELEMENT_TIMEOUT: Duration = Duration::from_secs(5);
/// Month paging bound in either direction. Beyond a year of paging the
/// widget contract has drifted.
const MONTH_NAV_LIMIT: u32 = 12;

pub struct FilterApplier<'a, B: BrowserDriver> {
    browser: &'a B,
}

impl<'a, B: BrowserDriver> FilterApplier<'a, B> {
    pub fn new(browser: &'a B) -> Self {
        Self { browser }
    }

    pub async fn apply(
        &self,
        config: &ScrapeConfig,
        range: &DateRange,
        cancel: &CancelToken,
        run_log: &mut RunLog,
    ) -> Result<(), ScrapeError> {
        let browser = self.browser;

        // Step 1: prime the date field with the widget's own encoding, then
        // open it and wait for the calendar to render.
        let encoded = format!(
            "{} - {}",
            format_for_widget(range.start),
            format_for_widget(range.end)
        );
        let encoded = encoded.as_str();
        self.step("open_calendar", cancel, move || async move {
            browser.fill(site::DATE_FIELD, encoded).await?;
            browser.click(site::DATE_FIELD).await?;
            browser
                .wait_for(site::CALENDAR_WIDGET, WIDGET_TIMEOUT)
                .await?;
            Ok(())
        })
        .await?;

        // Step 2: select both ends of the range. A retry reissues the whole
        // selection — the widget may be in any state after a failure.
        let this = self;
        let (start, end) = (range.start, range.end);
        self.step("select_range", cancel, move || async move {
            this.select_day(start).await?;
            this.select_day(end).await
        })
        .await?;
        run_log.log(EventKind::CalendarRange { start, end });

        // Step 3: apply and wait for the results to finish loading.
        self.step("apply_range", cancel, move || async move {
            browser.click(site::APPLY_BUTTON).await?;
            this.wait_loading_cleared().await
        })
        .await?;

        // Step 4: optional dropdowns, degraded-but-continue.
        for (name, selector, value) in [
            ("age_group", site::AGE_GROUP_SELECT, config.age_group.as_str()),
            ("club", site::CLUB_SELECT, config.club.as_str()),
            (
                "competition",
                site::COMPETITION_SELECT,
                config.competition.as_str(),
            ),
            ("division", site::DIVISION_SELECT, config.division.as_str()),
        ] {
            if value == FILTER_NONE {
                continue;
            }
            let applied = match self.select_filter(name, selector, value, cancel).await {
                Ok(true) => {
                    info!(filter = name, value, "Filter applied");
                    true
                }
                Ok(false) => {
                    warn!(
                        filter = name,
                        value, "Filter option not present, continuing with site default"
                    );
                    false
                }
                Err(ScrapeError::Cancelled) => return Err(ScrapeError::Cancelled),
                Err(e) => {
                    // One broken dropdown never aborts the scrape.
                    warn!(filter = name, value, error = %e, "Filter step failed, continuing with site default");
                    false
                }
            };
            run_log.log(EventKind::FilterApplied {
                filter: name.to_string(),
                value: value.to_string(),
                applied,
            });
        }

        Ok(())
    }

    /// One independently retried interaction step.
    async fn step<T, F, Fut>(
        &self,
        name: &'static str,
        cancel: &CancelToken,
        f: F,
    ) -> Result<T, ScrapeError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        match RetryPolicy::INTERACTION
            .run(name, cancel, |_| Recovery::Retry, f)
            .await
        {
            Ok(attempted) => {
                if attempted.attempts > 1 {
                    debug!(
                        step = name,
                        attempts = attempted.attempts,
                        "Step succeeded after retry"
                    );
                }
                Ok(attempted.value)
            }
            Err(RetryFailure::Cancelled) => Err(ScrapeError::Cancelled),
            Err(RetryFailure::Exhausted { attempts, cause })
            | Err(RetryFailure::Fatal { attempts, cause }) => Err(ScrapeError::Interaction {
                step: name.to_string(),
                attempts,
                cause,
            }),
        }
    }

    /// Click the widget cell for `date`, paging the month view toward it
    /// when the cell is not currently rendered.
    async fn select_day(&self, date: NaiveDate) -> Result<()> {
        let cell = site::calendar_day_cell(date);
        if self.browser.wait_for(&cell, DAY_CELL_TIMEOUT).await.is_err() {
            let shown = self.displayed_month().await?;
            let months = month_delta(shown, date);
            anyhow::ensure!(
                months.unsigned_abs() <= MONTH_NAV_LIMIT,
                "{date} is {months} months from the displayed {shown}, beyond the navigation bound"
            );
            let nav = if months < 0 {
                site::CALENDAR_PREV
            } else {
                site::CALENDAR_NEXT
            };
            for _ in 0..months.abs() {
                self.browser.click(nav).await?;
            }
            self.browser
                .wait_for(&cell, DAY_CELL_TIMEOUT)
                .await
                .with_context(|| format!("day cell for {date} absent after month navigation"))?;
        }
        self.browser.click(&cell).await?;
        Ok(())
    }

    /// Current month shown by the widget, parsed from its "June 2024" label.
    async fn displayed_month(&self) -> Result<NaiveDate> {
        let label_html = self.browser.html(site::CALENDAR_MONTH_LABEL).await?;
        let label = Html::parse_fragment(&label_html)
            .root_element()
            .text()
            .collect::<String>();
        let label = label.trim().to_string();
        NaiveDate::parse_from_str(&format!("{label} 1"), "%B %Y %d")
            .with_context(|| format!("unrecognized month label '{label}'"))
    }

    /// There is no "wait for absence" primitive, so poll the DOM until the
    /// loading indicator is gone. An error fetching it means it is not in
    /// the DOM, which counts as cleared.
    async fn wait_loading_cleared(&self) -> Result<()> {
        let deadline = Instant::now() + LOADING_TIMEOUT;
        loop {
            let indicator = self
                .browser
                .html(site::LOADING_INDICATOR)
                .await
                .unwrap_or_default();
            if indicator.trim().is_empty() {
                return Ok(());
            }
            anyhow::ensure!(
                Instant::now() < deadline,
                "results still loading after {}s",
                LOADING_TIMEOUT.as_secs()
            );
            tokio::time::sleep(LOADING_POLL_INTERVAL).await;
        }
    }

    /// Returns `Ok(false)` when the dropdown renders but has no matching
    /// option — that is a skip, not a failure, and is not retried.
    async fn select_filter(
        &self,
        name: &'static str,
        selector: &'static str,
        value: &str,
        cancel: &CancelToken,
    ) -> Result<bool, ScrapeError> {
        let browser = self.browser;
        self.step(name, cancel, move || async move {
            browser.wait_for(selector, ELEMENT_TIMEOUT).await?;
            let options = browser.html(selector).await?;
            if !has_option(&options, value) {
                return Ok(false);
            }
            browser.fill(selector, value).await?;
            Ok(true)
        })
        .await
    }
}

/// Signed month distance from the displayed month to the target date.
fn month_delta(shown: NaiveDate, target: NaiveDate) -> i32 {
    (target.year() - shown.year()) * 12 + (target.month() as i32 - shown.month() as i32)
}

fn has_option(select_html: &str, value: &str) -> bool {
    let fragment = Html::parse_fragment(select_html);
    let option_sel = Selector::parse("option").expect("valid selector");
    fragment.select(&option_sel).any(|opt| {
        opt.value().attr("value") == Some(value)
            || opt.text().collect::<String>().trim() == value
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn month_delta_is_signed() {
        assert_eq!(month_delta(day(2024, 6, 1), day(2024, 6, 15)), 0);
        assert_eq!(month_delta(day(2024, 6, 1), day(2024, 5, 30)), -1);
        assert_eq!(month_delta(day(2024, 6, 1), day(2025, 1, 2)), 7);
        assert_eq!(month_delta(day(2024, 12, 1), day(2024, 1, 2)), -11);
    }

    #[test]
    fn option_matching_by_value_or_text() {
        let html = r#"<select class="division">
            <option value="">All</option>
            <option value="Northeast">Northeast</option>
            <option value="mw">Midwest</option>
        </select>"#;
        assert!(has_option(html, "Northeast"));
        assert!(has_option(html, "Midwest")); // by visible text
        assert!(!has_option(html, "Southwest"));
    }
}
