//! End-to-end orchestrator runs over the mock browser: full happy path,
//! abort paths, the results-wait retry, and the session-release invariant.

use chrono::NaiveDate;

use matchday_scraper::cancel::CancelToken;
use matchday_scraper::dates::DateRange;
use matchday_scraper::filters::FilterApplier;
use matchday_scraper::orchestrator::Orchestrator;
use matchday_scraper::run_log::RunLog;
use matchday_scraper::site;
use matchday_scraper::submit::SubmissionPipeline;
use matchday_scraper::testing::{
    match_row, results_table, test_config, MockApi, MockBrowser,
};
use matchday_common::{MatchStatus, ScrapeError};

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn run_log() -> RunLog {
    RunLog::new("test-run".to_string(), "Northeast".to_string())
}

#[tokio::test]
async fn happy_path_scrapes_and_submits_two_matches() {
    let html = results_table(&[
        match_row(Some("1001"), "06/09/2024", "Arsenal FC", "United SC", "2 - 1"),
        match_row(None, "06/10/2024", "City SC", "Rovers FC", "3:30 PM"),
    ]);
    let browser = MockBrowser::new().with_html(site::RESULTS_TABLE, &html);
    let config = test_config();
    let cancel = CancelToken::new();
    let mut log = run_log();

    let orchestrator = Orchestrator::new(&browser, &config, day(2024, 6, 10));
    let run = orchestrator.run(&cancel, &mut log).await;

    assert!(run.outcome.is_ok());
    assert_eq!(run.metrics.matches_found, 2);
    assert_eq!(run.metrics.matches_scored, 1);
    assert_eq!(run.records[0].status, MatchStatus::Completed);
    assert_eq!(run.records[1].status, MatchStatus::Scheduled);
    assert_eq!(browser.close_count(), 1);

    // Submit what was extracted against an empty prior-submission set.
    let api = MockApi::new();
    let pipeline = SubmissionPipeline::new(&api);
    let mut metrics = run.metrics;
    let report = pipeline
        .submit(&run.records, &mut metrics, &cancel, &mut log)
        .await;

    assert_eq!(report.created, 2);
    assert_eq!(report.duplicates_skipped, 0);
    assert_eq!(report.failed, 0);
    // Completed match gets a score update on top of the schedule upsert.
    assert_eq!(api.call_count("score:1001"), 1);
    assert_eq!(metrics.api_calls_succeeded, 3);
}

#[tokio::test]
async fn navigation_failure_aborts_with_attempt_count() {
    let browser = MockBrowser::new().fail_navigate_times(3);
    let config = test_config();
    let mut log = run_log();

    let orchestrator = Orchestrator::new(&browser, &config, day(2024, 6, 10));
    let run = orchestrator.run(&CancelToken::new(), &mut log).await;

    match run.outcome {
        Err(ScrapeError::Aborted {
            phase, attempts, ..
        }) => {
            assert_eq!(phase, "navigation");
            assert_eq!(attempts, 3);
        }
        other => panic!("expected navigation abort, got {other:?}"),
    }
    assert!(run.records.is_empty());
    assert_eq!(run.metrics.errors.len(), 1);
    // The session is released on the abort path too.
    assert_eq!(browser.close_count(), 1);
}

#[tokio::test]
async fn transient_navigation_failure_recovers() {
    let browser = MockBrowser::new().fail_navigate_times(2);
    let config = test_config();
    let mut log = run_log();

    let orchestrator = Orchestrator::new(&browser, &config, day(2024, 6, 10));
    let run = orchestrator.run(&CancelToken::new(), &mut log).await;

    assert!(run.outcome.is_ok());
    assert_eq!(browser.close_count(), 1);
}

#[tokio::test]
async fn results_timeout_retries_filter_sequence_once() {
    let browser = MockBrowser::new().fail_wait_times(site::RESULTS_TABLE, 1);
    let config = test_config();
    let mut log = run_log();

    let orchestrator = Orchestrator::new(&browser, &config, day(2024, 6, 10));
    let run = orchestrator.run(&CancelToken::new(), &mut log).await;

    assert!(run.outcome.is_ok());
    let apply_clicks = browser
        .recorded()
        .iter()
        .filter(|a| *a == &format!("click:{}", site::APPLY_BUTTON))
        .count();
    assert_eq!(apply_clicks, 2, "filter sequence should be reissued once");
}

#[tokio::test]
async fn missing_results_table_aborts_after_one_retry() {
    let browser = MockBrowser::new().never_find(site::RESULTS_TABLE);
    let config = test_config();
    let mut log = run_log();

    let orchestrator = Orchestrator::new(&browser, &config, day(2024, 6, 10));
    let run = orchestrator.run(&CancelToken::new(), &mut log).await;

    match run.outcome {
        Err(ScrapeError::Aborted {
            phase, attempts, ..
        }) => {
            assert_eq!(phase, "results_loaded");
            assert_eq!(attempts, 2);
        }
        other => panic!("expected results abort, got {other:?}"),
    }
    assert_eq!(browser.close_count(), 1);
}

#[tokio::test]
async fn empty_results_table_is_a_valid_run() {
    // No scripted table HTML: extraction sees an empty document.
    let browser = MockBrowser::new();
    let config = test_config();
    let mut log = run_log();

    let orchestrator = Orchestrator::new(&browser, &config, day(2024, 6, 10));
    let run = orchestrator.run(&CancelToken::new(), &mut log).await;

    assert!(run.outcome.is_ok());
    assert!(run.records.is_empty());
    assert_eq!(run.metrics.matches_found, 0);
}

#[tokio::test]
async fn cancelled_token_short_circuits_to_cleanup() {
    let browser = MockBrowser::new();
    let config = test_config();
    let cancel = CancelToken::new();
    cancel.cancel();
    let mut log = run_log();

    let orchestrator = Orchestrator::new(&browser, &config, day(2024, 6, 10));
    let run = orchestrator.run(&cancel, &mut log).await;

    match &run.outcome {
        Err(e) => assert!(e.is_cancelled()),
        Ok(()) => panic!("cancelled run should not report success"),
    }
    assert!(browser.recorded().is_empty(), "no browser work after cancel");
    assert_eq!(browser.close_count(), 1);
}

#[tokio::test]
async fn invalid_schedule_url_fails_before_browser_interaction() {
    let browser = MockBrowser::new();
    let mut config = test_config();
    config.schedule_url = "not a url".to_string();
    let mut log = run_log();

    let orchestrator = Orchestrator::new(&browser, &config, day(2024, 6, 10));
    let run = orchestrator.run(&CancelToken::new(), &mut log).await;

    assert!(matches!(run.outcome, Err(ScrapeError::Config(_))));
    assert!(browser.recorded().is_empty());
    assert_eq!(browser.close_count(), 1);
}

#[tokio::test]
async fn negative_lookback_fails_before_browser_interaction() {
    let browser = MockBrowser::new();
    let mut config = test_config();
    config.lookback_days = -1;
    let mut log = run_log();

    let orchestrator = Orchestrator::new(&browser, &config, day(2024, 6, 10));
    let run = orchestrator.run(&CancelToken::new(), &mut log).await;

    assert!(matches!(run.outcome, Err(ScrapeError::Config(_))));
    assert!(browser.recorded().is_empty());
}

#[tokio::test]
async fn division_filter_applies_when_option_exists() {
    let browser = MockBrowser::new().with_html(
        site::DIVISION_SELECT,
        r#"<select class="division"><option value="Northeast">Northeast</option></select>"#,
    );
    let config = test_config();
    let mut log = run_log();

    let orchestrator = Orchestrator::new(&browser, &config, day(2024, 6, 10));
    let run = orchestrator.run(&CancelToken::new(), &mut log).await;

    assert!(run.outcome.is_ok());
    let actions = browser.recorded();
    assert!(actions.contains(&format!("fill:{}=Northeast", site::DIVISION_SELECT)));
    // Age group option is absent from the mock: degraded, no fill issued.
    assert!(!actions.iter().any(|a| a.starts_with(&format!("fill:{}", site::AGE_GROUP_SELECT))));
}

#[tokio::test]
async fn calendar_pages_back_to_reach_start_date() {
    let start_cell = site::calendar_day_cell(day(2024, 5, 9));
    let browser = MockBrowser::new()
        .fail_wait_times(&start_cell, 1)
        .with_html(
            site::CALENDAR_MONTH_LABEL,
            r#"<span class="month-label">June 2024</span>"#,
        );
    let config = test_config();
    let range = DateRange {
        start: day(2024, 5, 9),
        end: day(2024, 6, 10),
    };
    let mut log = run_log();

    let applier = FilterApplier::new(&browser);
    applier
        .apply(&config, &range, &CancelToken::new(), &mut log)
        .await
        .expect("filter application should succeed");

    let actions = browser.recorded();
    let prev_clicks = actions
        .iter()
        .filter(|a| *a == &format!("click:{}", site::CALENDAR_PREV))
        .count();
    assert_eq!(prev_clicks, 1, "one month back from June to May");
    assert!(actions.contains(&format!("click:{start_cell}")));
}
