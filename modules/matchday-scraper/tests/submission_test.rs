//! Submission pipeline behavior over the mock API: dedup, classified
//! retries, partial-failure containment, and cancellation.

use chrono::NaiveDate;

use matchday_scraper::cancel::CancelToken;
use matchday_scraper::metrics::ScrapeMetrics;
use matchday_scraper::run_log::RunLog;
use matchday_scraper::submit::SubmissionPipeline;
use matchday_scraper::testing::{completed, scheduled, MockApi};

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn run_log() -> RunLog {
    RunLog::new("test-run".to_string(), "Northeast".to_string())
}

#[tokio::test]
async fn duplicate_records_are_sent_once() {
    let first = scheduled("Arsenal FC", "United SC", day(2024, 6, 9));
    let twin = first.clone();
    let key = first.dedup_key();

    let api = MockApi::new();
    let pipeline = SubmissionPipeline::new(&api);
    let mut metrics = ScrapeMetrics::default();
    let report = pipeline
        .submit(&[first, twin], &mut metrics, &CancelToken::new(), &mut run_log())
        .await;

    assert_eq!(report.created, 1);
    assert_eq!(report.duplicates_skipped, 1);
    assert_eq!(api.call_count(&format!("schedule:{key}")), 1);
}

#[tokio::test]
async fn one_bad_record_does_not_block_the_batch() {
    let good_a = scheduled("Arsenal FC", "United SC", day(2024, 6, 9));
    let bad = scheduled("City SC", "Rovers FC", day(2024, 6, 9));
    let good_b = scheduled("Wanderers", "Athletic", day(2024, 6, 10));
    let bad_key = bad.dedup_key();

    let api = MockApi::new().fail_schedule(&bad_key, 400, u32::MAX);
    let pipeline = SubmissionPipeline::new(&api);
    let mut metrics = ScrapeMetrics::default();
    let report = pipeline
        .submit(
            &[good_a, bad, good_b],
            &mut metrics,
            &CancelToken::new(),
            &mut run_log(),
        )
        .await;

    assert_eq!(report.created, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].key, bad_key);
    assert_eq!(metrics.api_calls_succeeded, 2);
    assert_eq!(metrics.api_calls_failed, 1);
}

#[tokio::test]
async fn transient_failures_retry_to_success() {
    let record = scheduled("Arsenal FC", "United SC", day(2024, 6, 9));
    let key = record.dedup_key();

    let api = MockApi::new().fail_schedule(&key, 503, 2);
    let pipeline = SubmissionPipeline::new(&api);
    let mut metrics = ScrapeMetrics::default();
    let report = pipeline
        .submit(&[record], &mut metrics, &CancelToken::new(), &mut run_log())
        .await;

    // Two 503s then success on the third attempt — reported as a success.
    assert_eq!(report.created, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(api.call_count(&format!("schedule:{key}")), 3);
    assert_eq!(metrics.api_calls_failed, 0);
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let record = scheduled("Arsenal FC", "United SC", day(2024, 6, 9));
    let key = record.dedup_key();

    let api = MockApi::new().fail_schedule(&key, 422, u32::MAX);
    let pipeline = SubmissionPipeline::new(&api);
    let mut metrics = ScrapeMetrics::default();
    let report = pipeline
        .submit(&[record], &mut metrics, &CancelToken::new(), &mut run_log())
        .await;

    assert_eq!(report.failed, 1);
    assert_eq!(api.call_count(&format!("schedule:{key}")), 1);
}

#[tokio::test]
async fn rate_limit_backs_off_and_recovers() {
    let record = scheduled("Arsenal FC", "United SC", day(2024, 6, 9));
    let key = record.dedup_key();

    // The mock attaches a short Retry-After hint to 429s.
    let api = MockApi::new().fail_schedule(&key, 429, 1);
    let pipeline = SubmissionPipeline::new(&api);
    let mut metrics = ScrapeMetrics::default();
    let report = pipeline
        .submit(&[record], &mut metrics, &CancelToken::new(), &mut run_log())
        .await;

    assert_eq!(report.created, 1);
    assert_eq!(api.call_count(&format!("schedule:{key}")), 2);
}

#[tokio::test]
async fn scored_match_gets_schedule_and_score_calls() {
    let record = completed("Arsenal FC", "United SC", day(2024, 6, 9), (2, 1));
    let key = record.dedup_key();

    let api = MockApi::new();
    let pipeline = SubmissionPipeline::new(&api);
    let mut metrics = ScrapeMetrics::default();
    let report = pipeline
        .submit(&[record], &mut metrics, &CancelToken::new(), &mut run_log())
        .await;

    assert_eq!(report.created, 1);
    assert_eq!(api.call_count(&format!("schedule:{key}")), 1);
    assert_eq!(api.call_count(&format!("score:{key}")), 1);
    assert_eq!(metrics.api_calls_succeeded, 2);
}

#[tokio::test]
async fn score_update_failure_marks_the_record_failed() {
    let record = completed("Arsenal FC", "United SC", day(2024, 6, 9), (2, 1));
    let key = record.dedup_key();

    let api = MockApi::new().fail_score(&key, 400, u32::MAX);
    let pipeline = SubmissionPipeline::new(&api);
    let mut metrics = ScrapeMetrics::default();
    let report = pipeline
        .submit(&[record], &mut metrics, &CancelToken::new(), &mut run_log())
        .await;

    assert_eq!(report.created, 0);
    assert_eq!(report.failed, 1);
    assert_eq!(metrics.api_calls_succeeded, 1);
    assert_eq!(metrics.api_calls_failed, 1);
}

#[tokio::test]
async fn known_keys_count_as_updates() {
    let record = scheduled("Arsenal FC", "United SC", day(2024, 6, 9));
    let key = record.dedup_key();

    let api = MockApi::new().already_known(&key);
    let pipeline = SubmissionPipeline::new(&api);
    let mut metrics = ScrapeMetrics::default();
    let report = pipeline
        .submit(&[record], &mut metrics, &CancelToken::new(), &mut run_log())
        .await;

    assert_eq!(report.created, 0);
    assert_eq!(report.updated, 1);
}

#[tokio::test]
async fn cancellation_stops_the_batch_without_failures() {
    let records = vec![
        scheduled("Arsenal FC", "United SC", day(2024, 6, 9)),
        scheduled("City SC", "Rovers FC", day(2024, 6, 10)),
    ];
    let cancel = CancelToken::new();
    cancel.cancel();

    let api = MockApi::new();
    let pipeline = SubmissionPipeline::new(&api);
    let mut metrics = ScrapeMetrics::default();
    let report = pipeline
        .submit(&records, &mut metrics, &cancel, &mut run_log())
        .await;

    assert_eq!(report.created + report.updated + report.failed, 0);
    assert!(api.recorded().is_empty());
}
