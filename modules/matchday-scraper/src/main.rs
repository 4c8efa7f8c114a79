use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Utc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use headless_client::HeadlessClient;
use matchday_common::ScrapeConfig;
use matchday_scraper::cancel::CancelToken;
use matchday_scraper::orchestrator::Orchestrator;
use matchday_scraper::run_log::RunLog;
use matchday_scraper::submit::{SubmissionPipeline, UpstreamApi};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("matchday_scraper=info".parse()?),
        )
        .init();

    info!("Matchday scraper starting...");

    // Load config
    let config = ScrapeConfig::from_env();
    config.log_redacted();

    // Cancellation: optional run deadline plus Ctrl-C.
    let cancel = match std::env::var("MATCHDAY_DEADLINE_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
    {
        Some(secs) => CancelToken::with_deadline(Duration::from_secs(secs)),
        None => CancelToken::new(),
    };
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing up and releasing the browser");
            ctrl_c_cancel.cancel();
        }
    });

    // One browser session per run, owned by the orchestrator.
    let client = HeadlessClient::new(&config.browser_url, config.browser_token.as_deref());
    let session = client.create_session().await?;

    let started = Instant::now();
    let today = Utc::now().date_naive();
    let run_id = format!("run-{}", Utc::now().format("%Y%m%dT%H%M%SZ"));
    let mut run_log = RunLog::new(run_id, config.division.clone());

    let orchestrator = Orchestrator::new(&session, &config, today);
    let run = orchestrator.run(&cancel, &mut run_log).await;
    let mut metrics = run.metrics;

    let report = match &run.outcome {
        Ok(()) => {
            let api = UpstreamApi::new(&config.api_base_url, &config.api_token);
            let pipeline = SubmissionPipeline::new(&api);
            Some(
                pipeline
                    .submit(&run.records, &mut metrics, &cancel, &mut run_log)
                    .await,
            )
        }
        Err(_) => None,
    };

    metrics.duration = started.elapsed();
    if let Err(e) = run_log.save(&metrics) {
        warn!(error = %e, "Failed to persist run log");
    }

    info!("{metrics}");
    if let Some(report) = &report {
        info!("{report}");
    }

    match run.outcome {
        Ok(()) => Ok(()),
        Err(e) if e.is_cancelled() => {
            error!("Run cancelled before completion");
            std::process::exit(2);
        }
        Err(e) => {
            error!(error = %e, "Scrape run aborted");
            std::process::exit(1);
        }
    }
}
