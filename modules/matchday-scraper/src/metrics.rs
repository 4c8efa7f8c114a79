use std::time::Duration;

/// Accumulator for one scrape run. Owned by the orchestrator while the run
/// is live, extended by the submission pipeline, read-only afterwards. No
/// state survives between runs.
#[derive(Debug, Default)]
pub struct ScrapeMetrics {
    pub matches_found: u32,
    pub matches_scored: u32,
    pub api_calls_succeeded: u32,
    pub api_calls_failed: u32,
    pub duplicates_skipped: u32,
    pub parse_warnings: u32,
    pub errors: Vec<String>,
    pub duration: Duration,
}

impl std::fmt::Display for ScrapeMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Scrape Run Complete ===")?;
        writeln!(f, "Matches found:      {}", self.matches_found)?;
        writeln!(f, "Matches scored:     {}", self.matches_scored)?;
        writeln!(f, "API calls ok:       {}", self.api_calls_succeeded)?;
        writeln!(f, "API calls failed:   {}", self.api_calls_failed)?;
        writeln!(f, "Duplicates skipped: {}", self.duplicates_skipped)?;
        writeln!(f, "Parse warnings:     {}", self.parse_warnings)?;
        writeln!(f, "Duration:           {:.1}s", self.duration.as_secs_f64())?;
        if !self.errors.is_empty() {
            writeln!(f, "\nErrors:")?;
            for error in &self.errors {
                writeln!(f, "  - {error}")?;
            }
        }
        Ok(())
    }
}
