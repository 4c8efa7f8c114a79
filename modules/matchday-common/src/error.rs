use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Browser step '{step}' failed after {attempts} attempts: {cause}")]
    Interaction {
        step: String,
        attempts: u32,
        cause: String,
    },

    #[error("Submission error: {0}")]
    Submission(String),

    #[error("Scrape aborted in {phase} after {attempts} attempts: {cause}")]
    Aborted {
        phase: String,
        attempts: u32,
        cause: String,
    },

    #[error("Run cancelled")]
    Cancelled,
}

impl ScrapeError {
    /// Distinguishes the cooperative-cancellation outcome from a failure.
    /// Cancelled runs exit non-zero but should not be re-triggered by the
    /// external scheduler.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ScrapeError::Cancelled)
    }
}
