use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// --- Match status ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Scheduled,
    InProgress,
    Completed,
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchStatus::Scheduled => write!(f, "scheduled"),
            MatchStatus::InProgress => write!(f, "in_progress"),
            MatchStatus::Completed => write!(f, "completed"),
        }
    }
}

// --- Match record ---

/// One discovered game. Created fresh on every scrape, never mutated
/// afterwards. Durability lives entirely in the upstream service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    /// Source-site identifier. Absent for not-yet-numbered fixtures.
    pub match_id: Option<String>,
    pub home_team: String,
    pub away_team: String,
    /// The source site's local date. No timezone conversion.
    pub date: NaiveDate,
    pub status: MatchStatus,
    /// Present only when `status == Completed`.
    pub home_score: Option<u32>,
    pub away_score: Option<u32>,
    pub competition: String,
    pub division: String,
    pub age_group: String,
    pub club: String,
}

impl MatchRecord {
    /// Identity used for in-run duplicate suppression and for the upstream
    /// upsert key: the site's match id when present, otherwise a composite
    /// of teams + date + competition. The composite is assumed stable
    /// across runs; the upstream upsert is keyed on the same value.
    pub fn dedup_key(&self) -> String {
        match &self.match_id {
            Some(id) if !id.is_empty() => id.clone(),
            _ => format!(
                "{}|{}|{}|{}",
                self.home_team.to_lowercase(),
                self.away_team.to_lowercase(),
                self.date,
                self.competition.to_lowercase(),
            ),
        }
    }

    pub fn has_score(&self) -> bool {
        self.home_score.is_some() && self.away_score.is_some()
    }
}
