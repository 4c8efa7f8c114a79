//! Results-table extraction: rendered HTML in, ordered `MatchRecord`
//! sequence out. Row-level problems are parse warnings, never errors — a
//! drifted or partially rendered table degrades to fewer records, and the
//! output order always mirrors the table's physical row order.

use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use matchday_common::{MatchRecord, MatchStatus, ScrapeConfig};

use crate::site;

#[derive(Debug, Clone)]
pub struct ParseWarning {
    /// Zero-based physical row index in the source table.
    pub row: usize,
    pub reason: String,
}

#[derive(Debug)]
pub struct Extraction {
    pub records: Vec<MatchRecord>,
    pub warnings: Vec<ParseWarning>,
}

/// Parse the results table. Pure: same markup in, same records out.
pub fn extract(html: &str, config: &ScrapeConfig) -> Extraction {
    let document = Html::parse_document(html);
    let row_sel = Selector::parse(site::RESULTS_ROW).expect("valid selector");
    let date_sel = Selector::parse(site::DATE_CELL).expect("valid selector");
    let home_sel = Selector::parse(site::HOME_TEAM_CELL).expect("valid selector");
    let away_sel = Selector::parse(site::AWAY_TEAM_CELL).expect("valid selector");
    let result_sel = Selector::parse(site::RESULT_CELL).expect("valid selector");

    let mut records = Vec::new();
    let mut warnings = Vec::new();

    for (idx, row) in document.select(&row_sel).enumerate() {
        let home_team = cell_text(&row, &home_sel);
        let away_team = cell_text(&row, &away_sel);
        if home_team.is_empty() || away_team.is_empty() {
            warnings.push(ParseWarning {
                row: idx,
                reason: "missing team name".to_string(),
            });
            continue;
        }

        let date_text = cell_text(&row, &date_sel);
        let date = match NaiveDate::parse_from_str(&date_text, site::TABLE_DATE_FORMAT) {
            Ok(date) => date,
            Err(_) => {
                warnings.push(ParseWarning {
                    row: idx,
                    reason: format!("unparseable date '{date_text}'"),
                });
                continue;
            }
        };

        let match_id = row
            .value()
            .attr(site::MATCH_ID_ATTR)
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(String::from);

        let (status, home_score, away_score) =
            match classify_result_cell(&cell_text(&row, &result_sel)) {
                ResultCell::Score(home, away) => {
                    (MatchStatus::Completed, Some(home), Some(away))
                }
                ResultCell::Time | ResultCell::Blank => (MatchStatus::Scheduled, None, None),
                ResultCell::Live => (MatchStatus::InProgress, None, None),
                ResultCell::Malformed(text) => {
                    // Strict score parsing: a bad score cell demotes the row
                    // to scheduled instead of failing the extraction.
                    warnings.push(ParseWarning {
                        row: idx,
                        reason: format!("unparseable result cell '{text}', treating as scheduled"),
                    });
                    (MatchStatus::Scheduled, None, None)
                }
            };

        records.push(MatchRecord {
            match_id,
            home_team,
            away_team,
            date,
            status,
            home_score,
            away_score,
            competition: config.competition.clone(),
            division: config.division.clone(),
            age_group: config.age_group.clone(),
            club: config.club.clone(),
        });
    }

    Extraction { records, warnings }
}

fn cell_text(row: &ElementRef, selector: &Selector) -> String {
    row.select(selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

enum ResultCell {
    Score(u32, u32),
    Time,
    Live,
    Blank,
    Malformed(String),
}

/// Status inference from the result column: "2 - 1" is a final score,
/// "3:30 PM" is a kickoff time, a live token means the game is underway.
/// An empty cell is a fixture with no kickoff time listed yet.
fn classify_result_cell(text: &str) -> ResultCell {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return ResultCell::Blank;
    }

    let lower = trimmed.to_lowercase();
    if site::LIVE_TOKENS
        .iter()
        .any(|token| lower == *token || lower.starts_with(&format!("{token} ")))
    {
        return ResultCell::Live;
    }

    let score_re = Regex::new(r"^(\d+)\s*[-–]\s*(\d+)$").expect("valid regex");
    if let Some(cap) = score_re.captures(trimmed) {
        if let (Ok(home), Ok(away)) = (cap[1].parse::<u32>(), cap[2].parse::<u32>()) {
            return ResultCell::Score(home, away);
        }
        return ResultCell::Malformed(trimmed.to_string());
    }

    let time_re = Regex::new(r"(?i)^\d{1,2}:\d{2}\s*(?:am|pm)?$").expect("valid regex");
    if time_re.is_match(trimmed) {
        return ResultCell::Time;
    }

    ResultCell::Malformed(trimmed.to_string())
}
