//! The source site's DOM contract: selectors for the schedule page's filter
//! panel, calendar widget, and results table, plus the status tokens the
//! results column uses. Semi-stable — when the site drifts, these are the
//! constants to update, and the engine degrades with warnings rather than
//! crashing.

use chrono::NaiveDate;

// --- Filter panel ---

pub const DATE_FIELD: &str = "#schedule-filters input.date-range";
pub const APPLY_BUTTON: &str = "#schedule-filters button.apply-filters";

pub const AGE_GROUP_SELECT: &str = "#schedule-filters select.age-group";
pub const CLUB_SELECT: &str = "#schedule-filters select.club";
pub const COMPETITION_SELECT: &str = "#schedule-filters select.competition";
pub const DIVISION_SELECT: &str = "#schedule-filters select.division";

// --- Calendar widget ---

pub const CALENDAR_WIDGET: &str = ".datepicker-panel";
pub const CALENDAR_MONTH_LABEL: &str = ".datepicker-panel .month-label";
pub const CALENDAR_PREV: &str = ".datepicker-panel button.nav-prev";
pub const CALENDAR_NEXT: &str = ".datepicker-panel button.nav-next";

/// Day cells carry the ISO date in a data attribute.
pub fn calendar_day_cell(date: NaiveDate) -> String {
    format!(
        ".datepicker-panel td[data-date=\"{}\"]",
        date.format("%Y-%m-%d")
    )
}

// --- Results ---

pub const LOADING_INDICATOR: &str = "#schedule-results .loading-spinner";
pub const RESULTS_TABLE: &str = "#schedule-results table.match-results";
pub const RESULTS_ROW: &str = "tr.match-row";

pub const DATE_CELL: &str = "td.match-date";
pub const HOME_TEAM_CELL: &str = "td.home-team";
pub const AWAY_TEAM_CELL: &str = "td.away-team";
pub const RESULT_CELL: &str = "td.result";
pub const MATCH_ID_ATTR: &str = "data-match-id";

/// Dates in the results table use the same encoding as the calendar widget.
pub const TABLE_DATE_FORMAT: &str = "%m/%d/%Y";

/// Tokens the result column shows for a game currently being played.
pub const LIVE_TOKENS: &[&str] = &["live", "ht", "1st half", "2nd half", "in progress"];
