//! Due-date parsing and the labels shown on task cards.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::error::ApiError;

pub const DUE_SOON_DAYS: i64 = 3;
const DUE_DATE_FORMAT: &str = "%Y-%m-%d";

pub fn parse_due_date(raw: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw.trim(), DUE_DATE_FORMAT)
        .map_err(|_| ApiError::bad_request("Due date must be formatted as YYYY-MM-DD"))
}

pub fn format_due_date(date: NaiveDate) -> String {
    date.format(DUE_DATE_FORMAT).to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DueState {
    NoDueDate,
    Completed,
    Overdue,
    DueToday,
    DueSoon,
    Upcoming,
}

pub fn due_state(due: Option<NaiveDate>, today: NaiveDate, completed: bool) -> DueState {
    let Some(due) = due else {
        return DueState::NoDueDate;
    };
    if completed {
        return DueState::Completed;
    }
    match (due - today).num_days() {
        d if d < 0 => DueState::Overdue,
        0 => DueState::DueToday,
        d if d <= DUE_SOON_DAYS => DueState::DueSoon,
        _ => DueState::Upcoming,
    }
}

pub fn due_label(due: NaiveDate, today: NaiveDate) -> String {
    let days = (due - today).num_days();
    match days {
        0 => "Due today".to_string(),
        1 => "Due tomorrow".to_string(),
        -1 => "Overdue by 1 day".to_string(),
        d if d < 0 => format!("Overdue by {} days", -d),
        d if d <= 6 => format!("Due in {} days", d),
        _ if due.year() == today.year() => format!("Due {}", due.format("%b %-d")),
        _ => format!("Due {}", due.format("%b %-d, %Y")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn parses_iso_dates() {
        assert_eq!(parse_due_date(" 2024-03-05 ").unwrap(), d(2024, 3, 5));
        assert!(parse_due_date("05/03/2024").is_err());
        assert!(parse_due_date("2024-02-30").is_err());
        assert_eq!(format_due_date(d(2024, 3, 5)), "2024-03-05");
    }

    #[test]
    fn classifies_due_dates() {
        let today = d(2024, 3, 10);
        assert_eq!(due_state(None, today, false), DueState::NoDueDate);
        assert_eq!(due_state(Some(d(2024, 3, 9)), today, false), DueState::Overdue);
        assert_eq!(due_state(Some(d(2024, 3, 10)), today, false), DueState::DueToday);
        assert_eq!(due_state(Some(d(2024, 3, 13)), today, false), DueState::DueSoon);
        assert_eq!(due_state(Some(d(2024, 3, 14)), today, false), DueState::Upcoming);
    }

    #[test]
    fn completed_tasks_are_never_overdue() {
        let today = d(2024, 3, 10);
        assert_eq!(due_state(Some(d(2024, 1, 1)), today, true), DueState::Completed);
    }

    #[test]
    fn labels() {
        let today = d(2024, 3, 10);
        assert_eq!(due_label(d(2024, 3, 10), today), "Due today");
        assert_eq!(due_label(d(2024, 3, 11), today), "Due tomorrow");
        assert_eq!(due_label(d(2024, 3, 9), today), "Overdue by 1 day");
        assert_eq!(due_label(d(2024, 3, 7), today), "Overdue by 3 days");
        assert_eq!(due_label(d(2024, 3, 13), today), "Due in 3 days");
        assert_eq!(due_label(d(2024, 4, 5), today), "Due Apr 5");
        assert_eq!(due_label(d(2025, 1, 2), today), "Due Jan 2, 2025");
    }
}
