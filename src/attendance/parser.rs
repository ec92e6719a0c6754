//! Attendance report extraction from the portal's rendered HTML.
//!
//! The report has no semantic markup; the results table is anchored by its
//! fixed width/border attributes. Rows that cannot be parsed are logged and
//! skipped so one bad row never loses the rest of the report.

use chrono::{Duration, NaiveTime};
use regex::Regex;
use scraper::{Html, Selector};

use crate::error::ScrapeError;

/// Hours from the earliest punch to the estimated leave time: an 8-hour
/// shift plus a 1-hour unpaid break. A policy constant, not scraped.
const SHIFT_HOURS: i64 = 9;

/// One employee-day row from the punch-clock report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceRecord {
    pub employee_id: String,
    pub name: String,
    /// Report date in normalized `Y/M/D` form (no zero-padding).
    pub date: String,
    /// Every punch time in the row, `HH:MM`, in table order.
    pub times: Vec<String>,
    /// Earliest punch of the day.
    pub work_start: String,
    /// `work_start` plus the shift policy offset.
    pub work_end: String,
}

/// Extract all parseable rows from the report page.
pub fn parse_attendance_html(html: &str) -> Result<Vec<AttendanceRecord>, ScrapeError> {
    let document = Html::parse_document(html);
    let table_selector = Selector::parse(r#"table[width="566"][border="1"]"#)
        .map_err(|e| ScrapeError::Parse(e.to_string()))?;
    let row_selector = Selector::parse("tr").map_err(|e| ScrapeError::Parse(e.to_string()))?;
    let cell_selector = Selector::parse("td").map_err(|e| ScrapeError::Parse(e.to_string()))?;

    let table = document
        .select(&table_selector)
        .next()
        .ok_or(ScrapeError::TableNotFound)?;

    let time_pattern = Regex::new(r"^\d{2}:\d{2}$").map_err(|e| ScrapeError::Parse(e.to_string()))?;

    let mut records = Vec::new();
    // Skip the header row.
    for row in table.select(&row_selector).skip(1) {
        let cells: Vec<String> = row
            .select(&cell_selector)
            .map(|cell| cell.text().collect::<String>().trim().to_string())
            .collect();

        match parse_row(&cells, &time_pattern) {
            Ok(Some(record)) => records.push(record),
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(error = %err, cells = cells.len(), "skipping unparseable attendance row");
            }
        }
    }

    Ok(records)
}

/// Parse one row of trimmed cell texts. `Ok(None)` means the row is shaped
/// fine but carries no punch times (e.g. a day off).
fn parse_row(
    cells: &[String],
    time_pattern: &Regex,
) -> Result<Option<AttendanceRecord>, ScrapeError> {
    if cells.len() < 5 {
        return Ok(None);
    }

    let employee_id = cells[0].clone();
    let name = cells[1].clone();
    let date = normalize_report_date(&cells[2]);

    // Punch times run left to right from the fourth cell. Blanks are
    // skipped; the first non-blank, non-time cell starts the summary text
    // and ends the scan.
    let mut times = Vec::new();
    for cell in &cells[3..] {
        if time_pattern.is_match(cell) {
            times.push(cell.clone());
        } else if cell.is_empty() {
            continue;
        } else {
            break;
        }
    }

    if times.is_empty() {
        return Ok(None);
    }

    // All times share the day, so lexicographic min is chronological min.
    let work_start = times.iter().min().cloned().unwrap_or_default();
    let work_end = add_shift(&work_start)?;

    Ok(Some(AttendanceRecord { employee_id, name, date, times, work_start, work_end }))
}

/// Re-join a portal date on `/` without zero-padding so stored dates look
/// the same regardless of how the portal rendered them.
fn normalize_report_date(raw: &str) -> String {
    let parts: Vec<&str> = raw.split('/').collect();
    if parts.len() != 3 {
        return raw.to_string();
    }
    match (
        parts[0].trim().parse::<i64>(),
        parts[1].trim().parse::<i64>(),
        parts[2].trim().parse::<i64>(),
    ) {
        (Ok(y), Ok(m), Ok(d)) => format!("{y}/{m}/{d}"),
        _ => raw.to_string(),
    }
}

fn add_shift(work_start: &str) -> Result<String, ScrapeError> {
    let start = NaiveTime::parse_from_str(work_start, "%H:%M")
        .map_err(|e| ScrapeError::Parse(format!("bad punch time {work_start:?}: {e}")))?;
    let end = start + Duration::hours(SHIFT_HOURS);
    Ok(end.format("%H:%M").to_string())
}
