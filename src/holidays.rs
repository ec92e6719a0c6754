//! The static holiday table and day arithmetic.
//!
//! The table is configuration data baked into the process; labels and dates
//! are read-only at runtime. Labels carrying a recurring keyword (birthdays,
//! anniversaries, annual festivals) re-anchor to the current year and roll
//! forward when the date has already passed.

use chrono::{Datelike, NaiveDate};

use crate::clock::Clock;

/// Label → calendar date (`YYYY-MM-DD`).
pub const HOLIDAYS: &[(&str, &str)] = &[
    ("七夕", "2025-08-29"),
    ("騷鵝生日", "1998-02-26"),
    ("灰鵝生日", "1999-07-14"),
    ("灰鵝哥哥生日", "1996-03-05"),
    ("灰鵝媽媽生日", "1964-04-21"),
    ("灰鵝爸爸生日", "1963-12-21"),
    ("灰鵝與騷鵝的結婚紀念日", "2025-01-16"),
    ("情鵝節", "2025-02-14"),
    ("聖誕節", "2025-12-25"),
    ("蝦皮折扣", "2025-09-18"),
];

/// Labels containing any of these recur yearly.
const RECURRING_KEYWORDS: &[&str] = &["生日", "紀念日", "情人節", "情鵝節", "七夕", "聖誕節"];

/// Days from `today` until the holiday, with the resolved occurrence date.
///
/// Recurring holidays resolve to this year's occurrence, or next year's when
/// this year's has already passed, so the count is never negative for them.
pub fn days_until(
    label: &str,
    date_str: &str,
    today: NaiveDate,
) -> Result<(i64, NaiveDate), chrono::ParseError> {
    let configured = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")?;

    let target = if is_recurring(label) {
        let this_year = anchor_to_year(configured, today.year());
        if this_year < today { anchor_to_year(configured, today.year() + 1) } else { this_year }
    } else {
        configured
    };

    Ok(((target - today).num_days(), target))
}

fn is_recurring(label: &str) -> bool {
    RECURRING_KEYWORDS.iter().any(|kw| label.contains(kw))
}

fn anchor_to_year(date: NaiveDate, year: i32) -> NaiveDate {
    // Feb 29 birthdays land on Feb 28 in common years.
    date.with_year(year).unwrap_or_else(|| {
        NaiveDate::from_ymd_opt(year, date.month(), date.day() - 1)
            .unwrap_or(date)
    })
}

/// Human-readable listing of every configured holiday with its countdown.
pub fn list_holidays(clock: &dyn Clock) -> String {
    let now = clock.now();
    let today = clock.today();

    let mut message = format!(
        "📅 已設定的重要節日 (台灣時間: {})：\n\n",
        now.format("%Y-%m-%d %H:%M")
    );
    for (label, date_str) in HOLIDAYS {
        match days_until(label, date_str, today) {
            Ok((days, target)) => {
                message.push_str(&format!(
                    "• {label}：{} (還有{days}天)\n",
                    target.format("%Y年%m月%d日")
                ));
            }
            Err(err) => {
                tracing::warn!(label, date = date_str, error = %err, "skipping malformed holiday date");
            }
        }
    }
    message
}
