//! Time-windowed projections over the entry store.

pub mod aggregate;
pub mod handlers;
pub mod timeline;

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl ViewMode {
    pub fn parse(raw: &str) -> AppResult<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(ViewMode::Daily),
            "weekly" => Ok(ViewMode::Weekly),
            "monthly" => Ok(ViewMode::Monthly),
            "yearly" => Ok(ViewMode::Yearly),
            other => Err(AppError::validation(format!(
                "view must be daily, weekly, monthly or yearly, got {other}"
            ))),
        }
    }
}

/// Inclusive date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    /// The window of `mode` containing `anchor`. Weeks start on Monday.
    ///
    /// `None` when the window would run past the calendar's representable range.
    pub fn containing(mode: ViewMode, anchor: NaiveDate) -> Option<Self> {
        let (start, end) = match mode {
            ViewMode::Daily => (anchor, anchor),
            ViewMode::Weekly => {
                let back = Days::new(u64::from(anchor.weekday().num_days_from_monday()));
                let start = anchor.checked_sub_days(back)?;
                (start, start.checked_add_days(Days::new(6))?)
            }
            ViewMode::Monthly => (
                anchor.with_day(1)?,
                last_day_of_month(anchor.year(), anchor.month())?,
            ),
            ViewMode::Yearly => (
                NaiveDate::from_ymd_opt(anchor.year(), 1, 1)?,
                NaiveDate::from_ymd_opt(anchor.year(), 12, 31)?,
            ),
        };
        Some(DateWindow { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 {
        (year.checked_add(1)?, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1).and_then(|d| d.pred_opt())
}

/// `YYYY-MM`, the key entries are grouped under.
pub fn month_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}
