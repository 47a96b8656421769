//! Target period of an import run

use chrono::{Datelike, Months, NaiveDate};
use std::fmt;

/// The publication date an archive is requested for.
///
/// Computed as the last day of the month lying `months_back` months before
/// the month of `today`, e.g. `2026-10-17` with two months back is
/// `2026-08-31`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TargetPeriod(NaiveDate);

impl TargetPeriod {
    pub fn for_date(today: NaiveDate, months_back: u32) -> Self {
        let first_of_month = today.with_day(1).unwrap_or(today);
        // Step back one month fewer than asked, then one day back from the
        // first of that month lands on the last day of the target month.
        let anchor = first_of_month
            .checked_sub_months(Months::new(months_back.saturating_sub(1)))
            .unwrap_or(first_of_month);
        let date = if months_back == 0 {
            last_day_of_month(first_of_month)
        } else {
            anchor.pred_opt().unwrap_or(anchor)
        };
        Self(date)
    }

    /// Period for the current local date
    pub fn current(months_back: u32) -> Self {
        Self::for_date(chrono::Local::now().date_naive(), months_back)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// `YYYYMMDD` form used in archive names and run log names
    pub fn as_compact(&self) -> String {
        self.0.format("%Y%m%d").to_string()
    }
}

fn last_day_of_month(first: NaiveDate) -> NaiveDate {
    first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(first)
}

impl fmt::Display for TargetPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_compact())
    }
}
