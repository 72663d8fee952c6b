//! Reporting cadence selector and the fixed calendar span of each period.

use crate::error::Result;
use crate::schema::DateRange;
use crate::utils::{quarter_of, ymd};
use chrono::{Datelike, NaiveDate};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum StatementPeriod {
    #[default]
    Annual,
    Quarterly,
    Quarter1,
    Quarter2,
    Quarter3,
    Quarter4,
}

/// `(start_month, start_day, end_month, end_day)` within a single year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodSpan {
    pub start_month: u32,
    pub start_day: u32,
    pub end_month: u32,
    pub end_day: u32,
}

impl StatementPeriod {
    pub const QUARTERS: [StatementPeriod; 4] = [
        StatementPeriod::Quarter1,
        StatementPeriod::Quarter2,
        StatementPeriod::Quarter3,
        StatementPeriod::Quarter4,
    ];

    pub fn span(&self) -> PeriodSpan {
        let (start_month, start_day, end_month, end_day) = match self {
            StatementPeriod::Annual | StatementPeriod::Quarterly => (1, 1, 12, 31),
            StatementPeriod::Quarter1 => (1, 1, 3, 31),
            StatementPeriod::Quarter2 => (4, 1, 6, 30),
            StatementPeriod::Quarter3 => (7, 1, 9, 30),
            StatementPeriod::Quarter4 => (10, 1, 12, 31),
        };
        PeriodSpan {
            start_month,
            start_day,
            end_month,
            end_day,
        }
    }

    pub fn start_date(&self, year: i32) -> Result<NaiveDate> {
        let span = self.span();
        ymd(year, span.start_month, span.start_day)
    }

    pub fn end_date(&self, year: i32) -> Result<NaiveDate> {
        let span = self.span();
        ymd(year, span.end_month, span.end_day)
    }

    /// Date range from the period start in `start_year` to its end in `end_year`.
    pub fn date_range(&self, start_year: i32, end_year: i32) -> Result<DateRange> {
        Ok(DateRange::new(
            self.start_date(start_year)?,
            self.end_date(end_year)?,
        ))
    }

    /// Inclusive membership of `date` in this period's span for the date's own year.
    pub fn contains(&self, date: NaiveDate) -> bool {
        let span = self.span();
        let start = (span.start_month, span.start_day);
        let end = (span.end_month, span.end_day);
        let current = (date.month(), date.day());
        current >= start && current <= end
    }

    /// Column header for a reference date: the year for annual tables,
    /// `"{quarter}T{year}"` otherwise.
    pub fn column_label(&self, reference_date: NaiveDate) -> String {
        match self {
            StatementPeriod::Annual => reference_date.year().to_string(),
            _ => format!("{}T{}", quarter_of(reference_date), reference_date.year()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_quarter_spans() {
        assert_eq!(StatementPeriod::Quarter1.start_date(2020).unwrap(), date(2020, 1, 1));
        assert_eq!(StatementPeriod::Quarter1.end_date(2020).unwrap(), date(2020, 3, 31));
        assert_eq!(StatementPeriod::Quarter2.end_date(2020).unwrap(), date(2020, 6, 30));
        assert_eq!(StatementPeriod::Quarter3.start_date(2020).unwrap(), date(2020, 7, 1));
        assert_eq!(StatementPeriod::Quarter4.start_date(2020).unwrap(), date(2020, 10, 1));
        assert_eq!(StatementPeriod::Annual.end_date(2021).unwrap(), date(2021, 12, 31));
    }

    #[test]
    fn test_contains_is_inclusive() {
        assert!(StatementPeriod::Quarter1.contains(date(2019, 1, 1)));
        assert!(StatementPeriod::Quarter1.contains(date(2019, 3, 31)));
        assert!(!StatementPeriod::Quarter1.contains(date(2019, 4, 1)));
        assert!(StatementPeriod::Quarter2.contains(date(2022, 6, 30)));
        assert!(StatementPeriod::Quarter4.contains(date(2022, 12, 31)));
        assert!(StatementPeriod::Annual.contains(date(2022, 7, 14)));
    }

    #[test]
    fn test_date_range_spans_years() {
        let range = StatementPeriod::Annual.date_range(2018, 2020).unwrap();
        assert_eq!(range.start, date(2018, 1, 1));
        assert_eq!(range.end, date(2020, 12, 31));
    }

    #[test]
    fn test_column_labels() {
        assert_eq!(StatementPeriod::Annual.column_label(date(2020, 12, 31)), "2020");
        assert_eq!(StatementPeriod::Quarterly.column_label(date(2020, 6, 30)), "2T2020");
        assert_eq!(StatementPeriod::Quarter3.column_label(date(2021, 9, 30)), "3T2021");
        assert_eq!(StatementPeriod::Quarter4.column_label(date(2021, 12, 31)), "4T2021");
    }
}
