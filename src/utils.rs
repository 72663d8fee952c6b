use crate::error::{ReportError, Result};
use chrono::{Datelike, NaiveDate};

pub fn ymd(year: i32, month: u32, day: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
        ReportError::InvalidDate(format!("{:04}-{:02}-{:02}", year, month, day))
    })
}

/// Calendar quarter (1..=4) the month belongs to.
pub fn quarter_of_month(month: u32) -> u32 {
    (month.saturating_sub(1)) / 3 + 1
}

pub fn quarter_of(date: NaiveDate) -> u32 {
    quarter_of_month(date.month())
}

pub fn validate_year_range(start_year: i32, end_year: i32) -> Result<()> {
    if start_year > end_year {
        return Err(ReportError::InvalidYearRange {
            start: start_year,
            end: end_year,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quarter_of_month() {
        assert_eq!(quarter_of_month(1), 1);
        assert_eq!(quarter_of_month(3), 1);
        assert_eq!(quarter_of_month(4), 2);
        assert_eq!(quarter_of_month(9), 3);
        assert_eq!(quarter_of_month(12), 4);
    }

    #[test]
    fn test_invalid_dates() {
        assert!(ymd(2023, 2, 30).is_err());
        assert!(matches!(ymd(2023, 13, 1), Err(ReportError::InvalidDate(text)) if text == "2023-13-01"));
        assert_eq!(ymd(2024, 2, 29).unwrap(), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    }

    #[test]
    fn test_year_range() {
        assert!(validate_year_range(2019, 2021).is_ok());
        assert!(validate_year_range(2020, 2020).is_ok());
        assert!(matches!(
            validate_year_range(2021, 2019),
            Err(ReportError::InvalidYearRange { start: 2021, end: 2019 })
        ));
    }
}
