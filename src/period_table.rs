//! Row-named, column-keyed numeric tables for time-series statements.
//!
//! Rows are fixed when the table is created; columns are appended one period at
//! a time from a field mapping, so the order of keys in the mapping does not
//! matter:
//!
//! ```rust
//! use comparative_statements::{fields, PeriodTable};
//!
//! let mut table = PeriodTable::new(["a", "b", "c"]);
//! table.append(2010, &fields([("c", 30.0), ("b", 20.0), ("a", 10.0)]));
//! table.append(2011, &fields([("b", 50.0), ("a", 40.0), ("c", 60.0)]));
//!
//! table.set_horizontal_analysis_enabled(true);
//! assert_eq!(table.number_by_name("a", 1).unwrap(), Some(3.0));
//! assert_eq!(table.number_by_name("a", 2).unwrap(), Some(40.0));
//! ```
//!
//! With horizontal analysis (HA) enabled, a growth-ratio column sits between
//! every two adjacent period columns. Growth is always read left to right;
//! use [`ReversibleView`](crate::ReversibleView) to present the latest period
//! first.

use crate::balance_format::BalanceFormatter;
use crate::error::{ReportError, Result};
use crate::reversible::{ReversibleView, TableSource};
use crate::schema::{ColumnKey, FieldMap};
use crate::statement_period::StatementPeriod;
use chrono::NaiveDate;
use log::debug;
use serde::Serialize;
use std::collections::BTreeSet;

pub const HORIZONTAL_ANALYSIS_HEADER: &str = "HA %";

const UNNAMED_COLUMN_HEADER: &str = "?";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    key: Option<ColumnKey>,
    values: Vec<Option<f64>>,
}

impl Column {
    pub fn key(&self) -> Option<&ColumnKey> {
        self.key.as_ref()
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }
}

/// Period-over-period growth: `(next - prev) / prev`, zero when `prev` is zero.
pub fn growth_ratio(previous: Option<f64>, next: Option<f64>) -> Option<f64> {
    match (previous, next) {
        (Some(previous), Some(next)) => {
            if previous == 0.0 {
                Some(0.0)
            } else {
                Some((next - previous) / previous)
            }
        }
        _ => None,
    }
}

fn horizontal_analysis(previous: &Column, next: &Column) -> Column {
    Column {
        key: None,
        values: previous
            .values
            .iter()
            .zip(&next.values)
            .map(|(p, n)| growth_ratio(*p, *n))
            .collect(),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PeriodTable {
    row_names: Vec<String>,
    row_labels: Vec<String>,
    real_columns: Vec<Column>,
    columns: Vec<Column>,
    ha_enabled: bool,
    period: Option<StatementPeriod>,
    percent_rows: BTreeSet<usize>,
    plain_numbers: bool,
    decimals: usize,
}

impl PeriodTable {
    pub fn new<S: Into<String>>(row_names: impl IntoIterator<Item = S>) -> Self {
        let row_names: Vec<String> = row_names.into_iter().map(Into::into).collect();
        let row_labels = row_names.clone();

        Self {
            row_names,
            row_labels,
            real_columns: Vec::new(),
            columns: Vec::new(),
            ha_enabled: false,
            period: None,
            percent_rows: BTreeSet::new(),
            plain_numbers: false,
            decimals: 2,
        }
    }

    /// Creates a table whose rows are keyed by the first element of each pair
    /// and displayed with the second.
    pub fn with_labels<K: Into<String>, L: Into<String>>(
        mapped_row_names: impl IntoIterator<Item = (K, L)>,
    ) -> Self {
        let (names, labels): (Vec<String>, Vec<String>) = mapped_row_names
            .into_iter()
            .map(|(name, label)| (name.into(), label.into()))
            .unzip();

        let mut table = Self::new(names);
        table.row_labels = labels;
        table
    }

    pub fn row_count(&self) -> usize {
        self.row_names.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_names(&self) -> &[String] {
        &self.row_names
    }

    pub fn row_name(&self, row: usize) -> Result<&str> {
        self.check_row(row)?;
        Ok(&self.row_names[row])
    }

    pub fn row_from_name(&self, name: &str) -> Option<usize> {
        self.row_names.iter().position(|candidate| candidate == name)
    }

    pub fn row_label(&self, row: usize) -> Result<&str> {
        self.check_row(row)?;
        Ok(&self.row_labels[row])
    }

    pub fn set_row_label(&mut self, row: usize, label: impl Into<String>) -> Result<()> {
        self.check_row(row)?;
        self.row_labels[row] = label.into();
        Ok(())
    }

    /// Visible columns, including HA columns when enabled.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Period columns only, in append order.
    pub fn real_columns(&self) -> &[Column] {
        &self.real_columns
    }

    pub fn column_key(&self, column: usize) -> Result<Option<&ColumnKey>> {
        self.check_column(column)?;
        Ok(self.columns[column].key())
    }

    pub fn column_from_key(&self, key: &ColumnKey) -> Option<usize> {
        self.columns
            .iter()
            .position(|column| column.key.as_ref() == Some(key))
    }

    /// Names columns by reporting period (`"2020"`, `"2T2020"`) instead of raw keys.
    pub fn set_period(&mut self, period: StatementPeriod) {
        self.period = Some(period);
    }

    pub fn period(&self) -> Option<StatementPeriod> {
        self.period
    }

    pub fn column_name(&self, column: usize) -> Result<String> {
        self.check_column(column)?;

        if self.is_horizontal_analysis_column(column) {
            return Ok(HORIZONTAL_ANALYSIS_HEADER.to_string());
        }

        let name = match (&self.columns[column].key, self.period) {
            (Some(ColumnKey::Date(date)), Some(period)) => period.column_label(*date),
            (Some(key), _) => key.to_string(),
            (None, _) => UNNAMED_COLUMN_HEADER.to_string(),
        };
        Ok(name)
    }

    pub fn clear(&mut self) {
        self.real_columns.clear();
        self.columns.clear();
    }

    /// Appends a period column; each row takes the field of the same name, or
    /// `None` when `fields` lacks it.
    pub fn append(&mut self, key: impl Into<ColumnKey>, fields: &FieldMap) {
        self.push_column(key.into(), fields);
    }

    pub fn append_rows(&mut self, rows: impl IntoIterator<Item = (NaiveDate, FieldMap)>) {
        for (reference_date, fields) in rows {
            self.append(reference_date, &fields);
        }
    }

    fn push_column(&mut self, key: ColumnKey, fields: &FieldMap) {
        let column = Column {
            key: Some(key),
            values: self
                .row_names
                .iter()
                .map(|name| fields.get(name).copied())
                .collect(),
        };

        let unknown = fields
            .keys()
            .filter(|name| self.row_from_name(name).is_none())
            .count();
        if unknown > 0 {
            debug!("Ignored {} field(s) without a matching row", unknown);
        }

        if self.ha_enabled {
            if let Some(previous) = self.real_columns.last() {
                let ha = horizontal_analysis(previous, &column);
                self.columns.push(ha);
            }
        }

        self.columns.push(column.clone());
        self.real_columns.push(column);
    }

    pub fn set_horizontal_analysis_enabled(&mut self, enabled: bool) {
        if self.ha_enabled == enabled {
            return;
        }
        self.ha_enabled = enabled;

        let mut columns = Vec::with_capacity(if enabled {
            (self.real_columns.len() * 2).saturating_sub(1)
        } else {
            self.real_columns.len()
        });

        for (index, column) in self.real_columns.iter().enumerate() {
            if enabled && index > 0 {
                columns.push(horizontal_analysis(&self.real_columns[index - 1], column));
            }
            columns.push(column.clone());
        }

        self.columns = columns;
    }

    pub fn is_horizontal_analysis_enabled(&self) -> bool {
        self.ha_enabled
    }

    pub fn is_horizontal_analysis_column(&self, column: usize) -> bool {
        self.ha_enabled && column % 2 != 0
    }

    pub fn number(&self, row: usize, column: usize) -> Result<Option<f64>> {
        self.check_row(row)?;
        self.check_column(column)?;
        Ok(self.columns[column].values[row])
    }

    /// Like [`number`](Self::number), but an unknown row name yields `None`.
    pub fn number_by_name(&self, name: &str, column: usize) -> Result<Option<f64>> {
        self.check_column(column)?;
        match self.row_from_name(name) {
            Some(row) => Ok(self.columns[column].values[row]),
            None => {
                debug!("Unknown row name '{}'", name);
                Ok(None)
            }
        }
    }

    /// Every value of the period columns, for set-based format policies.
    pub fn real_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.real_columns
            .iter()
            .flat_map(|column| column.values.iter().flatten().copied())
    }

    pub fn set_percent_row(&mut self, row: usize, percent: bool) -> Result<()> {
        self.check_row(row)?;
        if percent {
            self.percent_rows.insert(row);
        } else {
            self.percent_rows.remove(&row);
        }
        Ok(())
    }

    pub fn is_percent_row(&self, row: usize) -> bool {
        self.percent_rows.contains(&row)
    }

    /// Renders non-percent period cells as plain numbers with
    /// [`decimals`](Self::decimals) places instead of scaled balances.
    pub fn set_plain_numbers(&mut self, plain: bool) {
        self.plain_numbers = plain;
    }

    pub fn has_plain_numbers(&self) -> bool {
        self.plain_numbers
    }

    pub fn set_decimals(&mut self, decimals: usize) {
        self.decimals = decimals;
    }

    pub fn decimals(&self) -> usize {
        self.decimals
    }

    /// Display text of a cell. HA cells and percent rows render as percentages;
    /// other cells go through `formatter` unless the table shows plain numbers.
    pub fn number_text(
        &self,
        row: usize,
        column: usize,
        formatter: &BalanceFormatter,
        precision: usize,
    ) -> Result<Option<String>> {
        let Some(number) = self.number(row, column)? else {
            return Ok(None);
        };

        let text = if self.is_horizontal_analysis_column(column) {
            format!("{:.2}%", number * 100.0)
        } else if self.is_percent_row(row) {
            format!("{:.*}%", self.decimals, number * 100.0)
        } else if self.plain_numbers {
            format!("{:.*}", self.decimals, number)
        } else {
            formatter.format(number, precision)
        };

        Ok(Some(text))
    }

    pub fn to_csv(&self, formatter: &BalanceFormatter, precision: usize) -> Result<String> {
        render_csv(self, |row, column| {
            self.number_text(row, column, formatter, precision)
        })
    }

    pub fn to_markdown(&self, formatter: &BalanceFormatter, precision: usize) -> Result<String> {
        render_markdown(self, |row, column| {
            self.number_text(row, column, formatter, precision)
        })
    }

    fn check_row(&self, row: usize) -> Result<()> {
        if row >= self.row_count() {
            return Err(ReportError::RowOutOfRange {
                row,
                count: self.row_count(),
            });
        }
        Ok(())
    }

    fn check_column(&self, column: usize) -> Result<()> {
        if column >= self.column_count() {
            return Err(ReportError::ColumnOutOfRange {
                column,
                count: self.column_count(),
            });
        }
        Ok(())
    }
}

impl TableSource for PeriodTable {
    fn row_count(&self) -> usize {
        PeriodTable::row_count(self)
    }

    fn column_count(&self) -> usize {
        PeriodTable::column_count(self)
    }

    fn number(&self, row: usize, column: usize) -> Result<Option<f64>> {
        PeriodTable::number(self, row, column)
    }

    fn row_label(&self, row: usize) -> Result<String> {
        PeriodTable::row_label(self, row).map(str::to_string)
    }

    fn column_name(&self, column: usize) -> Result<String> {
        PeriodTable::column_name(self, column)
    }
}

impl ReversibleView<'_, PeriodTable> {
    /// [`PeriodTable::number_text`] at view coordinates.
    pub fn number_text(
        &self,
        row: usize,
        column: usize,
        formatter: &BalanceFormatter,
        precision: usize,
    ) -> Result<Option<String>> {
        self.source().number_text(
            self.source_row(row)?,
            self.source_column(column)?,
            formatter,
            precision,
        )
    }

    pub fn to_csv(&self, formatter: &BalanceFormatter, precision: usize) -> Result<String> {
        render_csv(self, |row, column| {
            self.number_text(row, column, formatter, precision)
        })
    }

    pub fn to_markdown(&self, formatter: &BalanceFormatter, precision: usize) -> Result<String> {
        render_markdown(self, |row, column| {
            self.number_text(row, column, formatter, precision)
        })
    }
}

fn render_csv<T: TableSource + ?Sized>(
    table: &T,
    text: impl Fn(usize, usize) -> Result<Option<String>>,
) -> Result<String> {
    let mut output = String::new();

    output.push_str("Row");
    for column in 0..table.column_count() {
        output.push(',');
        output.push_str(&csv_field(&table.column_name(column)?));
    }
    output.push('\n');

    for row in 0..table.row_count() {
        output.push_str(&csv_field(&table.row_label(row)?));
        for column in 0..table.column_count() {
            output.push(',');
            output.push_str(&csv_field(&text(row, column)?.unwrap_or_default()));
        }
        output.push('\n');
    }

    Ok(output)
}

fn render_markdown<T: TableSource + ?Sized>(
    table: &T,
    text: impl Fn(usize, usize) -> Result<Option<String>>,
) -> Result<String> {
    let mut output = String::from("| |");
    for column in 0..table.column_count() {
        output.push_str(&format!(" {} |", table.column_name(column)?));
    }
    output.push_str("\n|---|");
    for _ in 0..table.column_count() {
        output.push_str("---:|");
    }
    output.push('\n');

    for row in 0..table.row_count() {
        output.push_str(&format!("| {} |", table.row_label(row)?));
        for column in 0..table.column_count() {
            output.push_str(&format!(" {} |", text(row, column)?.unwrap_or_default()));
        }
        output.push('\n');
    }

    Ok(output)
}

fn csv_field(text: &str) -> String {
    if text.contains([',', '"', '\n']) {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::fields;

    fn sample() -> PeriodTable {
        let mut table = PeriodTable::new(["a", "b", "c"]);
        table.append(2010, &fields([("c", 30.0), ("b", 20.0), ("a", 10.0)]));
        table.append(2011, &fields([("b", 50.0), ("a", 40.0), ("c", 60.0)]));
        table
    }

    #[test]
    fn test_rows() {
        let table = PeriodTable::new(["a", "b", "c"]);
        assert_eq!(table.row_count(), 3);
        assert_eq!(table.row_name(0).unwrap(), "a");
        assert_eq!(table.row_label(2).unwrap(), "c");
        assert_eq!(table.row_from_name("b"), Some(1));
        assert_eq!(table.row_from_name("z"), None);
        assert!(table.row_name(3).is_err());
    }

    #[test]
    fn test_columns() {
        let table = sample();
        assert_eq!(table.column_count(), 2);
        assert_eq!(table.column_name(0).unwrap(), "2010");
        assert_eq!(table.column_key(1).unwrap(), Some(&ColumnKey::Year(2011)));
        assert_eq!(table.column_from_key(&ColumnKey::Year(2011)), Some(1));
        assert_eq!(table.column_from_key(&ColumnKey::Year(2012)), None);
    }

    #[test]
    fn test_number() {
        let table = sample();
        assert_eq!(table.number_by_name("a", 0).unwrap(), Some(10.0));
        assert_eq!(table.number_by_name("b", 0).unwrap(), Some(20.0));
        assert_eq!(table.number_by_name("c", 1).unwrap(), Some(60.0));
        assert_eq!(table.number(1, 1).unwrap(), Some(50.0));
    }

    #[test]
    fn test_missing_fields_are_none() {
        let mut table = PeriodTable::new(["a", "b"]);
        table.append(2010, &fields([("a", 1.0), ("unrelated", 9.0)]));
        assert_eq!(table.number(0, 0).unwrap(), Some(1.0));
        assert_eq!(table.number(1, 0).unwrap(), None);
        assert_eq!(table.columns()[0].values().len(), 2);
    }

    #[test]
    fn test_out_of_range_is_an_error() {
        let table = sample();
        assert!(matches!(
            table.number(0, 2),
            Err(ReportError::ColumnOutOfRange { column: 2, count: 2 })
        ));
        assert!(matches!(
            table.number(3, 0),
            Err(ReportError::RowOutOfRange { row: 3, count: 3 })
        ));
        assert!(table.number_by_name("a", 5).is_err());
        assert_eq!(table.number_by_name("zzz", 0).unwrap(), None);
    }

    #[test]
    fn test_horizontal_analysis_enabled_before_append() {
        let mut table = PeriodTable::new(["a", "b", "c"]);
        table.set_horizontal_analysis_enabled(true);
        table.append(2010, &fields([("c", 30.0), ("b", 20.0), ("a", 10.0)]));
        table.append(2011, &fields([("b", 50.0), ("a", 40.0), ("c", 60.0)]));

        assert_eq!(table.column_count(), 3);
        assert_eq!(table.number_by_name("a", 0).unwrap(), Some(10.0));
        assert_eq!(table.number_by_name("a", 1).unwrap(), Some(3.0));
        assert_eq!(table.number_by_name("a", 2).unwrap(), Some(40.0));
        assert_eq!(table.number_by_name("b", 1).unwrap(), Some(1.5));
        assert_eq!(table.number_by_name("c", 1).unwrap(), Some(1.0));

        let flags: Vec<bool> = (0..3).map(|c| table.is_horizontal_analysis_column(c)).collect();
        assert_eq!(flags, vec![false, true, false]);
        assert_eq!(table.column_name(1).unwrap(), HORIZONTAL_ANALYSIS_HEADER);
        assert_eq!(table.column_key(1).unwrap(), None);
    }

    #[test]
    fn test_horizontal_analysis_toggle_round_trip() {
        let mut table = sample();
        table.append(2012, &fields([("a", 20.0)]));
        let before = table.columns().to_vec();

        table.set_horizontal_analysis_enabled(true);
        assert_eq!(table.column_count(), 5);
        table.set_horizontal_analysis_enabled(true);
        assert_eq!(table.column_count(), 5);

        assert_eq!(table.number_by_name("a", 3).unwrap(), Some(-0.5));
        assert_eq!(table.number_by_name("b", 3).unwrap(), None);

        table.set_horizontal_analysis_enabled(false);
        assert_eq!(table.columns(), before.as_slice());
        assert_eq!(table.row_names(), &["a", "b", "c"]);
    }

    #[test]
    fn test_growth_ratio() {
        assert_eq!(growth_ratio(Some(10.0), Some(40.0)), Some(3.0));
        assert_eq!(growth_ratio(Some(0.0), Some(40.0)), Some(0.0));
        assert_eq!(growth_ratio(None, Some(40.0)), None);
        assert_eq!(growth_ratio(Some(10.0), None), None);
    }

    #[test]
    fn test_single_column_has_no_ha() {
        let mut table = PeriodTable::new(["a"]);
        table.append(2010, &fields([("a", 1.0)]));
        table.set_horizontal_analysis_enabled(true);
        assert_eq!(table.column_count(), 1);
        assert!(!table.is_horizontal_analysis_column(0));
    }

    #[test]
    fn test_mapped_labels() {
        let mut table = PeriodTable::with_labels([("i", "Int"), ("b", "Bool"), ("f", "Float")]);
        table.append(2010, &fields([("i", 10.0), ("b", 1.0), ("f", 3.14)]));

        assert_eq!(table.row_label(0).unwrap(), "Int");
        assert_eq!(table.row_label(1).unwrap(), "Bool");
        assert_eq!(table.row_label(2).unwrap(), "Float");
        assert_eq!(table.row_name(2).unwrap(), "f");
        assert_eq!(table.column_name(0).unwrap(), "2010");

        table.set_row_label(0, "Integer").unwrap();
        assert_eq!(table.row_label(0).unwrap(), "Integer");
        assert!(table.set_row_label(9, "x").is_err());
    }

    #[test]
    fn test_number_text() {
        let mut table = sample();
        table.set_horizontal_analysis_enabled(true);
        let fmt = BalanceFormatter::fixed(0);

        let a = table.row_from_name("a").unwrap();
        let b = table.row_from_name("b").unwrap();
        assert_eq!(table.number_text(a, 1, &fmt, 0).unwrap().as_deref(), Some("300.00%"));
        assert_eq!(table.number_text(b, 1, &fmt, 0).unwrap().as_deref(), Some("150.00%"));
        assert_eq!(table.number_text(a, 2, &fmt, 1).unwrap().as_deref(), Some("40.0"));

        table.set_percent_row(b, true).unwrap();
        table.set_decimals(1);
        assert_eq!(table.number_text(b, 0, &fmt, 0).unwrap().as_deref(), Some("2000.0%"));
        assert!(table.is_percent_row(b));
        table.set_percent_row(b, false).unwrap();
        assert!(!table.is_percent_row(b));
    }

    #[test]
    fn test_plain_numbers_ignore_formatter() {
        let mut table = PeriodTable::new(["liquidity", "margin"]);
        table.set_percent_row(1, true).unwrap();
        table.append(2020, &fields([("liquidity", 1.5), ("margin", 0.125)]));
        let fmt = BalanceFormatter::fixed(1);

        assert_eq!(table.number_text(0, 0, &fmt, 2).unwrap().as_deref(), Some("0.00K"));

        table.set_plain_numbers(true);
        assert!(table.has_plain_numbers());
        assert_eq!(table.number_text(0, 0, &fmt, 2).unwrap().as_deref(), Some("1.50"));
        assert_eq!(table.number_text(1, 0, &fmt, 2).unwrap().as_deref(), Some("12.50%"));

        table.set_decimals(3);
        assert_eq!(table.number_text(0, 0, &fmt, 0).unwrap().as_deref(), Some("1.500"));
        assert!(table.to_markdown(&fmt, 0).unwrap().contains("| liquidity | 1.500 |"));
    }

    #[test]
    fn test_period_column_names() {
        let mut table = PeriodTable::new(["a"]);
        let date = NaiveDate::from_ymd_opt(2020, 9, 30).unwrap();
        table.append(date, &fields([("a", 1.0)]));

        assert_eq!(table.column_name(0).unwrap(), "2020-09-30");
        table.set_period(StatementPeriod::Quarterly);
        assert_eq!(table.column_name(0).unwrap(), "3T2020");
        table.set_period(StatementPeriod::Annual);
        assert_eq!(table.column_name(0).unwrap(), "2020");
    }

    #[test]
    fn test_clear_keeps_rows() {
        let mut table = sample();
        table.clear();
        assert_eq!(table.column_count(), 0);
        assert_eq!(table.row_count(), 3);
    }

    #[test]
    fn test_exports() {
        let mut table = PeriodTable::with_labels([("revenue", "Revenue, net")]);
        table.append(2020, &fields([("revenue", 1_500_000.0)]));
        table.append(2021, &fields([("revenue", 3_000_000.0)]));
        table.set_horizontal_analysis_enabled(true);

        let fmt = BalanceFormatter::fixed(1);
        let csv = table.to_csv(&fmt, 0).unwrap();
        assert!(csv.starts_with("Row,2020,HA %,2021\n"));
        assert!(csv.contains("\"Revenue, net\",\"1,500K\",100.00%,\"3,000K\""));

        let markdown = table.to_markdown(&fmt, 0).unwrap();
        assert!(markdown.contains("| Revenue, net | 1,500K | 100.00% | 3,000K |"));

        let mut view = ReversibleView::new(&table);
        view.set_reversed_horizontally(true);
        assert!(view.to_csv(&fmt, 0).unwrap().starts_with("Row,2021,HA %,2020\n"));
        assert_eq!(view.number_text(0, 0, &fmt, 0).unwrap().as_deref(), Some("3,000K"));
    }
}
