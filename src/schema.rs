use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Named numeric fields of one statement record (e.g. `revenue`, `net_income`).
/// A field that is absent has no data for that period.
pub type FieldMap = BTreeMap<String, f64>;

/// Identifies a column of a tree or table: a period end date, a fiscal year, or
/// a named field (equity-change statements use one column per equity component).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKey {
    Date(NaiveDate),
    Year(i32),
    Field(String),
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnKey::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            ColumnKey::Year(year) => write!(f, "{}", year),
            ColumnKey::Field(name) => f.write_str(name),
        }
    }
}

impl From<NaiveDate> for ColumnKey {
    fn from(date: NaiveDate) -> Self {
        ColumnKey::Date(date)
    }
}

impl From<i32> for ColumnKey {
    fn from(year: i32) -> Self {
        ColumnKey::Year(year)
    }
}

impl From<&str> for ColumnKey {
    fn from(field: &str) -> Self {
        ColumnKey::Field(field.to_string())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum DocumentType {
    #[schemars(description = "Annual standardized financial statements (year-end filing)")]
    Annual,

    #[schemars(description = "Quarterly information filing (Q1 to Q3 of each year)")]
    Quarterly,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum StatementType {
    BalanceSheetAssets,
    BalanceSheetLiabilities,
    IncomeStatement,
    ComprehensiveIncome,
    CashFlow,
    EquityChanges,
    ValueAdded,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum BalanceType {
    #[schemars(description = "Group-wide figures, including subsidiaries")]
    Consolidated,

    #[schemars(description = "Figures of the filing entity alone")]
    Individual,
}

/// Inclusive range of reference dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// One account line of one statement period, as fetched from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub code: String,
    pub name: String,
    pub period_end_date: NaiveDate,
    pub quantity: f64,
}

/// One account with its quantities across every period it appears in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountRow {
    pub code: String,
    pub name: String,
    pub quantities: BTreeMap<ColumnKey, f64>,
}

impl AccountRow {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            quantities: BTreeMap::new(),
        }
    }

    pub fn with_quantity(mut self, key: impl Into<ColumnKey>, quantity: f64) -> Self {
        self.quantities.insert(key.into(), quantity);
        self
    }
}

/// A statement record keyed by its document reference date. Stores may hand
/// back rows whose reference date could not be read; those are skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementRow {
    pub reference_date: Option<NaiveDate>,
    pub fields: FieldMap,
}

impl StatementRow {
    pub fn new(reference_date: NaiveDate, fields: FieldMap) -> Self {
        Self {
            reference_date: Some(reference_date),
            fields,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorInput {
    pub reference_date: NaiveDate,
    pub balance_sheet: FieldMap,
    pub income_statement: FieldMap,
}

/// Builds a `FieldMap` from `(name, value)` pairs.
pub fn fields<'a>(pairs: impl IntoIterator<Item = (&'a str, f64)>) -> FieldMap {
    pairs
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}
