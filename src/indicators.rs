//! Ratio indicators computed from a balance sheet and an income statement.
//!
//! Indicators have no built-in accounting meaning here: each one is a ratio of
//! sums of named fields, defined in configuration. A ratio over
//! `current_assets / current_liabilities` is written as
//!
//! ```json
//! {
//!   "name": "current_liquidity",
//!   "label": "Current liquidity",
//!   "numerator": [{"statement": "BalanceSheet", "field": "current_assets"}],
//!   "denominator": [{"statement": "BalanceSheet", "field": "current_liabilities"}]
//! }
//! ```

use crate::aggregator::{accumulate, subtract, FourthQuarter};
use crate::error::{ReportError, Result};
use crate::period_table::PeriodTable;
use crate::schema::{DocumentType, FieldMap, IndicatorInput};
use crate::statement_period::StatementPeriod;
use crate::store::{EntityId, StatementStore};
use chrono::{Datelike, NaiveDate};
use log::{debug, info};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Turns one filing's statements into named indicator values.
pub trait IndicatorComputer {
    /// Indicator names in display order.
    fn indicator_names(&self) -> Vec<String>;

    /// Computes every indicator it can; indicators whose inputs are missing or
    /// whose denominator is zero are left out.
    fn compute(&self, balance_sheet: &FieldMap, income_statement: &FieldMap) -> FieldMap;
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub enum StatementSide {
    BalanceSheet,
    IncomeStatement,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct FieldRef {
    pub statement: StatementSide,
    pub field: String,
}

impl FieldRef {
    pub fn balance_sheet(field: impl Into<String>) -> Self {
        Self {
            statement: StatementSide::BalanceSheet,
            field: field.into(),
        }
    }

    pub fn income_statement(field: impl Into<String>) -> Self {
        Self {
            statement: StatementSide::IncomeStatement,
            field: field.into(),
        }
    }

    fn value(&self, balance_sheet: &FieldMap, income_statement: &FieldMap) -> Option<f64> {
        let source = match self.statement {
            StatementSide::BalanceSheet => balance_sheet,
            StatementSide::IncomeStatement => income_statement,
        };
        source.get(&self.field).copied()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct RatioDefinition {
    pub name: String,

    /// Display label; the name is shown when absent.
    #[serde(default)]
    pub label: Option<String>,

    pub numerator: Vec<FieldRef>,

    /// An empty denominator makes the indicator the plain numerator sum.
    #[serde(default)]
    pub denominator: Vec<FieldRef>,

    /// Rendered as a percentage in indicator tables.
    #[serde(default)]
    pub percent: bool,
}

impl RatioDefinition {
    pub fn new(name: impl Into<String>, numerator: Vec<FieldRef>, denominator: Vec<FieldRef>) -> Self {
        Self {
            name: name.into(),
            label: None,
            numerator,
            denominator,
            percent: false,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn as_percent(mut self) -> Self {
        self.percent = true;
        self
    }

    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    pub fn evaluate(&self, balance_sheet: &FieldMap, income_statement: &FieldMap) -> Option<f64> {
        let sum = |operands: &[FieldRef]| -> Option<f64> {
            operands
                .iter()
                .map(|operand| operand.value(balance_sheet, income_statement))
                .sum()
        };

        let numerator = sum(&self.numerator)?;
        if self.denominator.is_empty() {
            return Some(numerator);
        }

        let denominator = sum(&self.denominator)?;
        if denominator == 0.0 {
            return None;
        }
        Some(numerator / denominator)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ReportError::ValidationError {
                subject: "indicator".to_string(),
                details: "Indicator name must not be empty".to_string(),
            });
        }
        if self.numerator.is_empty() {
            return Err(ReportError::ValidationError {
                subject: self.name.clone(),
                details: "Numerator must reference at least one field".to_string(),
            });
        }
        if let Some(operand) = self
            .numerator
            .iter()
            .chain(&self.denominator)
            .find(|operand| operand.field.trim().is_empty())
        {
            return Err(ReportError::ValidationError {
                subject: self.name.clone(),
                details: format!("Empty field name in {:?} operand", operand.statement),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct RatioIndicators {
    pub definitions: Vec<RatioDefinition>,
}

impl RatioIndicators {
    pub fn new(definitions: Vec<RatioDefinition>) -> Self {
        Self { definitions }
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::BTreeSet::new();
        for definition in &self.definitions {
            definition.validate()?;
            if !seen.insert(definition.name.as_str()) {
                return Err(ReportError::ValidationError {
                    subject: definition.name.clone(),
                    details: "Indicator defined more than once".to_string(),
                });
            }
        }
        Ok(())
    }

    /// An empty plain-number table with one labelled row per indicator and
    /// percent rows marked.
    pub fn table(&self) -> Result<PeriodTable> {
        let mut table = PeriodTable::with_labels(
            self.definitions
                .iter()
                .map(|definition| (definition.name.clone(), definition.label().to_string())),
        );
        table.set_plain_numbers(true);
        for (row, definition) in self.definitions.iter().enumerate() {
            table.set_percent_row(row, definition.percent)?;
        }
        Ok(table)
    }
}

impl IndicatorComputer for RatioIndicators {
    fn indicator_names(&self) -> Vec<String> {
        self.definitions.iter().map(|d| d.name.clone()).collect()
    }

    fn compute(&self, balance_sheet: &FieldMap, income_statement: &FieldMap) -> FieldMap {
        self.definitions
            .iter()
            .filter_map(|definition| {
                definition
                    .evaluate(balance_sheet, income_statement)
                    .map(|value| (definition.name.clone(), value))
            })
            .collect()
    }
}

/// Indicator selection by period. Annual indicators come from annual filings
/// and quarters from quarterly filings. With
/// [`FourthQuarter::DerivedFromAnnual`] the fourth quarter's income statement
/// is the annual one minus the accumulated quarters, while the balance sheet is
/// taken from the annual filing as is.
pub struct IndicatorAggregator<S: StatementStore, C: IndicatorComputer> {
    store: S,
    computer: C,
    fourth_quarter: FourthQuarter,
}

impl<S: StatementStore, C: IndicatorComputer> IndicatorAggregator<S, C> {
    pub fn new(store: S, computer: C) -> Self {
        Self {
            store,
            computer,
            fourth_quarter: FourthQuarter::default(),
        }
    }

    pub fn with_fourth_quarter(mut self, fourth_quarter: FourthQuarter) -> Self {
        self.fourth_quarter = fourth_quarter;
        self
    }

    pub fn computer(&self) -> &C {
        &self.computer
    }

    pub fn select(&self, entity_id: EntityId, period: StatementPeriod) -> Result<Vec<(NaiveDate, FieldMap)>> {
        let derive_fourth_quarter = self.fourth_quarter == FourthQuarter::DerivedFromAnnual;

        let selected = match period {
            StatementPeriod::Annual => self
                .store
                .fetch_indicator_inputs(entity_id, DocumentType::Annual)?
                .iter()
                .map(|input| self.indicators(input))
                .collect(),
            StatementPeriod::Quarterly | StatementPeriod::Quarter4 if derive_fourth_quarter => {
                self.select_derived(entity_id, period)?
            }
            quarter => self
                .store
                .fetch_indicator_inputs(entity_id, DocumentType::Quarterly)?
                .iter()
                .filter(|input| quarter.contains(input.reference_date))
                .map(|input| self.indicators(input))
                .collect(),
        };

        info!(
            "Computed {:?} indicators of entity {} for {} period(s)",
            period,
            entity_id,
            selected.len()
        );
        Ok(selected)
    }

    /// Clears `table` and fills it with [`select`](Self::select) rows.
    pub fn select_into(
        &self,
        table: &mut PeriodTable,
        entity_id: EntityId,
        period: StatementPeriod,
    ) -> Result<usize> {
        table.clear();
        let rows = self.select(entity_id, period)?;
        let count = rows.len();

        table.append_rows(rows);
        table.set_period(period);
        Ok(count)
    }

    fn indicators(&self, input: &IndicatorInput) -> (NaiveDate, FieldMap) {
        (
            input.reference_date,
            self.computer
                .compute(&input.balance_sheet, &input.income_statement),
        )
    }

    fn select_derived(&self, entity_id: EntityId, period: StatementPeriod) -> Result<Vec<(NaiveDate, FieldMap)>> {
        let mut quarterly_by_year: BTreeMap<i32, Vec<IndicatorInput>> = BTreeMap::new();
        for input in self
            .store
            .fetch_indicator_inputs(entity_id, DocumentType::Quarterly)?
        {
            quarterly_by_year
                .entry(input.reference_date.year())
                .or_default()
                .push(input);
        }

        let annual_by_year: BTreeMap<i32, IndicatorInput> = self
            .store
            .fetch_indicator_inputs(entity_id, DocumentType::Annual)?
            .into_iter()
            .map(|input| (input.reference_date.year(), input))
            .collect();

        let mut selected = Vec::new();

        for (year, inputs) in &quarterly_by_year {
            let mut accumulated: Option<FieldMap> = None;

            for input in inputs {
                accumulated = Some(match accumulated {
                    Some(sum) => accumulate(&sum, &input.income_statement),
                    None => input.income_statement.clone(),
                });
                if period == StatementPeriod::Quarterly {
                    selected.push(self.indicators(input));
                }
            }

            let (Some(accumulated), Some(annual)) = (accumulated, annual_by_year.get(year)) else {
                debug!("No annual filing to derive the fourth quarter of {}", year);
                continue;
            };

            let income_statement = subtract(&annual.income_statement, &accumulated);
            selected.push((
                annual.reference_date,
                self.computer.compute(&annual.balance_sheet, &income_statement),
            ));
        }

        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::fields;
    use crate::store::InMemoryStore;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn ratios() -> RatioIndicators {
        RatioIndicators::new(vec![
            RatioDefinition::new(
                "net_margin",
                vec![FieldRef::income_statement("net_income")],
                vec![FieldRef::income_statement("revenue")],
            )
            .with_label("Net margin")
            .as_percent(),
            RatioDefinition::new(
                "current_liquidity",
                vec![FieldRef::balance_sheet("current_assets")],
                vec![FieldRef::balance_sheet("current_liabilities")],
            ),
        ])
    }

    fn input(y: i32, m: u32, d: u32, revenue: f64, net_income: f64) -> IndicatorInput {
        IndicatorInput {
            reference_date: date(y, m, d),
            balance_sheet: fields([("current_assets", 300.0), ("current_liabilities", 150.0)]),
            income_statement: fields([("revenue", revenue), ("net_income", net_income)]),
        }
    }

    fn store() -> InMemoryStore {
        let mut store = InMemoryStore::new();
        store.insert_indicator_input(1, DocumentType::Annual, input(2020, 12, 31, 1000.0, 100.0));
        store.insert_indicator_input(1, DocumentType::Quarterly, input(2020, 3, 31, 200.0, 20.0));
        store.insert_indicator_input(1, DocumentType::Quarterly, input(2020, 6, 30, 200.0, 30.0));
        store.insert_indicator_input(1, DocumentType::Quarterly, input(2020, 9, 30, 200.0, 10.0));
        store
    }

    #[test]
    fn test_ratio_evaluation() {
        let indicators = ratios().compute(
            &fields([("current_assets", 300.0), ("current_liabilities", 150.0)]),
            &fields([("revenue", 0.0), ("net_income", 5.0)]),
        );
        assert_eq!(indicators.get("current_liquidity"), Some(&2.0));
        assert_eq!(indicators.get("net_margin"), None);
    }

    #[test]
    fn test_missing_field_leaves_indicator_out() {
        let indicators = ratios().compute(&FieldMap::new(), &fields([("revenue", 10.0), ("net_income", 1.0)]));
        assert_eq!(indicators.len(), 1);
        assert_eq!(indicators.get("net_margin"), Some(&0.1));
    }

    #[test]
    fn test_plain_sum_indicator() {
        let definition = RatioDefinition::new(
            "ebit_plus_da",
            vec![FieldRef::income_statement("ebit"), FieldRef::income_statement("da")],
            vec![],
        );
        let value = definition.evaluate(&FieldMap::new(), &fields([("ebit", 10.0), ("da", 2.5)]));
        assert_eq!(value, Some(12.5));
    }

    #[test]
    fn test_validation() {
        assert!(ratios().validate().is_ok());

        let empty = RatioDefinition::new("x", vec![], vec![]);
        assert!(matches!(empty.validate(), Err(ReportError::ValidationError { .. })));

        let duplicated = RatioIndicators::new(vec![
            RatioDefinition::new("x", vec![FieldRef::balance_sheet("a")], vec![]),
            RatioDefinition::new("x", vec![FieldRef::balance_sheet("b")], vec![]),
        ]);
        assert!(duplicated.validate().is_err());
    }

    #[test]
    fn test_table_layout() {
        let table = ratios().table().unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.row_label(0).unwrap(), "Net margin");
        assert_eq!(table.row_label(1).unwrap(), "current_liquidity");
        assert!(table.is_percent_row(0));
        assert!(!table.is_percent_row(1));
    }

    #[test]
    fn test_annual_and_single_quarter() {
        let store = store();
        let aggregator = IndicatorAggregator::new(&store, ratios());

        let annual = aggregator.select(1, StatementPeriod::Annual).unwrap();
        assert_eq!(annual.len(), 1);
        assert_eq!(annual[0].1["net_margin"], 0.1);

        let second = aggregator.select(1, StatementPeriod::Quarter2).unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].0, date(2020, 6, 30));
        assert_eq!(second[0].1["net_margin"], 0.15);
    }

    #[test]
    fn test_derived_fourth_quarter_indicators() {
        let store = store();
        let aggregator = IndicatorAggregator::new(&store, ratios())
            .with_fourth_quarter(FourthQuarter::DerivedFromAnnual);

        let quarterly = aggregator.select(1, StatementPeriod::Quarterly).unwrap();
        assert_eq!(quarterly.len(), 4);

        let (reference_date, fourth) = &quarterly[3];
        assert_eq!(*reference_date, date(2020, 12, 31));
        // (100 - 60) / (1000 - 600)
        assert_eq!(fourth["net_margin"], 0.1);
        assert_eq!(fourth["current_liquidity"], 2.0);

        let only_fourth = aggregator.select(1, StatementPeriod::Quarter4).unwrap();
        assert_eq!(only_fourth, vec![quarterly[3].clone()]);
    }

    #[test]
    fn test_default_reads_filed_fourth_quarter_indicators() {
        let mut store = store();
        let aggregator = IndicatorAggregator::new(&store, ratios());
        assert_eq!(aggregator.select(1, StatementPeriod::Quarterly).unwrap().len(), 3);
        assert!(aggregator.select(1, StatementPeriod::Quarter4).unwrap().is_empty());

        store.insert_indicator_input(1, DocumentType::Quarterly, input(2020, 12, 31, 400.0, 60.0));
        let aggregator = IndicatorAggregator::new(&store, ratios());
        let fourth = aggregator.select(1, StatementPeriod::Quarter4).unwrap();
        assert_eq!(fourth.len(), 1);
        assert_eq!(fourth[0].0, date(2020, 12, 31));
        assert_eq!(fourth[0].1["net_margin"], 0.15);
    }

    #[test]
    fn test_select_into_percent_text() {
        let store = store();
        let indicators = ratios();
        let mut table = indicators.table().unwrap();
        let aggregator = IndicatorAggregator::new(&store, indicators);

        aggregator
            .select_into(&mut table, 1, StatementPeriod::Annual)
            .unwrap();

        let formatter = crate::balance_format::BalanceFormatter::fixed(0);
        assert_eq!(table.column_name(0).unwrap(), "2020");
        assert_eq!(
            table.number_text(0, 0, &formatter, 2).unwrap().as_deref(),
            Some("10.00%")
        );
        assert_eq!(
            table.number_text(1, 0, &formatter, 2).unwrap().as_deref(),
            Some("2.00")
        );
    }

    #[test]
    fn test_definitions_from_json() {
        let json = r#"{
            "definitions": [{
                "name": "current_liquidity",
                "label": "Current liquidity",
                "numerator": [{"statement": "BalanceSheet", "field": "current_assets"}],
                "denominator": [{"statement": "BalanceSheet", "field": "current_liabilities"}]
            }]
        }"#;
        let indicators: RatioIndicators = serde_json::from_str(json).unwrap();
        assert_eq!(indicators.indicator_names(), vec!["current_liquidity".to_string()]);
        assert!(!indicators.definitions[0].percent);
    }
}
