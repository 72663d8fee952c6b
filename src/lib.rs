//! # Comparative Statements
//!
//! A library for turning filed financial statements into comparative reports:
//! hierarchical account trees with one column per period, and period tables
//! with optional horizontal analysis.
//!
//! ## Core Concepts
//!
//! - **Account trees**: flat, dot-coded account lines ("1", "1.01", "1.01.02")
//!   are rebuilt into a parent/child tree, even when children arrive first
//! - **Period tables**: named rows, one column per reporting period, with
//!   growth-ratio columns between periods on request
//! - **Period selection**: annual, quarterly or single-quarter views, with the
//!   fourth quarter read from quarterly filings or derived from the annual one
//! - **Formatting**: balances rendered in units, thousands, millions or
//!   billions, picked per value or for a whole set
//!
//! ## Example
//!
//! ```rust
//! use comparative_statements::*;
//!
//! let tree = AccountTreeBuilder::build(vec![
//!     AccountRow::new("1.02", "Non-current").with_quantity(2020, 60.0),
//!     AccountRow::new("1", "Assets").with_quantity(2020, 100.0),
//!     AccountRow::new("1.01", "Current").with_quantity(2020, 40.0),
//! ]);
//!
//! let assets = tree.children(tree.root_id()).next().unwrap();
//! assert_eq!(assets.code(), "1");
//! assert_eq!(assets.child_count(), 2);
//! ```

pub mod account_tree;
pub mod aggregator;
pub mod balance_format;
pub mod config;
pub mod error;
pub mod indicators;
pub mod ingestion;
pub mod period_table;
pub mod pipeline;
pub mod reversible;
pub mod schema;
pub mod statement_period;
pub mod store;
pub mod utils;

pub use account_tree::{AccountNode, AccountTree, AccountTreeBuilder, NodeId};
pub use aggregator::{
    accumulate, subtract, AccumulationPolicy, AggregatorOptions, FourthQuarter,
    StatementAggregator,
};
pub use balance_format::{BalanceFormatPolicy, BalanceFormatter, NumberLocale};
pub use config::ReportConfig;
pub use error::{ReportError, Result};
pub use indicators::{
    FieldRef, IndicatorAggregator, IndicatorComputer, RatioDefinition, RatioIndicators,
    StatementSide,
};
pub use ingestion::group_account_records;
pub use period_table::{growth_ratio, Column, PeriodTable};
pub use pipeline::{ImportEvent, ImportStage, ImportSummary, RecordSink, StopHandle, StoreSink};
pub use reversible::{ReversibleView, TableSource};
pub use schema::*;
pub use statement_period::StatementPeriod;
pub use store::{
    EntityId, FiledAccount, FiledIndicatorInput, FiledRecord, FiledStatement, InMemoryStore,
    StatementStore,
};
pub use utils::*;

use chrono::NaiveDate;
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Selects the account lines of one statement across several filings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountQuery {
    pub entity_id: EntityId,
    pub reference_dates: Vec<NaiveDate>,
    pub document_type: DocumentType,
    pub statement_type: StatementType,
    pub balance_type: BalanceType,
}

/// Builds reports from a store under one [`ReportConfig`].
pub struct StatementReporter<S: StatementStore> {
    store: S,
    config: ReportConfig,
}

impl<S: StatementStore> StatementReporter<S> {
    pub fn new(store: S, config: ReportConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { store, config })
    }

    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Comparative account tree with one column per distinct period end date.
    pub fn account_tree(&self, query: &AccountQuery) -> Result<AccountTree> {
        let mut records = Vec::new();
        for reference_date in &query.reference_dates {
            let fetched = self.store.fetch_accounts(
                query.entity_id,
                *reference_date,
                query.document_type,
                query.statement_type,
                query.balance_type,
            )?;
            debug!(
                "Fetched {} account line(s) of {:?} filed {}",
                fetched.len(),
                query.statement_type,
                reference_date
            );
            records.extend(fetched);
        }

        let tree = AccountTreeBuilder::build(group_account_records(records));

        info!(
            "Built {:?} tree of entity {}: {} account(s) over {} period(s)",
            query.statement_type,
            query.entity_id,
            tree.len(),
            tree.column_count()
        );

        Ok(tree)
    }

    /// Statement table for `start_year..=end_year` at the configured period.
    /// `rows` maps field names to display labels, in display order.
    pub fn statement_table<K: Into<String>, L: Into<String>>(
        &self,
        entity_id: EntityId,
        start_year: i32,
        end_year: i32,
        rows: impl IntoIterator<Item = (K, L)>,
    ) -> Result<PeriodTable> {
        let mut table = PeriodTable::with_labels(rows);
        let aggregator = StatementAggregator::with_options(&self.store, self.config.aggregation);

        aggregator.select_into(&mut table, entity_id, start_year, end_year, self.config.period)?;
        table.set_horizontal_analysis_enabled(self.config.horizontal_analysis);

        Ok(table)
    }

    /// Indicator table with one row per configured ratio.
    pub fn indicator_table(&self, entity_id: EntityId) -> Result<PeriodTable> {
        let mut table = self.config.indicators.table()?;
        table.set_decimals(self.config.indicator_decimals);

        let aggregator = IndicatorAggregator::new(&self.store, self.config.indicators.clone())
            .with_fourth_quarter(self.config.aggregation.fourth_quarter);

        aggregator.select_into(&mut table, entity_id, self.config.period)?;
        table.set_horizontal_analysis_enabled(self.config.horizontal_analysis);

        Ok(table)
    }

    /// Formatter for `table`; set-based policies look at its period columns.
    pub fn table_formatter(&self, table: &PeriodTable) -> BalanceFormatter {
        self.config.formatter(table.real_values())
    }

    pub fn tree_formatter(&self, tree: &AccountTree) -> BalanceFormatter {
        self.config.formatter(tree.quantity_values())
    }

    /// `table` seen with the configured reversal.
    pub fn view<'t>(&self, table: &'t PeriodTable) -> ReversibleView<'t, PeriodTable> {
        let mut view = ReversibleView::new(table);
        view.set_reversed_horizontally(self.config.reverse_columns);
        view.set_reversed_vertically(self.config.reverse_rows);
        view
    }

    pub fn table_to_csv(&self, table: &PeriodTable) -> Result<String> {
        self.view(table)
            .to_csv(&self.table_formatter(table), self.config.precision)
    }

    pub fn table_to_markdown(&self, table: &PeriodTable) -> Result<String> {
        self.view(table)
            .to_markdown(&self.table_formatter(table), self.config.precision)
    }

    pub fn tree_to_markdown(&self, tree: &AccountTree) -> String {
        tree.to_markdown(&self.tree_formatter(tree), self.config.precision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn store() -> InMemoryStore {
        let mut store = InMemoryStore::new();
        let lines = [
            (2020, "1", "Total assets", 1_000_000.0),
            (2020, "1.01", "Current assets", 400_000.0),
            (2020, "1.02", "Non-current assets", 600_000.0),
            (2021, "1", "Total assets", 1_200_000.0),
            (2021, "1.02", "Non-current assets", 700_000.0),
            (2021, "1.01", "Current assets", 500_000.0),
        ];
        for (year, code, name, quantity) in lines {
            store.insert_account(
                9,
                date(year, 12, 31),
                DocumentType::Annual,
                StatementType::BalanceSheetAssets,
                BalanceType::Consolidated,
                AccountRecord {
                    code: code.to_string(),
                    name: name.to_string(),
                    period_end_date: date(year, 12, 31),
                    quantity,
                },
            );
        }
        for (year, revenue) in [(2020, 800_000.0), (2021, 1_000_000.0)] {
            store.insert_statement_row(
                9,
                DocumentType::Annual,
                StatementRow::new(date(year, 12, 31), fields([("revenue", revenue)])),
            );
        }
        store
    }

    fn query() -> AccountQuery {
        AccountQuery {
            entity_id: 9,
            reference_dates: vec![date(2020, 12, 31), date(2021, 12, 31)],
            document_type: DocumentType::Annual,
            statement_type: StatementType::BalanceSheetAssets,
            balance_type: BalanceType::Consolidated,
        }
    }

    #[test]
    fn test_account_tree_over_two_periods() {
        let store = store();
        let reporter = StatementReporter::new(&store, ReportConfig::default()).unwrap();
        let tree = reporter.account_tree(&query()).unwrap();

        assert_eq!(tree.len(), 3);
        assert_eq!(tree.column_count(), 2);

        let current = tree.find("1.01").unwrap();
        assert_eq!(current.quantities(), &[Some(400_000.0), Some(500_000.0)]);
        assert_eq!(tree.parent(tree.find_id("1.01").unwrap()).unwrap().code(), "1");
    }

    #[test]
    fn test_statement_table_with_horizontal_analysis() {
        let store = store();
        let config = ReportConfig {
            horizontal_analysis: true,
            balance_format: BalanceFormatPolicy::Thousand,
            precision: 0,
            ..ReportConfig::default()
        };
        let reporter = StatementReporter::new(&store, config).unwrap();
        let table = reporter
            .statement_table(9, 2020, 2021, [("revenue", "Revenue")])
            .unwrap();

        assert_eq!(table.column_count(), 3);
        assert_eq!(table.number(0, 1).unwrap(), Some(0.25));

        let markdown = reporter.table_to_markdown(&table).unwrap();
        assert!(markdown.contains("| Revenue | 800K | 25.00% | 1,000K |"));
    }

    #[test]
    fn test_reversed_csv() {
        let store = store();
        let config = ReportConfig {
            reverse_columns: true,
            balance_format: BalanceFormatPolicy::Greatest,
            precision: 1,
            ..ReportConfig::default()
        };
        let reporter = StatementReporter::new(&store, config).unwrap();
        let table = reporter
            .statement_table(9, 2020, 2021, [("revenue", "Revenue")])
            .unwrap();

        let csv = reporter.table_to_csv(&table).unwrap();
        assert_eq!(csv, "Row,2021,2020\nRevenue,\"1,000.0K\",800.0K\n");
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let store = store();
        let config = ReportConfig {
            precision: 99,
            ..ReportConfig::default()
        };
        assert!(matches!(
            StatementReporter::new(&store, config),
            Err(ReportError::InvalidPrecision(99))
        ));
    }
}
