//! Period selection over filed statements.
//!
//! Annual filings cover the whole year and quarterly filings cover single
//! quarters. By default every quarter, the fourth included, is read from
//! quarterly filings. Sources without a fourth-quarter filing can opt into
//! deriving it from the annual filing, optionally minus the accumulated quarters
//! for flow statements whose annual figure is a year-to-date total.

use crate::error::Result;
use crate::period_table::PeriodTable;
use crate::schema::{DateRange, DocumentType, FieldMap, StatementRow};
use crate::statement_period::StatementPeriod;
use crate::store::{EntityId, StatementStore};
use crate::utils::validate_year_range;
use chrono::NaiveDate;
use log::{debug, info, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Where fourth-quarter rows come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum FourthQuarter {
    /// Quarterly filings dated in the fourth quarter.
    #[default]
    Filed,

    /// The annual filing of the same year.
    DerivedFromAnnual,
}

/// How quarters one to three are combined with the annual filing when the
/// fourth quarter is derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum AccumulationPolicy {
    /// Use the annual figures as they are. Suits point-in-time statements.
    #[default]
    Disabled,

    /// Subtract the accumulated quarters; skip years without quarterly data.
    Required,

    /// Subtract the accumulated quarters when there are any, else use the
    /// annual figures as they are.
    BestEffort,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AggregatorOptions {
    #[serde(default)]
    pub fourth_quarter: FourthQuarter,
    #[serde(default)]
    pub accumulation: AccumulationPolicy,
}

/// Field-wise sum. A field present on one side only keeps its value.
pub fn accumulate(lhs: &FieldMap, rhs: &FieldMap) -> FieldMap {
    let mut sum = lhs.clone();
    for (name, value) in rhs {
        *sum.entry(name.clone()).or_insert(0.0) += value;
    }
    sum
}

/// Field-wise difference over the fields of `minuend`; fields absent from
/// `subtrahend` are left unchanged.
pub fn subtract(minuend: &FieldMap, subtrahend: &FieldMap) -> FieldMap {
    minuend
        .iter()
        .map(|(name, value)| {
            let other = subtrahend.get(name).copied().unwrap_or(0.0);
            (name.clone(), value - other)
        })
        .collect()
}

pub struct StatementAggregator<S: StatementStore> {
    store: S,
    options: AggregatorOptions,
}

impl<S: StatementStore> StatementAggregator<S> {
    pub fn new(store: S) -> Self {
        Self::with_options(store, AggregatorOptions::default())
    }

    pub fn with_options(store: S, options: AggregatorOptions) -> Self {
        Self { store, options }
    }

    pub fn options(&self) -> &AggregatorOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: AggregatorOptions) {
        self.options = options;
    }

    /// Statement records of `entity_id` for `start_year..=end_year` at the
    /// requested cadence, in chronological order.
    pub fn select(
        &self,
        entity_id: EntityId,
        start_year: i32,
        end_year: i32,
        period: StatementPeriod,
    ) -> Result<Vec<(NaiveDate, FieldMap)>> {
        validate_year_range(start_year, end_year)?;

        let derive_fourth_quarter = self.options.fourth_quarter == FourthQuarter::DerivedFromAnnual;
        let mut selected = Vec::new();

        match period {
            StatementPeriod::Annual => {
                selected = self.annual(entity_id, start_year, end_year)?;
            }
            StatementPeriod::Quarterly | StatementPeriod::Quarter4 if derive_fourth_quarter => {
                for year in start_year..=end_year {
                    self.select_derived_year(entity_id, year, period, &mut selected)?;
                }
            }
            StatementPeriod::Quarterly => {
                for year in start_year..=end_year {
                    for quarter in StatementPeriod::QUARTERS {
                        selected.extend(self.filed_quarter(entity_id, year, quarter)?);
                    }
                }
            }
            quarter => {
                for year in start_year..=end_year {
                    selected.extend(self.filed_quarter(entity_id, year, quarter)?);
                }
            }
        }

        info!(
            "Selected {} {:?} statement row(s) of entity {} for {}..={}",
            selected.len(),
            period,
            entity_id,
            start_year,
            end_year
        );

        Ok(selected)
    }

    /// Clears `table`, then fills it with [`select`](Self::select) rows. Returns
    /// the number of columns appended.
    pub fn select_into(
        &self,
        table: &mut PeriodTable,
        entity_id: EntityId,
        start_year: i32,
        end_year: i32,
        period: StatementPeriod,
    ) -> Result<usize> {
        table.clear();
        let rows = self.select(entity_id, start_year, end_year, period)?;
        let count = rows.len();

        table.append_rows(rows);
        table.set_period(period);
        Ok(count)
    }

    fn select_derived_year(
        &self,
        entity_id: EntityId,
        year: i32,
        period: StatementPeriod,
        selected: &mut Vec<(NaiveDate, FieldMap)>,
    ) -> Result<()> {
        let accumulation = self.options.accumulation;
        let range = DateRange::new(
            StatementPeriod::Quarter1.start_date(year)?,
            StatementPeriod::Quarter3.end_date(year)?,
        );

        let mut accumulated: Option<FieldMap> = None;
        for (reference_date, fields) in self.quarterly(entity_id, range)? {
            if accumulation != AccumulationPolicy::Disabled {
                accumulated = Some(match accumulated {
                    Some(sum) => accumulate(&sum, &fields),
                    None => fields.clone(),
                });
            }
            if period == StatementPeriod::Quarterly {
                selected.push((reference_date, fields));
            }
        }

        let Some((reference_date, fields)) = self.annual(entity_id, year, year)?.into_iter().next()
        else {
            debug!("Entity {} has no annual filing for {}", entity_id, year);
            return Ok(());
        };

        match accumulated {
            Some(sum) => selected.push((reference_date, subtract(&fields, &sum))),
            None if accumulation == AccumulationPolicy::Required => {
                debug!(
                    "Skipping fourth quarter of {} for entity {}: no quarterly filings to subtract",
                    year, entity_id
                );
            }
            None => selected.push((reference_date, fields)),
        }

        Ok(())
    }

    fn annual(
        &self,
        entity_id: EntityId,
        start_year: i32,
        end_year: i32,
    ) -> Result<Vec<(NaiveDate, FieldMap)>> {
        let range = StatementPeriod::Annual.date_range(start_year, end_year)?;
        let rows = self
            .store
            .fetch_statement_rows(entity_id, range, DocumentType::Annual)?;
        Ok(dated_rows(rows))
    }

    fn filed_quarter(
        &self,
        entity_id: EntityId,
        year: i32,
        quarter: StatementPeriod,
    ) -> Result<Vec<(NaiveDate, FieldMap)>> {
        let range = DateRange::new(quarter.start_date(year)?, quarter.end_date(year)?);
        self.quarterly(entity_id, range)
    }

    fn quarterly(&self, entity_id: EntityId, range: DateRange) -> Result<Vec<(NaiveDate, FieldMap)>> {
        let rows = self
            .store
            .fetch_statement_rows(entity_id, range, DocumentType::Quarterly)?;
        Ok(dated_rows(rows))
    }
}

fn dated_rows(rows: Vec<StatementRow>) -> Vec<(NaiveDate, FieldMap)> {
    rows.into_iter()
        .filter_map(|row| match row.reference_date {
            Some(reference_date) => Some((reference_date, row.fields)),
            None => {
                warn!(
                    "Skipping statement row without a reference date ({} field(s))",
                    row.fields.len()
                );
                None
            }
        })
        .collect()
}
