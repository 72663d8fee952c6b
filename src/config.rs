use crate::aggregator::AggregatorOptions;
use crate::balance_format::{BalanceFormatPolicy, BalanceFormatter, NumberLocale, MAX_PRECISION};
use crate::error::{ReportError, Result};
use crate::indicators::RatioIndicators;
use crate::statement_period::StatementPeriod;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

fn default_precision() -> usize {
    2
}

/// Presentation and selection settings of a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReportConfig {
    #[serde(default)]
    #[schemars(description = "Magnitude policy applied to balances")]
    pub balance_format: BalanceFormatPolicy,

    #[serde(default = "default_precision")]
    #[schemars(description = "Decimals shown for balances (at most 15)")]
    pub precision: usize,

    #[serde(default)]
    pub locale: NumberLocale,

    #[serde(default)]
    #[schemars(description = "Insert period-over-period growth columns between periods")]
    pub horizontal_analysis: bool,

    #[serde(default)]
    #[schemars(description = "Show the latest period first")]
    pub reverse_columns: bool,

    #[serde(default)]
    pub reverse_rows: bool,

    #[serde(default)]
    pub period: StatementPeriod,

    #[serde(default)]
    pub aggregation: AggregatorOptions,

    #[serde(default)]
    pub indicators: RatioIndicators,

    #[serde(default = "default_precision")]
    #[schemars(description = "Decimals shown for indicator values, plain or percent (at most 15)")]
    pub indicator_decimals: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            balance_format: BalanceFormatPolicy::default(),
            precision: default_precision(),
            locale: NumberLocale::default(),
            horizontal_analysis: false,
            reverse_columns: false,
            reverse_rows: false,
            period: StatementPeriod::default(),
            aggregation: AggregatorOptions::default(),
            indicators: RatioIndicators::default(),
            indicator_decimals: default_precision(),
        }
    }
}

impl ReportConfig {
    /// Parses and validates a configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.precision > MAX_PRECISION {
            return Err(ReportError::InvalidPrecision(self.precision));
        }
        if self.indicator_decimals > MAX_PRECISION {
            return Err(ReportError::InvalidPrecision(self.indicator_decimals));
        }
        if self.locale.group_separator == Some(self.locale.decimal_separator) {
            return Err(ReportError::ValidationError {
                subject: "locale".to_string(),
                details: format!(
                    "Group and decimal separators are both '{}'",
                    self.locale.decimal_separator
                ),
            });
        }
        self.indicators.validate()
    }

    /// Formatter for this configuration; set-based policies use `balances`.
    pub fn formatter(&self, balances: impl IntoIterator<Item = f64>) -> BalanceFormatter {
        BalanceFormatter::from_policy(self.balance_format, balances).with_locale(self.locale.clone())
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ReportConfig)
    }

    pub fn schema_as_json() -> Result<String> {
        let schema = Self::generate_json_schema();
        Ok(serde_json::to_string_pretty(&schema)?)
    }
}
