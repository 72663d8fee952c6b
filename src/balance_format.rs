//! Human-readable rendering of balances under a magnitude policy.
//!
//! A [`BalanceFormatter`] either uses a fixed magnitude (units, thousands,
//! millions, billions) for every value, or picks one per value ("dynamic").
//! Fixed magnitudes can also be derived from a reference set of values:
//!
//! ```rust
//! use comparative_statements::BalanceFormatter;
//!
//! let fmt = BalanceFormatter::greatest([1.0, 2000.0]);
//! assert_eq!(fmt.format(1.0, 0), "0K");
//! assert_eq!(fmt.format(2000.0, 0), "2K");
//! ```

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A value is scaled down one magnitude while its absolute value stays strictly
/// above this threshold, so exactly 1000 is rendered in units.
pub const SCALE_THRESHOLD: f64 = 1000.0;

/// Returned by [`BalanceFormatter::format`] when the magnitude has no suffix.
pub const FORMAT_ERROR_TEXT: &str = "Error";

pub const MAX_PRECISION: usize = 15;

const DEFAULT_SUFFIXES: [&str; 4] = ["", "K", "M", "B"];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum BalanceFormatPolicy {
    #[schemars(description = "Pick the magnitude of every value on its own")]
    Dynamic,

    #[default]
    Unit,

    Thousand,

    Million,

    Billion,

    #[schemars(description = "Magnitude of the smallest nonzero value of the displayed set")]
    Smallest,

    #[schemars(description = "Magnitude of the greatest nonzero value of the displayed set")]
    Greatest,

    #[schemars(description = "Magnitude of the average of the nonzero values of the displayed set")]
    Best,
}

/// Separators used when rendering numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NumberLocale {
    pub group_separator: Option<char>,
    pub decimal_separator: char,
}

impl Default for NumberLocale {
    fn default() -> Self {
        Self::english()
    }
}

impl NumberLocale {
    pub fn english() -> Self {
        Self {
            group_separator: Some(','),
            decimal_separator: '.',
        }
    }

    pub fn brazilian() -> Self {
        Self {
            group_separator: Some('.'),
            decimal_separator: ',',
        }
    }

    /// Renders `value` with exactly `precision` decimals and grouped integer digits.
    pub fn format_number(&self, value: f64, precision: usize) -> String {
        let precision = precision.min(MAX_PRECISION);
        let rendered = format!("{:.*}", precision, value.abs());

        let (integer, fraction) = match rendered.split_once('.') {
            Some((integer, fraction)) => (integer, Some(fraction)),
            None => (rendered.as_str(), None),
        };

        let mut output = String::with_capacity(rendered.len() + integer.len() / 3 + 1);

        let is_zero = rendered.chars().all(|c| c == '0' || c == '.');
        if value.is_sign_negative() && !is_zero && !value.is_nan() {
            output.push('-');
        }

        output.push_str(&group_digits(integer, self.group_separator));

        if let Some(fraction) = fraction {
            output.push(self.decimal_separator);
            output.push_str(fraction);
        }

        output
    }
}

fn group_digits(digits: &str, separator: Option<char>) -> String {
    let Some(separator) = separator else {
        return digits.to_string();
    };
    if digits.len() <= 3 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return digits.to_string();
    }

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    let offset = digits.len() % 3;

    for (i, c) in digits.chars().enumerate() {
        if i != 0 && (i + 3 - offset) % 3 == 0 {
            grouped.push(separator);
        }
        grouped.push(c);
    }

    grouped
}

#[derive(Debug, Clone, PartialEq)]
pub struct BalanceFormatter {
    thousands: Option<u32>,
    suffixes: Vec<String>,
    locale: NumberLocale,
}

impl Default for BalanceFormatter {
    fn default() -> Self {
        Self::dynamic()
    }
}

impl BalanceFormatter {
    /// Counts how many times `balance` can be divided by 1000 while staying
    /// above [`SCALE_THRESHOLD`].
    pub fn thousands(balance: f64) -> u32 {
        let mut n = balance.abs();
        if !n.is_finite() {
            return 0;
        }

        let mut thousands = 0;
        while n > SCALE_THRESHOLD {
            n /= 1000.0;
            thousands += 1;
        }
        thousands
    }

    pub fn new(thousands: Option<u32>) -> Self {
        Self {
            thousands,
            suffixes: DEFAULT_SUFFIXES.iter().map(|s| s.to_string()).collect(),
            locale: NumberLocale::default(),
        }
    }

    pub fn dynamic() -> Self {
        Self::new(None)
    }

    pub fn fixed(thousands: u32) -> Self {
        Self::new(Some(thousands))
    }

    pub fn smallest(balances: impl IntoIterator<Item = f64>) -> Self {
        let smallest = nonzero(balances).reduce(f64::min).unwrap_or(0.0);
        Self::fixed(Self::thousands(smallest))
    }

    pub fn greatest(balances: impl IntoIterator<Item = f64>) -> Self {
        let greatest = nonzero(balances).reduce(f64::max).unwrap_or(0.0);
        Self::fixed(Self::thousands(greatest))
    }

    pub fn best(balances: impl IntoIterator<Item = f64>) -> Self {
        let (sum, count) = nonzero(balances).fold((0.0, 0usize), |(sum, count), b| (sum + b, count + 1));
        let average = if count == 0 { 0.0 } else { sum / count as f64 };
        Self::fixed(Self::thousands(average))
    }

    /// Formatter for `policy`; set-based policies derive their magnitude from `balances`.
    pub fn from_policy(policy: BalanceFormatPolicy, balances: impl IntoIterator<Item = f64>) -> Self {
        match policy {
            BalanceFormatPolicy::Dynamic => Self::dynamic(),
            BalanceFormatPolicy::Unit => Self::fixed(0),
            BalanceFormatPolicy::Thousand => Self::fixed(1),
            BalanceFormatPolicy::Million => Self::fixed(2),
            BalanceFormatPolicy::Billion => Self::fixed(3),
            BalanceFormatPolicy::Smallest => Self::smallest(balances),
            BalanceFormatPolicy::Greatest => Self::greatest(balances),
            BalanceFormatPolicy::Best => Self::best(balances),
        }
    }

    pub fn with_locale(mut self, locale: NumberLocale) -> Self {
        self.locale = locale;
        self
    }

    pub fn set_locale(&mut self, locale: NumberLocale) {
        self.locale = locale;
    }

    pub fn locale(&self) -> &NumberLocale {
        &self.locale
    }

    /// The fixed magnitude, or `None` for dynamic formatting.
    pub fn scale(&self) -> Option<u32> {
        self.thousands
    }

    /// Replaces the suffix of an existing magnitude. Returns `false` if the
    /// magnitude has no slot in the suffix table.
    pub fn set_suffix(&mut self, thousands: u32, suffix: impl Into<String>) -> bool {
        match self.suffixes.get_mut(thousands as usize) {
            Some(slot) => {
                *slot = suffix.into();
                true
            }
            None => false,
        }
    }

    pub fn suffix(&self, thousands: u32) -> Option<&str> {
        self.suffixes.get(thousands as usize).map(String::as_str)
    }

    pub fn format(&self, balance: f64, precision: usize) -> String {
        let thousands = self.thousands.unwrap_or_else(|| Self::thousands(balance));

        let Some(suffix) = self.suffix(thousands) else {
            return FORMAT_ERROR_TEXT.to_string();
        };

        let scaled = balance / 1000f64.powi(thousands as i32);
        let mut text = self.locale.format_number(scaled, precision);
        text.push_str(suffix);
        text
    }
}

fn nonzero(balances: impl IntoIterator<Item = f64>) -> impl Iterator<Item = f64> {
    balances.into_iter().filter(|b| *b != 0.0 && !b.is_nan())
}
