//! Domain models for Penny

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Earliest year accepted for a summary period
pub const MIN_YEAR: i32 = 1900;

/// Latest year accepted for a summary period
pub const MAX_YEAR: i32 = 2200;

/// Largest accepted transaction magnitude, in whole currency units
pub const MAX_AMOUNT_UNITS: i64 = 1_000_000_000_000_000;

/// Reject amounts whose magnitude exceeds `MAX_AMOUNT_UNITS`
///
/// Keeps monthly sums far from the decimal range limit.
pub fn validate_amount(amount: Decimal) -> Result<Decimal> {
    if amount.abs() > Decimal::from(MAX_AMOUNT_UNITS) {
        return Err(Error::InvalidInput(format!(
            "amount must not exceed {} in magnitude",
            MAX_AMOUNT_UNITS
        )));
    }
    Ok(amount)
}

/// Direction of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Income,
    Expense,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

impl std::str::FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            _ => Err(format!("Unknown transaction type: {}", s)),
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A stored transaction (owned by the storage layer, read-only to the engine)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: i64,
    pub user_id: String,
    pub description: String,
    /// Always recorded as a magnitude; `kind` carries the direction
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub category: Option<String>,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// A transaction to be stored (before DB insertion)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTransaction {
    pub description: String,
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub category: Option<String>,
    pub date: NaiveDate,
}

/// Partial update for an existing transaction
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionUpdate {
    pub description: Option<String>,
    pub amount: Option<Decimal>,
    pub category: Option<String>,
    pub date: Option<NaiveDate>,
}

/// Fixed spending categories
///
/// `Other` is a legitimate answer and also the fallback for anything the
/// model returns that is not one of the names below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Food,
    Transportation,
    Housing,
    Entertainment,
    Healthcare,
    Education,
    Shopping,
    Utilities,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Food => "Food",
            Self::Transportation => "Transportation",
            Self::Housing => "Housing",
            Self::Entertainment => "Entertainment",
            Self::Healthcare => "Healthcare",
            Self::Education => "Education",
            Self::Shopping => "Shopping",
            Self::Utilities => "Utilities",
            Self::Other => "Other",
        }
    }

    /// All categories, in the order they are presented to the model
    pub fn all() -> &'static [Category] {
        &[
            Self::Food,
            Self::Transportation,
            Self::Housing,
            Self::Entertainment,
            Self::Healthcare,
            Self::Education,
            Self::Shopping,
            Self::Utilities,
            Self::Other,
        ]
    }

    /// Resolve a model completion to a category
    ///
    /// Matching ignores case and whitespace and accepts the category name
    /// anywhere in the text ("Category: food." resolves to `Food`).
    /// Anything unrecognised resolves to `Other`.
    pub fn from_completion(text: &str) -> Self {
        let normalized: String = text
            .chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect();

        Self::all()
            .iter()
            .copied()
            .find(|c| normalized.contains(&c.as_str().to_lowercase()))
            .unwrap_or(Self::Other)
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::all()
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("Unknown category: {}", s))
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A calendar month used to bound aggregation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Period {
    pub year: i32,
    pub month: u32,
    #[serde(skip)]
    first_day: NaiveDate,
    #[serde(skip)]
    last_day: NaiveDate,
}

impl Period {
    /// Validate and build a period
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(Error::InvalidInput(format!(
                "month must be between 1 and 12, got {}",
                month
            )));
        }
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err(Error::InvalidInput(format!(
                "year must be between {} and {}, got {}",
                MIN_YEAR, MAX_YEAR, year
            )));
        }

        let invalid = || Error::InvalidInput(format!("invalid period {}-{:02}", year, month));
        let first_day = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
        let next_month = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        }
        .ok_or_else(invalid)?;
        let last_day = next_month.pred_opt().ok_or_else(invalid)?;

        Ok(Self {
            year,
            month,
            first_day,
            last_day,
        })
    }

    /// The period containing `date`
    pub fn containing(date: NaiveDate) -> Result<Self> {
        Self::new(date.year(), date.month())
    }

    pub fn first_day(&self) -> NaiveDate {
        self.first_day
    }

    pub fn last_day(&self) -> NaiveDate {
        self.last_day
    }

    /// Inclusive on both ends
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.first_day && date <= self.last_day
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.month, self.year)
    }
}

/// Metrics for one user and one month
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyMetrics {
    pub period: Period,
    pub total_income: Decimal,
    pub total_expenses: Decimal,
    /// May be negative
    pub savings: Decimal,
    /// Keyed by category name, iterated in ascending name order
    pub expenses_by_category: BTreeMap<String, Decimal>,
}

impl MonthlyMetrics {
    /// All-zero metrics for a period
    pub fn empty(period: Period) -> Self {
        Self {
            period,
            total_income: Decimal::ZERO,
            total_expenses: Decimal::ZERO,
            savings: Decimal::ZERO,
            expenses_by_category: BTreeMap::new(),
        }
    }
}

/// A validated classification request
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationRequest {
    pub user_id: String,
    pub description: String,
    pub amount: Decimal,
}

impl ClassificationRequest {
    pub fn new(user_id: &str, description: &str, amount: Decimal) -> Result<Self> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(Error::InvalidInput("user id is required".into()));
        }
        let description = description.trim();
        if description.is_empty() {
            return Err(Error::InvalidInput("description must not be empty".into()));
        }

        let amount = validate_amount(amount)?;

        Ok(Self {
            user_id: user_id.to_string(),
            description: description.to_string(),
            amount,
        })
    }
}

/// Result of an AI-assisted operation
///
/// `Degraded` is still a successful response: the model was unavailable and
/// `fallback` holds the documented substitute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AssistOutcome<T> {
    Success(T),
    Degraded { fallback: T, cause: String },
}

impl<T> AssistOutcome<T> {
    pub fn value(&self) -> &T {
        match self {
            Self::Success(v) => v,
            Self::Degraded { fallback, .. } => fallback,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Self::Success(v) => v,
            Self::Degraded { fallback, .. } => fallback,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}
