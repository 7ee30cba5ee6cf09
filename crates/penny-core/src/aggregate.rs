//! Monthly aggregation of transactions
//!
//! Pure computation: no I/O, never fails. The caller filters by user; the
//! aggregator only filters by date. Sums saturate at the decimal range
//! limit instead of overflowing; stored amounts are capped well below it.

use rust_decimal::Decimal;

use crate::models::{MonthlyMetrics, Period, TransactionRecord, TransactionType};

/// Category name used for expenses with no category
pub const UNCATEGORIZED: &str = "Other";

/// Computes per-month metrics from transaction records
#[derive(Debug, Clone, Copy, Default)]
pub struct Aggregator;

impl Aggregator {
    pub fn new() -> Self {
        Self
    }

    /// Aggregate the records that fall inside `period` (inclusive bounds)
    pub fn aggregate(&self, transactions: &[TransactionRecord], period: Period) -> MonthlyMetrics {
        let mut metrics = MonthlyMetrics::empty(period);

        for tx in transactions.iter().filter(|t| period.contains(t.date)) {
            let amount = tx.amount.abs();
            match tx.kind {
                TransactionType::Income => {
                    metrics.total_income = metrics.total_income.saturating_add(amount);
                }
                TransactionType::Expense => {
                    metrics.total_expenses = metrics.total_expenses.saturating_add(amount);
                    let category = tx
                        .category
                        .as_deref()
                        .map(str::trim)
                        .filter(|c| !c.is_empty())
                        .unwrap_or(UNCATEGORIZED);
                    let subtotal = metrics
                        .expenses_by_category
                        .entry(category.to_string())
                        .or_insert(Decimal::ZERO);
                    *subtotal = subtotal.saturating_add(amount);
                }
            }
        }

        metrics.savings = metrics.total_income.saturating_sub(metrics.total_expenses);
        metrics
    }
}
