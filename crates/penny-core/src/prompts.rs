//! Prompt templates for the assist engine
//!
//! Templates are embedded in the binary and use `{{name}}` placeholders.
//! Rendering is a single pass over the template, so values containing
//! placeholder syntax are inserted literally and never re-expanded.
//! Identical inputs always produce identical prompts.

use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::models::{Category, MonthlyMetrics, Period};

/// Embedded prompt templates
mod templates {
    pub const CLASSIFY_TRANSACTION: &str = "\
Classify the following financial transaction into one of these categories:
{{categories}}.

Description: {{description}}
Amount: ${{amount}}

Respond with ONLY the category name, nothing else.";

    pub const SUMMARIZE_MONTH: &str = "\
Analyze the following monthly financial data and provide a concise summary \
with insights and recommendations:

Month: {{month}}/{{year}}
Total Income: ${{total_income}}
Total Expenses: ${{total_expenses}}
Savings: ${{savings}}

Expenses by category:
{{category_lines}}

Please provide:
1. A brief summary of spending patterns
2. Areas where spending seems high
3. 2-3 practical suggestions to improve savings
4. Overall financial health assessment

Keep it concise and actionable.";
}

/// Known prompt IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptId {
    ClassifyTransaction,
    SummarizeMonth,
}

impl PromptId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClassifyTransaction => "classify_transaction",
            Self::SummarizeMonth => "summarize_month",
        }
    }

    pub fn template(&self) -> &'static str {
        match self {
            Self::ClassifyTransaction => templates::CLASSIFY_TRANSACTION,
            Self::SummarizeMonth => templates::SUMMARIZE_MONTH,
        }
    }
}

/// Renders prompts from structured inputs
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Prompt asking for exactly one category name
    pub fn build_classification_prompt(&self, description: &str, amount: Decimal) -> String {
        let categories = Category::all()
            .iter()
            .map(Category::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        let amount = format_money(amount);

        let mut vars = HashMap::new();
        vars.insert("categories", categories.as_str());
        vars.insert("description", description);
        vars.insert("amount", amount.as_str());
        render(PromptId::ClassifyTransaction.template(), &vars)
    }

    /// Prompt asking for a narrative summary of one month
    pub fn build_summary_prompt(&self, period: Period, metrics: &MonthlyMetrics) -> String {
        // BTreeMap iteration is already sorted by category name
        let category_lines = if metrics.expenses_by_category.is_empty() {
            "- none".to_string()
        } else {
            metrics
                .expenses_by_category
                .iter()
                .map(|(category, amount)| format!("- {}: ${}", category, format_money(*amount)))
                .collect::<Vec<_>>()
                .join("\n")
        };

        let year = period.year.to_string();
        let month = period.month.to_string();
        let total_income = format_money(metrics.total_income);
        let total_expenses = format_money(metrics.total_expenses);
        let savings = format_money(metrics.savings);

        let mut vars = HashMap::new();
        vars.insert("year", year.as_str());
        vars.insert("month", month.as_str());
        vars.insert("total_income", total_income.as_str());
        vars.insert("total_expenses", total_expenses.as_str());
        vars.insert("savings", savings.as_str());
        vars.insert("category_lines", category_lines.as_str());
        render(PromptId::SummarizeMonth.template(), &vars)
    }
}

/// Two decimal places, no thousands separators
pub fn format_money(amount: Decimal) -> String {
    format!("{:.2}", amount)
}

/// Substitute `{{name}}` placeholders in one pass
///
/// Unknown placeholders are left in place.
pub fn render(template: &str, vars: &HashMap<&str, &str>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let name = after[..end].trim();
                match vars.get(name) {
                    Some(value) => out.push_str(value),
                    None => out.push_str(&rest[start..start + 2 + end + 2]),
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MonthlyMetrics;
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;

    fn sample_metrics() -> MonthlyMetrics {
        let mut by_category = BTreeMap::new();
        by_category.insert("Shopping".to_string(), dec!(20));
        by_category.insert("Food".to_string(), dec!(40));
        by_category.insert("Other".to_string(), dec!(15.5));
        MonthlyMetrics {
            period: Period::new(2024, 3).unwrap(),
            total_income: dec!(100),
            total_expenses: dec!(75.5),
            savings: dec!(24.5),
            expenses_by_category: by_category,
        }
    }

    #[test]
    fn test_classification_prompt_lists_all_categories() {
        let prompt = PromptBuilder::new().build_classification_prompt("Uber ride", dec!(23.4));

        assert!(prompt.contains(
            "Food, Transportation, Housing, Entertainment, Healthcare, \
             Education, Shopping, Utilities, Other."
        ));
        assert!(prompt.contains("Description: Uber ride"));
        assert!(prompt.contains("Amount: $23.40"));
        assert!(prompt.contains("Respond with ONLY the category name"));
    }

    #[test]
    fn test_classification_prompt_is_deterministic() {
        let builder = PromptBuilder::new();
        let a = builder.build_classification_prompt("Netflix", dec!(15.49));
        let b = builder.build_classification_prompt("Netflix", dec!(15.49));
        assert_eq!(a, b);
    }

    #[test]
    fn test_summary_prompt_sorted_categories() {
        let metrics = sample_metrics();
        let prompt = PromptBuilder::new().build_summary_prompt(metrics.period, &metrics);

        let food = prompt.find("- Food: $40.00").unwrap();
        let other = prompt.find("- Other: $15.50").unwrap();
        let shopping = prompt.find("- Shopping: $20.00").unwrap();
        assert!(food < other && other < shopping);

        assert!(prompt.contains("Month: 3/2024"));
        assert!(prompt.contains("Total Income: $100.00"));
        assert!(prompt.contains("Total Expenses: $75.50"));
        assert!(prompt.contains("Savings: $24.50"));
    }

    #[test]
    fn test_summary_prompt_is_deterministic() {
        let builder = PromptBuilder::new();
        let metrics = sample_metrics();
        assert_eq!(
            builder.build_summary_prompt(metrics.period, &metrics),
            builder.build_summary_prompt(metrics.period, &metrics.clone())
        );
    }

    #[test]
    fn test_summary_prompt_without_expenses() {
        let period = Period::new(2024, 1).unwrap();
        let metrics = MonthlyMetrics::empty(period);
        let prompt = PromptBuilder::new().build_summary_prompt(period, &metrics);
        assert!(prompt.contains("Expenses by category:\n- none"));
        assert!(prompt.contains("Savings: $0.00"));
    }

    #[test]
    fn test_render_does_not_reexpand_values() {
        let mut vars = HashMap::new();
        vars.insert("a", "{{b}}");
        vars.insert("b", "B");
        assert_eq!(render("x {{a}} y {{b}}", &vars), "x {{b}} y B");
    }

    #[test]
    fn test_render_leaves_unknown_and_unterminated() {
        let vars = HashMap::new();
        assert_eq!(render("hi {{name}}", &vars), "hi {{name}}");
        assert_eq!(render("hi {{name", &vars), "hi {{name");
    }

    #[test]
    fn test_negative_money_format() {
        assert_eq!(format_money(dec!(-30.255)), "-30.26");
    }
}
