//! AI assist engine
//!
//! Composes aggregation, prompt rendering, the model gateway and the audit
//! log into two operations: transaction classification and monthly
//! summaries.
//!
//! Model unavailability is never an error here. A failed gateway call turns
//! into `AssistOutcome::Degraded` carrying a fixed fallback (`Other` for
//! classification, `SUMMARY_UNAVAILABLE_MESSAGE` for summaries). Only caller
//! input errors (and storage errors on the stored-month path) propagate.
//!
//! Each call that passes validation appends exactly one audit record, after
//! the outcome is decided. Dropping the returned future before that point
//! abandons the model call and writes nothing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, warn};

use crate::aggregate::Aggregator;
use crate::ai::{GatewayError, GenerationRequest, ModelGateway};
use crate::audit::{
    AuditLog, ClassificationInput, ClassificationOutput, InteractionOutput, InteractionPayload,
    InteractionRecord, SummaryInput, SummaryOutput,
};
use crate::config::{AssistConfig, TaskLimits};
use crate::db::TransactionStore;
use crate::error::{Error, Result};
use crate::models::{
    AssistOutcome, Category, ClassificationRequest, MonthlyMetrics, Period, TransactionRecord,
};
use crate::prompts::PromptBuilder;

/// Narrative returned when the model could not produce a summary
pub const SUMMARY_UNAVAILABLE_MESSAGE: &str =
    "AI service is currently unavailable. Please try again later.";

/// Result of a monthly summary
///
/// `metrics` is computed locally and is identical whether or not the model
/// call succeeded.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryResult {
    pub narrative: AssistOutcome<String>,
    pub metrics: MonthlyMetrics,
}

impl SummaryResult {
    /// Narrative text, generated or fallback
    pub fn summary(&self) -> &str {
        self.narrative.value()
    }

    pub fn is_degraded(&self) -> bool {
        self.narrative.is_degraded()
    }
}

/// Serializable view for API responses (the degradation cause stays internal)
#[derive(Debug, Serialize)]
pub struct SummaryView<'a> {
    pub summary: &'a str,
    pub metrics: &'a MonthlyMetrics,
    pub degraded: bool,
}

impl<'a> From<&'a SummaryResult> for SummaryView<'a> {
    fn from(result: &'a SummaryResult) -> Self {
        Self {
            summary: result.summary(),
            metrics: &result.metrics,
            degraded: result.is_degraded(),
        }
    }
}

/// AI assist engine
///
/// Send + Sync; share it behind an `Arc`. Calls are independent and hold no
/// locks.
pub struct AIAssistEngine {
    gateway: Arc<dyn ModelGateway>,
    aggregator: Aggregator,
    audit: Arc<dyn AuditLog>,
    prompts: PromptBuilder,
    config: AssistConfig,
    audit_failures: AtomicU64,
}

impl AIAssistEngine {
    pub fn new(
        gateway: Arc<dyn ModelGateway>,
        aggregator: Aggregator,
        audit: Arc<dyn AuditLog>,
        config: AssistConfig,
    ) -> Self {
        Self {
            gateway,
            aggregator,
            audit,
            prompts: PromptBuilder::new(),
            config,
            audit_failures: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &AssistConfig {
        &self.config
    }

    /// Model name recorded in audit records
    pub fn model(&self) -> &str {
        self.gateway.model()
    }

    /// Audit appends that failed or timed out since startup
    pub fn audit_failures(&self) -> u64 {
        self.audit_failures.load(Ordering::Relaxed)
    }

    /// Classify a transaction description into a category
    pub async fn classify_transaction(
        &self,
        user_id: &str,
        description: &str,
        amount: Decimal,
    ) -> Result<AssistOutcome<Category>> {
        let request = ClassificationRequest::new(user_id, description, amount)?;
        let prompt = self
            .prompts
            .build_classification_prompt(&request.description, request.amount);

        let started = Instant::now();
        let result = self.call_model(prompt, self.config.classification).await;
        let latency_ms = elapsed_ms(started);

        let (outcome, output) = match result {
            Ok(raw) => {
                let category = Category::from_completion(&raw);
                debug!(
                    user_id = %request.user_id,
                    raw = %raw,
                    category = %category,
                    "Classified transaction"
                );
                (
                    AssistOutcome::Success(category),
                    InteractionOutput::Success(ClassificationOutput { category, raw }),
                )
            }
            Err(e) => {
                warn!(
                    user_id = %request.user_id,
                    latency_ms,
                    error = %e,
                    "Classification degraded"
                );
                let cause = e.to_string();
                (
                    AssistOutcome::Degraded {
                        fallback: Category::Other,
                        cause: cause.clone(),
                    },
                    InteractionOutput::unavailable(cause),
                )
            }
        };

        let payload = InteractionPayload::Classification {
            input: ClassificationInput {
                description: request.description,
                amount: request.amount,
            },
            output,
        };
        self.record(InteractionRecord::new(
            &request.user_id,
            self.gateway.model(),
            latency_ms,
            payload,
        ))
        .await;

        Ok(outcome)
    }

    /// Summarize one month of a user's transactions
    ///
    /// `transactions` must already be limited to this user; records outside
    /// the month are ignored.
    pub async fn summarize_month(
        &self,
        user_id: &str,
        year: i32,
        month: u32,
        transactions: &[TransactionRecord],
    ) -> Result<SummaryResult> {
        let user_id = require_user(user_id)?;
        let period = Period::new(year, month)?;

        let metrics = self.aggregator.aggregate(transactions, period);
        let prompt = self.prompts.build_summary_prompt(period, &metrics);

        let started = Instant::now();
        let result = self.call_model(prompt, self.config.summary).await;
        let latency_ms = elapsed_ms(started);

        let (narrative, output) = match result {
            Ok(text) => {
                debug!(user_id = %user_id, period = %period, latency_ms, "Generated month summary");
                (
                    AssistOutcome::Success(text.clone()),
                    InteractionOutput::Success(SummaryOutput { summary: text }),
                )
            }
            Err(e) => {
                warn!(
                    user_id = %user_id,
                    period = %period,
                    latency_ms,
                    error = %e,
                    "Month summary degraded"
                );
                let cause = e.to_string();
                (
                    AssistOutcome::Degraded {
                        fallback: SUMMARY_UNAVAILABLE_MESSAGE.to_string(),
                        cause: cause.clone(),
                    },
                    InteractionOutput::unavailable(cause),
                )
            }
        };

        let payload = InteractionPayload::MonthSummary {
            input: SummaryInput::from(&metrics),
            output,
        };
        self.record(InteractionRecord::new(
            user_id,
            self.gateway.model(),
            latency_ms,
            payload,
        ))
        .await;

        Ok(SummaryResult { narrative, metrics })
    }

    /// Load the month's transactions from `store`, then summarize them
    pub async fn summarize_stored_month(
        &self,
        store: &dyn TransactionStore,
        user_id: &str,
        year: i32,
        month: u32,
    ) -> Result<SummaryResult> {
        let user = require_user(user_id)?;
        let period = Period::new(year, month)?;

        let transactions =
            store.find_by_user_and_period(user, period.first_day(), period.last_day())?;

        self.summarize_month(user, year, month, &transactions).await
    }

    /// Invoke the gateway within the task's ceiling, retrying once if configured
    async fn call_model(
        &self,
        prompt: String,
        limits: TaskLimits,
    ) -> std::result::Result<String, GatewayError> {
        let request = GenerationRequest::new(prompt, limits.max_output_tokens, limits.timeout);
        let retry = self.config.retry;

        let attempts = async {
            let mut attempt = 0;
            loop {
                match self.gateway.invoke(&request).await {
                    Ok(text) => return Ok(text),
                    Err(e) if attempt < retry.max_retries && e.is_retryable() => {
                        attempt += 1;
                        let delay = retry.base_delay + random_jitter(retry.base_delay);
                        debug!(
                            error = %e,
                            delay_ms = delay.as_millis() as u64,
                            "Retrying model call"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        match tokio::time::timeout(limits.ceiling, attempts).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout(limits.ceiling)),
        }
    }

    /// Append an audit record; failures are counted and logged, never returned
    async fn record(&self, record: InteractionRecord) {
        let kind = record.kind().as_str();

        match tokio::time::timeout(self.config.audit_timeout, self.audit.append(&record)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.audit_failures.fetch_add(1, Ordering::Relaxed);
                warn!(
                    user_id = %record.user_id,
                    kind,
                    error = %e,
                    "Failed to append AI interaction record"
                );
            }
            Err(_) => {
                self.audit_failures.fetch_add(1, Ordering::Relaxed);
                warn!(
                    user_id = %record.user_id,
                    kind,
                    timeout_ms = self.config.audit_timeout.as_millis() as u64,
                    "Timed out appending AI interaction record"
                );
            }
        }
    }
}

fn require_user(user_id: &str) -> Result<&str> {
    let user_id = user_id.trim();
    if user_id.is_empty() {
        return Err(Error::InvalidInput("user id is required".into()));
    }
    Ok(user_id)
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Up to the base delay again, so concurrent retries spread out
fn random_jitter(base_delay: Duration) -> Duration {
    let max_jitter_ms = base_delay.as_millis() as u64;
    if max_jitter_ms == 0 {
        return Duration::ZERO;
    }
    let jitter_ms = rand::rng().random_range(0..max_jitter_ms);
    Duration::from_millis(jitter_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{MockGateway, MockStep};
    use crate::audit::{MemoryAuditLog, AI_UNAVAILABLE_MARKER};
    use crate::config::RetryConfig;
    use crate::models::TransactionType;
    use chrono::{NaiveDate, Utc};
    use rust_decimal_macros::dec;

    fn engine_with(
        gateway: &MockGateway,
        audit: &MemoryAuditLog,
        config: AssistConfig,
    ) -> AIAssistEngine {
        AIAssistEngine::new(
            Arc::new(gateway.clone()),
            Aggregator::new(),
            Arc::new(audit.clone()),
            config,
        )
    }

    fn engine(gateway: &MockGateway, audit: &MemoryAuditLog) -> AIAssistEngine {
        engine_with(gateway, audit, AssistConfig::default())
    }

    fn tx(
        amount: Decimal,
        kind: TransactionType,
        category: Option<&str>,
        day: u32,
    ) -> TransactionRecord {
        TransactionRecord {
            id: 0,
            user_id: "u1".to_string(),
            description: "test".to_string(),
            amount,
            kind,
            category: category.map(String::from),
            date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            created_at: Utc::now(),
        }
    }

    fn reference_month() -> Vec<TransactionRecord> {
        vec![
            tx(dec!(100), TransactionType::Income, None, 5),
            tx(dec!(40), TransactionType::Expense, Some("Food"), 10),
            tx(dec!(15), TransactionType::Expense, Some(""), 20),
        ]
    }

    fn unavailable() -> GatewayError {
        GatewayError::Transport("connection refused".into())
    }

    #[tokio::test]
    async fn test_classify_success() {
        let gateway = MockGateway::replying("Food");
        let audit = MemoryAuditLog::new();
        let engine = engine(&gateway, &audit);

        let outcome = engine
            .classify_transaction("u1", "Grocery run", dec!(54.20))
            .await
            .unwrap();

        assert_eq!(outcome, AssistOutcome::Success(Category::Food));
        let records = audit.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].user_id, "u1");
        assert_eq!(records[0].model, "mock");
        match &records[0].payload {
            InteractionPayload::Classification { input, output } => {
                assert_eq!(input.description, "Grocery run");
                assert_eq!(input.amount, dec!(54.20));
                assert_eq!(
                    output,
                    &InteractionOutput::Success(ClassificationOutput {
                        category: Category::Food,
                        raw: "Food".into()
                    })
                );
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_classify_unknown_label_is_other_not_degraded() {
        let gateway = MockGateway::replying("Groceries");
        let audit = MemoryAuditLog::new();

        let outcome = engine(&gateway, &audit)
            .classify_transaction("u1", "Whole Foods", dec!(80))
            .await
            .unwrap();

        assert_eq!(outcome, AssistOutcome::Success(Category::Other));
        assert!(audit.records()[0].payload.is_success());
    }

    #[tokio::test]
    async fn test_classify_degrades_when_model_unavailable() {
        let gateway = MockGateway::failing(unavailable());
        let audit = MemoryAuditLog::new();

        let outcome = engine(&gateway, &audit)
            .classify_transaction("u1", "Uber", dec!(23.4))
            .await
            .unwrap();

        assert!(outcome.is_degraded());
        assert_eq!(*outcome.value(), Category::Other);

        let records = audit.records();
        assert_eq!(records.len(), 1);
        match &records[0].payload {
            InteractionPayload::Classification { output, .. } => match output {
                InteractionOutput::Error { error, cause } => {
                    assert_eq!(error, AI_UNAVAILABLE_MARKER);
                    assert!(cause.as_deref().unwrap().contains("connection refused"));
                }
                other => panic!("expected error output, got {:?}", other),
            },
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_classify_rejects_empty_description_before_model() {
        let gateway = MockGateway::replying("Food");
        let audit = MemoryAuditLog::new();
        let engine = engine(&gateway, &audit);

        let result = engine.classify_transaction("u1", "   ", dec!(5)).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));

        let result = engine.classify_transaction("", "Coffee", dec!(5)).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));

        assert_eq!(gateway.calls(), 0);
        assert!(audit.is_empty());
    }

    #[tokio::test]
    async fn test_classify_prompt_reaches_gateway() {
        let gateway = MockGateway::replying("Transportation");
        let audit = MemoryAuditLog::new();

        engine(&gateway, &audit)
            .classify_transaction("u1", "  Uber ride ", dec!(23.4))
            .await
            .unwrap();

        let prompts = gateway.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Description: Uber ride\n"));
        assert!(prompts[0].contains("Amount: $23.40"));
    }

    #[tokio::test]
    async fn test_summarize_success() {
        let gateway = MockGateway::replying("You saved 45% of your income.");
        let audit = MemoryAuditLog::new();

        let result = engine(&gateway, &audit)
            .summarize_month("u1", 2024, 3, &reference_month())
            .await
            .unwrap();

        assert!(!result.is_degraded());
        assert_eq!(result.summary(), "You saved 45% of your income.");
        assert_eq!(result.metrics.total_income, dec!(100));
        assert_eq!(result.metrics.total_expenses, dec!(55));
        assert_eq!(result.metrics.savings, dec!(45));
        assert_eq!(result.metrics.expenses_by_category["Food"], dec!(40));
        assert_eq!(result.metrics.expenses_by_category["Other"], dec!(15));

        let records = audit.records();
        assert_eq!(records.len(), 1);
        match &records[0].payload {
            InteractionPayload::MonthSummary { input, output } => {
                assert_eq!(input.year, 2024);
                assert_eq!(input.month, 3);
                assert_eq!(input.savings, dec!(45));
                assert!(output.is_success());
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_summarize_degraded_keeps_metrics() {
        let ok_gateway = MockGateway::replying("Looks fine.");
        let failing_gateway = MockGateway::failing(GatewayError::Timeout(Duration::from_secs(30)));
        let audit = MemoryAuditLog::new();

        let ok = engine(&ok_gateway, &audit)
            .summarize_month("u1", 2024, 3, &reference_month())
            .await
            .unwrap();
        let degraded = engine(&failing_gateway, &audit)
            .summarize_month("u1", 2024, 3, &reference_month())
            .await
            .unwrap();

        assert!(degraded.is_degraded());
        assert_eq!(degraded.summary(), SUMMARY_UNAVAILABLE_MESSAGE);
        assert_eq!(
            degraded.summary(),
            "AI service is currently unavailable. Please try again later."
        );
        assert_eq!(degraded.metrics, ok.metrics);
        assert_eq!(audit.len(), 2);
        assert!(!audit.records()[1].payload.is_success());
    }

    #[tokio::test]
    async fn test_summarize_empty_month() {
        let gateway = MockGateway::replying("No activity this month.");
        let audit = MemoryAuditLog::new();

        let result = engine(&gateway, &audit)
            .summarize_month("u1", 2024, 1, &[])
            .await
            .unwrap();

        assert_eq!(result.metrics, MonthlyMetrics::empty(Period::new(2024, 1).unwrap()));
        assert_eq!(gateway.calls(), 1);
        assert_eq!(audit.len(), 1);
    }

    #[tokio::test]
    async fn test_summarize_invalid_period_touches_nothing() {
        let gateway = MockGateway::replying("x");
        let audit = MemoryAuditLog::new();
        let engine = engine(&gateway, &audit);

        for (year, month) in [(2024, 13), (2024, 0), (1800, 5), (9999, 5)] {
            let result = engine.summarize_month("u1", year, month, &reference_month()).await;
            assert!(matches!(result, Err(Error::InvalidInput(_))));
        }

        assert_eq!(gateway.calls(), 0);
        assert!(audit.is_empty());
    }

    #[tokio::test]
    async fn test_retry_once_then_success() {
        let gateway = MockGateway::with_script(
            vec![MockStep::Fail(unavailable())],
            MockStep::Reply("Food".into()),
        );
        let audit = MemoryAuditLog::new();
        let config = AssistConfig {
            retry: RetryConfig::once(Duration::from_millis(1)),
            ..AssistConfig::default()
        };

        let outcome = engine_with(&gateway, &audit, config)
            .classify_transaction("u1", "Bagels", dec!(6))
            .await
            .unwrap();

        assert_eq!(outcome, AssistOutcome::Success(Category::Food));
        assert_eq!(gateway.calls(), 2);
        assert_eq!(audit.len(), 1);
    }

    #[tokio::test]
    async fn test_no_retry_by_default() {
        let gateway = MockGateway::with_script(
            vec![MockStep::Fail(unavailable())],
            MockStep::Reply("Food".into()),
        );
        let audit = MemoryAuditLog::new();

        let outcome = engine(&gateway, &audit)
            .classify_transaction("u1", "Bagels", dec!(6))
            .await
            .unwrap();

        assert!(outcome.is_degraded());
        assert_eq!(gateway.calls(), 1);
    }

    #[tokio::test]
    async fn test_not_configured_is_not_retried() {
        let gateway = MockGateway::failing(GatewayError::NotConfigured("no host".into()));
        let audit = MemoryAuditLog::new();
        let config = AssistConfig {
            retry: RetryConfig::once(Duration::from_millis(1)),
            ..AssistConfig::default()
        };

        let outcome = engine_with(&gateway, &audit, config)
            .classify_transaction("u1", "Bagels", dec!(6))
            .await
            .unwrap();

        assert!(outcome.is_degraded());
        assert_eq!(gateway.calls(), 1);
    }

    #[tokio::test]
    async fn test_ceiling_bounds_the_call() {
        let gateway = MockGateway::replying("Food").with_delay(Duration::from_millis(500));
        let audit = MemoryAuditLog::new();
        let mut config = AssistConfig::default();
        config.classification.ceiling = Duration::from_millis(50);

        let started = Instant::now();
        let outcome = engine_with(&gateway, &audit, config)
            .classify_transaction("u1", "Bagels", dec!(6))
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_millis(400));
        assert_eq!(
            outcome,
            AssistOutcome::Degraded {
                fallback: Category::Other,
                cause: GatewayError::Timeout(Duration::from_millis(50)).to_string(),
            }
        );
        assert_eq!(audit.len(), 1);
    }

    #[tokio::test]
    async fn test_audit_failure_does_not_change_result() {
        let gateway = MockGateway::replying("Food");
        let audit = MemoryAuditLog::failing();
        let engine = engine(&gateway, &audit);

        let outcome = engine
            .classify_transaction("u1", "Bagels", dec!(6))
            .await
            .unwrap();

        assert_eq!(outcome, AssistOutcome::Success(Category::Food));
        assert_eq!(engine.audit_failures(), 1);
    }

    #[tokio::test]
    async fn test_slow_audit_is_bounded() {
        let gateway = MockGateway::replying("Food");
        let audit = MemoryAuditLog::new().with_delay(Duration::from_millis(500));
        let config = AssistConfig {
            audit_timeout: Duration::from_millis(20),
            ..AssistConfig::default()
        };
        let engine = engine_with(&gateway, &audit, config);

        let result = engine
            .summarize_month("u1", 2024, 3, &reference_month())
            .await
            .unwrap();

        assert_eq!(result.summary(), "Food");
        assert_eq!(engine.audit_failures(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_call_writes_nothing() {
        let gateway = MockGateway::replying("Food").with_delay(Duration::from_secs(3));
        let audit = MemoryAuditLog::new();
        let engine = engine(&gateway, &audit);

        let result = tokio::time::timeout(
            Duration::from_millis(50),
            engine.classify_transaction("u1", "Bagels", dec!(6)),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(gateway.calls(), 1);
        assert!(audit.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_calls_each_audit_once() {
        let gateway = MockGateway::replying("Shopping");
        let audit = MemoryAuditLog::new();
        let engine = Arc::new(engine(&gateway, &audit));

        let handles: Vec<_> = (0..20)
            .map(|i| {
                let engine = engine.clone();
                tokio::spawn(async move {
                    engine
                        .classify_transaction(&format!("user{}", i), "Target", dec!(19.99))
                        .await
                })
            })
            .collect();

        for handle in handles {
            let outcome = handle.await.unwrap().unwrap();
            assert_eq!(outcome, AssistOutcome::Success(Category::Shopping));
        }
        assert_eq!(audit.len(), 20);
        assert_eq!(gateway.calls(), 20);
    }

    #[test]
    fn test_summary_view_hides_cause() {
        let result = SummaryResult {
            narrative: AssistOutcome::Degraded {
                fallback: SUMMARY_UNAVAILABLE_MESSAGE.to_string(),
                cause: "transport error: secret-host:443".to_string(),
            },
            metrics: MonthlyMetrics::empty(Period::new(2024, 3).unwrap()),
        };

        let json = serde_json::to_string(&SummaryView::from(&result)).unwrap();
        assert!(json.contains(SUMMARY_UNAVAILABLE_MESSAGE));
        assert!(json.contains("\"degraded\":true"));
        assert!(!json.contains("secret-host"));
    }

    #[test]
    fn test_random_jitter_bounds() {
        assert_eq!(random_jitter(Duration::ZERO), Duration::ZERO);
        for _ in 0..100 {
            assert!(random_jitter(Duration::from_millis(10)) < Duration::from_millis(10));
        }
    }
}
