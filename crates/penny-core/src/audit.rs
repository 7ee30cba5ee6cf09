//! Append-only audit log of AI interactions
//!
//! Every engine call that reaches the model step produces exactly one
//! `InteractionRecord`, on the success path and the degraded path alike.
//! The payload is tagged by kind so each kind has one fixed input/output
//! shape instead of free-form JSON.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Category, MonthlyMetrics};

/// Marker stored in `error` when the model could not be used
pub const AI_UNAVAILABLE_MARKER: &str = "AI service unavailable";

/// Kind of AI interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Classification,
    MonthSummary,
}

impl InteractionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Classification => "classification",
            Self::MonthSummary => "month_summary",
        }
    }
}

impl std::str::FromStr for InteractionKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "classification" => Ok(Self::Classification),
            "month_summary" => Ok(Self::MonthSummary),
            _ => Err(format!("Unknown interaction kind: {}", s)),
        }
    }
}

/// What was sent for a classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationInput {
    pub description: String,
    pub amount: Decimal,
}

/// What a classification produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationOutput {
    pub category: Category,
    /// Completion text before category matching
    pub raw: String,
}

/// What was sent for a month summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryInput {
    pub year: i32,
    pub month: u32,
    pub total_income: Decimal,
    pub total_expenses: Decimal,
    pub savings: Decimal,
}

impl From<&MonthlyMetrics> for SummaryInput {
    fn from(metrics: &MonthlyMetrics) -> Self {
        Self {
            year: metrics.period.year,
            month: metrics.period.month,
            total_income: metrics.total_income,
            total_expenses: metrics.total_expenses,
            savings: metrics.savings,
        }
    }
}

/// What a month summary produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryOutput {
    pub summary: String,
}

/// Either the generated result or the unavailability marker
///
/// `cause` carries the gateway error for operators. It is never part of
/// anything returned to end users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InteractionOutput<T> {
    Error {
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cause: Option<String>,
    },
    Success(T),
}

impl<T> InteractionOutput<T> {
    /// The marker output for a failed model call
    pub fn unavailable(cause: impl Into<String>) -> Self {
        Self::Error {
            error: AI_UNAVAILABLE_MARKER.to_string(),
            cause: Some(cause.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Kind-tagged input/output pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InteractionPayload {
    Classification {
        input: ClassificationInput,
        output: InteractionOutput<ClassificationOutput>,
    },
    MonthSummary {
        input: SummaryInput,
        output: InteractionOutput<SummaryOutput>,
    },
}

impl InteractionPayload {
    pub fn kind(&self) -> InteractionKind {
        match self {
            Self::Classification { .. } => InteractionKind::Classification,
            Self::MonthSummary { .. } => InteractionKind::MonthSummary,
        }
    }

    pub fn is_success(&self) -> bool {
        match self {
            Self::Classification { output, .. } => output.is_success(),
            Self::MonthSummary { output, .. } => output.is_success(),
        }
    }

    /// Input as a JSON value (for storage)
    pub fn input_json(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            Self::Classification { input, .. } => serde_json::to_value(input),
            Self::MonthSummary { input, .. } => serde_json::to_value(input),
        }
    }

    /// Output as a JSON value (for storage)
    pub fn output_json(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            Self::Classification { output, .. } => serde_json::to_value(output),
            Self::MonthSummary { output, .. } => serde_json::to_value(output),
        }
    }

    /// Rebuild a payload from stored columns
    pub fn from_parts(
        kind: InteractionKind,
        input: serde_json::Value,
        output: serde_json::Value,
    ) -> serde_json::Result<Self> {
        serde_json::from_value(serde_json::json!({
            "kind": kind.as_str(),
            "input": input,
            "output": output,
        }))
    }
}

/// One audited AI interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    /// Storage id, set once persisted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    pub model: String,
    pub latency_ms: u64,
    #[serde(flatten)]
    pub payload: InteractionPayload,
}

impl InteractionRecord {
    pub fn new(user_id: &str, model: &str, latency_ms: u64, payload: InteractionPayload) -> Self {
        Self {
            id: None,
            user_id: user_id.to_string(),
            timestamp: Utc::now(),
            model: model.to_string(),
            latency_ms,
            payload,
        }
    }

    pub fn kind(&self) -> InteractionKind {
        self.payload.kind()
    }
}

/// Audit write failure
///
/// Observed and counted by the engine, never returned to callers.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("audit storage error: {0}")]
    Storage(String),

    #[error("audit serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("audit log unavailable: {0}")]
    Unavailable(String),
}

/// Append-only sink for interaction records
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn append(&self, record: &InteractionRecord) -> Result<(), LogError>;
}

/// In-memory audit log for tests and offline development
#[derive(Clone, Default)]
pub struct MemoryAuditLog {
    records: Arc<Mutex<Vec<InteractionRecord>>>,
    failing: bool,
    delay: Duration,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A log that rejects every append
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// Wait this long inside every append
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Snapshot of stored records, oldest first
    pub fn records(&self) -> Vec<InteractionRecord> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AuditLog for MemoryAuditLog {
    async fn append(&self, record: &InteractionRecord) -> Result<(), LogError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.failing {
            return Err(LogError::Unavailable("memory log configured to fail".into()));
        }
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn classification_payload() -> InteractionPayload {
        InteractionPayload::Classification {
            input: ClassificationInput {
                description: "Uber".to_string(),
                amount: dec!(23.40),
            },
            output: InteractionOutput::Success(ClassificationOutput {
                category: Category::Transportation,
                raw: "Transportation".to_string(),
            }),
        }
    }

    #[test]
    fn test_record_json_shape() {
        let record = InteractionRecord::new("u1", "gpt-3.5-turbo", 42, classification_payload());
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["kind"], "classification");
        assert_eq!(json["user_id"], "u1");
        assert_eq!(json["input"]["description"], "Uber");
        assert_eq!(json["input"]["amount"], "23.40");
        assert_eq!(json["output"]["category"], "Transportation");
        assert!(json.get("id").is_none());
    }

    #[test]
    fn test_unavailable_output_shape() {
        let output: InteractionOutput<SummaryOutput> =
            InteractionOutput::unavailable("model call timed out after 30s");
        let json = serde_json::to_value(&output).unwrap();

        assert_eq!(json["error"], AI_UNAVAILABLE_MARKER);
        assert_eq!(json["cause"], "model call timed out after 30s");
        assert!(!output.is_success());
    }

    #[test]
    fn test_from_parts_rebuilds_payload() {
        let payload = InteractionPayload::MonthSummary {
            input: SummaryInput {
                year: 2024,
                month: 3,
                total_income: dec!(100),
                total_expenses: dec!(55),
                savings: dec!(45),
            },
            output: InteractionOutput::unavailable("transport error: reset"),
        };

        let rebuilt = InteractionPayload::from_parts(
            payload.kind(),
            payload.input_json().unwrap(),
            payload.output_json().unwrap(),
        )
        .unwrap();

        assert_eq!(rebuilt, payload);
        assert_eq!(rebuilt.kind(), InteractionKind::MonthSummary);
        assert!(!rebuilt.is_success());
    }

    #[test]
    fn test_from_parts_rejects_mismatched_shapes() {
        let result = InteractionPayload::from_parts(
            InteractionKind::Classification,
            serde_json::json!({ "year": 2024 }),
            serde_json::json!({ "summary": "x" }),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!(
            "month_summary".parse::<InteractionKind>().unwrap(),
            InteractionKind::MonthSummary
        );
        assert!("classify".parse::<InteractionKind>().is_err());
    }

    #[tokio::test]
    async fn test_memory_log() {
        let log = MemoryAuditLog::new();
        let shared = log.clone();
        let record = InteractionRecord::new("u1", "mock", 1, classification_payload());

        shared.append(&record).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log.records()[0], record);

        let failing = MemoryAuditLog::failing();
        assert!(failing.append(&record).await.is_err());
        assert!(failing.is_empty());
    }
}
