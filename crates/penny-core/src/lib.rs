//! Penny Core Library
//!
//! AI assist engine for the Penny personal finance app:
//! - Monthly aggregation of transactions with exact decimal arithmetic
//! - Deterministic prompt rendering for classification and summaries
//! - Pluggable model gateways (OpenAI-compatible, Ollama, mock)
//! - Append-only audit log of every AI interaction
//! - The assist engine composing all of the above with graceful degradation
//! - SQLite storage for transactions and audit records

pub mod aggregate;
pub mod ai;
pub mod audit;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod models;
pub mod prompts;

/// Test utilities including a mock model server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use aggregate::Aggregator;
pub use ai::{
    GatewayClient, GatewayError, GenerationRequest, MockGateway, MockStep, ModelGateway,
    OllamaGateway, OpenAICompatibleGateway,
};
pub use audit::{
    AuditLog, InteractionKind, InteractionOutput, InteractionPayload, InteractionRecord, LogError,
    MemoryAuditLog, AI_UNAVAILABLE_MARKER,
};
pub use config::{AssistConfig, BackendConfig, BackendKind, RetryConfig, TaskLimits};
pub use db::{Database, TransactionStore};
pub use engine::{AIAssistEngine, SummaryResult, SummaryView, SUMMARY_UNAVAILABLE_MESSAGE};
pub use error::{Error, Result};
pub use models::{
    validate_amount, AssistOutcome, Category, ClassificationRequest, MonthlyMetrics,
    NewTransaction, Period, TransactionRecord, TransactionType, TransactionUpdate,
    MAX_AMOUNT_UNITS,
};
pub use prompts::PromptBuilder;
