//! AI assist handlers
//!
//! Model outages never surface as errors here: degraded results come back
//! as 200 with `degraded: true`. Only invalid input is rejected.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{get_user_id, AppError, AppState, MAX_PAGE_LIMIT};
use penny_core::{Category, InteractionRecord, MonthlyMetrics};

/// Request body for classification
///
/// `amount` accepts a JSON number or a decimal string such as `"23.40"`.
#[derive(Debug, Deserialize)]
pub struct ClassifyRequest {
    pub description: String,
    pub amount: Decimal,
}

#[derive(Debug, Serialize)]
pub struct ClassifyResponse {
    pub classification: Category,
    pub degraded: bool,
}

/// POST /api/ai/classify - Suggest a category for a transaction
pub async fn classify_transaction(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<ClassifyRequest>,
) -> Result<Json<ClassifyResponse>, AppError> {
    let user_id = get_user_id(&headers)?;

    let outcome = state
        .engine
        .classify_transaction(&user_id, &body.description, body.amount)
        .await?;

    Ok(Json(ClassifyResponse {
        degraded: outcome.is_degraded(),
        classification: outcome.into_value(),
    }))
}

#[derive(Debug, Serialize)]
pub struct MonthSummaryResponse {
    pub summary: String,
    pub metrics: MonthlyMetrics,
    pub degraded: bool,
}

/// GET /api/ai/summary/:year/:month - Narrative summary of one month
pub async fn get_month_summary(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((year, month)): Path<(i32, u32)>,
) -> Result<Json<MonthSummaryResponse>, AppError> {
    let user_id = get_user_id(&headers)?;

    let result = state
        .engine
        .summarize_stored_month(&state.db, &user_id, year, month)
        .await?;

    Ok(Json(MonthSummaryResponse {
        summary: result.summary().to_string(),
        degraded: result.is_degraded(),
        metrics: result.metrics,
    }))
}

#[derive(Debug, Deserialize)]
pub struct InteractionsQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

/// GET /api/ai/interactions - The caller's recent AI interactions
pub async fn list_interactions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<InteractionsQuery>,
) -> Result<Json<Vec<InteractionRecord>>, AppError> {
    let user_id = get_user_id(&headers)?;

    // Input validation: clamp pagination
    let limit = params.limit.clamp(1, MAX_PAGE_LIMIT);

    let records = state.db.list_interactions(&user_id, limit)?;
    Ok(Json(records))
}

#[derive(Debug, Serialize)]
pub struct AIStatusResponse {
    pub model: String,
    pub audit_failures: u64,
}

/// GET /api/ai/status - Model in use and audit write failures since startup
pub async fn get_ai_status(State(state): State<Arc<AppState>>) -> Json<AIStatusResponse> {
    Json(AIStatusResponse {
        model: state.engine.model().to_string(),
        audit_failures: state.engine.audit_failures(),
    })
}
