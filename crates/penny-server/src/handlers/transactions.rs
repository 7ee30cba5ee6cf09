//! Transaction handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Serialize;

use crate::{get_user_id, AppError, AppState, SuccessResponse};
use penny_core::{NewTransaction, TransactionRecord, TransactionUpdate};

#[derive(Serialize)]
pub struct TransactionListResponse {
    pub transactions: Vec<TransactionRecord>,
}

#[derive(Serialize)]
pub struct TransactionResponse {
    pub transaction: TransactionRecord,
}

/// GET /api/transactions - List the caller's transactions, newest first
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<TransactionListResponse>, AppError> {
    let user_id = get_user_id(&headers)?;
    let transactions = state.db.list_user_transactions(&user_id)?;
    Ok(Json(TransactionListResponse { transactions }))
}

/// POST /api/transactions - Create a transaction
pub async fn create_transaction(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<NewTransaction>,
) -> Result<(StatusCode, Json<TransactionResponse>), AppError> {
    let user_id = get_user_id(&headers)?;
    let transaction = state.db.insert_transaction(&user_id, &body)?;
    Ok((StatusCode::CREATED, Json(TransactionResponse { transaction })))
}

/// PUT /api/transactions/:id - Update a transaction
pub async fn update_transaction(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<TransactionUpdate>,
) -> Result<Json<TransactionResponse>, AppError> {
    let user_id = get_user_id(&headers)?;
    let transaction = state.db.update_transaction(&user_id, id, &body)?;
    Ok(Json(TransactionResponse { transaction }))
}

/// DELETE /api/transactions/:id - Delete a transaction
pub async fn delete_transaction(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, AppError> {
    let user_id = get_user_id(&headers)?;
    state.db.delete_transaction(&user_id, id)?;
    Ok(Json(SuccessResponse { success: true }))
}
