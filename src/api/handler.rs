use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use super::models::*;
use crate::{
    error::{AppError, AppResult},
    settlement::{TipMessage, TipSettlement},
};

const DEFAULT_HISTORY_LIMIT: i64 = 50;
const MAX_HISTORY_LIMIT: i64 = 500;

#[derive(Clone)]
pub struct AppState {
    pub settlement: Arc<TipSettlement>,
}

/// Settle a parsed tip message
/// POST /api/v1/tips
pub async fn settle_tips(
    State(state): State<AppState>,
    Json(message): Json<TipMessage>,
) -> AppResult<Json<SettleTipsResponse>> {
    info!(
        "Settling message {} from {} to {} recipients",
        message.id,
        message.sender_screen_name,
        message.recipients.len()
    );

    message.check()?;

    let outcomes = state.settlement.settle_message(&message).await;
    let settled = outcomes.iter().filter(|o| o.settled).count();

    Ok(Json(SettleTipsResponse {
        message_id: message.id,
        settled,
        outcomes,
    }))
}

/// GET /api/v1/users/:user_id
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> AppResult<Json<UserResponse>> {
    let user = state
        .settlement
        .directory()
        .lookup(user_id)
        .await?
        .ok_or_else(|| AppError::AccountNotFound(format!("user {}", user_id)))?;

    Ok(Json(UserResponse::from(user)))
}

/// GET /api/v1/users/:user_id/tips
pub async fn get_user_tips(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Query(query): Query<TipHistoryQuery>,
) -> AppResult<Json<TipHistoryResponse>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);

    let denomination = state.settlement.denomination();
    let tips = state
        .settlement
        .tip_ledger()
        .history(user_id, limit)
        .await?
        .into_iter()
        .map(|tip| TipView::for_user(user_id, tip, denomination))
        .collect();

    Ok(Json(TipHistoryResponse { user_id, tips }))
}

/// GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
    })
}
