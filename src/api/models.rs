use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::currency::{Denomination, RawAmount};
use crate::ledger::models::{Tip, User};
use crate::settlement::TipOutcome;

// ========== REQUEST MODELS ==========

#[derive(Debug, Deserialize)]
pub struct TipHistoryQuery {
    pub limit: Option<i64>,
}

// ========== RESPONSE MODELS ==========

/// Result of settling a tip message, one entry per recipient
#[derive(Debug, Serialize)]
pub struct SettleTipsResponse {
    pub message_id: i64,
    pub settled: usize,
    pub outcomes: Vec<TipOutcome>,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user_id: i64,
    pub display_name: String,
    pub ledger_account: String,
    pub registered: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            user_id: user.user_id,
            display_name: user.display_name,
            ledger_account: user.ledger_account,
            registered: user.registered,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TipView {
    pub tip_id: String,
    pub message_id: i64,
    pub direction: TipDirection,
    pub counterparty_id: i64,
    pub amount_raw: RawAmount,
    pub amount: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TipDirection {
    Sent,
    Received,
}

impl TipView {
    pub fn for_user(user_id: i64, tip: Tip, denomination: &Denomination) -> Self {
        let (direction, counterparty_id) = if tip.sender_id == user_id {
            (TipDirection::Sent, tip.receiver_id)
        } else {
            (TipDirection::Received, tip.sender_id)
        };

        Self {
            tip_id: tip.tip_id,
            message_id: tip.message_id,
            direction,
            counterparty_id,
            amount_raw: tip.amount,
            amount: denomination.format(tip.amount),
            text: tip.text,
            created_at: tip.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TipHistoryResponse {
    pub user_id: i64,
    pub tips: Vec<TipView>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}
