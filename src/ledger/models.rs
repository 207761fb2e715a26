use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::BigDecimal};

use crate::currency::RawAmount;
use crate::error::{AppError, AppResult};

/// `processed` code stored for a tip whose transfer was submitted.
pub const TIP_STATUS_SENT: i32 = 2;

///User entity - one row per platform identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub user_id: i64,
    pub display_name: String,
    /// Assigned once when the row is created, never changed.
    pub ledger_account: String,
    pub registered: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub user_id: i64,
    pub display_name: String,
    pub ledger_account: String,
}

/// A tip ready to be recorded: transfer already submitted, users not yet
/// looked up, text still raw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TipRecord {
    pub message_id: i64,
    pub tip_id: String,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub text: String,
    pub amount: RawAmount,
}

/// Row inserted into `tip_list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewTip {
    pub message_id: i64,
    pub tip_id: String,
    pub status: i32,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub text: String,
    pub amount: RawAmount,
}

///Tip entity - append-only record of a settled tip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tip {
    pub id: i64,
    pub message_id: i64,
    pub tip_id: String,
    pub status: i32,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub text: String,
    pub amount: RawAmount,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
pub struct TipRow {
    pub id: i64,
    pub message_id: i64,
    pub tip_id: String,
    pub status: i32,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub text: String,
    pub amount: BigDecimal,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<TipRow> for Tip {
    type Error = AppError;

    fn try_from(row: TipRow) -> AppResult<Self> {
        Ok(Tip {
            id: row.id,
            message_id: row.message_id,
            tip_id: row.tip_id,
            status: row.status,
            sender_id: row.sender_id,
            receiver_id: row.receiver_id,
            text: row.text,
            amount: from_numeric(&row.amount)?,
            created_at: row.created_at,
        })
    }
}

pub fn to_numeric(amount: RawAmount) -> AppResult<BigDecimal> {
    BigDecimal::from_str(&amount.to_string())
        .map_err(|e| AppError::Persistence(format!("amount {} not storable: {}", amount, e)))
}

pub fn from_numeric(value: &BigDecimal) -> AppResult<RawAmount> {
    value
        .with_scale(0)
        .to_string()
        .parse()
        .map_err(|_| AppError::Persistence(format!("stored amount {} is not a raw amount", value)))
}

/// Drop the `!` and `@` markup characters from a tip message.
pub fn strip_markup(text: &str) -> String {
    text.chars().filter(|c| *c != '!' && *c != '@').collect()
}
