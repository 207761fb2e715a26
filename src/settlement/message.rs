use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationErrors};

use crate::currency::RawAmount;
use crate::error::{AppError, AppResult};

/// Parsed tip command handed over by the messaging layer.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TipMessage {
    pub id: i64,
    pub sender_id: i64,
    #[validate(length(min = 1, message = "sender account is required"))]
    pub sender_account: String,
    #[validate(length(min = 1, message = "sender screen name is required"))]
    pub sender_screen_name: String,
    /// Message words as split by the parser.
    #[serde(default)]
    pub text: Vec<String>,
    #[validate(length(min = 1, message = "at least one recipient is required"))]
    pub recipients: Vec<TipRecipient>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TipRecipient {
    pub receiver_id: i64,
    #[validate(length(min = 1, message = "receiver screen name is required"))]
    pub receiver_screen_name: String,
    pub tip_amount_raw: RawAmount,
    #[serde(default)]
    pub tip_amount_text: String,
}

impl TipMessage {
    /// Client-side correlation token for the recipient at `index`.
    pub fn tip_id(&self, index: usize) -> String {
        format!("{}{}", self.id, index)
    }

    pub fn joined_text(&self) -> String {
        self.text.join(" ")
    }

    pub fn check(&self) -> AppResult<()> {
        self.validate().map_err(|e| invalid(&e))?;
        for recipient in &self.recipients {
            recipient.validate().map_err(|e| invalid(&e))?;
            if recipient.tip_amount_raw.is_zero() {
                return Err(AppError::InvalidInput(format!(
                    "tip to {} must be greater than zero",
                    recipient.receiver_screen_name
                )));
            }
        }
        Ok(())
    }
}

fn invalid(errors: &ValidationErrors) -> AppError {
    let message = errors
        .field_errors()
        .into_iter()
        .map(|(field, errors)| {
            let messages: Vec<String> = errors
                .iter()
                .map(|e| e.message.as_ref().map(|s| s.to_string()).unwrap_or_default())
                .collect();
            format!("{}: {}", field, messages.join(", "))
        })
        .collect::<Vec<String>>()
        .join("; ");

    AppError::InvalidInput(format!("Validation failed: {}", message))
}
