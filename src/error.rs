use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use sqlx::migrate::MigrateError;
use thiserror::Error;

pub const SELF_TIP_REPLY: &str =
    "Self tipping is not allowed.  Please use this bot to tip other users!";
pub const TIP_FAILED_REPLY: &str =
    "There was an error processing your tip.  Please try again later.";
pub const TIP_UNRECORDED_REPLY: &str =
    "Your tip was sent but could not be saved to the tip history.  Please do not resend it.";

/// Top-level error type for the settlement service
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Ledger node unavailable: {0}")]
    LedgerUnavailable(String),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Work generation failed after {attempts} attempts: {reason}")]
    WorkGenerationFailed { attempts: u32, reason: String },

    #[error("Self tipping is not allowed")]
    SelfTipRejected,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Persistence failure: {0}")]
    Persistence(String),

    /// The transfer is already on the ledger; only the local record is missing.
    #[error("Tip sent in block {send_hash} but not recorded: {source}")]
    RecordingFailed {
        send_hash: String,
        #[source]
        source: Box<AppError>,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether the error reflects a fault, as opposed to rejected user input.
    pub fn is_fault(&self) -> bool {
        !matches!(self, AppError::SelfTipRejected | AppError::InvalidInput(_))
    }

    /// Whether funds may already have moved on the ledger.
    pub fn transfer_submitted(&self) -> bool {
        matches!(self, AppError::RecordingFailed { .. })
    }

    /// Text for the tipping user.
    pub fn user_reply(&self) -> &'static str {
        match self {
            AppError::SelfTipRejected => SELF_TIP_REPLY,
            AppError::RecordingFailed { .. } => TIP_UNRECORDED_REPLY,
            _ => TIP_FAILED_REPLY,
        }
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::LedgerUnavailable(_) => (StatusCode::BAD_GATEWAY, "LEDGER_UNAVAILABLE"),
            AppError::AccountNotFound(_) => (StatusCode::NOT_FOUND, "ACCOUNT_NOT_FOUND"),
            AppError::WorkGenerationFailed { .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, "WORK_GENERATION_FAILED")
            }
            AppError::SelfTipRejected => (StatusCode::UNPROCESSABLE_ENTITY, "SELF_TIP_REJECTED"),
            AppError::Database(_) | AppError::Persistence(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR")
            }
            AppError::RecordingFailed { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "TIP_NOT_RECORDED")
            }
            AppError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
            AppError::Config(_) | AppError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        }
    }

    pub fn error_code(&self) -> &'static str {
        self.status_and_code().1
    }
}

/// API error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.status_and_code();

        let (message, details) = match &self {
            AppError::Database(_) => ("A database error occurred".to_string(), None),
            AppError::RecordingFailed { send_hash, .. } => (
                self.to_string(),
                Some(serde_json::json!({ "send_hash": send_hash })),
            ),
            AppError::WorkGenerationFailed { attempts, .. } => (
                self.to_string(),
                Some(serde_json::json!({ "attempts": attempts })),
            ),
            _ => (self.to_string(), None),
        };

        let body = Json(ErrorResponse {
            error: message,
            error_code: error_code.to_string(),
            details,
        });

        (status, body).into_response()
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        AppError::LedgerUnavailable(format!("HTTP request error: {:?}", error))
    }
}

impl From<MigrateError> for AppError {
    fn from(error: MigrateError) -> Self {
        AppError::Internal(format!("Migration error: {:?}", error))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(error: config::ConfigError) -> Self {
        AppError::Config(error.to_string())
    }
}

/// Result type alias for the application
pub type AppResult<T> = Result<T, AppError>;
