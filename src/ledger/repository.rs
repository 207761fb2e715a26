use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{info, warn};

use super::models::*;
use crate::error::{AppError, AppResult};

/// Storage seam for users and tips.
#[async_trait]
pub trait TipRepository: Send + Sync {
    async fn find_user(&self, user_id: i64) -> AppResult<Option<User>>;

    /// Insert the user unless a row for `user_id` already exists. Returns the
    /// stored row and whether this call created it.
    async fn create_user(&self, user: NewUser) -> AppResult<(User, bool)>;

    /// Insert a tip row, returning the number of rows affected.
    async fn insert_tip(&self, tip: &NewTip) -> AppResult<u64>;

    /// Tips sent or received by `user_id`, newest first.
    async fn tips_for_user(&self, user_id: i64, limit: i64) -> AppResult<Vec<Tip>>;
}

/// Postgres repository over the `users` and `tip_list` tables
pub struct PgTipRepository {
    pub pool: PgPool,
}

impl PgTipRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TipRepository for PgTipRepository {
    async fn find_user(&self, user_id: i64) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT user_id, user_name AS display_name, account AS ledger_account,
                   (register <> 0) AS registered, created_ts AS created_at
            FROM users
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn create_user(&self, user: NewUser) -> AppResult<(User, bool)> {
        let inserted = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (user_id, user_name, account, register, created_ts)
            VALUES ($1, $2, $3, 0, NOW())
            ON CONFLICT (user_id) DO NOTHING
            RETURNING user_id, user_name AS display_name, account AS ledger_account,
                      (register <> 0) AS registered, created_ts AS created_at
            "#,
        )
        .bind(user.user_id)
        .bind(&user.display_name)
        .bind(&user.ledger_account)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(created) = inserted {
            info!("Created user {} with account {}", created.user_id, created.ledger_account);
            return Ok((created, true));
        }

        warn!(
            "User {} was created concurrently, account {} left unassigned",
            user.user_id, user.ledger_account
        );
        let existing = self.find_user(user.user_id).await?.ok_or_else(|| {
            AppError::Persistence(format!(
                "user {} conflicted on insert but cannot be read back",
                user.user_id
            ))
        })?;
        Ok((existing, false))
    }

    async fn insert_tip(&self, tip: &NewTip) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            INSERT INTO tip_list (
                dm_id, tx_id, processed, sender_id, receiver_id, dm_text, amount, created_ts
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
            "#,
        )
        .bind(tip.message_id)
        .bind(&tip.tip_id)
        .bind(tip.status)
        .bind(tip.sender_id)
        .bind(tip.receiver_id)
        .bind(&tip.text)
        .bind(to_numeric(tip.amount)?)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn tips_for_user(&self, user_id: i64, limit: i64) -> AppResult<Vec<Tip>> {
        let rows = sqlx::query_as::<_, TipRow>(
            r#"
            SELECT id, dm_id AS message_id, tx_id AS tip_id, processed AS status,
                   sender_id, receiver_id, dm_text AS text, amount, created_ts AS created_at
            FROM tip_list
            WHERE sender_id = $1 OR receiver_id = $1
            ORDER BY created_ts DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Tip::try_from).collect()
    }
}
