use std::sync::Arc;

use tracing::{error, info, instrument};

use super::models::*;
use super::repository::TipRepository;
use crate::error::{AppError, AppResult};

/// Durable record of settled tips.
pub struct TipLedger {
    repository: Arc<dyn TipRepository>,
}

impl TipLedger {
    pub fn new(repository: Arc<dyn TipRepository>) -> Self {
        Self { repository }
    }

    /// Insert the tip row for a transfer that has already been submitted.
    ///
    /// Both users must already exist. Anything other than exactly one inserted
    /// row is a failure.
    #[instrument(skip(self, record), fields(tip_id = %record.tip_id))]
    pub async fn record(&self, record: &TipRecord) -> AppResult<NewTip> {
        info!("Inserting tip into DB");

        let result = self.insert(record).await;
        if let Err(e) = &result {
            error!("Failed to record tip {}: {}", record.tip_id, e);
        }
        result
    }

    async fn insert(&self, record: &TipRecord) -> AppResult<NewTip> {
        let sender = self
            .repository
            .find_user(record.sender_id)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(format!("sender {}", record.sender_id)))?;
        let receiver = self
            .repository
            .find_user(record.receiver_id)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(format!("receiver {}", record.receiver_id)))?;

        let tip = NewTip {
            message_id: record.message_id,
            tip_id: record.tip_id.clone(),
            status: TIP_STATUS_SENT,
            sender_id: sender.user_id,
            receiver_id: receiver.user_id,
            text: strip_markup(&record.text),
            amount: record.amount,
        };

        let affected = self.repository.insert_tip(&tip).await?;
        if affected != 1 {
            return Err(AppError::Persistence(format!(
                "Couldn't insert tip {}: {} rows affected",
                record.message_id, affected
            )));
        }

        Ok(tip)
    }

    pub async fn history(&self, user_id: i64, limit: i64) -> AppResult<Vec<Tip>> {
        self.repository.tips_for_user(user_id, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::RawAmount;
    use crate::testing::MemoryRepository;

    fn record(sender_id: i64, receiver_id: i64) -> TipRecord {
        TipRecord {
            message_id: 555,
            tip_id: "5550".to_string(),
            sender_id,
            receiver_id,
            text: "!tip @bob 100".to_string(),
            amount: RawAmount::new(100),
        }
    }

    #[tokio::test]
    async fn test_record_inserts_stripped_sent_tip() {
        let repo = Arc::new(MemoryRepository::new());
        repo.seed_user(1, "alice", "ban_alice").await;
        repo.seed_user(2, "bob", "ban_bob").await;
        let ledger = TipLedger::new(repo.clone());

        let tip = ledger.record(&record(1, 2)).await.unwrap();

        assert_eq!(tip.text, "tip bob 100");
        assert_eq!(tip.status, TIP_STATUS_SENT);
        let stored = repo.tips().await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].amount, RawAmount::new(100));
        assert_eq!(stored[0].sender_id, 1);
        assert_eq!(stored[0].receiver_id, 2);
    }

    #[tokio::test]
    async fn test_record_requires_both_users() {
        let repo = Arc::new(MemoryRepository::new());
        repo.seed_user(1, "alice", "ban_alice").await;
        let ledger = TipLedger::new(repo.clone());

        let err = ledger.record(&record(1, 2)).await.unwrap_err();

        assert!(matches!(err, AppError::AccountNotFound(_)));
        assert!(repo.tips().await.is_empty());
    }

    #[tokio::test]
    async fn test_record_fails_when_no_row_is_inserted() {
        let repo = Arc::new(MemoryRepository::new());
        repo.seed_user(1, "alice", "ban_alice").await;
        repo.seed_user(2, "bob", "ban_bob").await;
        repo.fail_tip_inserts();
        let ledger = TipLedger::new(repo.clone());

        let err = ledger.record(&record(1, 2)).await.unwrap_err();

        assert!(matches!(err, AppError::Persistence(_)));
    }

    #[tokio::test]
    async fn test_history_lists_sent_and_received() {
        let repo = Arc::new(MemoryRepository::new());
        repo.seed_user(1, "alice", "ban_alice").await;
        repo.seed_user(2, "bob", "ban_bob").await;
        repo.seed_user(3, "carol", "ban_carol").await;
        let ledger = TipLedger::new(repo.clone());

        ledger.record(&record(1, 2)).await.unwrap();
        ledger.record(&record(2, 3)).await.unwrap();
        ledger.record(&record(3, 1)).await.unwrap();

        let bob = ledger.history(2, 10).await.unwrap();
        assert_eq!(bob.len(), 2);
        assert_eq!(ledger.history(2, 1).await.unwrap().len(), 1);
    }
}
