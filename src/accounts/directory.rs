use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::error::AppResult;
use crate::ledger::models::{NewUser, User};
use crate::ledger::TipRepository;
use crate::node::LedgerClient;

/// Maps platform users to ledger accounts, opening an account on first use.
pub struct AccountDirectory {
    ledger: Arc<dyn LedgerClient>,
    repository: Arc<dyn TipRepository>,
    wallet: String,
    // Serializes first-time account creation within this process.
    creation_lock: Mutex<()>,
}

impl AccountDirectory {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        repository: Arc<dyn TipRepository>,
        wallet: String,
    ) -> Self {
        Self {
            ledger,
            repository,
            wallet,
            creation_lock: Mutex::new(()),
        }
    }

    pub async fn lookup(&self, user_id: i64) -> AppResult<Option<User>> {
        self.repository.find_user(user_id).await
    }

    /// Ledger account of `user_id`, created in the bot wallet if the user is new.
    #[instrument(skip(self))]
    pub async fn resolve_receiver(&self, user_id: i64, display_name: &str) -> AppResult<String> {
        if let Some(user) = self.repository.find_user(user_id).await? {
            return Ok(user.ledger_account);
        }

        let _guard = self.creation_lock.lock().await;

        // Another settlement may have created the user while we waited.
        if let Some(user) = self.repository.find_user(user_id).await? {
            return Ok(user.ledger_account);
        }

        let account = self.ledger.create_account(&self.wallet).await?;
        let (user, created) = self
            .repository
            .create_user(NewUser {
                user_id,
                display_name: display_name.to_string(),
                ledger_account: account.clone(),
            })
            .await?;

        if created {
            info!("Sender sent to a new receiving account. Created account {}", account);
        } else {
            warn!(
                "User {} already had account {}; new account {} is unused",
                user_id, user.ledger_account, account
            );
        }

        Ok(user.ledger_account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{LedgerCall, MemoryRepository, MockLedger, WALLET};

    fn directory(ledger: Arc<MockLedger>, repo: Arc<MemoryRepository>) -> AccountDirectory {
        AccountDirectory::new(ledger, repo, WALLET.to_string())
    }

    #[tokio::test]
    async fn test_known_user_returns_stored_account() {
        let ledger = Arc::new(MockLedger::new());
        let repo = Arc::new(MemoryRepository::new());
        repo.seed_user(7, "bob", "ban_bob").await;

        let account = directory(ledger.clone(), repo)
            .resolve_receiver(7, "bob")
            .await
            .unwrap();

        assert_eq!(account, "ban_bob");
        assert!(ledger.calls().is_empty());
    }

    #[tokio::test]
    async fn test_new_user_gets_exactly_one_account() {
        let ledger = Arc::new(MockLedger::new());
        let repo = Arc::new(MemoryRepository::new());
        let directory = directory(ledger.clone(), repo.clone());

        let first = directory.resolve_receiver(9, "carol").await.unwrap();
        let second = directory.resolve_receiver(9, "carol").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(ledger.count(|c| *c == LedgerCall::CreateAccount), 1);
        let users = repo.users().await;
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].ledger_account, first);
        assert_eq!(users[0].display_name, "carol");
        assert!(!users[0].registered);
    }

    #[tokio::test]
    async fn test_concurrent_first_tips_share_one_account() {
        let ledger = Arc::new(MockLedger::new());
        let repo = Arc::new(MemoryRepository::new());
        let directory = Arc::new(directory(ledger.clone(), repo.clone()));

        let (a, b) = tokio::join!(
            directory.resolve_receiver(11, "dave"),
            directory.resolve_receiver(11, "dave"),
        );

        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(ledger.count(|c| *c == LedgerCall::CreateAccount), 1);
        assert_eq!(repo.users().await.len(), 1);
    }
}
