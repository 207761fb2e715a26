// Proof-of-work acquisition ahead of transfers and receives
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{info, instrument, warn};

use crate::error::{AppError, AppResult};
use crate::node::{LedgerClient, Work};

/// Bounds on work generation retries for one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkRetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Overall budget for all attempts and delays.
    pub timeout: Duration,
}

impl Default for WorkRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
            timeout: Duration::from_secs(60),
        }
    }
}

impl WorkRetryPolicy {
    /// Delay after the given failed attempt (1-based), doubling up to the cap.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Decides whether work must be supplied for an account's next block and
/// fetches it from the node.
pub struct WorkProvider {
    ledger: Arc<dyn LedgerClient>,
    policy: WorkRetryPolicy,
}

impl WorkProvider {
    pub fn new(ledger: Arc<dyn LedgerClient>, policy: WorkRetryPolicy) -> Self {
        Self { ledger, policy }
    }

    /// Work for the block following the account's frontier.
    ///
    /// `None` when the account has no frontier yet; the caller then submits
    /// without work and the node computes it. Dropping the future cancels the
    /// retry loop.
    #[instrument(skip(self))]
    pub async fn acquire_work(&self, account: &str) -> AppResult<Option<Work>> {
        let frontier = match self.ledger.frontier(account).await {
            Ok(hash) => hash,
            Err(e) => {
                info!("Error checking frontier, proceeding without work: {}", e);
                return Ok(None);
            }
        };

        info!("Generating work for frontier {}", frontier);
        self.generate_with_retry(&frontier).await.map(Some)
    }

    async fn generate_with_retry(&self, hash: &str) -> AppResult<Work> {
        let deadline = Instant::now() + self.policy.timeout;
        let mut last_error = String::from("no attempt made");

        for attempt in 1..=self.policy.max_attempts {
            match time::timeout_at(deadline, self.ledger.generate_work(hash)).await {
                Ok(Ok(work)) => {
                    info!("Work generated on attempt {}: {}", attempt, work);
                    return Ok(work);
                }
                Ok(Err(e)) => {
                    warn!(
                        "Error generating work (attempt {}/{}): {}",
                        attempt, self.policy.max_attempts, e
                    );
                    last_error = e.to_string();
                }
                Err(_) => return Err(self.timed_out(attempt)),
            }

            if attempt < self.policy.max_attempts {
                let delay = self.policy.backoff(attempt);
                if Instant::now() + delay >= deadline {
                    return Err(self.timed_out(attempt));
                }
                time::sleep(delay).await;
            }
        }

        Err(AppError::WorkGenerationFailed {
            attempts: self.policy.max_attempts,
            reason: last_error,
        })
    }

    fn timed_out(&self, attempts: u32) -> AppError {
        AppError::WorkGenerationFailed {
            attempts,
            reason: format!("timed out after {:?}", self.policy.timeout),
        }
    }
}
