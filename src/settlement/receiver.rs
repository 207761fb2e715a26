// Pending receiver - confirms incoming transfers into an account's balance
//
// Drain flow:
// 1. Ask the node for the account's pending blocks
// 2. For each block, acquire work (or let the node compute it)
// 3. Receive the block into the account
//
// A failure stops the drain. Blocks received before it stay received.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::error::AppResult;
use crate::node::LedgerClient;
use crate::work::WorkProvider;

pub struct PendingReceiver {
    ledger: Arc<dyn LedgerClient>,
    work: Arc<WorkProvider>,
    wallet: String,
}

impl PendingReceiver {
    pub fn new(ledger: Arc<dyn LedgerClient>, work: Arc<WorkProvider>, wallet: String) -> Self {
        Self {
            ledger,
            work,
            wallet,
        }
    }

    /// Receive every pending block of `account`, returning how many were received.
    #[instrument(skip(self))]
    pub async fn drain(&self, account: &str) -> AppResult<usize> {
        let blocks = self.ledger.pending(account).await?;

        if blocks.is_empty() {
            info!("No blocks to receive");
            return Ok(0);
        }

        info!("📥 Found {} pending blocks", blocks.len());

        for block in &blocks {
            let work = self.work.acquire_work(account).await?;
            if work.is_some() {
                info!("Processing block {} with work", block);
            } else {
                info!("Processing block {} without work", block);
            }

            self.ledger
                .receive(&self.wallet, account, block, work.as_ref())
                .await?;
            info!("✓ Block {} received", block);
        }

        Ok(blocks.len())
    }
}
