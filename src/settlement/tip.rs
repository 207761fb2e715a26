use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info, instrument, warn};

use super::message::{TipMessage, TipRecipient};
use super::notification::Notification;
use super::receiver::PendingReceiver;
use crate::accounts::AccountDirectory;
use crate::currency::{Denomination, RawAmount};
use crate::error::{AppError, AppResult};
use crate::ledger::models::{NewTip, TipRecord};
use crate::ledger::{TipLedger, TipRepository};
use crate::node::{LedgerClient, Transfer};
use crate::work::{WorkProvider, WorkRetryPolicy};

/// Progress of one tip attempt. Each stage is entered only after the
/// previous one succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementStage {
    Initiated,
    SelfTipRejected,
    ReceiverResolved,
    WorkAcquired,
    TransferSent,
    Recorded,
    Notified,
    /// Settled; only the post-settlement refresh failed.
    NotifyFailed,
}

impl SettlementStage {
    pub fn is_settled(self) -> bool {
        matches!(
            self,
            SettlementStage::Recorded | SettlementStage::Notified | SettlementStage::NotifyFailed
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SettledTip {
    pub stage: SettlementStage,
    pub receiver_account: String,
    pub send_hash: String,
    pub tip: NewTip,
    pub notification: Option<Notification>,
}

/// Per-recipient result of a tip message.
#[derive(Debug, Clone, Serialize)]
pub struct TipOutcome {
    pub receiver_id: i64,
    pub receiver_screen_name: String,
    pub stage: SettlementStage,
    pub settled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver_account: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub send_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<RawAmount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<Notification>,
    /// Reply for the sender when the tip did not settle cleanly.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl TipOutcome {
    fn settled(recipient: &TipRecipient, settled: SettledTip) -> Self {
        Self {
            receiver_id: recipient.receiver_id,
            receiver_screen_name: recipient.receiver_screen_name.clone(),
            stage: settled.stage,
            settled: settled.stage.is_settled(),
            receiver_account: Some(settled.receiver_account),
            send_hash: Some(settled.send_hash),
            amount: Some(settled.tip.amount),
            notification: settled.notification,
            reply: None,
            error_code: None,
        }
    }

    fn failed(recipient: &TipRecipient, stage: SettlementStage, err: &AppError) -> Self {
        let send_hash = match err {
            AppError::RecordingFailed { send_hash, .. } => Some(send_hash.clone()),
            _ => None,
        };

        Self {
            receiver_id: recipient.receiver_id,
            receiver_screen_name: recipient.receiver_screen_name.clone(),
            stage,
            settled: false,
            receiver_account: None,
            send_hash,
            amount: None,
            notification: None,
            reply: Some(err.user_reply().to_string()),
            error_code: Some(err.error_code().to_string()),
        }
    }
}

/// Orchestrates a tip end to end: self-tip guard, receiver resolution, work,
/// transfer, record, then a best-effort balance refresh for the receiver.
pub struct TipSettlement {
    ledger: Arc<dyn LedgerClient>,
    directory: Arc<AccountDirectory>,
    work: Arc<WorkProvider>,
    receiver: Arc<PendingReceiver>,
    tips: Arc<TipLedger>,
    denomination: Denomination,
    wallet: String,
    // Held per sender account from work acquisition through send, so each
    // send's work matches the frontier it extends.
    sender_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TipSettlement {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        repository: Arc<dyn TipRepository>,
        wallet: String,
        work_policy: WorkRetryPolicy,
        denomination: Denomination,
    ) -> Self {
        let work = Arc::new(WorkProvider::new(ledger.clone(), work_policy));
        let directory = Arc::new(AccountDirectory::new(
            ledger.clone(),
            repository.clone(),
            wallet.clone(),
        ));
        let receiver = Arc::new(PendingReceiver::new(
            ledger.clone(),
            work.clone(),
            wallet.clone(),
        ));
        let tips = Arc::new(TipLedger::new(repository));

        Self {
            ledger,
            directory,
            work,
            receiver,
            tips,
            denomination,
            wallet,
            sender_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn directory(&self) -> &AccountDirectory {
        &self.directory
    }

    pub fn tip_ledger(&self) -> &TipLedger {
        &self.tips
    }

    pub fn denomination(&self) -> &Denomination {
        &self.denomination
    }

    /// Settle every recipient of a message in order. One recipient's failure
    /// does not stop the others.
    #[instrument(skip(self, message), fields(message_id = message.id, sender_id = message.sender_id))]
    pub async fn settle_message(&self, message: &TipMessage) -> Vec<TipOutcome> {
        let mut outcomes = Vec::with_capacity(message.recipients.len());

        for (index, recipient) in message.recipients.iter().enumerate() {
            let mut stage = SettlementStage::Initiated;
            let outcome = match self.run(message, index, &mut stage).await {
                Ok(settled) => TipOutcome::settled(recipient, settled),
                Err(e) => {
                    if e.transfer_submitted() {
                        error!(
                            "Tip {} moved funds but is not recorded, needs reconciliation: {}",
                            message.tip_id(index),
                            e
                        );
                    } else if e.is_fault() {
                        error!("Tip {} failed: {}", message.tip_id(index), e);
                    }
                    TipOutcome::failed(recipient, stage, &e)
                }
            };
            outcomes.push(outcome);
        }

        outcomes
    }

    /// Settle the tip to the recipient at `index`.
    ///
    /// Errors before the transfer mean nothing moved. `RecordingFailed` means
    /// the transfer went through but the tip row is missing. Failures after
    /// recording are logged and reported as `NotifyFailed`, never as errors.
    #[instrument(skip(self, message), fields(message_id = message.id))]
    pub async fn settle(&self, message: &TipMessage, index: usize) -> AppResult<SettledTip> {
        let mut stage = SettlementStage::Initiated;
        self.run(message, index, &mut stage).await
    }

    /// `stage` is left at the last stage the attempt reached.
    async fn run(
        &self,
        message: &TipMessage,
        index: usize,
        stage: &mut SettlementStage,
    ) -> AppResult<SettledTip> {
        let recipient = message.recipients.get(index).ok_or_else(|| {
            AppError::InvalidInput(format!("message {} has no recipient {}", message.id, index))
        })?;
        info!("Sending tip to {}", recipient.receiver_screen_name);
        advance(stage, SettlementStage::Initiated);

        if recipient.receiver_id == message.sender_id {
            info!("User tried to tip themself");
            advance(stage, SettlementStage::SelfTipRejected);
            return Err(AppError::SelfTipRejected);
        }

        let receiver_account = self
            .directory
            .resolve_receiver(recipient.receiver_id, &recipient.receiver_screen_name)
            .await?;
        advance(stage, SettlementStage::ReceiverResolved);

        let tip_id = message.tip_id(index);
        let sender_guard = self.lock_sender(&message.sender_account).await;
        let work = self.work.acquire_work(&message.sender_account).await?;
        advance(stage, SettlementStage::WorkAcquired);

        let transfer = Transfer {
            wallet: self.wallet.clone(),
            source: message.sender_account.clone(),
            destination: receiver_account.clone(),
            amount: recipient.tip_amount_raw,
            id: format!("tip-{}", tip_id),
            work,
        };
        info!(
            "Sending tip: from {} to {} amount {} id {} work {:?}",
            transfer.source, transfer.destination, transfer.amount, transfer.id, transfer.work
        );

        let send_hash = self.ledger.send(&transfer).await?;
        drop(sender_guard);
        advance(stage, SettlementStage::TransferSent);

        let record = TipRecord {
            message_id: message.id,
            tip_id,
            sender_id: message.sender_id,
            receiver_id: recipient.receiver_id,
            text: message.joined_text(),
            amount: recipient.tip_amount_raw,
        };
        let tip = self
            .tips
            .record(&record)
            .await
            .map_err(|e| AppError::RecordingFailed {
                send_hash: send_hash.clone(),
                source: Box::new(e),
            })?;
        advance(stage, SettlementStage::Recorded);

        let (outcome, notification) = match self
            .receiver_notification(message, recipient, &receiver_account)
            .await
        {
            Ok(notification) => (SettlementStage::Notified, Some(notification)),
            Err(e) => {
                warn!(
                    "Error receiving new tip, the new account may not be registered for work: {}",
                    e
                );
                (SettlementStage::NotifyFailed, None)
            }
        };
        advance(stage, outcome);

        info!(
            "Tip sent to {} via hash {}",
            recipient.receiver_screen_name, send_hash
        );

        Ok(SettledTip {
            stage: outcome,
            receiver_account,
            send_hash,
            tip,
            notification,
        })
    }

    async fn lock_sender(&self, account: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .sender_locks
            .lock()
            .await
            .entry(account.to_string())
            .or_default()
            .clone();
        lock.lock_owned().await
    }

    /// Receive the tip into the receiver's account and build the message
    /// telling them their new balance.
    async fn receiver_notification(
        &self,
        message: &TipMessage,
        recipient: &TipRecipient,
        receiver_account: &str,
    ) -> AppResult<Notification> {
        self.receiver.drain(receiver_account).await?;
        let balance = self.ledger.balance(receiver_account).await?;

        let tip_amount = if recipient.tip_amount_text.trim().is_empty() {
            self.denomination.format(recipient.tip_amount_raw)
        } else {
            recipient.tip_amount_text.clone()
        };

        Ok(Notification::tip_received(
            recipient.receiver_id,
            &message.sender_screen_name,
            tip_amount,
            self.denomination.format(balance),
            self.denomination.symbol(),
        ))
    }
}

fn advance(current: &mut SettlementStage, next: SettlementStage) {
    *current = next;
    debug!(stage = ?next, "settlement stage");
}
