use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument};

use super::models::*;
use crate::currency::RawAmount;
use crate::error::{AppError, AppResult};

/// Remote ledger node operations used by the settlement core.
///
/// Every call is a network round trip and may fail with
/// `AppError::LedgerUnavailable`.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Unconfirmed incoming blocks waiting on `account`.
    async fn pending(&self, account: &str) -> AppResult<Vec<String>>;

    /// Hash of the latest confirmed block. `AccountNotFound` when the account
    /// has no history yet.
    async fn frontier(&self, account: &str) -> AppResult<String>;

    async fn generate_work(&self, hash: &str) -> AppResult<Work>;

    /// Confirm one pending block. Without `work` the node computes it.
    async fn receive(
        &self,
        wallet: &str,
        account: &str,
        block: &str,
        work: Option<&Work>,
    ) -> AppResult<()>;

    /// Submit a transfer and return its block hash.
    async fn send(&self, transfer: &Transfer) -> AppResult<String>;

    async fn balance(&self, account: &str) -> AppResult<RawAmount>;

    async fn create_account(&self, wallet: &str) -> AppResult<String>;
}

/// JSON-RPC client for a Nano-family node.
pub struct NodeRpcClient {
    url: String,
    client: reqwest::Client,
}

impl NodeRpcClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }

    async fn call<T: DeserializeOwned>(&self, request: RpcRequest<'_>) -> AppResult<T> {
        let action = request.action();
        let response = self.client.post(&self.url).json(&request).send().await?;
        let status = response.status();

        let body: Value = response.json().await.map_err(|e| {
            AppError::LedgerUnavailable(format!("{} returned HTTP {}: {}", action, status, e))
        })?;
        debug!(action, %status, "node response received");

        if !status.is_success() && body.get("error").is_none() {
            return Err(AppError::LedgerUnavailable(format!(
                "{} returned HTTP {}",
                action, status
            )));
        }

        parse_response(action, body)
    }
}

#[async_trait]
impl LedgerClient for NodeRpcClient {
    #[instrument(skip(self))]
    async fn pending(&self, account: &str) -> AppResult<Vec<String>> {
        let response: PendingResponse = self.call(RpcRequest::Pending { account }).await?;
        Ok(response.blocks)
    }

    #[instrument(skip(self))]
    async fn frontier(&self, account: &str) -> AppResult<String> {
        let mut response: FrontiersResponse = self
            .call(RpcRequest::AccountsFrontiers {
                accounts: vec![account],
            })
            .await?;

        response
            .frontiers
            .remove(account)
            .ok_or_else(|| AppError::AccountNotFound(format!("no frontier for {}", account)))
    }

    #[instrument(skip(self))]
    async fn generate_work(&self, hash: &str) -> AppResult<Work> {
        let response: WorkResponse = self
            .call(RpcRequest::WorkGenerate {
                hash,
                use_peers: "true",
            })
            .await?;
        Ok(response.work)
    }

    #[instrument(skip(self, wallet, work))]
    async fn receive(
        &self,
        wallet: &str,
        account: &str,
        block: &str,
        work: Option<&Work>,
    ) -> AppResult<()> {
        let _: BlockResponse = self
            .call(RpcRequest::Receive {
                wallet,
                account,
                block,
                work: work.map(Work::as_str),
            })
            .await?;
        Ok(())
    }

    #[instrument(skip(self, transfer), fields(id = %transfer.id, amount = %transfer.amount))]
    async fn send(&self, transfer: &Transfer) -> AppResult<String> {
        let response: BlockResponse = self
            .call(RpcRequest::Send {
                wallet: &transfer.wallet,
                source: &transfer.source,
                destination: &transfer.destination,
                amount: transfer.amount,
                id: &transfer.id,
                work: transfer.work.as_ref().map(Work::as_str),
            })
            .await?;
        Ok(response.block)
    }

    #[instrument(skip(self))]
    async fn balance(&self, account: &str) -> AppResult<RawAmount> {
        let response: BalanceResponse = self.call(RpcRequest::AccountBalance { account }).await?;
        Ok(response.balance)
    }

    #[instrument(skip(self, wallet))]
    async fn create_account(&self, wallet: &str) -> AppResult<String> {
        let response: AccountResponse = self
            .call(RpcRequest::AccountCreate {
                wallet,
                work: "true",
            })
            .await?;
        Ok(response.account)
    }
}
