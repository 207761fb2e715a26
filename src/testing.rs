// In-memory collaborators for unit tests
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::currency::RawAmount;
use crate::error::{AppError, AppResult};
use crate::ledger::models::*;
use crate::ledger::TipRepository;
use crate::node::{LedgerClient, Transfer, Work};

pub const WALLET: &str = "TEST-WALLET";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerCall {
    Pending(String),
    Frontier(String),
    GenerateWork(String),
    Receive {
        account: String,
        block: String,
        work: Option<Work>,
    },
    Send(Transfer),
    Balance(String),
    CreateAccount,
}

#[derive(Default)]
struct NodeState {
    calls: Vec<LedgerCall>,
    frontiers: HashMap<String, String>,
    pending: HashMap<String, Vec<String>>,
    block_amounts: HashMap<String, u128>,
    balances: HashMap<String, u128>,
    work_failures: u32,
    fail_pending: bool,
    fail_send: bool,
    fail_balance: bool,
    next_id: u32,
}

/// Ledger node double: moves funds between in-memory accounts and records
/// every call in order.
#[derive(Default)]
pub struct MockLedger {
    state: Mutex<NodeState>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut NodeState) -> T) -> T {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    /// Give `account` a confirmed history and balance.
    pub fn open_account(&self, account: &str, balance: u128) {
        self.with_state(|s| {
            s.frontiers
                .insert(account.to_string(), format!("FRONTIER_{}", account));
            s.balances.insert(account.to_string(), balance);
        });
    }

    pub fn add_pending(&self, account: &str, block: &str, amount: u128) {
        self.with_state(|s| {
            s.pending
                .entry(account.to_string())
                .or_default()
                .push(block.to_string());
            s.block_amounts.insert(block.to_string(), amount);
        });
    }

    pub fn fail_work_times(&self, failures: u32) {
        self.with_state(|s| s.work_failures = failures);
    }

    pub fn fail_pending(&self) {
        self.with_state(|s| s.fail_pending = true);
    }

    pub fn fail_send(&self) {
        self.with_state(|s| s.fail_send = true);
    }

    pub fn fail_balance(&self) {
        self.with_state(|s| s.fail_balance = true);
    }

    pub fn calls(&self) -> Vec<LedgerCall> {
        self.with_state(|s| s.calls.clone())
    }

    pub fn sends(&self) -> Vec<Transfer> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                LedgerCall::Send(transfer) => Some(transfer),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, matches: impl Fn(&LedgerCall) -> bool) -> usize {
        self.calls().iter().filter(|call| matches(call)).count()
    }

    pub fn balance_of(&self, account: &str) -> u128 {
        self.with_state(|s| s.balances.get(account).copied().unwrap_or(0))
    }

    pub fn pending_of(&self, account: &str) -> Vec<String> {
        self.with_state(|s| s.pending.get(account).cloned().unwrap_or_default())
    }
}

// Yield on every node call so concurrent settlements interleave.
async fn suspend() {
    tokio::task::yield_now().await;
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn pending(&self, account: &str) -> AppResult<Vec<String>> {
        suspend().await;
        self.with_state(|s| {
            s.calls.push(LedgerCall::Pending(account.to_string()));
            if s.fail_pending {
                return Err(AppError::LedgerUnavailable("pending: connection refused".into()));
            }
            Ok(s.pending.get(account).cloned().unwrap_or_default())
        })
    }

    async fn frontier(&self, account: &str) -> AppResult<String> {
        suspend().await;
        self.with_state(|s| {
            s.calls.push(LedgerCall::Frontier(account.to_string()));
            s.frontiers
                .get(account)
                .cloned()
                .ok_or_else(|| AppError::AccountNotFound(format!("no frontier for {}", account)))
        })
    }

    async fn generate_work(&self, hash: &str) -> AppResult<Work> {
        suspend().await;
        self.with_state(|s| {
            s.calls.push(LedgerCall::GenerateWork(hash.to_string()));
            if s.work_failures > 0 {
                s.work_failures -= 1;
                return Err(AppError::LedgerUnavailable("work_generate: Cancelled".into()));
            }
            Ok(Work(format!("WORK_{}", hash)))
        })
    }

    async fn receive(
        &self,
        _wallet: &str,
        account: &str,
        block: &str,
        work: Option<&Work>,
    ) -> AppResult<()> {
        suspend().await;
        self.with_state(|s| {
            s.calls.push(LedgerCall::Receive {
                account: account.to_string(),
                block: block.to_string(),
                work: work.cloned(),
            });
            let queue = s.pending.entry(account.to_string()).or_default();
            let position = queue
                .iter()
                .position(|b| b == block)
                .ok_or_else(|| AppError::LedgerUnavailable(format!("receive: unknown block {}", block)))?;
            queue.remove(position);

            let amount = s.block_amounts.remove(block).unwrap_or(0);
            *s.balances.entry(account.to_string()).or_default() += amount;
            s.frontiers.insert(account.to_string(), block.to_string());
            Ok(())
        })
    }

    async fn send(&self, transfer: &Transfer) -> AppResult<String> {
        suspend().await;
        self.with_state(|s| {
            s.calls.push(LedgerCall::Send(transfer.clone()));
            if s.fail_send {
                return Err(AppError::LedgerUnavailable("send: Insufficient balance".into()));
            }
            s.next_id += 1;
            let hash = format!("SEND_{}", s.next_id);
            let source = s.balances.entry(transfer.source.clone()).or_default();
            *source = source.saturating_sub(transfer.amount.get());
            s.frontiers.insert(transfer.source.clone(), hash.clone());
            s.pending
                .entry(transfer.destination.clone())
                .or_default()
                .push(hash.clone());
            s.block_amounts.insert(hash.clone(), transfer.amount.get());
            Ok(hash)
        })
    }

    async fn balance(&self, account: &str) -> AppResult<RawAmount> {
        suspend().await;
        self.with_state(|s| {
            s.calls.push(LedgerCall::Balance(account.to_string()));
            if s.fail_balance {
                return Err(AppError::LedgerUnavailable("account_balance: timeout".into()));
            }
            Ok(RawAmount::new(s.balances.get(account).copied().unwrap_or(0)))
        })
    }

    async fn create_account(&self, _wallet: &str) -> AppResult<String> {
        suspend().await;
        self.with_state(|s| {
            s.calls.push(LedgerCall::CreateAccount);
            s.next_id += 1;
            Ok(format!("ban_new{}", s.next_id))
        })
    }
}

fn stored(user: NewUser) -> User {
    User {
        user_id: user.user_id,
        display_name: user.display_name,
        ledger_account: user.ledger_account,
        registered: false,
        created_at: Utc::now(),
    }
}

/// Repository double backed by maps, counting every call.
pub struct MemoryRepository {
    users: RwLock<HashMap<i64, User>>,
    tips: RwLock<Vec<Tip>>,
    fail_tip_inserts: AtomicBool,
    calls: AtomicUsize,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            tips: RwLock::new(Vec::new()),
            fail_tip_inserts: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    pub async fn seed_user(&self, user_id: i64, name: &str, account: &str) {
        let user = stored(NewUser {
            user_id,
            display_name: name.to_string(),
            ledger_account: account.to_string(),
        });
        self.users.write().await.insert(user_id, user);
    }

    /// Inserts report zero affected rows from now on.
    pub fn fail_tip_inserts(&self) {
        self.fail_tip_inserts.store(true, Ordering::SeqCst);
    }

    pub async fn users(&self) -> Vec<User> {
        self.users.read().await.values().cloned().collect()
    }

    pub async fn tips(&self) -> Vec<Tip> {
        self.tips.read().await.clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TipRepository for MemoryRepository {
    async fn find_user(&self, user_id: i64) -> AppResult<Option<User>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.users.read().await.get(&user_id).cloned())
    }

    async fn create_user(&self, user: NewUser) -> AppResult<(User, bool)> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut users = self.users.write().await;
        if let Some(existing) = users.get(&user.user_id) {
            return Ok((existing.clone(), false));
        }
        let created = stored(user);
        users.insert(created.user_id, created.clone());
        Ok((created, true))
    }

    async fn insert_tip(&self, tip: &NewTip) -> AppResult<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_tip_inserts.load(Ordering::SeqCst) {
            return Ok(0);
        }
        let mut tips = self.tips.write().await;
        let id = tips.len() as i64 + 1;
        tips.push(Tip {
            id,
            message_id: tip.message_id,
            tip_id: tip.tip_id.clone(),
            status: tip.status,
            sender_id: tip.sender_id,
            receiver_id: tip.receiver_id,
            text: tip.text.clone(),
            amount: tip.amount,
            created_at: Utc::now(),
        });
        Ok(1)
    }

    async fn tips_for_user(&self, user_id: i64, limit: i64) -> AppResult<Vec<Tip>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let tips = self.tips.read().await;
        Ok(tips
            .iter()
            .rev()
            .filter(|t| t.sender_id == user_id || t.receiver_id == user_id)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}
