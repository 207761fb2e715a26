use std::collections::HashMap;
use std::fmt;

use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::currency::RawAmount;
use crate::error::{AppError, AppResult};

/// Proof-of-work token for the next block of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Work(pub String);

impl Work {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Work {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A transfer from one wallet-held account to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub wallet: String,
    pub source: String,
    pub destination: String,
    pub amount: RawAmount,
    /// Correlation id; the node treats a repeated id as the same send.
    pub id: String,
    pub work: Option<Work>,
}

/// Ledger node RPC request. The `action` field selects the call.
#[derive(Debug, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RpcRequest<'a> {
    Pending {
        account: &'a str,
    },
    AccountsFrontiers {
        accounts: Vec<&'a str>,
    },
    WorkGenerate {
        hash: &'a str,
        use_peers: &'static str,
    },
    Receive {
        wallet: &'a str,
        account: &'a str,
        block: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        work: Option<&'a str>,
    },
    Send {
        wallet: &'a str,
        source: &'a str,
        destination: &'a str,
        amount: RawAmount,
        id: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        work: Option<&'a str>,
    },
    AccountBalance {
        account: &'a str,
    },
    AccountCreate {
        wallet: &'a str,
        work: &'static str,
    },
}

impl RpcRequest<'_> {
    pub fn action(&self) -> &'static str {
        match self {
            RpcRequest::Pending { .. } => "pending",
            RpcRequest::AccountsFrontiers { .. } => "accounts_frontiers",
            RpcRequest::WorkGenerate { .. } => "work_generate",
            RpcRequest::Receive { .. } => "receive",
            RpcRequest::Send { .. } => "send",
            RpcRequest::AccountBalance { .. } => "account_balance",
            RpcRequest::AccountCreate { .. } => "account_create",
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PendingResponse {
    #[serde(deserialize_with = "blocks_or_empty")]
    pub blocks: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct FrontiersResponse {
    #[serde(deserialize_with = "map_or_empty")]
    pub frontiers: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct WorkResponse {
    pub work: Work,
}

#[derive(Debug, Deserialize)]
pub struct BlockResponse {
    pub block: String,
}

#[derive(Debug, Deserialize)]
pub struct BalanceResponse {
    pub balance: RawAmount,
}

#[derive(Debug, Deserialize)]
pub struct AccountResponse {
    pub account: String,
}

/// The node answers an empty queue with `""` instead of `[]`, and with a
/// block-to-amount object when sources are requested.
fn blocks_or_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Blocks {
        List(Vec<String>),
        Detailed(serde_json::Map<String, Value>),
        Empty(String),
    }

    Ok(match Blocks::deserialize(deserializer)? {
        Blocks::List(blocks) => blocks,
        Blocks::Detailed(map) => map.into_iter().map(|(hash, _)| hash).collect(),
        Blocks::Empty(_) => Vec::new(),
    })
}

fn map_or_empty<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<HashMap<String, String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Frontiers {
        Map(HashMap<String, String>),
        Empty(String),
    }

    Ok(match Frontiers::deserialize(deserializer)? {
        Frontiers::Map(map) => map,
        Frontiers::Empty(_) => HashMap::new(),
    })
}

/// Decode a node response body, turning an `error` field into a typed error.
pub fn parse_response<T: DeserializeOwned>(action: &str, body: Value) -> AppResult<T> {
    if let Some(message) = body.get("error").and_then(Value::as_str) {
        return Err(node_error(action, message));
    }

    serde_json::from_value(body).map_err(|e| {
        AppError::LedgerUnavailable(format!("unexpected {} response: {}", action, e))
    })
}

fn node_error(action: &str, message: &str) -> AppError {
    if message.eq_ignore_ascii_case("account not found") {
        AppError::AccountNotFound(format!("{}: {}", action, message))
    } else {
        AppError::LedgerUnavailable(format!("{}: {}", action, message))
    }
}
