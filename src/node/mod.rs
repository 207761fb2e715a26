// Ledger node RPC surface
pub mod client;
pub mod models;

pub use client::{LedgerClient, NodeRpcClient};
pub use models::{Transfer, Work};
