use std::time::Duration;

use serde::Deserialize;

use crate::currency::Denomination;
use crate::error::{AppError, AppResult};
use crate::work::WorkRetryPolicy;

/// Process configuration. Built once in `main` and handed to each component.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_address: String,
    pub database_max_connections: u32,

    /// Ledger node RPC endpoint.
    pub node_url: String,
    /// Custodial wallet holding every bot-managed account.
    pub wallet: String,
    pub rpc_timeout_secs: u64,

    pub currency_symbol: String,
    pub currency_decimals: u32,

    pub work_max_attempts: u32,
    pub work_initial_backoff_ms: u64,
    pub work_max_backoff_ms: u64,
    pub work_timeout_secs: u64,
}

impl Config {
    /// Defaults, overridden by environment variables (`NODE_URL`, `WALLET`, ...).
    pub fn from_env() -> AppResult<Self> {
        dotenv::dotenv().ok();
        Self::load(config::Environment::default().try_parsing(true))
    }

    fn load<S>(source: S) -> AppResult<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let config: Config = config::Config::builder()
            .set_default("database_url", "postgresql://localhost/tipbot")?
            .set_default("bind_address", "0.0.0.0:8080")?
            .set_default("database_max_connections", 20)?
            .set_default("node_url", "")?
            .set_default("wallet", "")?
            .set_default("rpc_timeout_secs", 30)?
            .set_default("currency_symbol", "BANANO")?
            .set_default("currency_decimals", 29)?
            .set_default("work_max_attempts", 10)?
            .set_default("work_initial_backoff_ms", 200)?
            .set_default("work_max_backoff_ms", 5_000)?
            .set_default("work_timeout_secs", 60)?
            .add_source(source)
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.node_url.trim().is_empty() {
            return Err(AppError::Config("NODE_URL must be set".to_string()));
        }
        if self.wallet.trim().is_empty() {
            return Err(AppError::Config("WALLET must be set".to_string()));
        }
        if self.currency_decimals > Denomination::MAX_DECIMALS {
            return Err(AppError::Config(format!(
                "CURRENCY_DECIMALS must be at most {}, got {}",
                Denomination::MAX_DECIMALS,
                self.currency_decimals
            )));
        }
        if self.work_max_attempts == 0 {
            return Err(AppError::Config(
                "WORK_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }

    pub fn denomination(&self) -> Denomination {
        Denomination::new(self.currency_symbol.clone(), self.currency_decimals)
    }

    pub fn work_retry_policy(&self) -> WorkRetryPolicy {
        WorkRetryPolicy {
            max_attempts: self.work_max_attempts,
            initial_backoff: Duration::from_millis(self.work_initial_backoff_ms),
            max_backoff: Duration::from_millis(self.work_max_backoff_ms),
            timeout: Duration::from_secs(self.work_timeout_secs),
        }
    }
}
