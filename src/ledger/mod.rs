// Local record of users and settled tips
pub mod models;
pub mod repository;
pub mod tip_ledger;

pub use repository::{PgTipRepository, TipRepository};
pub use tip_ledger::TipLedger;
