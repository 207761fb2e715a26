// Tip settlement: moves funds for a tip and records it
pub mod message;
pub mod notification;
pub mod receiver;
pub mod tip;

pub use message::TipMessage;
pub use tip::{TipOutcome, TipSettlement};
