// Platform identity to ledger account mapping
pub mod directory;

pub use directory::AccountDirectory;
