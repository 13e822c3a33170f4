mod manager;
mod types;

pub use manager::TransferManager;
pub use types::TransferOutcome;
