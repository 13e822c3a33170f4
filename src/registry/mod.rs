pub mod store;
pub mod types;

pub use store::TransferRegistry;
pub use types::{parts_for, TransferSnapshot, TransferState};
