pub mod error;
pub mod manager;

pub use error::{ResourceError, ResourceResult};
pub use manager::{ResourceManager, ResourceSlot};
