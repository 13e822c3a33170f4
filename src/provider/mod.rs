pub mod direct;
pub mod error;
pub mod registry;
pub mod types;

pub use direct::DirectLinkProvider;
pub use error::{ProviderError, ProviderResult};
pub use registry::ProviderRegistry;
pub use types::{MediaAttributes, MediaDescriptor, Provider, ResolveOptions, Resolved};
