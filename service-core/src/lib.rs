//! service-core: Shared infrastructure for the workshop workspace.
pub mod actor;
pub mod config;
pub mod error;
pub mod observability;

pub use async_trait;
pub use serde;
pub use serde_json;
pub use tokio;
pub use tracing;
pub use validator;
