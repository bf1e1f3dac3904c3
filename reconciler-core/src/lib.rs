//! reconciler-core: Shared infrastructure for the token reconciliation pipeline.
pub mod config;
pub mod error;
pub mod observability;

pub use anyhow;
pub use async_trait;
pub use serde;
pub use serde_json;
pub use tokio;
pub use tracing;
