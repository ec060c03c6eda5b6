//! ABOUTME: Scoped key-value execution context with token-window enforcement
//! ABOUTME: The engine is the sole writer per node; scoping happens at the boundary

mod compression;
mod error;
mod scoped;
mod store;
mod token;

pub use compression::CompressionStrategy;
pub use error::{ContextError, Result};
pub use scoped::ScopedContextStore;
pub use store::{ContextStore, ContextStoreConfig};
pub use token::estimate_tokens;
