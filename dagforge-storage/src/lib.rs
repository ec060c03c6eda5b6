//! ABOUTME: Blueprint store with content-hash optimistic concurrency

mod error;
mod patch;
mod store;

pub use error::{Result, StorageError};
pub use patch::{apply_patches, NodePatch};
pub use store::{BlueprintStore, Revision};
