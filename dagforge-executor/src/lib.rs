//! ABOUTME: Per-node executor dispatch: cache check, schema validation, timeout/retry, usage recording
//! ABOUTME: `kinds/` holds one `NodeExecutor` per node kind, selected by `NodeKind::label()`

mod cache;
mod context_builder;
mod dispatch;
mod error;
pub mod kinds;
mod retry;

pub use cache::{fingerprint, ExecutionCache};
pub use context_builder::build_inputs;
pub use dispatch::{Dispatcher, ExecutorOutput, ExecutorRegistry, NodeExecutor};
pub use error::{ExecutorError, Result};
pub use retry::{with_retry, with_timeout};
