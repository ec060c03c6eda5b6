//! ABOUTME: Engine tunables — ceilings, failure policy, and the external guard hooks
//! ABOUTME: Env vars are read once in `from_env` (`MAX_PARALLEL_DEFAULT` etc.)

use std::sync::Arc;

/// Overrides the token-ceiling check: `token_guard(total, ceiling) -> bool`.
/// Returning `true` lets execution continue past the ceiling.
pub type TokenGuard = Arc<dyn Fn(u64, u64) -> bool + Send + Sync>;

/// Overrides the depth-ceiling check: `depth_guard(level, ceiling) -> bool`.
pub type DepthGuard = Arc<dyn Fn(usize, usize) -> bool + Send + Sync>;

/// What happens to the rest of a level, and to further levels, once a node
/// fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop scheduling any further node, in this level or later ones.
    Halt,
    /// Skip descendants of the failed node; everything else continues.
    ContinuePossible,
    /// Never abort; every node that is reachable still runs.
    AlwaysContinue,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self::ContinuePossible
    }
}

/// Engine-wide tunables for a single run.
#[derive(Clone)]
pub struct EngineConfig {
    /// Total weighted-semaphore capacity per level.
    pub max_parallel: usize,
    pub token_ceiling: Option<u64>,
    pub depth_ceiling: Option<usize>,
    pub failure_policy: FailurePolicy,
    pub token_guard: Option<TokenGuard>,
    pub depth_guard: Option<DepthGuard>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_parallel: 4,
            token_ceiling: None,
            depth_ceiling: Some(10),
            failure_policy: FailurePolicy::default(),
            token_guard: None,
            depth_guard: None,
        }
    }
}

impl EngineConfig {
    /// Reads `MAX_PARALLEL_DEFAULT`, `TOKEN_CEILING_DEFAULT`, and
    /// `DEPTH_CEILING_DEFAULT` once, falling back to `Default` for any that
    /// are unset or unparsable.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_parallel: std::env::var("MAX_PARALLEL_DEFAULT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_parallel),
            token_ceiling: std::env::var("TOKEN_CEILING_DEFAULT")
                .ok()
                .and_then(|v| v.parse().ok())
                .or(defaults.token_ceiling),
            depth_ceiling: std::env::var("DEPTH_CEILING_DEFAULT")
                .ok()
                .and_then(|v| v.parse().ok())
                .or(defaults.depth_ceiling),
            ..defaults
        }
    }
}
