//! ABOUTME: Error type for registry lookups and registration conflicts

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RegistryError>;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no {kind} registered under name '{name}'")]
    NotFound { kind: &'static str, name: String },

    #[error("{kind} '{name}' is already registered (pass force=true to overwrite)")]
    AlreadyRegistered { kind: &'static str, name: String },

    #[error("registry is locked for execution and cannot accept writes")]
    Locked,
}
