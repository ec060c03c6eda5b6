//! ABOUTME: Unified agent memory: working/episodic/semantic/procedural memory behind one facade
//! ABOUTME: Backends are in-process implementations; a host swaps in its own by implementing the traits in `traits`

mod config;
mod episodic;
mod error;
mod facade;
mod procedural;
mod semantic;
mod traits;
mod types;
mod working;

pub use config::{Backend, MemoryConfig};
pub use error::{MemoryError, Result};
pub use facade::UnifiedMemory;
pub use episodic::InMemoryEpisodicMemory;
pub use procedural::InMemoryProceduralMemory;
pub use semantic::InMemorySemanticMemory;
pub use traits::{
    ActionPattern, Entity, EpisodicMemory, EpisodicRecord, MemoryBackend, ProceduralMemory,
    Relationship, SemanticMemory,
};
pub use types::{Guarantee, MemoryEntry, UsageStats};
pub use working::WorkingMemory;
