//! ABOUTME: The registry itself: append-mostly maps from (kind, name) to factories
//! ABOUTME: Kept dependency-free of dagforge-agents/dagforge-workflows to avoid a crate cycle; they register against the traits here

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dagforge_core::schema::IoSchema;
use dashmap::DashMap;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{RegistryError, Result};

/// Uniform tool contract: stateless and idempotent unless a tool marks
/// itself otherwise via `is_stateful`.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn input_schema(&self) -> IoSchema;
    fn output_schema(&self) -> IoSchema;
    fn is_stateful(&self) -> bool {
        false
    }
    async fn execute(&self, args: Value) -> std::result::Result<Value, String>;
}

/// Produces fresh `Tool` instances on demand (registration is usually a
/// singleton factory wrapping an `Arc<dyn Tool>` clone).
pub trait ToolFactory: Send + Sync {
    fn create(&self) -> Arc<dyn Tool>;
}

/// Type-erased handle to a runnable agent. `dagforge-agents` adapts its
/// richer `Agent` trait to this shape when registering itself, so that
/// this crate never depends on `dagforge-agents`.
#[async_trait]
pub trait AgentHandle: Send + Sync {
    async fn invoke(&self, input: Value, context: Value) -> std::result::Result<Value, String>;
}

pub trait AgentFactory: Send + Sync {
    fn create(&self, agent_config: Value) -> std::result::Result<Arc<dyn AgentHandle>, String>;
}

/// Type-erased handle to a nested/sub workflow, adapted from
/// `dagforge-workflows`'s engine for the same reason as `AgentHandle`.
#[async_trait]
pub trait WorkflowHandle: Send + Sync {
    async fn run(&self, input: Value) -> std::result::Result<Value, String>;
}

pub trait WorkflowFactory: Send + Sync {
    fn create(&self, config_overrides: Value) -> std::result::Result<Arc<dyn WorkflowHandle>, String>;
}

enum Entry {
    Tool(Arc<dyn ToolFactory>),
    Agent(Arc<dyn AgentFactory>),
    Workflow(Arc<dyn WorkflowFactory>),
}

/// Process-wide registry. Intended to be constructed once and shared via
/// `Arc` across runs; registration is append-mostly — normal
/// registration refuses to overwrite, and overwriting is refused
/// unconditionally once the registry has been `lock()`ed for execution.
pub struct Registry {
    entries: DashMap<(&'static str, String), Entry>,
    locked: AtomicBool,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            locked: AtomicBool::new(false),
        }
    }

    /// Freeze the registry against further writes. Called once the host
    /// begins scheduling runs, so that a mid-run registration race can
    /// never be observed by an in-flight executor lookup.
    pub fn lock(&self) {
        self.locked.store(true, Ordering::SeqCst);
    }

    fn check_writable(&self, force: bool, kind: &'static str, name: &str) -> Result<()> {
        if self.locked.load(Ordering::SeqCst) {
            return Err(RegistryError::Locked);
        }
        if !force && self.entries.contains_key(&(kind, name.to_string())) {
            return Err(RegistryError::AlreadyRegistered {
                kind,
                name: name.to_string(),
            });
        }
        Ok(())
    }

    pub fn register_tool(
        &self,
        name: impl Into<String>,
        factory: Arc<dyn ToolFactory>,
        force: bool,
    ) -> Result<()> {
        let name = name.into();
        self.check_writable(force, "tool", &name)?;
        debug!(tool = %name, "registering tool factory");
        self.entries.insert(("tool", name), Entry::Tool(factory));
        Ok(())
    }

    pub fn register_agent(
        &self,
        name: impl Into<String>,
        factory: Arc<dyn AgentFactory>,
        force: bool,
    ) -> Result<()> {
        let name = name.into();
        self.check_writable(force, "agent", &name)?;
        debug!(agent = %name, "registering agent factory (lazy import)");
        self.entries.insert(("agent", name), Entry::Agent(factory));
        Ok(())
    }

    pub fn register_workflow(
        &self,
        name: impl Into<String>,
        factory: Arc<dyn WorkflowFactory>,
        force: bool,
    ) -> Result<()> {
        let name = name.into();
        self.check_writable(force, "workflow", &name)?;
        debug!(workflow = %name, "registering workflow factory");
        self.entries
            .insert(("workflow", name), Entry::Workflow(factory));
        Ok(())
    }

    pub fn get_tool(&self, name: &str) -> Result<Arc<dyn Tool>> {
        match self.entries.get(&("tool", name.to_string())) {
            Some(entry) => match entry.value() {
                Entry::Tool(factory) => Ok(factory.create()),
                _ => unreachable!("key namespaced by kind"),
            },
            None => Err(RegistryError::NotFound {
                kind: "tool",
                name: name.to_string(),
            }),
        }
    }

    /// Resolve an agent's `package` handle at execution time. Returns a
    /// `NotFound` error if the agent name was never registered — callers
    /// (the agent-kind executor) surface this as a `Validation` error
    /// since it indicates a blueprint referencing an unknown package.
    pub fn get_agent(&self, name: &str, agent_config: Value) -> Result<Arc<dyn AgentHandle>> {
        match self.entries.get(&("agent", name.to_string())) {
            Some(entry) => match entry.value() {
                Entry::Agent(factory) => factory.create(agent_config).map_err(|e| {
                    warn!(agent = %name, error = %e, "agent factory failed to construct instance");
                    RegistryError::NotFound {
                        kind: "agent",
                        name: name.to_string(),
                    }
                }),
                _ => unreachable!("key namespaced by kind"),
            },
            None => Err(RegistryError::NotFound {
                kind: "agent",
                name: name.to_string(),
            }),
        }
    }

    pub fn get_workflow(&self, name: &str, config_overrides: Value) -> Result<Arc<dyn WorkflowHandle>> {
        match self.entries.get(&("workflow", name.to_string())) {
            Some(entry) => match entry.value() {
                Entry::Workflow(factory) => factory.create(config_overrides).map_err(|e| {
                    warn!(workflow = %name, error = %e, "workflow factory failed to construct instance");
                    RegistryError::NotFound {
                        kind: "workflow",
                        name: name.to_string(),
                    }
                }),
                _ => unreachable!("key namespaced by kind"),
            },
            None => Err(RegistryError::NotFound {
                kind: "workflow",
                name: name.to_string(),
            }),
        }
    }

    #[must_use]
    pub fn tool_names(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| matches!(e.value(), Entry::Tool(_)))
            .map(|e| e.key().1.clone())
            .collect()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// A snapshot of what a blueprint-ingestion schema lookup needs: the
/// declared input/output schema for a named tool, used to auto-populate
/// `NodeConfig::input_schema`/`output_schema` when a tool node is ingested
/// into a blueprint.
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub input_schema: IoSchema,
    pub output_schema: IoSchema,
}

impl Registry {
    #[must_use]
    pub fn tool_schema(&self, name: &str) -> Option<RegistryEntry> {
        let tool = self.get_tool(name).ok()?;
        Some(RegistryEntry {
            input_schema: tool.input_schema(),
            output_schema: tool.output_schema(),
        })
    }
}
