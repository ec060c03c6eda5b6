//! ABOUTME: The workflow engine — level-by-level scheduling, branch gating, loop/parallel fan-out, recursion
//! ABOUTME: Level-by-level DAG scheduling, branch gating, ceilings, and recursive re-entry

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dagforge_core::node::{LoopConfig, NodeConfig, NodeId, NodeKind, ParallelConfig, WaitStrategy};
use dagforge_core::result::NodeExecutionResult;
use dagforge_core::Blueprint;
use dagforge_context::{ContextStoreConfig, ScopedContextStore};
use dagforge_executor::{Dispatcher, ExecutionCache};
use dagforge_events::{EventBus, ExecutionState, WorkflowEvent, WorkflowState};
use dagforge_graph::DependencyGraph;
use dagforge_registry::{Registry, WorkflowFactory, WorkflowHandle};
use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::{json, Map, Value};
use tokio::sync::Semaphore;
use tracing::{info, instrument, warn};

use crate::branch::BranchResolver;
use crate::config::{EngineConfig, FailurePolicy};
use crate::error::{EngineError, Result};
use crate::weight::complexity_estimate;

/// What a completed run produced: the leaf-node outputs, totals, and the
/// full completed/skipped accounting.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub output: Value,
    pub usage: dagforge_core::result::Usage,
    pub completed: Vec<NodeId>,
    pub skipped: Vec<NodeId>,
}

/// Overlay `overlay`'s object keys onto `base`, `overlay` winning on
/// conflict. Non-object inputs fall back to `overlay` whole.
fn merge_overlay(base: &Value, overlay: &Value) -> Value {
    match (base.as_object(), overlay.as_object()) {
        (Some(base_obj), Some(overlay_obj)) => {
            let mut merged = base_obj.clone();
            for (key, value) in overlay_obj {
                merged.insert(key.clone(), value.clone());
            }
            Value::Object(merged)
        }
        _ => overlay.clone(),
    }
}

/// Which node ids belong to some `Loop`'s `body_nodes` or some `Parallel`'s
/// `branches` — these never appear in the main per-level scan; the engine
/// runs them as sub-chains once their controlling node's own dispatch
/// completes: loop/parallel executors only validate and pass through their
/// config, fan-out is the engine's job.
fn controlled_node_ids(nodes: &[NodeConfig]) -> HashSet<NodeId> {
    let mut controlled = HashSet::new();
    for node in nodes {
        match &node.kind {
            NodeKind::Loop(config) => controlled.extend(config.body_nodes.iter().cloned()),
            NodeKind::Parallel(config) => {
                controlled.extend(config.branches.iter().flatten().cloned());
            }
            _ => {}
        }
    }
    controlled
}

/// Runs `ids` level-by-level (grouped by their already-computed graph
/// level), applying branch gating and `failure_policy` at this chain's own
/// scope. Used both for the top-level scan and for loop/parallel/recursive
/// sub-chains, all of which acquire their node dispatches from the same
/// `semaphore` the top-level scan does — `max_parallel` is one budget
/// shared across every fan-out path, not a separate limit per path.
/// `cancel`, when set, is checked between levels so a parallel branch can
/// stop cooperatively once its siblings have decided the wait strategy is
/// satisfied; suspension only happens at await points.
#[allow(clippy::too_many_arguments)]
async fn run_node_chain(
    dispatcher: &Dispatcher,
    graph: &DependencyGraph,
    ids: &[NodeId],
    context: &ScopedContextStore,
    session_metadata: &Value,
    cache: &ExecutionCache,
    branch_resolver: &BranchResolver,
    seed_decisions: &HashMap<NodeId, bool>,
    failure_policy: FailurePolicy,
    cancel: Option<&AtomicBool>,
    semaphore: &Semaphore,
    max_parallel: usize,
) -> Vec<(NodeId, NodeExecutionResult)> {
    let mut by_level: BTreeMap<usize, Vec<NodeId>> = BTreeMap::new();
    for id in ids {
        let level = graph.level_of(id).unwrap_or(0);
        by_level.entry(level).or_default().push(id.clone());
    }

    let mut decisions = seed_decisions.clone();
    let mut blocked: HashSet<NodeId> = HashSet::new();
    let mut out = Vec::new();
    let mut halted = false;

    for level_ids in by_level.values() {
        if halted {
            break;
        }
        if let Some(flag) = cancel {
            if flag.load(Ordering::Relaxed) {
                break;
            }
        }

        let runnable: Vec<NodeId> = level_ids
            .iter()
            .filter(|id| !blocked.contains(id.as_str()))
            .filter(|id| branch_resolver.is_active(id.as_str(), |cond| decisions.get(cond).copied()))
            .cloned()
            .collect();
        if runnable.is_empty() {
            continue;
        }

        let futures = runnable.iter().map(|id| async move {
            let node = graph.node(id.as_str()).expect("chain ids come from the same graph");
            let weight = complexity_estimate(&node.kind).min(max_parallel as u32).max(1);
            let _permit = semaphore.acquire_many(weight).await.expect("semaphore is never closed during a run");
            let result = dispatcher.execute(node, context, session_metadata, cache).await;
            (id.clone(), result)
        });
        let results = futures::future::join_all(futures).await;

        for (id, result) in &results {
            if result.success {
                if let Some(output) = &result.output {
                    if matches!(graph.node(id).map(|n| &n.kind), Some(NodeKind::Condition(_))) {
                        if let Some(decision) = output.get("result").and_then(Value::as_bool) {
                            decisions.insert(id.clone(), decision);
                        }
                    }
                }
            } else {
                match failure_policy {
                    FailurePolicy::Halt => halted = true,
                    FailurePolicy::ContinuePossible => {
                        for dep in graph.dependents_of(id) {
                            blocked.insert(dep.clone());
                        }
                    }
                    FailurePolicy::AlwaysContinue => {}
                }
            }
        }
        out.extend(results);
    }

    out
}

/// Fan out a loop node's body over its resolved items. Each iteration sees
/// `{item, index}` merged over `session_metadata` rather than written into
/// the shared context, so concurrent iterations under `parallel: true`
/// never race on a single context key.
#[allow(clippy::too_many_arguments)]
async fn run_loop(
    dispatcher: &Dispatcher,
    graph: &DependencyGraph,
    config: &LoopConfig,
    items: &[Value],
    context: &ScopedContextStore,
    session_metadata: &Value,
    cache: &ExecutionCache,
    branch_resolver: &BranchResolver,
    seed_decisions: &HashMap<NodeId, bool>,
    failure_policy: FailurePolicy,
    semaphore: &Semaphore,
    max_parallel: usize,
) -> (Value, Vec<(NodeId, NodeExecutionResult)>) {
    let iteration = |index: usize, item: Value| {
        let iter_metadata = merge_overlay(session_metadata, &json!({ "item": item, "index": index }));
        async move {
            let results = run_node_chain(
                dispatcher,
                graph,
                &config.body_nodes,
                context,
                &iter_metadata,
                cache,
                branch_resolver,
                seed_decisions,
                failure_policy,
                None,
                semaphore,
                max_parallel,
            )
            .await;
            (index, results)
        }
    };

    let mut per_index: Vec<(usize, Vec<(NodeId, NodeExecutionResult)>)> = if config.parallel {
        let futs: FuturesUnordered<_> = items
            .iter()
            .cloned()
            .enumerate()
            .map(|(index, item)| iteration(index, item))
            .collect();
        futs.collect::<Vec<_>>().await
    } else {
        let mut collected = Vec::with_capacity(items.len());
        for (index, item) in items.iter().cloned().enumerate() {
            collected.push(iteration(index, item).await);
        }
        collected
    };
    per_index.sort_by_key(|(index, _)| *index);

    let mut all_results = Vec::new();
    let mut summaries = Vec::with_capacity(per_index.len());
    for (_, results) in per_index {
        let mut summary = Map::new();
        for (id, result) in &results {
            if let Some(output) = &result.output {
                summary.insert(id.clone(), output.clone());
            }
        }
        summaries.push(Value::Object(summary));
        all_results.extend(results);
    }

    let aggregate = json!({ "items": items, "results": summaries });
    (aggregate, all_results)
}

/// Fan out a parallel node's branches per `wait_strategy`: `All` waits for
/// everything, `Any` completes on the first branch whose whole sub-chain
/// succeeded, `Race` on the first branch to finish at all. The rest are
/// told to stop cooperatively via `cancel`, never force-cancelled — there
/// is no `tokio::spawn` here to cancel in the first place.
#[allow(clippy::too_many_arguments)]
async fn run_parallel(
    dispatcher: &Dispatcher,
    graph: &DependencyGraph,
    branches: &[Vec<NodeId>],
    wait_strategy: WaitStrategy,
    context: &ScopedContextStore,
    session_metadata: &Value,
    cache: &ExecutionCache,
    branch_resolver: &BranchResolver,
    seed_decisions: &HashMap<NodeId, bool>,
    failure_policy: FailurePolicy,
    semaphore: &Semaphore,
    max_parallel: usize,
) -> (Value, Vec<(NodeId, NodeExecutionResult)>) {
    let cancel = AtomicBool::new(false);

    let mut futs = FuturesUnordered::new();
    for (index, branch_ids) in branches.iter().enumerate() {
        futs.push(async {
            let results = run_node_chain(
                dispatcher,
                graph,
                branch_ids,
                context,
                session_metadata,
                cache,
                branch_resolver,
                seed_decisions,
                failure_policy,
                Some(&cancel),
                semaphore,
                max_parallel,
            )
            .await;
            let succeeded = !results.is_empty() && results.iter().all(|(_, r)| r.success);
            (index, succeeded, results)
        });
    }

    let mut collected: Vec<(usize, bool, Vec<(NodeId, NodeExecutionResult)>)> = Vec::new();
    let mut winner: Option<usize> = None;
    while let Some(item) = futs.next().await {
        let (index, succeeded, _) = &item;
        match wait_strategy {
            WaitStrategy::All => {}
            WaitStrategy::Any => {
                if *succeeded && winner.is_none() {
                    winner = Some(*index);
                    cancel.store(true, Ordering::Relaxed);
                }
            }
            WaitStrategy::Race => {
                if winner.is_none() {
                    winner = Some(*index);
                    cancel.store(true, Ordering::Relaxed);
                }
            }
        }
        collected.push(item);
        if !matches!(wait_strategy, WaitStrategy::All) && winner.is_some() {
            break;
        }
    }
    collected.sort_by_key(|(index, ..)| *index);

    let all_results: Vec<(NodeId, NodeExecutionResult)> =
        collected.iter().flat_map(|(_, _, r)| r.clone()).collect();

    let aggregate = match wait_strategy {
        WaitStrategy::All => {
            let mut branch_outputs = Vec::with_capacity(collected.len());
            for (_, _, results) in &collected {
                let mut summary = Map::new();
                for (id, result) in results {
                    if let Some(output) = &result.output {
                        summary.insert(id.clone(), output.clone());
                    }
                }
                branch_outputs.push(Value::Object(summary));
            }
            json!({ "branches": branch_outputs })
        }
        WaitStrategy::Any | WaitStrategy::Race => {
            let chosen = winner.and_then(|idx| collected.iter().find(|(i, ..)| *i == idx));
            match chosen {
                Some((index, succeeded, results)) => {
                    let mut summary = Map::new();
                    for (id, result) in results {
                        if let Some(output) = &result.output {
                            summary.insert(id.clone(), output.clone());
                        }
                    }
                    json!({ "winning_branch": index, "succeeded": succeeded, "result": summary })
                }
                None => json!({ "winning_branch": Value::Null, "succeeded": false, "result": {} }),
            }
        }
    };

    (aggregate, all_results)
}

/// Drives a single run of a blueprint from `Initializing` through to a
/// terminal state: level-by-level dispatch gated by a weighted semaphore,
/// branch gating, loop/parallel fan-out, recursive re-entry, and the three
/// failure policies.
pub struct WorkflowEngine {
    dispatcher: Arc<Dispatcher>,
    events: Arc<EventBus>,
    config: EngineConfig,
    /// Process-wide, keyed by node fingerprint: shared across every
    /// `execute()` call on this engine, not reset per run.
    cache: ExecutionCache,
}

impl WorkflowEngine {
    #[must_use]
    pub fn new(dispatcher: Arc<Dispatcher>, events: Arc<EventBus>, config: EngineConfig) -> Self {
        Self { dispatcher, events, config, cache: ExecutionCache::new() }
    }

    /// Run `blueprint` to completion under `workflow_id`'s scope.
    ///
    /// # Errors
    ///
    /// Returns `EngineError` if the blueprint doesn't form a valid DAG, a
    /// state transition is illegal, a ceiling is exceeded without a guard
    /// override, or `FailurePolicy::Halt` stops the run on a node failure.
    #[instrument(skip(self, blueprint, session_metadata), fields(workflow_id))]
    pub async fn execute(&self, blueprint: &Blueprint, session_metadata: Value, workflow_id: &str) -> Result<RunOutcome> {
        let graph = DependencyGraph::build(blueprint.nodes.clone())?;
        let context = ScopedContextStore::new(workflow_id, ContextStoreConfig::default());
        let cache = &self.cache;
        let branch_resolver = BranchResolver::build(&blueprint.nodes);
        let controlled = controlled_node_ids(&blueprint.nodes);
        let semaphore = Arc::new(Semaphore::new(self.config.max_parallel.max(1)));

        let mut state = ExecutionState::new(workflow_id);
        state.transition_to(WorkflowState::Validating)?;
        state.transition_to(WorkflowState::Executing)?;
        self.events.publish(
            workflow_id,
            WorkflowEvent::WorkflowStarted { blueprint_id: workflow_id.to_string() },
        );

        let mut blocked: HashSet<NodeId> = HashSet::new();
        let mut halted = false;

        'levels: for level in 0..=graph.max_level() {
            if halted {
                break;
            }
            let Some(level_ids) = graph.levels.get(&level) else { continue };

            let decisions: HashMap<NodeId, bool> =
                level_ids.iter().filter_map(|id| state.branch_decision(id).map(|d| (id.clone(), d))).collect();

            let runnable: Vec<NodeId> = level_ids
                .iter()
                .filter(|id| !controlled.contains(*id))
                .filter(|id| {
                    if blocked.contains(*id) {
                        state.mark_skipped(id);
                        false
                    } else {
                        true
                    }
                })
                .filter(|id| {
                    let active = branch_resolver.is_active(id.as_str(), |cond| decisions.get(cond).copied());
                    if !active {
                        state.mark_skipped(id);
                    }
                    active
                })
                .cloned()
                .collect();

            if runnable.is_empty() {
                continue;
            }

            let mut futures = Vec::with_capacity(runnable.len());
            for id in &runnable {
                let node = graph.node(id).expect("runnable ids come from this graph's own levels");
                let weight = complexity_estimate(&node.kind).min(self.config.max_parallel as u32).max(1);
                self.events.publish(
                    workflow_id,
                    WorkflowEvent::NodeStarted { node_id: id.clone(), kind: node.kind_label().to_string(), level },
                );
                let semaphore = semaphore.clone();
                let dispatcher = self.dispatcher.clone();
                let context = &context;
                let session_metadata = &session_metadata;
                futures.push(async move {
                    let _permit = semaphore
                        .acquire_many(weight)
                        .await
                        .expect("semaphore is never closed during a run");
                    let result = dispatcher.execute(node, context, session_metadata, cache).await;
                    (id.clone(), result)
                });
            }
            let results = futures::future::join_all(futures).await;

            for (id, result) in &results {
                state.record_result(id, result.clone());
                let node = graph.node(id).expect("result ids come from this graph's own levels");

                if result.success {
                    self.events.publish(
                        workflow_id,
                        WorkflowEvent::NodeCompleted { node_id: id.clone(), result: Box::new(result.clone()) },
                    );
                    if let (NodeKind::Condition(_), Some(output)) = (&node.kind, &result.output) {
                        if let Some(decision) = output.get("result").and_then(Value::as_bool) {
                            state.record_branch_decision(id, decision);
                        }
                    }
                } else {
                    self.events.publish(
                        workflow_id,
                        WorkflowEvent::NodeFailed { node_id: id.clone(), result: Box::new(result.clone()) },
                    );
                    match self.config.failure_policy {
                        FailurePolicy::Halt => {
                            warn!(node_id = %id, "halting workflow after node failure");
                            halted = true;
                        }
                        FailurePolicy::ContinuePossible => {
                            for dep in graph.dependents_of(id) {
                                blocked.insert(dep.clone());
                            }
                        }
                        FailurePolicy::AlwaysContinue => {}
                    }
                }

                if let Some(ceiling) = self.config.token_ceiling {
                    let total = state.total_usage().total_tokens();
                    if total > ceiling {
                        let allowed = self.config.token_guard.as_ref().is_some_and(|guard| guard(total, ceiling));
                        if !allowed {
                            return Err(EngineError::TokenCeiling { total, ceiling });
                        }
                    }
                }
            }

            if halted {
                for (id, _) in &results {
                    for dep in graph.dependents_of(id) {
                        state.mark_skipped(dep);
                    }
                }
                break 'levels;
            }

            let decisions_snapshot: HashMap<NodeId, bool> = level_ids
                .iter()
                .chain(results.iter().map(|(id, _)| id))
                .filter_map(|id| state.branch_decision(id).map(|d| (id.clone(), d)))
                .collect();

            for (id, result) in &results {
                if !result.success {
                    continue;
                }
                let node = graph.node(id).expect("checked above");
                match &node.kind {
                    NodeKind::Loop(config) => {
                        let Some(output) = &result.output else { continue };
                        let items = output.get("items").and_then(Value::as_array).cloned().unwrap_or_default();
                        let (aggregate, sub_results) = run_loop(
                            &self.dispatcher,
                            &graph,
                            config,
                            &items,
                            &context,
                            &session_metadata,
                            &cache,
                            &branch_resolver,
                            &decisions_snapshot,
                            self.config.failure_policy,
                            &semaphore,
                            self.config.max_parallel,
                        )
                        .await;
                        self.merge_sub_results(workflow_id, &mut state, &sub_results);
                        if let Err(e) = context.set(id, aggregate, None) {
                            warn!(node_id = %id, error = %e, "failed to persist loop aggregate");
                        }
                    }
                    NodeKind::Parallel(config) => {
                        let (aggregate, sub_results) = run_parallel(
                            &self.dispatcher,
                            &graph,
                            &config.branches,
                            config.wait_strategy,
                            &context,
                            &session_metadata,
                            &cache,
                            &branch_resolver,
                            &decisions_snapshot,
                            self.config.failure_policy,
                            &semaphore,
                            self.config.max_parallel,
                        )
                        .await;
                        self.merge_sub_results(workflow_id, &mut state, &sub_results);
                        if let Err(e) = context.set(id, aggregate, None) {
                            warn!(node_id = %id, error = %e, "failed to persist parallel aggregate");
                        }
                    }
                    _ => {}
                }
            }

            if let Err(halt) = self
                .drive_recursion(
                    workflow_id,
                    &graph,
                    &context,
                    &session_metadata,
                    &cache,
                    &branch_resolver,
                    &mut state,
                    level_ids,
                    &semaphore,
                )
                .await
            {
                return Err(halt);
            }
        }

        let final_state = if halted { WorkflowState::Failed } else { WorkflowState::Completed };
        state.transition_to(final_state)?;

        let output = self.collect_leaf_output(&graph, &context);
        self.events.publish(
            workflow_id,
            WorkflowEvent::WorkflowCompleted {
                total_usage: state.total_usage().clone(),
                completed: state.completed_ids(),
                skipped: state.skipped_ids(),
            },
        );

        Ok(RunOutcome {
            output,
            usage: state.total_usage().clone(),
            completed: state.completed_ids(),
            skipped: state.skipped_ids(),
        })
    }

    fn merge_sub_results(&self, workflow_id: &str, state: &mut ExecutionState, results: &[(NodeId, NodeExecutionResult)]) {
        for (id, result) in results {
            state.record_result(id, result.clone());
            let event = if result.success {
                WorkflowEvent::NodeCompleted { node_id: id.clone(), result: Box::new(result.clone()) }
            } else {
                WorkflowEvent::NodeFailed { node_id: id.clone(), result: Box::new(result.clone()) }
            };
            self.events.publish(workflow_id, event);
        }
    }

    /// After a level finishes, re-enter any recursive node whose output
    /// declares `_can_recurse && !converged`, re-running its
    /// `recursive_sources` with `recursive_context` merged over the base
    /// session metadata. Bounded by `depth_ceiling`, overridable via
    /// `depth_guard`. Convergence is caller-declared; the engine only
    /// enforces the ceiling.
    #[allow(clippy::too_many_arguments)]
    async fn drive_recursion(
        &self,
        workflow_id: &str,
        graph: &DependencyGraph,
        context: &ScopedContextStore,
        session_metadata: &Value,
        cache: &ExecutionCache,
        branch_resolver: &BranchResolver,
        state: &mut ExecutionState,
        level_ids: &[NodeId],
        semaphore: &Semaphore,
    ) -> Result<()> {
        let recursive_ids: Vec<NodeId> = level_ids
            .iter()
            .filter(|id| matches!(graph.node(id.as_str()).map(|n| &n.kind), Some(NodeKind::Recursive(_))))
            .cloned()
            .collect();
        if recursive_ids.is_empty() {
            return Ok(());
        }

        let mut recursion_depth = 0usize;
        loop {
            let mut any_recursed = false;
            for id in &recursive_ids {
                let Some(result) = state.result(id) else { continue };
                if !result.success {
                    continue;
                }
                let Some(output) = result.output.clone() else { continue };
                let can_recurse = output.get("_can_recurse").and_then(Value::as_bool).unwrap_or(false);
                let converged = output.get("converged").and_then(Value::as_bool).unwrap_or(true);
                if !can_recurse || converged {
                    continue;
                }

                recursion_depth += 1;
                if let Some(ceiling) = self.config.depth_ceiling {
                    if recursion_depth > ceiling {
                        let allowed =
                            self.config.depth_guard.as_ref().is_some_and(|guard| guard(recursion_depth, ceiling));
                        if !allowed {
                            return Err(EngineError::DepthCeiling { level: recursion_depth, ceiling });
                        }
                    }
                }

                let Some(node) = graph.node(id) else { continue };
                let NodeKind::Recursive(config) = &node.kind else { continue };
                let recursive_context = output.get("recursive_context").cloned().unwrap_or_else(|| json!({}));
                let enriched_metadata = merge_overlay(session_metadata, &recursive_context);

                let decisions: HashMap<NodeId, bool> = config
                    .recursive_sources
                    .iter()
                    .filter_map(|src| state.branch_decision(src).map(|d| (src.clone(), d)))
                    .collect();

                let sub_results = run_node_chain(
                    &self.dispatcher,
                    graph,
                    &config.recursive_sources,
                    context,
                    &enriched_metadata,
                    cache,
                    branch_resolver,
                    &decisions,
                    self.config.failure_policy,
                    None,
                    semaphore,
                    self.config.max_parallel,
                )
                .await;
                self.merge_sub_results(workflow_id, state, &sub_results);
                any_recursed = true;
            }
            if !any_recursed {
                break;
            }
        }
        Ok(())
    }

    /// The final `RunOutcome::output`: every leaf node's current context
    /// value, keyed by node id.
    fn collect_leaf_output(&self, graph: &DependencyGraph, context: &ScopedContextStore) -> Value {
        let mut output = Map::new();
        for id in graph.leaf_nodes() {
            if let Some(value) = context.get(&id) {
                output.insert(id, value);
            }
        }
        Value::Object(output)
    }
}

/// Adapts a fixed `Blueprint` to `dagforge_registry::WorkflowHandle`, so a
/// workflow can be registered and invoked as a nested node in another
/// workflow (the `Workflow` node kind).
pub struct EngineWorkflowHandle {
    engine: Arc<WorkflowEngine>,
    blueprint: Blueprint,
    workflow_id: String,
}

#[async_trait]
impl WorkflowHandle for EngineWorkflowHandle {
    async fn run(&self, input: Value) -> std::result::Result<Value, String> {
        let outcome = self
            .engine
            .execute(&self.blueprint, input, &self.workflow_id)
            .await
            .map_err(|e| e.to_string())?;
        Ok(outcome.output)
    }
}

/// Factory registered under a workflow's name; `config_overrides` is
/// shallow-merged over the blueprint's `metadata` before each run.
pub struct EngineWorkflowFactory {
    engine: Arc<WorkflowEngine>,
    blueprint: Blueprint,
    name: String,
}

impl EngineWorkflowFactory {
    #[must_use]
    pub fn new(engine: Arc<WorkflowEngine>, blueprint: Blueprint, name: impl Into<String>) -> Self {
        Self { engine, blueprint, name: name.into() }
    }
}

impl WorkflowFactory for EngineWorkflowFactory {
    fn create(&self, config_overrides: Value) -> std::result::Result<Arc<dyn WorkflowHandle>, String> {
        let mut blueprint = self.blueprint.clone();
        blueprint.metadata = merge_overlay(&blueprint.metadata, &config_overrides);
        let workflow_id = format!("{}:{}", self.name, blueprint.compute_lock());
        Ok(Arc::new(EngineWorkflowHandle { engine: self.engine.clone(), blueprint, workflow_id }))
    }
}

/// Registers `factory` against `registry` under `name`. Thin convenience
/// so hosts wiring up a set of named workflows don't repeat the
/// `Arc<dyn WorkflowFactory>` boilerplate.
pub fn register_workflow(registry: &Registry, name: impl Into<String>, factory: EngineWorkflowFactory) -> Result<()> {
    registry
        .register_workflow(name.into(), Arc::new(factory), false)
        .map_err(|_| EngineError::Halted("workflow already registered".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dagforge_core::node::{ConditionConfig, InputSource, RecursiveConfig, RetryPolicy};
    use dagforge_core::schema::IoSchema;
    use dagforge_executor::kinds::{ConditionExecutor, LoopExecutor, ParallelExecutor, RecursiveExecutor, ToolExecutor};
    use dagforge_executor::ExecutorRegistry;
    use dagforge_registry::{Tool, ToolFactory};
    use serde_json::json;
    use std::collections::HashMap as StdHashMap;

    struct EchoTool;
    #[async_trait::async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echoes its args"
        }
        fn input_schema(&self) -> IoSchema {
            IoSchema::new()
        }
        fn output_schema(&self) -> IoSchema {
            IoSchema::new()
        }
        async fn execute(&self, args: Value) -> std::result::Result<Value, String> {
            Ok(args)
        }
    }

    struct EchoFactory;
    impl ToolFactory for EchoFactory {
        fn create(&self) -> Arc<dyn Tool> {
            Arc::new(EchoTool)
        }
    }

    struct FailTool;
    #[async_trait::async_trait]
    impl Tool for FailTool {
        fn name(&self) -> &str {
            "fail"
        }
        fn description(&self) -> &str {
            "always fails"
        }
        fn input_schema(&self) -> IoSchema {
            IoSchema::new()
        }
        fn output_schema(&self) -> IoSchema {
            IoSchema::new()
        }
        async fn execute(&self, _args: Value) -> std::result::Result<Value, String> {
            Err("boom".to_string())
        }
    }

    struct FailFactory;
    impl ToolFactory for FailFactory {
        fn create(&self) -> Arc<dyn Tool> {
            Arc::new(FailTool)
        }
    }

    fn make_engine(config: EngineConfig) -> (WorkflowEngine, Arc<Registry>) {
        let registry = Arc::new(Registry::new());
        registry.register_tool("echo", Arc::new(EchoFactory), false).unwrap();
        registry.register_tool("fail", Arc::new(FailFactory), false).unwrap();

        let mut executors = ExecutorRegistry::new();
        executors.register("tool", Arc::new(ToolExecutor::new(registry.clone())));
        executors.register("condition", Arc::new(ConditionExecutor));
        executors.register("loop", Arc::new(LoopExecutor));
        executors.register("parallel", Arc::new(ParallelExecutor));
        executors.register("recursive", Arc::new(RecursiveExecutor));

        let dispatcher = Arc::new(Dispatcher::new(executors));
        let events = Arc::new(EventBus::new());
        (WorkflowEngine::new(dispatcher, events, config), registry)
    }

    fn tool_node(id: &str, deps: &[&str], tool_name: &str) -> NodeConfig {
        NodeConfig {
            id: id.to_string(),
            name: None,
            dependencies: deps.iter().map(|s| s.to_string()).collect(),
            level: 0,
            input_mappings: StdHashMap::new(),
            output_mappings: StdHashMap::new(),
            input_schema: IoSchema::default(),
            output_schema: IoSchema::default(),
            use_cache: false,
            timeout_seconds: None,
            retry: RetryPolicy::default(),
            kind: NodeKind::Tool { tool_name: tool_name.to_string(), tool_args: json!({}) },
        }
    }

    #[tokio::test]
    async fn linear_chain_completes_and_collects_leaf_output() {
        let (engine, _registry) = make_engine(EngineConfig::default());
        let nodes = vec![tool_node("a", &[], "echo"), tool_node("b", &["a"], "echo")];
        let blueprint = Blueprint::new("1.0", nodes);

        let outcome = engine.execute(&blueprint, json!({"x": 1}), "wf1").await.unwrap();
        assert_eq!(outcome.completed.len(), 2);
        assert!(outcome.skipped.is_empty());
        assert_eq!(outcome.output["b"]["x"], json!(1));
    }

    #[tokio::test]
    async fn branch_gating_skips_the_false_side() {
        let (engine, _registry) = make_engine(EngineConfig::default());
        let mut cond = tool_node("c", &[], "echo");
        cond.kind = NodeKind::Condition(ConditionConfig {
            expression: "flag".into(),
            true_branch: vec!["t".into()],
            false_branch: vec!["f".into()],
        });
        let mut t = tool_node("t", &["c"], "echo");
        t.input_mappings.insert(
            "flag".into(),
            InputSource { source_node_id: "c".into(), source_output_path: "result".into() },
        );
        let f = tool_node("f", &["c"], "echo");
        let blueprint = Blueprint::new("1.0", vec![cond, t, f]);

        let outcome = engine.execute(&blueprint, json!({"flag": true}), "wf2").await.unwrap();
        assert!(outcome.completed.contains(&"t".to_string()));
        assert!(outcome.skipped.contains(&"f".to_string()));
    }

    #[tokio::test]
    async fn token_ceiling_without_guard_aborts() {
        let mut config = EngineConfig::default();
        config.token_ceiling = Some(0);
        let (engine, registry) = make_engine(config);
        let mut llm = tool_node("a", &[], "echo");
        llm.kind = NodeKind::Llm {
            model: "m".into(),
            prompt_template: "hi".into(),
            temperature: None,
            max_tokens: None,
            provider: "test".into(),
            llm_config: json!({}),
        };

        let mut executors = ExecutorRegistry::new();
        executors.register("tool", Arc::new(ToolExecutor::new(registry.clone())));
        struct UsageLlm;
        #[async_trait::async_trait]
        impl dagforge_executor::NodeExecutor for UsageLlm {
            async fn invoke(
                &self,
                _node: &NodeConfig,
                _inputs: Value,
            ) -> dagforge_executor::Result<dagforge_executor::ExecutorOutput> {
                Ok(dagforge_executor::ExecutorOutput {
                    value: json!({"text": "hi"}),
                    usage: Some(dagforge_core::result::Usage { tokens_in: 10, tokens_out: 0, ..Default::default() }),
                })
            }
        }
        executors.register("llm", Arc::new(UsageLlm));
        let dispatcher = Arc::new(Dispatcher::new(executors));
        let events = Arc::new(EventBus::new());
        let engine = WorkflowEngine::new(dispatcher, events, engine.config.clone());

        let blueprint = Blueprint::new("1.0", vec![llm]);
        let err = engine.execute(&blueprint, json!({}), "wf3").await.unwrap_err();
        assert!(matches!(err, EngineError::TokenCeiling { .. }));
    }

    #[tokio::test]
    async fn failure_policy_halt_stops_further_scheduling() {
        let mut config = EngineConfig::default();
        config.failure_policy = FailurePolicy::Halt;
        let (engine, _registry) = make_engine(config);
        let nodes = vec![tool_node("a", &[], "fail"), tool_node("b", &["a"], "echo")];
        let blueprint = Blueprint::new("1.0", nodes);

        let outcome = engine.execute(&blueprint, json!({}), "wf4").await.unwrap();
        assert!(!outcome.completed.contains(&"b".to_string()));
        assert!(outcome.skipped.contains(&"b".to_string()));
    }

    #[tokio::test]
    async fn failure_policy_continue_possible_runs_unrelated_nodes() {
        let (engine, _registry) = make_engine(EngineConfig::default());
        let nodes = vec![
            tool_node("a", &[], "fail"),
            tool_node("dependent", &["a"], "echo"),
            tool_node("unrelated", &[], "echo"),
        ];
        let blueprint = Blueprint::new("1.0", nodes);

        let outcome = engine.execute(&blueprint, json!({}), "wf5").await.unwrap();
        assert!(outcome.completed.contains(&"unrelated".to_string()));
        assert!(outcome.skipped.contains(&"dependent".to_string()));
    }

    #[tokio::test]
    async fn loop_node_fans_out_body_and_aggregates_results() {
        let (engine, _registry) = make_engine(EngineConfig::default());
        let mut loop_node = tool_node("l", &[], "echo");
        loop_node.kind = NodeKind::Loop(LoopConfig {
            iterator_path: "items".into(),
            body_nodes: vec!["body".into()],
            max_iterations: 10,
            parallel: true,
        });
        let body = tool_node("body", &["l"], "echo");
        let blueprint = Blueprint::new("1.0", vec![loop_node, body]);

        let outcome = engine.execute(&blueprint, json!({"items": [1, 2, 3]}), "wf6").await.unwrap();
        assert!(outcome.completed.contains(&"l".to_string()));
        let leaf = &outcome.output["l"];
        assert_eq!(leaf["results"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn parallel_any_completes_on_first_success() {
        let (engine, _registry) = make_engine(EngineConfig::default());
        let mut parallel_node = tool_node("p", &[], "echo");
        parallel_node.kind = NodeKind::Parallel(ParallelConfig {
            branches: vec![vec!["branch_a".into()], vec!["branch_b".into()]],
            wait_strategy: WaitStrategy::Any,
        });
        let branch_a = tool_node("branch_a", &["p"], "echo");
        let branch_b = tool_node("branch_b", &["p"], "echo");
        let blueprint = Blueprint::new("1.0", vec![parallel_node, branch_a, branch_b]);

        let outcome = engine.execute(&blueprint, json!({}), "wf7").await.unwrap();
        let leaf = &outcome.output["p"];
        assert_eq!(leaf["succeeded"], json!(true));
    }

    #[tokio::test]
    async fn parallel_all_waits_for_every_branch() {
        let (engine, _registry) = make_engine(EngineConfig::default());
        let mut parallel_node = tool_node("p", &[], "echo");
        parallel_node.kind = NodeKind::Parallel(ParallelConfig {
            branches: vec![vec!["branch_a".into()], vec!["branch_b".into()]],
            wait_strategy: WaitStrategy::All,
        });
        let branch_a = tool_node("branch_a", &["p"], "echo");
        let branch_b = tool_node("branch_b", &["p"], "echo");
        let blueprint = Blueprint::new("1.0", vec![parallel_node, branch_a, branch_b]);

        let outcome = engine.execute(&blueprint, json!({}), "wf9").await.unwrap();
        let leaf = &outcome.output["p"];
        assert_eq!(leaf["branches"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn parallel_race_completes_on_first_finish_even_if_failed() {
        let (engine, _registry) = make_engine(EngineConfig::default());
        let mut parallel_node = tool_node("p", &[], "echo");
        parallel_node.kind = NodeKind::Parallel(ParallelConfig {
            branches: vec![vec!["branch_a".into()], vec!["branch_b".into()]],
            wait_strategy: WaitStrategy::Race,
        });
        let branch_a = tool_node("branch_a", &["p"], "fail");
        let branch_b = tool_node("branch_b", &["p"], "fail");
        let blueprint = Blueprint::new("1.0", vec![parallel_node, branch_a, branch_b]);

        let outcome = engine.execute(&blueprint, json!({}), "wf10").await.unwrap();
        let leaf = &outcome.output["p"];
        assert!(leaf["winning_branch"].is_number());
        assert_eq!(leaf["succeeded"], json!(false));
    }

    #[tokio::test]
    async fn repeated_runs_with_use_cache_hit_on_the_second_pass() {
        let registry = Arc::new(Registry::new());
        registry.register_tool("echo", Arc::new(EchoFactory), false).unwrap();
        let mut executors = ExecutorRegistry::new();
        executors.register("tool", Arc::new(ToolExecutor::new(registry.clone())));
        let dispatcher = Arc::new(Dispatcher::new(executors));
        let events = Arc::new(EventBus::new());
        let mut receiver = events.subscribe();
        let engine = WorkflowEngine::new(dispatcher, events, EngineConfig::default());

        let mut a = tool_node("a", &[], "echo");
        a.use_cache = true;
        let blueprint = Blueprint::new("1.0", vec![a]);

        let first = engine.execute(&blueprint, json!({"x": 1}), "wf11a").await.unwrap();
        let second = engine.execute(&blueprint, json!({"x": 1}), "wf11b").await.unwrap();
        assert_eq!(first.output["a"], second.output["a"]);

        let mut cache_hits = Vec::new();
        while let Ok(envelope) = receiver.try_recv() {
            if let WorkflowEvent::NodeCompleted { result, .. } = envelope.event {
                cache_hits.push(result.cache_hit);
            }
        }
        assert_eq!(cache_hits, vec![false, true]);
    }

    #[tokio::test]
    async fn recursive_node_re_enters_until_converged() {
        let (engine, _registry) = make_engine(EngineConfig::default());
        let mut source = tool_node("source", &[], "echo");
        source.input_mappings.insert(
            "can_recurse".into(),
            InputSource { source_node_id: "source".into(), source_output_path: "can_recurse".into() },
        );
        let mut rec = tool_node("rec", &["source"], "echo");
        rec.kind = NodeKind::Recursive(RecursiveConfig { recursive_sources: vec!["source".into()] });
        rec.input_mappings.insert(
            "can_recurse".into(),
            InputSource { source_node_id: "source".into(), source_output_path: "once".into() },
        );
        rec.input_mappings.insert(
            "converged".into(),
            InputSource { source_node_id: "source".into(), source_output_path: "done".into() },
        );
        let blueprint = Blueprint::new("1.0", vec![source, rec]);

        let outcome = engine.execute(&blueprint, json!({"once": false, "done": true}), "wf8").await.unwrap();
        assert!(outcome.completed.contains(&"rec".to_string()));
    }
}
