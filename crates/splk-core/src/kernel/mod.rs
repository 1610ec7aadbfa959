//! Kernel - the single source of truth for context nodes, scoped rules,
//! hypotheses, goals, and facts.
//!
//! All public methods go through one `ReentrantMutex`, so the Compiler can
//! call back into the Kernel (e.g. `query_scoped_rules` while inside an
//! `add_scoped_rule` call triggered by the same `observe`) from the same
//! thread without deadlocking, while still serializing access across
//! threads.

use std::cell::RefCell;

use chrono::Utc;
use indexmap::IndexMap;
use parking_lot::ReentrantMutex;
use serde::{Deserialize, Serialize};

use crate::config::SplkConfig;
use crate::embedder::cosine;
use crate::error::{Result, SplkError};
use crate::storage::ColdStorage;
use crate::types::{
    content_hash, CollaborationRequest, ContextNode, FactSource, Hypothesis, InteractionLog,
    ProcessedInteractionRegistry, ScopedRule, StyleVector, UserFact, UserGoal,
};

/// Whether `scope_path` is a (case-insensitive) prefix of `active_context` -
/// the same rule `ScopedRule::scope_matches` applies, reused here for goals
/// and facts so scope isolation holds at every layer (§4.3).
fn scope_path_matches(scope_path: &[String], active_context: &[String]) -> bool {
    if scope_path.len() > active_context.len() {
        return false;
    }
    scope_path
        .iter()
        .zip(active_context.iter())
        .all(|(a, b)| a.eq_ignore_ascii_case(b))
}

/// Export format major version. Bumped whenever a field is removed or its
/// meaning changes in a way older readers can't tolerate.
pub const EXPORT_VERSION: u64 = 1;

const PRUNE_FRACTION: f64 = 0.1;
const PRUNE_PROTECTED_CONFIDENCE: f32 = 0.3;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KernelMetrics {
    pub node_count: usize,
    pub rule_count: usize,
    pub established_rules: usize,
    pub shadow_rules: usize,
    pub hypothesis_count: usize,
    pub goal_count: usize,
    pub fact_count: usize,
    pub interaction_count: usize,
}

#[derive(Serialize, Deserialize)]
pub struct KernelExport {
    pub version: u64,
    pub nodes: IndexMap<String, ContextNode>,
    pub rules: IndexMap<String, ScopedRule>,
    pub hypotheses: IndexMap<String, Hypothesis>,
    pub goals: IndexMap<String, UserGoal>,
    pub facts: IndexMap<String, UserFact>,
    pub style: StyleVector,
}

struct KernelState {
    nodes: IndexMap<String, ContextNode>,
    rules: IndexMap<String, ScopedRule>,
    hypotheses: IndexMap<String, Hypothesis>,
    goals: IndexMap<String, UserGoal>,
    facts: IndexMap<String, UserFact>,
    interactions: IndexMap<String, InteractionLog>,
    processed: ProcessedInteractionRegistry,
    style: StyleVector,
}

impl KernelState {
    fn new() -> Self {
        Self {
            nodes: IndexMap::new(),
            rules: IndexMap::new(),
            hypotheses: IndexMap::new(),
            goals: IndexMap::new(),
            facts: IndexMap::new(),
            interactions: IndexMap::new(),
            processed: ProcessedInteractionRegistry::default(),
            style: StyleVector::new(),
        }
    }
}

pub struct Kernel {
    config: SplkConfig,
    state: ReentrantMutex<RefCell<KernelState>>,
    cold_storage: Option<ColdStorage>,
}

impl Kernel {
    pub fn new(config: SplkConfig) -> Self {
        let cold_storage = Some(ColdStorage::new(
            config.resolved_archive_path().join("splk_archive"),
            config.archive_max_mb * 1024 * 1024,
        ));
        Self {
            config,
            state: ReentrantMutex::new(RefCell::new(KernelState::new())),
            cold_storage,
        }
    }

    /// Construct with no on-disk archive; evicted entities are simply
    /// dropped. Useful for tests and ephemeral sessions.
    pub fn in_memory(config: SplkConfig) -> Self {
        Self {
            config,
            state: ReentrantMutex::new(RefCell::new(KernelState::new())),
            cold_storage: None,
        }
    }

    pub fn config(&self) -> &SplkConfig {
        &self.config
    }

    // ---- context nodes ----------------------------------------------

    pub fn add_context_node(&self, node: ContextNode) -> Result<String> {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        self.enforce_node_limit(&mut state)?;
        let id = node.id.clone();
        state.nodes.insert(id.clone(), node);
        Ok(id)
    }

    pub fn get_context_node(&self, id: &str) -> Option<ContextNode> {
        let guard = self.state.lock();
        guard.borrow().nodes.get(id).cloned()
    }

    pub fn find_by_name(&self, name: &str) -> Option<ContextNode> {
        let guard = self.state.lock();
        guard
            .borrow()
            .nodes
            .values()
            .find(|n| n.name.eq_ignore_ascii_case(name))
            .cloned()
    }

    /// Bump a node's reference count and recency, e.g. when a rule reuses
    /// an existing node instead of creating a fresh one.
    pub fn touch_context_node(&self, id: &str) {
        let guard = self.state.lock();
        if let Some(node) = guard.borrow_mut().nodes.get_mut(id) {
            node.reference();
        }
    }

    // ---- scoped rules -------------------------------------------------

    pub fn add_scoped_rule(&self, rule: ScopedRule) -> Result<String> {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        self.enforce_rule_limit(&mut state)?;
        let id = rule.id.clone();
        state.rules.insert(id.clone(), rule);
        Ok(id)
    }

    pub fn get_scoped_rule(&self, id: &str) -> Option<ScopedRule> {
        let guard = self.state.lock();
        guard.borrow().rules.get(id).cloned()
    }

    /// Mutate a rule in place via `f`, returning the updated clone.
    /// Re-entrant: safe to call from inside a Compiler callback that is
    /// itself being driven by another Kernel method on this thread.
    pub fn update_scoped_rule(
        &self,
        id: &str,
        f: impl FnOnce(&mut ScopedRule),
    ) -> Result<ScopedRule> {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        let rule = state
            .rules
            .get_mut(id)
            .ok_or_else(|| SplkError::Validation(format!("no such rule: {id}")))?;
        f(rule);
        Ok(rule.clone())
    }

    /// Every rule whose scope is a prefix of `active_context`
    /// (anti-context-collapse: a `Python` rule never leaks into a
    /// `JavaScript` session, but a global rule applies everywhere), scored
    /// by `weight * confidence` and optionally boosted by
    /// `1 + cosine(query_embedding, rule.embedding)` when a query embedding
    /// is given. Results are sorted by descending score, ties broken by
    /// `last_activated` (most recent first) then `id`, and capped to
    /// `top_k` when given (§4.3 lookup algorithm).
    pub fn query_scoped_rules(
        &self,
        active_context: &[String],
        query_embedding: Option<&[f32]>,
        top_k: Option<usize>,
    ) -> Vec<ScopedRule> {
        let guard = self.state.lock();
        let mut scored: Vec<(f32, ScopedRule)> = guard
            .borrow()
            .rules
            .values()
            .filter(|r| r.scope_matches(active_context))
            .map(|r| {
                let mut score = r.weight * r.confidence;
                if let Some(query) = query_embedding {
                    score *= 1.0 + cosine(query, &r.embedding);
                }
                (score, r.clone())
            })
            .collect();

        scored.sort_by(|(score_a, a), (score_b, b)| {
            score_b
                .partial_cmp(score_a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.last_activated.cmp(&a.last_activated))
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut rules: Vec<ScopedRule> = scored.into_iter().map(|(_, r)| r).collect();
        if let Some(k) = top_k {
            rules.truncate(k);
        }
        rules
    }

    /// Every rule overlapping `scope` by at least one element, regardless
    /// of state - used by shadow prediction to surface silent candidates.
    pub fn query_overlapping_rules(&self, scope: &[String]) -> Vec<ScopedRule> {
        let guard = self.state.lock();
        guard
            .borrow()
            .rules
            .values()
            .filter(|r| r.scope_overlaps(scope))
            .cloned()
            .collect()
    }

    pub fn restore_rule(&self, rule: ScopedRule) {
        let guard = self.state.lock();
        guard.borrow_mut().rules.insert(rule.id.clone(), rule);
    }

    // ---- hypotheses -----------------------------------------------------

    pub fn add_hypothesis(&self, hypothesis: Hypothesis) -> String {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        let id = hypothesis.id.clone();
        state.hypotheses.insert(id.clone(), hypothesis);
        id
    }

    pub fn get_pending_hypotheses(&self) -> Vec<Hypothesis> {
        let guard = self.state.lock();
        guard
            .borrow()
            .hypotheses
            .values()
            .filter(|h| h.is_active())
            .cloned()
            .collect()
    }

    pub fn update_hypothesis(&self, id: &str, f: impl FnOnce(&mut Hypothesis)) -> Option<Hypothesis> {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        let hyp = state.hypotheses.get_mut(id)?;
        f(hyp);
        Some(hyp.clone())
    }

    pub fn restore_hypothesis(&self, hypothesis: Hypothesis) {
        let guard = self.state.lock();
        guard.borrow_mut().hypotheses.insert(hypothesis.id.clone(), hypothesis);
    }

    // ---- goals and facts ------------------------------------------------

    pub fn add_goal(&self, goal: UserGoal) -> String {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        let id = goal.id.clone();
        state.goals.insert(id.clone(), goal);
        id
    }

    pub fn add_fact(&self, fact: UserFact) -> String {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        let id = fact.id.clone();
        state.facts.insert(id.clone(), fact);
        id
    }

    /// Goals not yet expired and whose scope is a prefix of `scope` (when
    /// given), ordered by decayed priority (highest first).
    pub fn get_active_goals(&self, scope: Option<&[String]>) -> Vec<UserGoal> {
        let guard = self.state.lock();
        let now = Utc::now();
        let mut goals: Vec<UserGoal> = guard
            .borrow()
            .goals
            .values()
            .filter(|g| g.is_active(now))
            .filter(|g| scope.is_none_or(|s| scope_path_matches(&g.scope_path, s)))
            .cloned()
            .collect();
        goals.sort_by_key(|g| std::cmp::Reverse(g.decay_priority_at(now)));
        goals
    }

    /// Facts that do not conflict with any currently active goal and whose
    /// scope is a prefix of `scope` (when given).
    pub fn get_facts_not_conflicting(&self, scope: Option<&[String]>) -> Vec<UserFact> {
        let guard = self.state.lock();
        let now = Utc::now();
        let state = guard.borrow();
        let goal_contents: Vec<String> = state
            .goals
            .values()
            .filter(|g| g.is_active(now))
            .map(|g| g.content.trim().to_lowercase())
            .collect();
        state
            .facts
            .values()
            .filter(|f| !goal_contents.iter().any(|g| f.conflicts_with_goal(g)))
            .filter(|f| scope.is_none_or(|s| scope_path_matches(&f.scope_path, s)))
            .cloned()
            .collect()
    }

    pub fn style(&self) -> StyleVector {
        let guard = self.state.lock();
        guard.borrow().style.clone()
    }

    pub fn update_style(&self, f: impl FnOnce(&mut StyleVector)) {
        let guard = self.state.lock();
        f(&mut guard.borrow_mut().style);
    }

    // ---- interaction log --------------------------------------------------

    /// Record an interaction if its content hash hasn't been seen before.
    /// Returns `None` when the interaction was a duplicate (the Compiler
    /// should then skip evolution entirely for this call).
    pub fn log_interaction(&self, log: InteractionLog) -> Option<String> {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        let hash = content_hash(&log.user_input, &log.ai_output);
        if state.processed.is_processed(&hash) {
            return None;
        }
        state.processed.register(hash);
        let id = log.id.clone();
        state.interactions.insert(id.clone(), log);
        Some(id)
    }

    pub fn mark_interaction_processed(&self, id: &str, compilation_target: Option<String>) {
        let guard = self.state.lock();
        if let Some(log) = guard.borrow_mut().interactions.get_mut(id) {
            log.processed = true;
            log.compilation_target = compilation_target;
        }
    }

    // ---- collaboration requests (stateless helper, kept here for symmetry) --

    pub fn propose_collaboration(
        &self,
        trigger_signal: impl Into<String>,
        conflicting_rule: &ScopedRule,
        reason: impl Into<String>,
    ) -> CollaborationRequest {
        CollaborationRequest::canonical(trigger_signal, &conflicting_rule.id, reason)
    }

    // ---- resource bounds & garbage collection --------------------------

    fn enforce_rule_limit(&self, state: &mut KernelState) -> Result<()> {
        if state.rules.len() < self.config.max_rules {
            return Ok(());
        }
        let mut candidates: Vec<(String, f32)> = state
            .rules
            .iter()
            .filter(|(_, r)| r.confidence < PRUNE_PROTECTED_CONFIDENCE)
            .map(|(id, r)| (id.clone(), r.confidence))
            .collect();
        if candidates.is_empty() {
            return Err(SplkError::ResourceLimit {
                resource: "rules",
                current: state.rules.len(),
                limit: self.config.max_rules,
            });
        }
        candidates.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
        let prune_count = ((state.rules.len() as f64 * PRUNE_FRACTION).ceil() as usize).max(1);
        for (id, _) in candidates.into_iter().take(prune_count) {
            if let Some(rule) = state.rules.shift_remove(&id) {
                if let Some(storage) = &self.cold_storage {
                    storage.archive_rule(&rule, "pruned")?;
                }
            }
        }
        Ok(())
    }

    fn enforce_node_limit(&self, state: &mut KernelState) -> Result<()> {
        if state.nodes.len() < self.config.max_nodes {
            return Ok(());
        }
        let targeted: std::collections::HashSet<String> =
            state.rules.values().map(|r| r.target_node.clone()).collect();
        let mut candidates: Vec<(String, f32)> = state
            .nodes
            .iter()
            .filter(|(id, n)| n.is_leaf() && !targeted.contains(*id))
            .map(|(id, n)| (id.clone(), n.weight))
            .collect();
        if candidates.is_empty() {
            return Err(SplkError::ResourceLimit {
                resource: "context_nodes",
                current: state.nodes.len(),
                limit: self.config.max_nodes,
            });
        }
        candidates.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
        let prune_count = ((state.nodes.len() as f64 * PRUNE_FRACTION).ceil() as usize).max(1);
        for (id, _) in candidates.into_iter().take(prune_count) {
            state.nodes.shift_remove(&id);
        }
        Ok(())
    }

    /// Explicit, caller-triggered sweep beyond the implicit limit checks
    /// that run on every insert: archives expired hypotheses and
    /// deprecated rules, then drops them from memory.
    pub fn garbage_collect(&self) -> Result<usize> {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        let mut collected = 0;

        let expired_hyp_ids: Vec<String> = state
            .hypotheses
            .iter()
            .filter(|(_, h)| !h.is_active())
            .map(|(id, _)| id.clone())
            .collect();
        for id in expired_hyp_ids {
            if let Some(hyp) = state.hypotheses.shift_remove(&id) {
                if let Some(storage) = &self.cold_storage {
                    storage.archive_hypothesis(&hyp, "expired")?;
                }
                collected += 1;
            }
        }

        let deprecated_rule_ids: Vec<String> = state
            .rules
            .iter()
            .filter(|(_, r)| r.state == crate::types::RuleState::Deprecated)
            .map(|(id, _)| id.clone())
            .collect();
        for id in deprecated_rule_ids {
            if let Some(rule) = state.rules.shift_remove(&id) {
                if let Some(storage) = &self.cold_storage {
                    storage.archive_rule(&rule, "deprecated")?;
                }
                collected += 1;
            }
        }

        Ok(collected)
    }

    /// Replay the cold-storage archive back into this kernel. Only useful
    /// when `self` was constructed with an on-disk archive.
    pub fn recompile_brain(&self) -> Result<crate::storage::RecompileReport> {
        match &self.cold_storage {
            Some(storage) => storage.recompile_brain(self),
            None => Ok(crate::storage::RecompileReport::default()),
        }
    }

    pub fn metrics(&self) -> KernelMetrics {
        let guard = self.state.lock();
        let state = guard.borrow();
        KernelMetrics {
            node_count: state.nodes.len(),
            rule_count: state.rules.len(),
            established_rules: state.rules.values().filter(|r| r.is_established()).count(),
            shadow_rules: state.rules.values().filter(|r| r.is_shadow()).count(),
            hypothesis_count: state.hypotheses.len(),
            goal_count: state.goals.len(),
            fact_count: state.facts.len(),
            interaction_count: state.interactions.len(),
        }
    }

    // ---- export / load --------------------------------------------------

    pub fn export(&self) -> KernelExport {
        let guard = self.state.lock();
        let state = guard.borrow();
        KernelExport {
            version: EXPORT_VERSION,
            nodes: state.nodes.clone(),
            rules: state.rules.clone(),
            hypotheses: state.hypotheses.clone(),
            goals: state.goals.clone(),
            facts: state.facts.clone(),
            style: state.style.clone(),
        }
    }

    pub fn load(&self, export: KernelExport) -> Result<()> {
        if export.version != EXPORT_VERSION {
            return Err(SplkError::VersionMismatch {
                expected: EXPORT_VERSION,
                found: export.version,
            });
        }
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        state.nodes = export.nodes;
        state.rules = export.rules;
        state.hypotheses = export.hypotheses;
        state.goals = export.goals;
        state.facts = export.facts;
        state.style = export.style;
        Ok(())
    }

    /// Hashes already registered as processed, for diagnostics.
    pub fn processed_count(&self) -> usize {
        let guard = self.state.lock();
        guard.borrow().processed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContextNodeType, Relation};

    fn kernel() -> Kernel {
        Kernel::in_memory(SplkConfig {
            max_rules: 5,
            max_nodes: 5,
            ..SplkConfig::default()
        })
    }

    #[test]
    fn add_and_query_scoped_rules_respects_scope_prefix() {
        let k = kernel();
        let rule = ScopedRule::new("uses tabs", vec!["python".into()], "python", Relation::Prefers, vec![]);
        k.add_scoped_rule(rule).unwrap();
        assert_eq!(k.query_scoped_rules(&["Python".into(), "FastAPI".into()], None, None).len(), 1);
        assert_eq!(k.query_scoped_rules(&["JavaScript".into()], None, None).len(), 0);
    }

    #[test]
    fn query_scoped_rules_ranks_by_weight_times_confidence_descending() {
        let k = kernel();
        let mut weak = ScopedRule::new("weak", vec!["Python".into()], "python", Relation::Prefers, vec![]);
        weak.weight = 0.2;
        weak.confidence = 0.5;
        let mut strong = ScopedRule::new("strong", vec!["Python".into()], "python", Relation::Prefers, vec![]);
        strong.weight = 0.9;
        strong.confidence = 0.9;
        k.add_scoped_rule(weak).unwrap();
        k.add_scoped_rule(strong.clone()).unwrap();

        let ranked = k.query_scoped_rules(&["Python".into()], None, None);
        assert_eq!(ranked[0].content, "strong");
    }

    #[test]
    fn query_scoped_rules_top_k_caps_results() {
        let k = kernel();
        for i in 0..4 {
            let rule = ScopedRule::new(format!("r{i}"), vec!["Python".into()], "python", Relation::Prefers, vec![]);
            k.add_scoped_rule(rule).unwrap();
        }
        assert_eq!(k.query_scoped_rules(&["Python".into()], None, Some(2)).len(), 2);
    }

    #[test]
    fn get_active_goals_and_facts_respect_scope() {
        let k = kernel();
        k.add_goal(UserGoal::new("ship the python release", vec!["Python".into()]));
        k.add_goal(UserGoal::new("ship the js release", vec!["JavaScript".into()]));
        k.add_fact(UserFact::new("uses pytest", vec!["Python".into()], FactSource::Observation));
        k.add_fact(UserFact::new("uses jest", vec!["JavaScript".into()], FactSource::Observation));

        let goals = k.get_active_goals(Some(&["Python".to_string()]));
        assert_eq!(goals.len(), 1);
        assert_eq!(goals[0].content, "ship the python release");

        let facts = k.get_facts_not_conflicting(Some(&["Python".to_string()]));
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].content, "uses pytest");

        assert_eq!(k.get_active_goals(None).len(), 2);
        assert_eq!(k.get_facts_not_conflicting(None).len(), 2);
    }

    #[test]
    fn duplicate_interactions_are_rejected() {
        let k = kernel();
        let log = InteractionLog::new("hi", "hello");
        let log2 = InteractionLog::new("hi", "hello");
        assert!(k.log_interaction(log).is_some());
        assert!(k.log_interaction(log2).is_none());
    }

    #[test]
    fn rule_limit_prunes_low_confidence_before_rejecting() {
        let k = kernel();
        for i in 0..5 {
            let rule = ScopedRule::new(format!("r{i}"), vec![], format!("t{i}"), Relation::Prefers, vec![]);
            k.add_scoped_rule(rule).unwrap();
        }
        let rule = ScopedRule::new("r5", vec![], "t5", Relation::Prefers, vec![]);
        assert!(k.add_scoped_rule(rule).is_ok());
        assert!(k.metrics().rule_count <= 5);
    }

    #[test]
    fn export_load_round_trips() {
        let k = kernel();
        let node = ContextNode::new(ContextNodeType::Language, "Python", &[], vec![]);
        k.add_context_node(node).unwrap();
        let exported = k.export();

        let k2 = kernel();
        k2.load(exported).unwrap();
        assert_eq!(k2.metrics().node_count, 1);
    }

    #[test]
    fn load_rejects_version_mismatch() {
        let k = kernel();
        let mut export = k.export();
        export.version = 99;
        assert!(matches!(k.load(export), Err(SplkError::VersionMismatch { .. })));
    }

    #[test]
    fn reentrant_lock_allows_nested_calls() {
        let k = kernel();
        let rule = ScopedRule::new("x", vec![], "t", Relation::Prefers, vec![]);
        let id = k.add_scoped_rule(rule).unwrap();
        // Simulates a Compiler callback that reads while "inside" a write path.
        let _guard = k.state.lock();
        assert!(k.get_scoped_rule(&id).is_some());
    }
}
