//! Compiler - turns `Signal`s into `ScopedRule` state transitions.
//!
//! Two pipelines share the same scope-detection and embedding machinery:
//! `scientific_evolve` mutates `ScopedRule`s directly on every matching
//! signal (the canonical path), while `evolve_scoped` stages a
//! `Hypothesis` first and only promotes it to a rule after enough
//! independent validations - useful when a caller wants extra
//! confirmation before committing to a rule at all.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::embedder::{cosine, Embedder};
use crate::error::Result;
use crate::kernel::Kernel;
use crate::types::{
    CollaborationRequest, ContextNode, ContextNodeType, Hypothesis, HypothesisState, Relation,
    RuleState, ScopedRule, Signal,
};

/// Confidence boost applied per matching signal (§4.4.1); chosen so that a
/// fresh rule (confidence 0.2) reaches Established (0.8) after exactly
/// four independent confirmations: 0.2 -> 0.35 -> 0.50 -> 0.65 -> 0.80.
const VALIDATION_BOOST: f32 = 0.15;
const REJECTION_PENALTY: f32 = 0.2;
/// Confidence a promoted hypothesis's rule starts at: the gated pipeline
/// already did the validation work a fresh rule would still need, so it
/// enters at Shadow rather than Hypothesis.
const PROMOTED_RULE_STARTING_CONFIDENCE: f32 = 0.5;

type KeywordTable = &'static [(&'static str, &'static [&'static str])];

/// Raw keyword tables, one per scope class (§4.4.1). Kept as plain data so
/// `scope_keywords()` can hand the contract back for introspection without
/// exposing the compiled matchers below.
const LANGUAGES: KeywordTable = &[
    ("TypeScript", &["typescript"]),
    ("JavaScript", &["javascript"]),
    ("Python", &["python"]),
    ("Java", &["java"]),
    ("Rust", &["rust"]),
    ("Go", &["golang", "go"]),
    ("Ruby", &["ruby"]),
    ("Php", &["php"]),
    ("Swift", &["swift"]),
    ("Kotlin", &["kotlin"]),
    ("Cpp", &["c++", "cpp"]),
    ("Csharp", &["c#", "csharp"]),
];

const FRAMEWORKS: KeywordTable = &[
    ("FastAPI", &["fastapi"]),
    ("Django", &["django"]),
    ("Flask", &["flask"]),
    ("React", &["react"]),
    ("Vue", &["vue"]),
    ("Angular", &["angular"]),
    ("Express", &["express"]),
    ("NextJs", &["next.js", "nextjs"]),
    ("Spring", &["spring"]),
    ("Rails", &["rails"]),
];

const DOMAINS: KeywordTable = &[
    ("Backend", &["backend"]),
    ("Frontend", &["frontend"]),
    ("Fullstack", &["fullstack"]),
    ("Api", &["api"]),
    ("Database", &["database"]),
    ("Ml", &["ml"]),
    ("Devops", &["devops"]),
    ("Mobile", &["mobile"]),
    ("Web", &["web"]),
];

/// Compiled keyword matchers, one regex per scope-table entry so substrings
/// like "java" inside "javascript" never cross-trigger (word-boundary
/// matching); symbol-bearing keywords like "c++"/"c#" fall back to plain
/// substring matching since `\b` doesn't mean anything around them.
fn compile_table(table: KeywordTable) -> Vec<(&'static str, Regex)> {
    table
        .iter()
        .map(|(name, keywords)| {
            let pattern = keywords
                .iter()
                .map(|k| {
                    let escaped = regex::escape(k);
                    if k.chars().all(|c| c.is_ascii_alphanumeric()) {
                        format!(r"\b{escaped}\b")
                    } else {
                        escaped
                    }
                })
                .collect::<Vec<_>>()
                .join("|");
            (*name, Regex::new(&format!("(?i){pattern}")).expect("valid keyword regex"))
        })
        .collect()
}

static LANGUAGE_MATCHERS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| compile_table(LANGUAGES));
static FRAMEWORK_MATCHERS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| compile_table(FRAMEWORKS));
static DOMAIN_MATCHERS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| compile_table(DOMAINS));

fn first_match(matchers: &[(&'static str, Regex)], text: &str) -> Option<&'static str> {
    matchers.iter().find(|(_, re)| re.is_match(text)).map(|(name, _)| *name)
}

/// Keyword tables exposed for introspection/debugging (§6: `scope_keywords()`).
#[derive(Debug, Clone, Copy)]
pub struct ScopeKeywordTables {
    pub languages: KeywordTable,
    pub frameworks: KeywordTable,
    pub domains: KeywordTable,
}

pub fn scope_keywords() -> ScopeKeywordTables {
    ScopeKeywordTables {
        languages: LANGUAGES,
        frameworks: FRAMEWORKS,
        domains: DOMAINS,
    }
}

/// Guess a scope path for `content` from the keyword tables: first match in
/// each class (language, then framework, then domain) accumulates into one
/// path, and `project` (when given) is appended after them. Content that
/// matches nothing at all, including no project, falls back to the global
/// scope rather than an empty path - an empty `scope_path` would otherwise
/// make a `ScopedRule` match every active context (§4.4.1 step 1).
pub fn detect_scope(content: &str, project: Option<&str>) -> Vec<String> {
    let mut scope = Vec::new();
    if let Some(lang) = first_match(&LANGUAGE_MATCHERS, content) {
        scope.push(lang.to_string());
    }
    if let Some(framework) = first_match(&FRAMEWORK_MATCHERS, content) {
        scope.push(framework.to_string());
    }
    if let Some(domain) = first_match(&DOMAIN_MATCHERS, content) {
        scope.push(domain.to_string());
    }
    if let Some(project) = project {
        if !project.trim().is_empty() {
            scope.push(project.to_string());
        }
    }
    if scope.is_empty() {
        vec!["Global".to_string()]
    } else {
        scope
    }
}

/// The context-node name a `scope` path should be associated with: the
/// lowercase sentinel `"global"` for the unmatched-content fallback, or the
/// last (most specific) element of the path otherwise.
pub fn target_node_name(scope: &[String]) -> String {
    if scope.len() == 1 && scope[0] == "Global" {
        "global".to_string()
    } else {
        scope.last().cloned().unwrap_or_else(|| "global".to_string())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvolutionReport {
    pub rules_created: usize,
    pub rules_validated: usize,
    pub rules_rejected: usize,
    pub nodes_created: usize,
    pub collaboration_requests: Vec<CollaborationRequest>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HypothesisEvolutionReport {
    pub hypotheses_created: usize,
    pub hypotheses_validated: usize,
    pub hypotheses_rejected: usize,
    pub rules_promoted: usize,
}

pub struct Compiler {
    embedder: std::sync::Mutex<Embedder>,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    pub fn new() -> Self {
        Self {
            embedder: std::sync::Mutex::new(Embedder::new(crate::embedder::EmbedderConfig::default())),
        }
    }

    /// Read-only view of the keyword tables, for diagnostics and tests.
    pub fn scope_keywords(&self) -> ScopeKeywordTables {
        scope_keywords()
    }

    /// Guess a scope path for free-text content, e.g. an injector query
    /// with no originating signal metadata.
    pub fn detect_scope(&self, content: &str) -> Vec<String> {
        detect_scope(content, None)
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        self.embedder.lock().unwrap().embed(text)
    }

    fn ensure_node(&self, kernel: &Kernel, scope: &[String], name: &str) -> Result<(bool, ContextNode)> {
        if let Some(existing) = kernel.find_by_name(name) {
            return Ok((false, existing));
        }
        let embedding = self.embed(name);
        let node = ContextNode::new(ContextNodeType::Domain, name, scope, embedding);
        kernel.add_context_node(node.clone())?;
        Ok((true, node))
    }

    fn find_matching_rule(
        kernel: &Kernel,
        scope: &[String],
        target: &str,
        relation: Relation,
    ) -> Option<ScopedRule> {
        kernel
            .query_overlapping_rules(scope)
            .into_iter()
            .chain(kernel.query_scoped_rules(scope, None, None))
            .find(|r| r.target_node == target && r.relation == relation)
    }

    /// Whether an established rule already holds the *opposite* relation
    /// on the same target - the case that should prompt the user instead
    /// of silently overwriting their stated preference (§4.4.1, Socratic
    /// branch).
    fn find_conflicting_rule(kernel: &Kernel, scope: &[String], target: &str, relation: Relation) -> Option<ScopedRule> {
        let opposite = match relation {
            Relation::Prefers => Relation::Avoids,
            Relation::Avoids => Relation::Prefers,
            _ => return None,
        };
        kernel
            .query_scoped_rules(scope, None, None)
            .into_iter()
            .find(|r| r.target_node == target && r.relation == opposite && r.is_established())
    }

    /// Canonical pipeline: each signal directly strengthens (or creates)
    /// the `ScopedRule` it implies. Conflicting signals against an
    /// established rule raise a `CollaborationRequest` instead of
    /// mutating anything.
    pub fn scientific_evolve(&self, kernel: &Kernel, signals: &[Signal]) -> Result<EvolutionReport> {
        let mut report = EvolutionReport::default();

        for signal in signals {
            let scope = detect_scope(&signal.content, signal.metadata.get("project").map(String::as_str));
            let target = target_node_name(&scope);
            let relation = Relation::from_signal_type(signal.signal_type);

            let (created, node) = self.ensure_node(kernel, &scope, &target)?;
            if created {
                report.nodes_created += 1;
            } else {
                kernel.touch_context_node(&node.id);
            }

            if let Some(conflict) = Self::find_conflicting_rule(kernel, &scope, &node.name, relation) {
                report
                    .collaboration_requests
                    .push(kernel.propose_collaboration(
                        signal.content.clone(),
                        &conflict,
                        format!("new signal suggests {relation:?} but an established rule says {:?}", conflict.relation),
                    ));
                continue;
            }

            match Self::find_matching_rule(kernel, &scope, &node.name, relation) {
                Some(existing) => {
                    kernel.update_scoped_rule(&existing.id, |r| r.validate(VALIDATION_BOOST))?;
                    report.rules_validated += 1;
                }
                None => {
                    let embedding = self.embed(&signal.content);
                    let rule = ScopedRule::new(signal.content.clone(), scope.clone(), node.name.clone(), relation, embedding);
                    kernel.add_scoped_rule(rule)?;
                    report.rules_created += 1;
                }
            }
        }

        Ok(report)
    }

    /// Legacy pipeline: stage a `Hypothesis`, only creating/strengthening a
    /// `ScopedRule` once it has been independently validated three times.
    pub fn evolve_scoped(&self, kernel: &Kernel, signals: &[Signal]) -> Result<HypothesisEvolutionReport> {
        let mut report = HypothesisEvolutionReport::default();
        let pending = kernel.get_pending_hypotheses();

        for signal in signals {
            let scope = detect_scope(&signal.content, signal.metadata.get("project").map(String::as_str));
            let target = target_node_name(&scope);
            let relation = Relation::from_signal_type(signal.signal_type);

            let existing = pending.iter().find(|h| {
                h.target_node == target && h.relation == relation && h.scope_path == scope
            });

            match existing {
                Some(hyp) => {
                    let updated = kernel
                        .update_hypothesis(&hyp.id, |h| h.validate())
                        .expect("hypothesis existed in snapshot");
                    report.hypotheses_validated += 1;
                    if updated.state == HypothesisState::Promoted {
                        let rule = ScopedRule::new(
                            updated.content.clone(),
                            updated.scope_path.clone(),
                            updated.target_node.clone(),
                            updated.relation,
                            updated.embedding.clone(),
                        );
                        let mut rule = rule;
                        rule.confidence = PROMOTED_RULE_STARTING_CONFIDENCE;
                        rule.state = RuleState::from_confidence(rule.confidence);
                        rule.promoted_from = Some(updated.id.clone());
                        kernel.add_scoped_rule(rule)?;
                        report.rules_promoted += 1;
                    }
                }
                None => {
                    let embedding = self.embed(&signal.content);
                    let hypothesis = Hypothesis::new(signal.content.clone(), scope, target, relation, embedding);
                    kernel.add_hypothesis(hypothesis);
                    report.hypotheses_created += 1;
                }
            }
        }

        Ok(report)
    }

    /// Explicitly reject the hypothesis matching `content`/`target`, e.g.
    /// when a later signal contradicts it before it is ever promoted.
    pub fn reject_hypothesis(&self, kernel: &Kernel, hypothesis_id: &str) -> Option<Hypothesis> {
        kernel.update_hypothesis(hypothesis_id, |h| h.reject())
    }

    /// Rules that overlap `scope` but are still at Shadow tier - visible
    /// to diagnostics, never surfaced through the Injector (Open Question
    /// resolution: shadow rules are silent-only).
    pub fn shadow_predict(&self, kernel: &Kernel, scope: &[String]) -> Vec<ScopedRule> {
        kernel
            .query_overlapping_rules(scope)
            .into_iter()
            .filter(|r| r.is_shadow())
            .collect()
    }

    /// Manually confirm a shadow rule, e.g. from an out-of-band signal
    /// (explicit "yes, that's right" rather than an inferred one).
    pub fn shadow_validate(&self, kernel: &Kernel, rule_id: &str) -> Result<ScopedRule> {
        kernel.update_scoped_rule(rule_id, |r| r.validate(VALIDATION_BOOST))
    }

    /// When a signal's embedding is only weakly similar to the rule it
    /// would otherwise strengthen, generate a clarifying question instead
    /// of assuming - the "Socratic" branch for ambiguous, not conflicting,
    /// signals.
    pub fn adaptive_socratic(&self, signal: &Signal, candidate: &ScopedRule) -> Option<String> {
        let similarity = cosine(&self.embed(&signal.content), &candidate.embedding);
        if similarity < 0.2 {
            Some(format!(
                "You mentioned \"{}\" - should this update the existing rule \"{}\", or is it unrelated?",
                signal.content, candidate.content
            ))
        } else {
            None
        }
    }

    /// Apply a rejecting signal against the best-matching rule in scope,
    /// used when a correction signal implies an existing rule was wrong.
    pub fn apply_rejection(&self, kernel: &Kernel, scope: &[String], target: &str, relation: Relation) -> Result<Option<ScopedRule>> {
        match Self::find_matching_rule(kernel, scope, target, relation) {
            Some(existing) => {
                let updated = kernel.update_scoped_rule(&existing.id, |r| r.reject(REJECTION_PENALTY))?;
                Ok(Some(updated))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SplkConfig;
    use crate::types::SignalType;

    fn kernel() -> Kernel {
        Kernel::in_memory(SplkConfig::default())
    }

    #[test]
    fn detect_scope_matches_keyword_table() {
        let compiler = Compiler::new();
        assert_eq!(compiler.detect_scope("I love using python for everything"), vec!["Python"]);
        assert_eq!(compiler.detect_scope("the weather is nice today"), vec!["Global".to_string()]);
    }

    #[test]
    fn scientific_evolve_creates_then_validates() {
        let k = kernel();
        let compiler = Compiler::new();
        let signal = Signal::new(SignalType::Preference, "I prefer using pytest for python testing", 0.7, "h1");

        let report = compiler.scientific_evolve(&k, std::slice::from_ref(&signal)).unwrap();
        assert_eq!(report.rules_created, 1);

        let report2 = compiler.scientific_evolve(&k, &[signal]).unwrap();
        assert_eq!(report2.rules_validated, 1);

        let rules = k.query_scoped_rules(&["Python".to_string()], None, None);
        assert_eq!(rules.len(), 1);
        assert!(rules[0].confidence > 0.2);
    }

    #[test]
    fn repeated_validation_reaches_established() {
        let k = kernel();
        let compiler = Compiler::new();
        let signal = Signal::new(SignalType::Preference, "I prefer pytest for python testing", 0.7, "h1");
        for _ in 0..5 {
            compiler.scientific_evolve(&k, std::slice::from_ref(&signal)).unwrap();
        }
        let rules = k.query_scoped_rules(&["Python".to_string()], None, None);
        assert!(rules[0].is_established());
    }

    #[test]
    fn conflicting_signal_raises_collaboration_request_not_overwrite() {
        let k = kernel();
        let compiler = Compiler::new();
        let pref = Signal::new(SignalType::Preference, "I prefer pytest for python testing", 0.9, "h1");
        for _ in 0..5 {
            compiler.scientific_evolve(&k, std::slice::from_ref(&pref)).unwrap();
        }
        let aversion = Signal::new(SignalType::Aversion, "I hate using pytest now for python testing", 0.9, "h2");
        let report = compiler.scientific_evolve(&k, &[aversion]).unwrap();
        assert_eq!(report.collaboration_requests.len(), 1);
        assert_eq!(report.collaboration_requests[0].proposed_options.len(), 3);
    }

    #[test]
    fn hypothesis_promotes_after_three_validations() {
        let k = kernel();
        let compiler = Compiler::new();
        let signal = Signal::new(SignalType::Preference, "I prefer rust for backend services", 0.7, "h1");
        let mut report = HypothesisEvolutionReport::default();
        // One signal creates the hypothesis; three more validate it to
        // `validations == 3`, which is the promotion threshold.
        for _ in 0..4 {
            let r = compiler.evolve_scoped(&k, std::slice::from_ref(&signal)).unwrap();
            report.hypotheses_created += r.hypotheses_created;
            report.hypotheses_validated += r.hypotheses_validated;
            report.rules_promoted += r.rules_promoted;
        }
        assert_eq!(report.rules_promoted, 1);
    }

    #[test]
    fn shadow_rules_are_excluded_from_query_until_validated_further() {
        let k = kernel();
        let compiler = Compiler::new();
        let signal = Signal::new(SignalType::Preference, "I prefer rust generics here", 0.9, "h1");
        // create (0.2) -> validate (0.35, Hypothesis) -> validate (0.50, Shadow).
        for _ in 0..3 {
            compiler.scientific_evolve(&k, std::slice::from_ref(&signal)).unwrap();
        }
        let shadows = compiler.shadow_predict(&k, &["Rust".to_string()]);
        assert_eq!(shadows.len(), 1);

        let established = k
            .query_scoped_rules(&["Rust".to_string()], None, None)
            .into_iter()
            .filter(|r| r.is_established())
            .count();
        assert_eq!(established, 0);
    }
}
