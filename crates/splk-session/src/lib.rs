//! # SPLK Session
//!
//! Thin session-level facade over [`splk_core`]: `observe`, `teach`,
//! `inject`, `save`, `load`, `close`. Composes `Kernel`, `Compiler`,
//! `Observer`, `Embedder`, and `ColdStorage` behind one API, matching the
//! shape in the kernel's external-interfaces contract.
//!
//! This crate never initializes a global `tracing` subscriber itself -
//! the embedding application wires one up (see [`build_env_filter`] for a
//! convenience helper that mirrors how the teacher's binary did it).

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};

use splk_core::compiler::{target_node_name, Compiler};
use splk_core::config::{Pipeline, SplkConfig};
use splk_core::injector;
use splk_core::kernel::{Kernel, KernelExport};
use splk_core::observer::Observer;
use splk_core::types::{ContextNodeType, InteractionLog, Relation, ScopedRule, Signal};
use splk_core::SplkError;

mod error;
pub use error::SessionError;

pub type Result<T> = std::result::Result<T, SessionError>;

/// Build (but do not install) a `tracing-subscriber` layer honoring
/// `RUST_LOG`, falling back to `config.log_level`. The embedding
/// application decides whether and how to call `.init()` - this crate
/// never does it implicitly.
pub fn build_env_filter(config: &SplkConfig) -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level))
}

/// Teach categories accepted by [`Session::teach`]; anything else maps to
/// `Behavioral` at the API boundary rather than erroring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeachCategory {
    Preference,
    Style,
    Expertise,
    Workflow,
    Personality,
    Behavioral,
}

impl TeachCategory {
    pub fn parse(raw: &str) -> Self {
        match raw.to_lowercase().as_str() {
            "preference" => TeachCategory::Preference,
            "style" => TeachCategory::Style,
            "expertise" => TeachCategory::Expertise,
            "workflow" => TeachCategory::Workflow,
            "personality" => TeachCategory::Personality,
            _ => TeachCategory::Behavioral,
        }
    }

    fn relation(self) -> Relation {
        match self {
            TeachCategory::Preference | TeachCategory::Behavioral => Relation::Prefers,
            TeachCategory::Style => Relation::Prefers,
            TeachCategory::Expertise => Relation::ExpertIn,
            TeachCategory::Workflow => Relation::Uses,
            TeachCategory::Personality => Relation::Prefers,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum ObserveResult {
    Observed {
        log_id: String,
        signals_extracted: usize,
        rules_created: usize,
        rules_validated: usize,
        collaboration_requests: usize,
    },
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InjectResult {
    pub system_prompt: String,
    pub rules_used: usize,
    pub estimated_tokens: usize,
}

/// On-disk export envelope. `version` follows semver; only the major
/// component is checked strictly (§6: minor/patch mismatches must still
/// load).
#[derive(Serialize, Deserialize)]
struct ExportEnvelope {
    version: String,
    kernel: KernelExport,
}

const SCHEMA_VERSION: &str = "1.0.0";

fn major_version(v: &str) -> Option<u64> {
    v.split('.').next()?.parse().ok()
}

/// The session-level facade. Owns a `Kernel`, `Compiler`, `Observer`, and
/// the configuration the whole pipeline was constructed with.
pub struct Session {
    kernel: Kernel,
    compiler: Compiler,
    observer: Observer,
    config: SplkConfig,
    observations_since_gc: u32,
    active_scope: Vec<String>,
}

impl Session {
    pub fn new(config: SplkConfig) -> Result<Self> {
        Ok(Self {
            kernel: Kernel::new(config.clone()),
            compiler: Compiler::new(),
            observer: Observer::new(),
            config,
            observations_since_gc: 0,
            active_scope: Vec::new(),
        })
    }

    /// Restrict which scope `inject` and scope-detection default to; the
    /// compiler still detects per-signal scope independently of this.
    pub fn set_active_scope(&mut self, scope: Vec<String>) {
        self.active_scope = scope;
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    /// Log an interaction, extract signals, and (unless `evolve` is
    /// false) run the configured pipeline against them. A duplicate
    /// interaction (same content hash already processed) is a no-op.
    pub fn observe(&mut self, user: &str, ai: &str, evolve: bool) -> Result<ObserveResult> {
        let log = InteractionLog::new(user, ai);
        let log_id = match self.kernel.log_interaction(log) {
            Some(id) => id,
            None => {
                tracing::debug!(target: "splk_session", "duplicate interaction skipped");
                return Ok(ObserveResult::Skipped);
            }
        };

        let signals: Vec<Signal> = self.observer.observe(user, ai);
        let signals_extracted = signals.len();

        let (rules_created, rules_validated, collaboration_requests) = if evolve && self.config.auto_evolve {
            match self.config.pipeline {
                Pipeline::Scientific => {
                    let report = self.compiler.scientific_evolve(&self.kernel, &signals)?;
                    (report.rules_created, report.rules_validated, report.collaboration_requests.len())
                }
                Pipeline::HypothesisBased => {
                    let report = self.compiler.evolve_scoped(&self.kernel, &signals)?;
                    (report.rules_promoted, report.hypotheses_validated, 0)
                }
            }
        } else {
            (0, 0, 0)
        };

        self.kernel.mark_interaction_processed(&log_id, None);

        self.observations_since_gc += 1;
        if self.observations_since_gc >= self.config.gc_threshold {
            let collected = self.kernel.garbage_collect()?;
            tracing::info!(target: "splk_session", collected, "automatic garbage collection ran");
            self.observations_since_gc = 0;
        }

        Ok(ObserveResult::Observed {
            log_id,
            signals_extracted,
            rules_created,
            rules_validated,
            collaboration_requests,
        })
    }

    /// Force-create an ESTABLISHED rule from an explicit instruction,
    /// skipping the hypothesis/shadow pipeline entirely.
    pub fn teach(&mut self, instruction: &str, category: &str) -> Result<String> {
        if instruction.trim().is_empty() {
            return Err(SplkError::Validation("teach instruction must not be empty".into()).into());
        }
        let category = TeachCategory::parse(category);
        let scope = self.compiler.detect_scope(instruction);
        let target = target_node_name(&scope);

        if self.kernel.find_by_name(&target).is_none() {
            let node = splk_core::types::ContextNode::new(ContextNodeType::Domain, &target, &scope, vec![]);
            self.kernel.add_context_node(node)?;
        }

        let mut rule = ScopedRule::new(instruction, scope, target, category.relation(), vec![]);
        rule.confidence = 0.9;
        rule.state = splk_core::types::RuleState::from_confidence(rule.confidence);
        let rule_id = self.kernel.add_scoped_rule(rule)?;
        tracing::info!(target: "splk_session", rule_id = %rule_id, "taught rule established directly");
        Ok(rule_id)
    }

    /// Delegate to the Injector for the given free-text query. The Injector
    /// runs its own scope detection on `query`; `set_active_scope` overrides
    /// that detection with a fixed scope when set.
    pub fn inject(&self, query: &str) -> InjectResult {
        let scope;
        let system_prompt = if self.active_scope.is_empty() {
            scope = self.compiler.detect_scope(query);
            injector::generate_system_prompt(&self.kernel, query)
        } else {
            scope = self.active_scope.clone();
            injector::generate_system_prompt_for_scope(&self.kernel, &scope)
        };
        let rules_used = self
            .kernel
            .query_scoped_rules(&scope, None, None)
            .iter()
            .filter(|r| r.is_established())
            .count();
        let estimated_tokens = system_prompt.split_whitespace().count() * 4 / 3;
        InjectResult {
            system_prompt,
            rules_used,
            estimated_tokens,
        }
    }

    /// Serialise the kernel as one JSON object, gzip-framed when `path`
    /// ends in `.gz`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let envelope = ExportEnvelope {
            version: SCHEMA_VERSION.to_string(),
            kernel: self.kernel.export(),
        };
        let json = serde_json::to_vec(&envelope)?;

        if path.extension().and_then(|e| e.to_str()) == Some("gz") {
            let file = File::create(path)?;
            let mut encoder = GzEncoder::new(file, Compression::default());
            encoder.write_all(&json)?;
            encoder.finish()?;
        } else {
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = if path.extension().and_then(|e| e.to_str()) == Some("gz") {
            let file = File::open(path)?;
            let mut decoder = GzDecoder::new(file);
            let mut buf = Vec::new();
            decoder.read_to_end(&mut buf)?;
            buf
        } else {
            std::fs::read(path)?
        };

        let envelope: ExportEnvelope = serde_json::from_slice(&bytes)?;
        let found_major = major_version(&envelope.version)
            .ok_or_else(|| SplkError::Integrity(format!("unparseable version: {}", envelope.version)))?;
        let expected_major = major_version(SCHEMA_VERSION).unwrap();
        if found_major != expected_major {
            return Err(SplkError::VersionMismatch {
                expected: expected_major,
                found: found_major,
            }
            .into());
        }

        self.kernel.load(envelope.kernel)?;
        Ok(())
    }

    /// Flush cold storage and drop working-memory caches. After `close`
    /// the session may still be queried, but further `observe` calls will
    /// re-open the archive file lazily.
    pub fn close(&mut self) -> Result<()> {
        self.kernel.garbage_collect()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(SplkConfig {
            gc_threshold: 1000,
            ..SplkConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn observe_then_duplicate_is_skipped() {
        let mut s = session();
        let first = s.observe("I prefer pytest", "ok", true).unwrap();
        assert!(matches!(first, ObserveResult::Observed { .. }));
        let second = s.observe("I prefer pytest", "ok", true).unwrap();
        assert!(matches!(second, ObserveResult::Skipped));
    }

    #[test]
    fn teach_creates_established_rule_immediately() {
        let mut s = session();
        let rule_id = s.teach("always use type hints in python", "preference").unwrap();
        let rule = s.kernel().get_scoped_rule(&rule_id).unwrap();
        assert!(rule.is_established());
        assert_eq!(rule.confidence, 0.9);
    }

    #[test]
    fn unknown_category_maps_to_behavioral() {
        assert_eq!(TeachCategory::parse("nonsense"), TeachCategory::Behavioral);
    }

    #[test]
    fn inject_surfaces_taught_rule() {
        let mut s = session();
        s.teach("prefer pytest for python testing", "preference").unwrap();
        let result = s.inject("How should I write tests in python?");
        assert!(result.system_prompt.contains("VERIFIED BEHAVIORS"));
        assert_eq!(result.rules_used, 1);
    }

    #[test]
    fn save_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kernel.json.gz");

        let mut s = session();
        s.teach("prefer tabs over spaces", "preference").unwrap();
        s.save(&path).unwrap();

        let mut s2 = session();
        s2.load(&path).unwrap();
        assert_eq!(s2.kernel().metrics().rule_count, 1);
    }
}
