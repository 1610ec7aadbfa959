//! # SPLK Core
//!
//! Scoped probabilistic learning kernel: extracts typed signals from
//! user/assistant interactions, evolves them into scoped behavioral rules
//! through a hypothesis -> shadow -> validating -> established ->
//! deprecated state machine, maintains time-decayed goal/fact priority
//! hierarchies, and renders the surviving rules into a prompt-injectable
//! Markdown fragment.
//!
//! ## Pipeline
//!
//! ```rust,ignore
//! use splk_core::{Kernel, Compiler, Observer, SplkConfig, injector};
//!
//! let kernel = Kernel::new(SplkConfig::default());
//! let mut observer = Observer::new();
//! let compiler = Compiler::new();
//!
//! let signals = observer.observe("I prefer pytest for testing", "Got it.");
//! compiler.scientific_evolve(&kernel, &signals)?;
//!
//! let prompt = injector::generate_system_prompt(&kernel, "how do I write python tests?");
//! # Ok::<(), splk_core::SplkError>(())
//! ```
//!
//! ## Module Overview
//!
//! - [`types`]: the leaf entity layer every other module depends on.
//! - [`embedder`]: deterministic TF-IDF/hash embedding, no ML model needed.
//! - [`observer`]: regex-driven signal extraction, single- and multi-stream.
//! - [`compiler`]: signal -> rule evolution, both the direct and
//!   hypothesis-gated pipelines.
//! - [`kernel`]: the single source of truth, behind one re-entrant lock.
//! - [`storage`]: gzip JSONL cold storage and archive recompilation.
//! - [`injector`]: Markdown system-prompt assembly.

#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULES
// ============================================================================

pub mod compiler;
pub mod config;
pub mod embedder;
pub mod error;
pub mod injector;
pub mod kernel;
pub mod observer;
pub mod storage;
pub mod types;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

pub use compiler::{Compiler, EvolutionReport, HypothesisEvolutionReport};
pub use config::{Pipeline, SplkConfig};
pub use embedder::{cosine, Embedder, EmbedderConfig};
pub use error::{Result, SplkError};
pub use kernel::{Kernel, KernelExport, KernelMetrics};
pub use observer::{AttentionFilter, MultiStreamObserver, Observer};
pub use storage::{ArchiveEntry, ColdStorage, RecompileReport};
pub use types::{
    CollaborationRequest, ContextNode, ContextNodeType, FactSource, Hypothesis, HypothesisState,
    InteractionLog, ObservationStream, ProcessedInteractionRegistry, Relation, RuleState,
    ScopedRule, Signal, SignalType, StyleDimension, StyleVector, UserFact, UserGoal,
};

// ============================================================================
// VERSION INFO
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Kernel export format major version (see [`kernel::EXPORT_VERSION`]).
pub const EXPORT_VERSION: u64 = kernel::EXPORT_VERSION;

// ============================================================================
// PRELUDE
// ============================================================================

/// Convenient imports for common usage.
pub mod prelude {
    pub use crate::{
        Compiler, ContextNode, ContextNodeType, Kernel, Observer, Relation, Result, RuleState,
        Signal, SignalType, SplkConfig, SplkError, UserFact, UserGoal,
    };
    pub use crate::injector;
}
