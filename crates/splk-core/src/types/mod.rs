//! Shared entity types.
//!
//! Every component (`observer`, `compiler`, `kernel`, `storage`, `injector`)
//! depends on this module; it depends on none of them. This is the leaf
//! layer that keeps the component graph acyclic.

mod collaboration;
mod context_node;
mod fact;
mod goal;
mod hypothesis;
mod interaction;
mod rule;
mod signal;
mod style;

pub use collaboration::CollaborationRequest;
pub use context_node::{ContextNode, ContextNodeType};
pub use fact::{FactSource, UserFact};
pub use goal::UserGoal;
pub use hypothesis::{Hypothesis, HypothesisState};
pub use interaction::{content_hash, InteractionLog, ProcessedInteractionRegistry};
pub use rule::{Relation, RuleState, ScopedRule};
pub use signal::{ObservationStream, Signal, SignalType};
pub use style::{StyleDimension, StyleVector};
