//! Signal - the transient unit the Observer emits and the Compiler consumes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Category of an implicit signal extracted from a user/assistant interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalType {
    /// User corrects AI behavior ("No, do X instead").
    Correction,
    /// User expresses a preference ("I prefer X").
    Preference,
    /// User demonstrates communication style.
    Style,
    /// User introduces a new entity (project, technology, concept).
    Entity,
    /// User demonstrates domain expertise.
    Expertise,
    /// User shows dislike ("Don't use X").
    Aversion,
    /// User provides background context.
    Context,
    /// User reveals a personality trait.
    Personality,
    /// User states an objective or goal.
    Goal,
    /// User demonstrates a preferred workflow pattern.
    Workflow,
}

impl SignalType {
    /// Fixed weight used when averaging confidence across a batch of signals (§4.2).
    pub fn aggregate_weight(self) -> f32 {
        match self {
            SignalType::Correction => 2.0,
            SignalType::Preference | SignalType::Aversion => 1.5,
            SignalType::Expertise => 1.3,
            SignalType::Goal => 1.2,
            SignalType::Style => 0.8,
            SignalType::Personality => 0.7,
            SignalType::Entity | SignalType::Context | SignalType::Workflow => 1.0,
        }
    }
}

/// The stream an observation came from, when using the multi-stream Observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObservationStream {
    Browser,
    Ide,
    Terminal,
}

/// A typed, transient signal extracted from one interaction.
///
/// Signals are owned by the Compiler for the duration of a single
/// `evolve` call; they are never persisted as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    pub signal_type: SignalType,
    /// Extracted text, capped to roughly 200 chars by the Observer.
    pub content: String,
    /// Confidence of this extraction, in `[0, 1]`.
    pub confidence: f32,
    /// Deterministic 16-hex digest of the originating interaction, for dedup.
    pub source_hash: String,
    /// Free-form metadata bag (e.g. `stream`, `project`, `file_path`).
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Signal {
    pub fn new(signal_type: SignalType, content: impl Into<String>, confidence: f32, source_hash: impl Into<String>) -> Self {
        Self {
            signal_type,
            content: content.into(),
            confidence: confidence.clamp(0.0, 1.0),
            source_hash: source_hash.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Normalised content, used as part of the dedup key `(type, normalised content)`.
    pub fn normalised_content(&self) -> String {
        self.content.trim().to_lowercase()
    }
}
