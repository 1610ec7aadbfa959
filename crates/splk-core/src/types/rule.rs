//! ScopedRule - the central persistent entity: a learned statement with a
//! scope, a confidence-derived state, and a reinforcement/rejection history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::signal::SignalType;

/// Relationship the rule expresses between the source (usually the user)
/// and the target scope/node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relation {
    Prefers,
    Avoids,
    Requires,
    ExpertIn,
    Learning,
    Uses,
}

impl Relation {
    /// Derive the relation a fresh rule should carry from the signal that
    /// created it (§4.4.1, branch "No match").
    pub fn from_signal_type(signal_type: SignalType) -> Self {
        match signal_type {
            SignalType::Preference => Relation::Prefers,
            SignalType::Aversion => Relation::Avoids,
            SignalType::Expertise => Relation::ExpertIn,
            SignalType::Correction => Relation::Prefers,
            SignalType::Workflow => Relation::Uses,
            _ => Relation::Prefers,
        }
    }
}

/// Lifecycle state of a `ScopedRule`, always a pure function of `confidence`
/// (invariant 2, §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleState {
    Hypothesis,
    Shadow,
    Validating,
    Established,
    Deprecated,
}

impl RuleState {
    /// Map a confidence value to the state the kernel invariant mandates.
    pub fn from_confidence(confidence: f32) -> Self {
        if confidence >= 0.8 {
            RuleState::Established
        } else if confidence >= 0.6 {
            RuleState::Validating
        } else if confidence >= 0.4 {
            RuleState::Shadow
        } else if confidence >= 0.2 {
            RuleState::Hypothesis
        } else {
            RuleState::Deprecated
        }
    }
}

/// A learned, scoped behavioral statement.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopedRule {
    pub id: String,
    pub content: String,
    /// Ordered scope names; `[]` means global.
    pub scope_path: Vec<String>,
    pub target_node: String,
    pub source_node: String,
    pub relation: Relation,
    pub confidence: f32,
    pub state: RuleState,
    pub validation_count: u32,
    pub rejection_count: u32,
    pub source_count: u32,
    pub weight: f32,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_activated: DateTime<Utc>,
    pub promoted_from: Option<String>,
}

impl ScopedRule {
    pub fn new(
        content: impl Into<String>,
        scope_path: Vec<String>,
        target_node: impl Into<String>,
        relation: Relation,
        embedding: Vec<f32>,
    ) -> Self {
        let now = Utc::now();
        let confidence = 0.2;
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            content: content.into(),
            scope_path,
            target_node: target_node.into(),
            source_node: "user".to_string(),
            relation,
            confidence,
            state: RuleState::from_confidence(confidence),
            validation_count: 0,
            rejection_count: 0,
            source_count: 1,
            weight: 0.5,
            embedding,
            created_at: now,
            updated_at: now,
            last_activated: now,
            promoted_from: None,
        }
    }

    /// Strengthen the rule (§4.4.1): boost confidence, update state, bump counters.
    pub fn validate(&mut self, boost: f32) {
        self.confidence = (self.confidence + boost).clamp(0.0, 1.0);
        self.state = RuleState::from_confidence(self.confidence);
        self.validation_count += 1;
        self.source_count += 1;
        self.updated_at = Utc::now();
        self.last_activated = self.updated_at;
    }

    /// Weaken the rule (§4.4.1): penalise confidence, update state, bump counters.
    pub fn reject(&mut self, penalty: f32) {
        self.confidence = (self.confidence - penalty).clamp(0.0, 1.0);
        self.state = RuleState::from_confidence(self.confidence);
        self.rejection_count += 1;
        self.updated_at = Utc::now();
    }

    pub fn activate(&mut self) {
        self.last_activated = Utc::now();
    }

    pub fn is_established(&self) -> bool {
        self.state == RuleState::Established
    }

    pub fn is_shadow(&self) -> bool {
        self.state == RuleState::Shadow
    }

    /// Whether `self.scope_path` is a (case-insensitive) prefix of `active_context`.
    pub fn scope_matches(&self, active_context: &[String]) -> bool {
        if self.scope_path.len() > active_context.len() {
            return false;
        }
        self.scope_path
            .iter()
            .zip(active_context.iter())
            .all(|(a, b)| a.eq_ignore_ascii_case(b))
    }

    /// Whether `self.scope_path` overlaps `scope` by at least one element
    /// (case-insensitive), used by shadow prediction (§4.4.3).
    pub fn scope_overlaps(&self, scope: &[String]) -> bool {
        self.scope_path
            .iter()
            .any(|a| scope.iter().any(|b| a.eq_ignore_ascii_case(b)))
    }
}
