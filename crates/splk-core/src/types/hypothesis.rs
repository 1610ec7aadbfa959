//! Hypothesis - the legacy evolution pipeline's candidate rule.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::rule::Relation;

/// Lifecycle state of a `Hypothesis`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HypothesisState {
    Pending,
    Validating,
    Promoted,
    Rejected,
    Expired,
}

/// A candidate rule that has not yet been promoted to a `ScopedRule`.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hypothesis {
    pub id: String,
    pub content: String,
    pub scope_path: Vec<String>,
    pub target_node: String,
    pub relation: Relation,
    pub confidence: f32,
    pub state: HypothesisState,
    pub embedding: Vec<f32>,
    pub validations: u32,
    pub rejections: u32,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub validation_interactions: u32,
}

impl Hypothesis {
    pub fn new(
        content: impl Into<String>,
        scope_path: Vec<String>,
        target_node: impl Into<String>,
        relation: Relation,
        embedding: Vec<f32>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            content: content.into(),
            scope_path,
            target_node: target_node.into(),
            relation,
            confidence: 0.1,
            state: HypothesisState::Pending,
            embedding,
            validations: 0,
            rejections: 0,
            created_at: now,
            expires_at: now + Duration::hours(24),
            validation_interactions: 0,
        }
    }

    /// §4.4.2 step 3: `validations++`, confidence capped at 0.9, PROMOTED at >= 3.
    pub fn validate(&mut self) {
        self.validations += 1;
        self.confidence = (self.confidence + 0.2).min(0.9);
        self.state = if self.validations >= 3 {
            HypothesisState::Promoted
        } else {
            HypothesisState::Validating
        };
    }

    /// §4.4.2 step 4: `rejections++`, confidence floored at 0.0, dropped at >= 2.
    pub fn reject(&mut self) {
        self.rejections += 1;
        self.confidence = (self.confidence - 0.3).max(0.0);
        if self.rejections >= 2 {
            self.state = HypothesisState::Rejected;
        }
    }

    pub fn tick_interaction(&mut self, now: DateTime<Utc>) {
        self.validation_interactions += 1;
        if self.expires_at < now || self.validation_interactions >= 10 {
            self.state = HypothesisState::Expired;
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, HypothesisState::Pending | HypothesisState::Validating)
    }
}
