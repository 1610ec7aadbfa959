//! CollaborationRequest - a structured prompt-to-the-user, never mutated once produced.

use serde::{Deserialize, Serialize};

#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollaborationRequest {
    pub id: String,
    pub trigger_signal: String,
    pub conflicting_rule: String,
    pub reason: String,
    pub proposed_options: Vec<String>,
}

impl CollaborationRequest {
    /// The three canonical options every conflict-resolution request offers.
    pub fn canonical(
        trigger_signal: impl Into<String>,
        conflicting_rule: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            trigger_signal: trigger_signal.into(),
            conflicting_rule: conflicting_rule.into(),
            reason: reason.into(),
            proposed_options: vec![
                "Replace".to_string(),
                "Keep".to_string(),
                "Create exception".to_string(),
            ],
        }
    }
}
