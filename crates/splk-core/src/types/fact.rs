//! UserFact - a low-priority, observational preference.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a `UserFact` came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactSource {
    Observation,
    Explicit,
    Inferred,
}

#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserFact {
    pub id: String,
    pub content: String,
    pub scope_path: Vec<String>,
    pub priority: i64,
    pub confidence: f32,
    pub validation_count: u32,
    pub source: FactSource,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserFact {
    pub fn new(content: impl Into<String>, scope_path: Vec<String>, source: FactSource) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            content: content.into(),
            scope_path,
            priority: 5,
            confidence: 0.5,
            validation_count: 0,
            source,
            created_at: now,
            updated_at: now,
        }
    }

    /// A fact "conflicts" with a goal when they share a scope prefix relationship
    /// and their contents disagree in normalised form. Since the kernel does not
    /// attempt semantic contradiction detection (Non-goals, §1), conflict here is
    /// defined narrowly: identical normalised content under overlapping scopes is
    /// never a conflict, and the Injector otherwise treats all facts as
    /// non-conflicting with goals it has already selected.
    pub fn conflicts_with_goal(&self, goal_content_lower: &str) -> bool {
        self.content.trim().to_lowercase() == goal_content_lower
    }
}
