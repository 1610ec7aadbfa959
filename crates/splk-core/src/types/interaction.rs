//! InteractionLog - transient record of one (user, assistant) turn, and the
//! bounded registry that survives garbage collection to keep dedup working.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::VecDeque;

#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionLog {
    pub id: String,
    pub user_input: String,
    pub ai_output: String,
    pub timestamp: DateTime<Utc>,
    pub processed: bool,
    pub compilation_target: Option<String>,
}

impl InteractionLog {
    pub fn new(user_input: impl Into<String>, ai_output: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_input: user_input.into(),
            ai_output: ai_output.into(),
            timestamp: Utc::now(),
            processed: false,
            compilation_target: None,
        }
    }

    /// First 16 hex chars of `SHA-256("user|ai")`.
    pub fn content_hash(&self) -> String {
        content_hash(&self.user_input, &self.ai_output)
    }
}

/// Deterministic 16-hex digest of a `(user, ai)` pair, shared by
/// `InteractionLog::content_hash` and anything that needs to check dedup
/// before constructing a full log.
pub fn content_hash(user_input: &str, ai_output: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_input.as_bytes());
    hasher.update(b"|");
    hasher.update(ai_output.as_bytes());
    let digest = hasher.finalize();
    digest.iter().take(8).map(|b| format!("{:02x}", b)).collect()
}

/// Bounded set of processed content hashes (§3, invariant 4 in §4.3).
///
/// Survivors beyond `max_size` are vanishingly unlikely to reappear, so
/// overflow evicts an arbitrary (oldest-inserted) entry rather than
/// maintaining full LRU order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedInteractionRegistry {
    order: VecDeque<String>,
    #[serde(skip)]
    lookup: std::collections::HashSet<String>,
    pub max_size: usize,
}

impl Default for ProcessedInteractionRegistry {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl ProcessedInteractionRegistry {
    pub fn new(max_size: usize) -> Self {
        Self {
            order: VecDeque::new(),
            lookup: std::collections::HashSet::new(),
            max_size,
        }
    }

    pub fn is_processed(&self, hash: &str) -> bool {
        self.lookup.contains(hash)
    }

    pub fn register(&mut self, hash: impl Into<String>) {
        let hash = hash.into();
        if self.lookup.contains(&hash) {
            return;
        }
        if self.order.len() >= self.max_size {
            if let Some(oldest) = self.order.pop_front() {
                self.lookup.remove(&oldest);
            }
        }
        self.lookup.insert(hash.clone());
        self.order.push_back(hash);
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Rebuild the lookup index after deserialization (serde skips it).
    pub fn rebuild_index(&mut self) {
        self.lookup = self.order.iter().cloned().collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_hash_is_deterministic() {
        let a = content_hash("hi", "hello");
        let b = content_hash("hi", "hello");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn registry_rejects_duplicates() {
        let mut reg = ProcessedInteractionRegistry::new(10);
        reg.register("abc");
        assert!(reg.is_processed("abc"));
        reg.register("abc");
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn registry_evicts_on_overflow() {
        let mut reg = ProcessedInteractionRegistry::new(2);
        reg.register("a");
        reg.register("b");
        reg.register("c");
        assert_eq!(reg.len(), 2);
        assert!(!reg.is_processed("a"));
        assert!(reg.is_processed("c"));
    }
}
