//! ContextNode - a node in the scope graph (language/framework/domain/project/...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category of a context node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextNodeType {
    Language,
    Framework,
    Domain,
    Project,
    Technology,
    Paradigm,
    Environment,
}

/// A node in the Kernel's context graph.
///
/// Parent/child edges are acyclic by construction: a node's `scope_path`
/// is always `parent.scope_path ++ [self.name]`, computed once at
/// insertion time and never mutated afterwards.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextNode {
    pub id: String,
    pub node_type: ContextNodeType,
    pub name: String,
    pub parent_id: Option<String>,
    #[serde(default)]
    pub children_ids: Vec<String>,
    pub embedding: Vec<f32>,
    pub weight: f32,
    pub reference_count: u64,
    pub created_at: DateTime<Utc>,
    pub last_referenced: DateTime<Utc>,
    /// Precomputed `parent.scope_path ++ [name]`.
    pub scope_path: Vec<String>,
}

impl ContextNode {
    pub fn new(
        node_type: ContextNodeType,
        name: impl Into<String>,
        parent_scope_path: &[String],
        embedding: Vec<f32>,
    ) -> Self {
        let name = name.into();
        let now = Utc::now();
        let mut scope_path = parent_scope_path.to_vec();
        scope_path.push(name.clone());
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            node_type,
            name,
            parent_id: None,
            children_ids: Vec::new(),
            embedding,
            weight: 0.5,
            reference_count: 1,
            created_at: now,
            last_referenced: now,
            scope_path,
        }
    }

    pub fn reference(&mut self) {
        self.last_referenced = Utc::now();
        self.reference_count += 1;
        self.weight = (self.weight + 0.05).min(1.0);
    }

    /// A node is prunable iff it has no children and is not a rule's target.
    pub fn is_leaf(&self) -> bool {
        self.children_ids.is_empty()
    }
}
