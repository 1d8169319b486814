//! Memory graph data types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a memory node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkId(pub Uuid);

impl LinkId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LinkId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A persisted knowledge unit.
///
/// Titles act as a soft key: synthesis resolves references by title during a
/// run, but storage does not enforce title uniqueness. Nodes are never
/// deleted by synthesis; merges absorb them instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryNode {
    pub id: NodeId,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    /// Category path; empty means uncategorized.
    pub folder_path: String,
    /// Confidence in the stored content, in [0, 1].
    pub credibility: f64,
    /// Retrieval priority, in [0, 1].
    pub importance: f64,
    /// Provenance tag.
    pub source: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MemoryNode {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: NodeId::new(),
            title: title.into(),
            content: content.into(),
            tags: Vec::new(),
            folder_path: String::new(),
            credibility: 1.0,
            importance: 0.5,
            source: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_folder_path(mut self, folder_path: impl Into<String>) -> Self {
        self.folder_path = folder_path.into();
        self
    }

    pub fn with_credibility(mut self, credibility: f64) -> Self {
        self.credibility = credibility.clamp(0.0, 1.0);
        self
    }

    pub fn with_importance(mut self, importance: f64) -> Self {
        self.importance = importance.clamp(0.0, 1.0);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn is_uncategorized(&self) -> bool {
        self.folder_path.is_empty()
    }
}

/// A directed, typed edge between two memory nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub id: LinkId,
    pub source_id: NodeId,
    pub target_id: NodeId,
    pub link_type: String,
    pub weight: f64,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl Link {
    pub fn new(source_id: NodeId, target_id: NodeId, link_type: impl Into<String>) -> Self {
        Self {
            id: LinkId::new(),
            source_id,
            target_id,
            link_type: link_type.into(),
            weight: 1.0,
            description: String::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Field-level patch for node updates. None leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateFields {
    pub content: Option<String>,
    pub credibility: Option<f64>,
    pub importance: Option<f64>,
    pub folder_path: Option<String>,
}

impl UpdateFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_credibility(mut self, credibility: f64) -> Self {
        self.credibility = Some(credibility.clamp(0.0, 1.0));
        self
    }

    pub fn with_importance(mut self, importance: f64) -> Self {
        self.importance = Some(importance.clamp(0.0, 1.0));
        self
    }

    pub fn with_folder_path(mut self, folder_path: impl Into<String>) -> Self {
        self.folder_path = Some(folder_path.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_none()
            && self.credibility.is_none()
            && self.importance.is_none()
            && self.folder_path.is_none()
    }
}
