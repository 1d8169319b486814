//! Repository trait for memory graph storage.

use async_trait::async_trait;

use crate::error::Result;

use super::types::{Link, MemoryNode, NodeId, UpdateFields};

/// Storage operations the synthesis pipeline needs.
///
/// [`SqliteNodeStore`](super::SqliteNodeStore) is the bundled implementation;
/// applications with their own storage or embedding service implement this
/// trait instead.
#[async_trait]
pub trait NodeRepository: Send + Sync {
    /// Find the first node with this exact title.
    async fn find_by_title(&self, title: &str) -> Result<Option<MemoryNode>>;

    /// Find every node with this exact title (detects storage drift).
    async fn find_all_by_title(&self, title: &str) -> Result<Vec<MemoryNode>>;

    /// Similarity search over title and content, best match first.
    async fn search_semantic(
        &self,
        text: &str,
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<MemoryNode>>;

    /// Similarity search over titles only, best match first.
    async fn search_similar_title(&self, title: &str, threshold: f32)
        -> Result<Vec<MemoryNode>>;

    /// All distinct non-empty folder paths.
    async fn list_folder_paths(&self) -> Result<Vec<String>>;

    /// All nodes with an empty folder path.
    async fn list_uncategorized(&self) -> Result<Vec<MemoryNode>>;

    /// Persist a new node.
    async fn create(&self, node: MemoryNode) -> Result<MemoryNode>;

    /// Apply a field patch; returns the updated node, or None if absent.
    async fn update(&self, id: NodeId, fields: UpdateFields) -> Result<Option<MemoryNode>>;

    /// Absorb every node matching any of `source_titles` into one new node.
    ///
    /// Links pointing at absorbed nodes are re-pointed at the merged node.
    /// Returns None when no source node matched.
    async fn merge(
        &self,
        source_titles: &[String],
        new_title: &str,
        new_content: &str,
        new_tags: &[String],
        folder_path: &str,
    ) -> Result<Option<MemoryNode>>;

    /// Append a tag if not already present.
    async fn add_tag(&self, id: NodeId, tag: &str) -> Result<()>;

    /// Create a directed link between two nodes.
    async fn link(
        &self,
        source: NodeId,
        target: NodeId,
        link_type: &str,
        weight: f64,
        description: &str,
    ) -> Result<Link>;
}
