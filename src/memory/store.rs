//! SQLite-backed node repository.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::error::{Error, Result};

use super::repository::NodeRepository;
use super::schema;
use super::similarity::{cosine_similarity, embed_text, tokenize, EMBEDDING_DIM};
use super::types::{Link, LinkId, MemoryNode, NodeId, UpdateFields};

const NODE_COLUMNS: &str =
    "id, title, content, tags, folder_path, credibility, importance, source, created_at, updated_at";

/// Node repository backed by a single SQLite database.
///
/// The connection is shared behind a mutex; each operation holds it for one
/// statement batch. Embeddings are computed at write time from title and
/// content and stored alongside the row.
pub struct SqliteNodeStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteNodeStore {
    /// Open or create a database at the given path.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| Error::Storage(format!("Failed to open database: {}", e)))?;
        schema::initialize_schema(&conn)
            .map_err(|e| Error::Storage(format!("Failed to initialize schema: {}", e)))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory store, useful for tests.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Storage(format!("Failed to open database: {}", e)))?;
        schema::initialize_schema(&conn)
            .map_err(|e| Error::Storage(format!("Failed to initialize schema: {}", e)))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub(crate) fn share_connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|_| Error::Internal("Connection lock poisoned".to_string()))?;
        f(&conn).map_err(|e| Error::Storage(e.to_string()))
    }

    /// Full-text keyword search over titles and content, best rank first.
    pub async fn search_content(&self, query: &str, limit: usize) -> Result<Vec<MemoryNode>> {
        let fts_query = tokenize(query)
            .into_iter()
            .map(|t| format!("\"{}\"", t))
            .collect::<Vec<_>>()
            .join(" ");
        if fts_query.is_empty() {
            return Ok(Vec::new());
        }

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT nodes.id, nodes.title, nodes.content, nodes.tags, nodes.folder_path,
                        nodes.credibility, nodes.importance, nodes.source, nodes.created_at,
                        nodes.updated_at
                 FROM nodes JOIN nodes_fts ON nodes.rowid = nodes_fts.rowid
                 WHERE nodes_fts MATCH ?1
                 ORDER BY rank
                 LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![fts_query, limit as i64], row_to_node)?;
            rows.collect()
        })
    }
}

// ==================== Row Mapping ====================

fn parse_timestamp(text: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn row_to_node(row: &rusqlite::Row) -> rusqlite::Result<MemoryNode> {
    let id_text: String = row.get(0)?;
    let id = Uuid::parse_str(&id_text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let tags_json: String = row.get(3)?;
    let created_at: String = row.get(8)?;
    let updated_at: String = row.get(9)?;

    Ok(MemoryNode {
        id: NodeId(id),
        title: row.get(1)?,
        content: row.get(2)?,
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
        folder_path: row.get(4)?,
        credibility: row.get(5)?,
        importance: row.get(6)?,
        source: row.get(7)?,
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
    })
}

fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn decode_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks(4)
        .filter(|c| c.len() == 4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn node_embedding(title: &str, content: &str) -> Vec<f32> {
    embed_text(&format!("{} {}", title, content), EMBEDDING_DIM)
}

fn tags_to_json(tags: &[String]) -> String {
    serde_json::to_string(tags).unwrap_or_else(|_| "[]".to_string())
}

fn insert_node(conn: &Connection, node: &MemoryNode) -> rusqlite::Result<()> {
    let embedding = encode_embedding(&node_embedding(&node.title, &node.content));
    conn.execute(
        "INSERT INTO nodes (id, title, content, tags, folder_path, credibility, importance,
                            source, embedding, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            node.id.to_string(),
            node.title,
            node.content,
            tags_to_json(&node.tags),
            node.folder_path,
            node.credibility,
            node.importance,
            node.source,
            embedding,
            node.created_at.to_rfc3339(),
            node.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn sort_scored(scored: &mut Vec<(f32, MemoryNode)>) {
    scored.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.1.title.cmp(&b.1.title))
    });
}

// ==================== Repository Implementation ====================

#[async_trait]
impl NodeRepository for SqliteNodeStore {
    async fn find_by_title(&self, title: &str) -> Result<Option<MemoryNode>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!(
                    "SELECT {} FROM nodes WHERE title = ?1 ORDER BY rowid LIMIT 1",
                    NODE_COLUMNS
                ),
                params![title],
                row_to_node,
            )
            .optional()
        })
    }

    async fn find_all_by_title(&self, title: &str) -> Result<Vec<MemoryNode>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM nodes WHERE title = ?1 ORDER BY rowid",
                NODE_COLUMNS
            ))?;
            let rows = stmt.query_map(params![title], row_to_node)?;
            rows.collect()
        })
    }

    async fn search_semantic(
        &self,
        text: &str,
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<MemoryNode>> {
        let probe = embed_text(text, EMBEDDING_DIM);

        let mut scored = self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {}, embedding FROM nodes",
                NODE_COLUMNS
            ))?;
            let rows = stmt.query_map([], |row| {
                let node = row_to_node(row)?;
                let blob: Option<Vec<u8>> = row.get(10)?;
                Ok((node, blob))
            })?;

            let mut scored = Vec::new();
            for row in rows {
                let (node, blob) = row?;
                let embedding = match blob {
                    Some(bytes) => decode_embedding(&bytes),
                    None => node_embedding(&node.title, &node.content),
                };
                let score = cosine_similarity(&probe, &embedding);
                scored.push((score, node));
            }
            Ok(scored)
        })?;

        scored.retain(|(score, _)| *score >= threshold);
        sort_scored(&mut scored);
        scored.truncate(limit);

        Ok(scored.into_iter().map(|(_, node)| node).collect())
    }

    async fn search_similar_title(
        &self,
        title: &str,
        threshold: f32,
    ) -> Result<Vec<MemoryNode>> {
        let probe = embed_text(title, EMBEDDING_DIM);

        let mut scored = self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("SELECT {} FROM nodes", NODE_COLUMNS))?;
            let rows = stmt.query_map([], row_to_node)?;

            let mut scored = Vec::new();
            for row in rows {
                let node = row?;
                let embedding = embed_text(&node.title, EMBEDDING_DIM);
                let score = cosine_similarity(&probe, &embedding);
                scored.push((score, node));
            }
            Ok(scored)
        })?;

        scored.retain(|(score, _)| *score >= threshold);
        sort_scored(&mut scored);

        Ok(scored.into_iter().map(|(_, node)| node).collect())
    }

    async fn list_folder_paths(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT folder_path FROM nodes WHERE folder_path != '' ORDER BY folder_path",
            )?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            rows.collect()
        })
    }

    async fn list_uncategorized(&self) -> Result<Vec<MemoryNode>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM nodes WHERE folder_path = '' ORDER BY rowid",
                NODE_COLUMNS
            ))?;
            let rows = stmt.query_map([], row_to_node)?;
            rows.collect()
        })
    }

    async fn create(&self, node: MemoryNode) -> Result<MemoryNode> {
        self.with_conn(|conn| insert_node(conn, &node))?;
        Ok(node)
    }

    async fn update(&self, id: NodeId, fields: UpdateFields) -> Result<Option<MemoryNode>> {
        self.with_conn(move |conn| {
            let existing = conn
                .query_row(
                    &format!("SELECT {} FROM nodes WHERE id = ?1", NODE_COLUMNS),
                    params![id.to_string()],
                    row_to_node,
                )
                .optional()?;

            let mut node = match existing {
                Some(node) => node,
                None => return Ok(None),
            };

            if let Some(content) = fields.content {
                node.content = content;
            }
            if let Some(credibility) = fields.credibility {
                node.credibility = credibility;
            }
            if let Some(importance) = fields.importance {
                node.importance = importance;
            }
            if let Some(folder_path) = fields.folder_path {
                node.folder_path = folder_path;
            }
            node.updated_at = Utc::now();

            let embedding = encode_embedding(&node_embedding(&node.title, &node.content));
            conn.execute(
                "UPDATE nodes SET content = ?1, credibility = ?2, importance = ?3,
                        folder_path = ?4, embedding = ?5, updated_at = ?6
                 WHERE id = ?7",
                params![
                    node.content,
                    node.credibility,
                    node.importance,
                    node.folder_path,
                    embedding,
                    node.updated_at.to_rfc3339(),
                    id.to_string(),
                ],
            )?;

            Ok(Some(node))
        })
    }

    async fn merge(
        &self,
        source_titles: &[String],
        new_title: &str,
        new_content: &str,
        new_tags: &[String],
        folder_path: &str,
    ) -> Result<Option<MemoryNode>> {
        self.with_conn(|conn| {
            let mut sources: Vec<MemoryNode> = Vec::new();
            {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM nodes WHERE title = ?1 ORDER BY rowid",
                    NODE_COLUMNS
                ))?;
                for title in source_titles {
                    let rows = stmt.query_map(params![title], row_to_node)?;
                    for node in rows {
                        sources.push(node?);
                    }
                }
            }

            if sources.is_empty() {
                return Ok(None);
            }

            let now = Utc::now();
            let merged = MemoryNode {
                id: NodeId::new(),
                title: new_title.to_string(),
                content: new_content.to_string(),
                tags: new_tags.to_vec(),
                folder_path: folder_path.to_string(),
                credibility: sources.iter().fold(0.0f64, |acc, n| acc.max(n.credibility)),
                importance: sources.iter().fold(0.0f64, |acc, n| acc.max(n.importance)),
                source: "merge".to_string(),
                created_at: now,
                updated_at: now,
            };

            let tx = conn.unchecked_transaction()?;
            insert_node(&tx, &merged)?;
            for node in &sources {
                tx.execute(
                    "UPDATE links SET source_id = ?1 WHERE source_id = ?2",
                    params![merged.id.to_string(), node.id.to_string()],
                )?;
                tx.execute(
                    "UPDATE links SET target_id = ?1 WHERE target_id = ?2",
                    params![merged.id.to_string(), node.id.to_string()],
                )?;
                tx.execute(
                    "DELETE FROM nodes WHERE id = ?1",
                    params![node.id.to_string()],
                )?;
            }
            tx.commit()?;

            Ok(Some(merged))
        })
    }

    async fn add_tag(&self, id: NodeId, tag: &str) -> Result<()> {
        self.with_conn(|conn| {
            let mut node = conn.query_row(
                &format!("SELECT {} FROM nodes WHERE id = ?1", NODE_COLUMNS),
                params![id.to_string()],
                row_to_node,
            )?;

            if node.tags.iter().any(|t| t == tag) {
                return Ok(());
            }
            node.tags.push(tag.to_string());

            conn.execute(
                "UPDATE nodes SET tags = ?1, updated_at = ?2 WHERE id = ?3",
                params![
                    tags_to_json(&node.tags),
                    Utc::now().to_rfc3339(),
                    id.to_string(),
                ],
            )?;
            Ok(())
        })
    }

    async fn link(
        &self,
        source: NodeId,
        target: NodeId,
        link_type: &str,
        weight: f64,
        description: &str,
    ) -> Result<Link> {
        let link = Link {
            id: LinkId::new(),
            source_id: source,
            target_id: target,
            link_type: link_type.to_string(),
            weight,
            description: description.to_string(),
            created_at: Utc::now(),
        };

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO links (id, source_id, target_id, link_type, weight, description, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    link.id.to_string(),
                    link.source_id.to_string(),
                    link.target_id.to_string(),
                    link.link_type,
                    link.weight,
                    link.description,
                    link.created_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })?;

        Ok(link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteNodeStore {
        SqliteNodeStore::in_memory().unwrap()
    }

    fn count_links(store: &SqliteNodeStore) -> i64 {
        store
            .with_conn(|conn| conn.query_row("SELECT COUNT(*) FROM links", [], |row| row.get(0)))
            .unwrap()
    }

    #[tokio::test]
    async fn create_and_find_by_title() {
        let store = store();
        store
            .create(MemoryNode::new("Bug: crash on save", "NPE in editor"))
            .await
            .unwrap();

        let found = store.find_by_title("Bug: crash on save").await.unwrap();
        assert_eq!(found.unwrap().content, "NPE in editor");

        assert!(store.find_by_title("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn find_by_title_returns_oldest_of_duplicates() {
        let store = store();
        store
            .create(MemoryNode::new("dup", "first"))
            .await
            .unwrap();
        store
            .create(MemoryNode::new("dup", "second"))
            .await
            .unwrap();

        let found = store.find_by_title("dup").await.unwrap().unwrap();
        assert_eq!(found.content, "first");

        let all = store.find_all_by_title("dup").await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn update_leaves_unpatched_fields_alone() {
        let store = store();
        let node = store
            .create(
                MemoryNode::new("n", "old content")
                    .with_credibility(0.7)
                    .with_importance(0.9),
            )
            .await
            .unwrap();

        let updated = store
            .update(node.id, UpdateFields::new().with_content("new content"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.content, "new content");
        assert_eq!(updated.credibility, 0.7);
        assert_eq!(updated.importance, 0.9);
    }

    #[tokio::test]
    async fn update_missing_returns_none() {
        let store = store();
        let result = store
            .update(NodeId::new(), UpdateFields::new().with_content("x"))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn semantic_search_filters_and_orders() {
        let store = store();
        store
            .create(MemoryNode::new(
                "Editor crash",
                "the editor crashes when saving large files",
            ))
            .await
            .unwrap();
        store
            .create(MemoryNode::new(
                "Pasta recipes",
                "carbonara and cacio e pepe from rome",
            ))
            .await
            .unwrap();

        let results = store
            .search_semantic("editor crashes when saving large files", 0.4, 15)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Editor crash");

        let all = store.search_semantic("anything at all", -1.0, 15).await.unwrap();
        assert_eq!(all.len(), 2);

        let limited = store.search_semantic("anything at all", -1.0, 1).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn similar_title_search_respects_threshold() {
        let store = store();
        store
            .create(MemoryNode::new("NullPointerException", "boom"))
            .await
            .unwrap();

        let exact = store
            .search_similar_title("NullPointerException", 0.92)
            .await
            .unwrap();
        assert_eq!(exact.len(), 1);

        let unrelated = store
            .search_similar_title("completely different topic", 0.92)
            .await
            .unwrap();
        assert!(unrelated.is_empty());
    }

    #[tokio::test]
    async fn merge_absorbs_sources_and_repoints_links() {
        let store = store();
        let a = store.create(MemoryNode::new("A", "a")).await.unwrap();
        let b = store.create(MemoryNode::new("B", "b")).await.unwrap();
        let c = store.create(MemoryNode::new("C", "c")).await.unwrap();
        store.link(c.id, a.id, "refersTo", 1.0, "").await.unwrap();
        store.link(b.id, c.id, "refersTo", 1.0, "").await.unwrap();

        let merged = store
            .merge(
                &["A".to_string(), "B".to_string()],
                "AB",
                "merged content",
                &["merged".to_string()],
                "topics",
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(merged.title, "AB");
        assert!(store.find_by_title("A").await.unwrap().is_none());
        assert!(store.find_by_title("B").await.unwrap().is_none());

        let endpoints: Vec<(String, String)> = store
            .with_conn(|conn| {
                let mut stmt = conn.prepare("SELECT source_id, target_id FROM links")?;
                let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
                rows.collect()
            })
            .unwrap();
        let merged_id = merged.id.to_string();
        let c_id = c.id.to_string();
        assert!(endpoints.contains(&(c_id.clone(), merged_id.clone())));
        assert!(endpoints.contains(&(merged_id.clone(), c_id.clone())));
    }

    #[tokio::test]
    async fn merge_without_matches_returns_none() {
        let store = store();
        let result = store
            .merge(&["ghost".to_string()], "new", "content", &[], "")
            .await
            .unwrap();
        assert!(result.is_none());
        assert!(store.find_by_title("new").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn merge_keeps_strongest_scores() {
        let store = store();
        store
            .create(MemoryNode::new("X", "x").with_credibility(0.6).with_importance(0.3))
            .await
            .unwrap();
        store
            .create(MemoryNode::new("Y", "y").with_credibility(0.9).with_importance(0.8))
            .await
            .unwrap();

        let merged = store
            .merge(&["X".to_string(), "Y".to_string()], "XY", "xy", &[], "")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(merged.credibility, 0.9);
        assert_eq!(merged.importance, 0.8);
    }

    #[tokio::test]
    async fn add_tag_is_idempotent() {
        let store = store();
        let node = store.create(MemoryNode::new("t", "c")).await.unwrap();

        store.add_tag(node.id, "alias").await.unwrap();
        store.add_tag(node.id, "alias").await.unwrap();

        let found = store.find_by_title("t").await.unwrap().unwrap();
        assert_eq!(found.tags, vec!["alias".to_string()]);
    }

    #[tokio::test]
    async fn folder_listing_skips_empty_and_dedupes() {
        let store = store();
        store
            .create(MemoryNode::new("a", "x").with_folder_path("bugs"))
            .await
            .unwrap();
        store
            .create(MemoryNode::new("b", "x").with_folder_path("bugs"))
            .await
            .unwrap();
        store
            .create(MemoryNode::new("c", "x").with_folder_path("ideas"))
            .await
            .unwrap();
        store.create(MemoryNode::new("d", "x")).await.unwrap();

        let folders = store.list_folder_paths().await.unwrap();
        assert_eq!(folders, vec!["bugs".to_string(), "ideas".to_string()]);

        let uncategorized = store.list_uncategorized().await.unwrap();
        assert_eq!(uncategorized.len(), 1);
        assert_eq!(uncategorized[0].title, "d");
    }

    #[tokio::test]
    async fn link_to_missing_node_fails() {
        let store = store();
        let node = store.create(MemoryNode::new("only", "c")).await.unwrap();

        let result = store
            .link(node.id, NodeId::new(), "refersTo", 1.0, "")
            .await;
        assert!(result.is_err());
        assert_eq!(count_links(&store), 0);
    }

    #[tokio::test]
    async fn fts_content_search_matches_keywords() {
        let store = store();
        store
            .create(MemoryNode::new("Gradle build", "daemon runs out of heap space"))
            .await
            .unwrap();
        store
            .create(MemoryNode::new("Lunch spots", "good ramen near the office"))
            .await
            .unwrap();

        let results = store.search_content("heap space", 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Gradle build");
    }

    #[tokio::test]
    async fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memweave.db");

        {
            let store = SqliteNodeStore::open(&path).unwrap();
            store
                .create(MemoryNode::new("durable", "survives reopen"))
                .await
                .unwrap();
        }

        let store = SqliteNodeStore::open(&path).unwrap();
        let found = store.find_by_title("durable").await.unwrap();
        assert_eq!(found.unwrap().content, "survives reopen");
    }
}
