//! Memory graph storage.
//!
//! Nodes are titled knowledge units; links are typed, weighted edges between
//! them. The synthesis pipeline reaches storage only through
//! [`NodeRepository`], so any backend works; [`SqliteNodeStore`] is the
//! bundled one (rusqlite, WAL, FTS5 keyword index, hash-embedding similarity
//! scoring).
//!
//! # Example
//!
//! ```ignore
//! use memweave_core::memory::{MemoryNode, NodeRepository, SqliteNodeStore};
//!
//! let store = SqliteNodeStore::open("memweave.db")?;
//! store
//!     .create(MemoryNode::new("Bug: crash on save", "NPE when the buffer is empty"))
//!     .await?;
//! let hits = store.search_semantic("crash while saving", 0.4, 15).await?;
//! ```

mod repository;
mod schema;
mod similarity;
mod store;
mod types;

pub use repository::NodeRepository;
pub use schema::{get_schema_version, initialize_schema, is_initialized, SCHEMA_VERSION};
pub use store::SqliteNodeStore;
pub use types::{Link, LinkId, MemoryNode, NodeId, UpdateFields};
