//! # memweave-core
//!
//! A memory graph that grows out of conversations. After each exchange, a
//! model call distills what is worth keeping into nodes, links and profile
//! updates, which are reconciled against a SQLite-backed graph.
//!
//! ## Core Components
//!
//! - **Conversation**: chat transcripts and the scrubbing applied before
//!   analysis
//! - **Memory**: graph nodes, links and the SQLite repository
//! - **Profile**: the user preference profile and its store
//! - **Llm**: completion clients and token accounting
//! - **Synthesis**: the analysis pipeline, reconciliation engine and
//!   folder categorizer
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use memweave_core::{
//!     AnthropicClient, ClientConfig, Conversation, SqliteNodeStore,
//!     SqliteProfileStore, SynthesisCoordinator,
//! };
//!
//! let store = Arc::new(SqliteNodeStore::open("memory.db")?);
//! let profile = Arc::new(SqliteProfileStore::from_node_store(&store)?);
//! let client = Arc::new(AnthropicClient::new(ClientConfig::new(api_key)));
//!
//! let coordinator = Arc::new(SynthesisCoordinator::new(store, profile, client));
//! let outcome = coordinator.synthesize(&solution, &history).await?;
//! println!("synthesis: {:?}", outcome);
//! ```

pub mod conversation;
pub mod error;
pub mod llm;
pub mod memory;
pub mod profile;
pub mod synthesis;

// Re-exports for convenience
pub use conversation::{ChatRole, ChatTurn, Conversation};
pub use error::{Error, Result};
pub use llm::{
    AnthropicClient, ClientConfig, CompletionClient, CompletionRequest, CompletionResponse,
    OpenAiClient, TokenUsage, UsageTracker,
};
pub use memory::{
    Link, LinkId, MemoryNode, NodeId, NodeRepository, SqliteNodeStore, UpdateFields,
};
pub use profile::{
    PreferenceProfile, PreferenceStore, PreferenceUpdate, SqliteProfileStore,
};
pub use synthesis::{
    Analysis, ApplyReport, CategorizeReport, Entity, LinkSpec, MergeSpec, SynthesisCoordinator,
    SynthesisOptions, SynthesisOutcome, UpdateSpec,
};
