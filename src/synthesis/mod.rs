//! Conversation-to-graph synthesis.
//!
//! After an exchange ends, one synthesis pass distills it into memory
//! graph operations:
//!
//! 1. **Context**: retrieve related nodes, duplicate-title warnings, the
//!    folder taxonomy and the user profile, and assemble one completion
//!    request around the exchange.
//! 2. **Completion**: a single model call whose reply is a compact JSON
//!    object of operations.
//! 3. **Parse**: decode the reply defensively; anything unusable becomes
//!    the empty analysis and the pass ends without writes.
//! 4. **Reconcile**: apply merges, updates, the preference delta, the
//!    main topic, entities and links against the repository, in that
//!    fixed order.
//!
//! A separate categorization pass sweeps nodes that were stored without a
//! folder and asks the model to place them, ten at a time.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use memweave_core::llm::{AnthropicClient, ClientConfig};
//! use memweave_core::memory::SqliteNodeStore;
//! use memweave_core::profile::SqliteProfileStore;
//! use memweave_core::synthesis::SynthesisCoordinator;
//!
//! let store = Arc::new(SqliteNodeStore::open("memory.db")?);
//! let profile = Arc::new(SqliteProfileStore::from_node_store(&store)?);
//! let client = Arc::new(AnthropicClient::new(ClientConfig::new(api_key)));
//! let coordinator = Arc::new(SynthesisCoordinator::new(store, profile, client));
//!
//! // After each exchange, in the background:
//! coordinator.spawn_synthesis(solution, history);
//!
//! // Periodically:
//! coordinator.spawn_categorization();
//! ```

mod analysis;
mod categorize;
mod context;
mod coordinator;
mod engine;
mod parser;
mod preferences;
mod prompts;

#[cfg(test)]
mod proptest;
#[cfg(test)]
mod testsupport;

// Re-exports for convenience
pub use analysis::{Analysis, Entity, LinkSpec, MergeSpec, UpdateSpec};
pub use categorize::CategorizeReport;
pub use coordinator::{SynthesisCoordinator, SynthesisOptions, SynthesisOutcome};
pub use engine::{ApplyReport, ReconciliationEngine};
pub use parser::parse_analysis;
