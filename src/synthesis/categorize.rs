//! Folder assignment for nodes that were stored without one.
//!
//! Uncategorized nodes are fetched in one pass, split into small chunks,
//! and each chunk is sent to the model with the current folder taxonomy.
//! A chunk that fails, in the call, the parse or the apply, is logged and
//! skipped; the remaining chunks still run.

use std::sync::Mutex;

use tracing::{debug, warn};

use crate::conversation::ChatTurn;
use crate::error::Result;
use crate::llm::{CompletionClient, CompletionRequest, UsageTracker};
use crate::memory::{MemoryNode, NodeRepository, UpdateFields};

use super::coordinator::{record_usage, SynthesisOptions};
use super::parser::parse_title_folder_pairs;
use super::prompts::{render_categorize_message, CATEGORIZE_SYSTEM_PROMPT};

const CHUNK_SIZE: usize = 10;

/// Counters for one categorization pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategorizeReport {
    pub chunks_attempted: usize,
    pub chunks_failed: usize,
    pub nodes_assigned: usize,
}

pub(crate) async fn run_categorization(
    repository: &dyn NodeRepository,
    client: &dyn CompletionClient,
    options: &SynthesisOptions,
    usage: &Mutex<UsageTracker>,
) -> Result<CategorizeReport> {
    let uncategorized = repository.list_uncategorized().await?;
    if uncategorized.is_empty() {
        debug!("no uncategorized nodes");
        return Ok(CategorizeReport::default());
    }
    let folders = repository.list_folder_paths().await?;

    let mut report = CategorizeReport::default();
    for chunk in uncategorized.chunks(CHUNK_SIZE) {
        report.chunks_attempted += 1;
        match categorize_chunk(repository, client, options, usage, chunk, &folders).await {
            Ok(assigned) => report.nodes_assigned += assigned,
            Err(e) => {
                warn!("categorization chunk failed: {}", e);
                report.chunks_failed += 1;
            }
        }
    }

    debug!(
        attempted = report.chunks_attempted,
        failed = report.chunks_failed,
        assigned = report.nodes_assigned,
        "categorization pass finished"
    );
    Ok(report)
}

async fn categorize_chunk(
    repository: &dyn NodeRepository,
    client: &dyn CompletionClient,
    options: &SynthesisOptions,
    usage: &Mutex<UsageTracker>,
    chunk: &[MemoryNode],
    folders: &[String],
) -> Result<usize> {
    let mut request = CompletionRequest::new()
        .with_system(CATEGORIZE_SYSTEM_PROMPT)
        .with_message(ChatTurn::user(render_categorize_message(chunk, folders)));
    if let Some(model) = &options.model {
        request = request.with_model(model.clone());
    }
    if let Some(max_tokens) = options.max_tokens {
        request = request.with_max_tokens(max_tokens);
    }

    let response = client.complete(request).await?;
    record_usage(usage, &response.usage);

    let mut assigned = 0;
    for (title, folder) in parse_title_folder_pairs(&response.content)? {
        match chunk.iter().find(|n| n.title == title) {
            Some(node) => {
                let fields = UpdateFields::new().with_folder_path(folder);
                if repository.update(node.id, fields).await?.is_some() {
                    assigned += 1;
                }
            }
            None => debug!("categorization answered for unknown title \"{}\"", title),
        }
    }
    Ok(assigned)
}
