//! Read-only assembly of the analysis prompt.
//!
//! Pulls candidate nodes, duplicate-title warnings, the folder taxonomy and
//! the preference profile out of storage and folds them into a single
//! completion request. Nothing here writes to the repository.

use std::collections::HashSet;

use crate::conversation::{prune_tool_results, ChatTurn, Conversation};
use crate::error::Result;
use crate::memory::NodeRepository;
use crate::profile::PreferenceStore;

use super::coordinator::SynthesisOptions;
use super::prompts::{
    cap_chars, render_analysis_message, render_candidates, render_duplicate_warning,
    render_folder_taxonomy, render_profile_block, ANALYSIS_SYSTEM_PROMPT,
};

/// A fully assembled analysis prompt, ready to send.
#[derive(Debug, Clone)]
pub struct AnalysisContext {
    pub system_prompt: String,
    pub history: Vec<ChatTurn>,
    pub analysis_message: String,
}

/// Build the analysis context for one exchange.
///
/// `history` must already be sanitized and `query` derived from it. The
/// retrieval probe mixes the query with a prefix of the solution so that
/// candidates reflect both what was asked and what was concluded.
pub(crate) async fn build_analysis_context(
    repository: &dyn NodeRepository,
    preferences: &dyn PreferenceStore,
    options: &SynthesisOptions,
    query: &str,
    solution: &str,
    history: &Conversation,
) -> Result<AnalysisContext> {
    let solution = prune_tool_results(solution);

    let probe = format!(
        "{} {}",
        query,
        cap_chars(&solution, options.probe_solution_chars)
    );
    let candidates = repository
        .search_semantic(&probe, options.semantic_threshold, options.candidate_limit)
        .await?;

    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();
    for candidate in &candidates {
        if !seen.insert(candidate.title.clone()) {
            continue;
        }
        let count = repository.find_all_by_title(&candidate.title).await?.len();
        if count > 1 {
            duplicates.push((candidate.title.clone(), count));
        }
    }

    let folders = repository.list_folder_paths().await?;
    let profile = preferences.load().await?;

    let mut system_prompt = options
        .system_prompt
        .clone()
        .unwrap_or_else(|| ANALYSIS_SYSTEM_PROMPT.to_string());
    for block in [
        render_candidates(&candidates),
        render_duplicate_warning(&duplicates),
        render_folder_taxonomy(&folders),
        render_profile_block(&profile.render_summary()),
    ] {
        if !block.is_empty() {
            system_prompt.push_str("\n\n");
            system_prompt.push_str(&block);
        }
    }

    let history = history
        .last_turns(options.history_turns)
        .iter()
        .map(|turn| {
            ChatTurn::new(turn.role, cap_chars(&turn.content, options.history_turn_chars))
        })
        .collect();

    let analysis_message =
        render_analysis_message(query, cap_chars(&solution, options.solution_chars));

    Ok(AnalysisContext {
        system_prompt,
        history,
        analysis_message,
    })
}
