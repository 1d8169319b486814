//! Prompt templates and rendering helpers.
//!
//! The analysis format below is the protocol between this engine and the
//! model; the parser decodes exactly what these instructions describe.

use crate::memory::MemoryNode;

pub(crate) const ANALYSIS_SYSTEM_PROMPT: &str = r#"You analyze one conversation exchange and extract what is worth remembering into a persistent memory graph. Respond with a single JSON object and nothing else.

Format:
{
  "main": [title, content, tags, folderPath],
  "new": [[title, content, tags, folderPath, aliasFor], ...],
  "links": [[sourceTitle, targetTitle, type, description, weight], ...],
  "update": [[title, newContent, reason, newCredibility, newImportance], ...],
  "merge": [{"source_titles": [...], "new_title": "...", "new_content": "...", "new_tags": [...], "folder_path": "...", "reason": "..."}, ...],
  "user": {"birth date": "...", "birth year": "...", "gender": "...", "personality": "...", "identity": "...", "occupation": "...", "ai style": "..."}
}

Rules:
- If nothing in the exchange is worth remembering, respond with {}.
- "main" is the central problem or topic of this exchange. Omit it only when the exchange produced corrections to existing nodes but no new anchor topic.
- In "new", set aliasFor to an existing node's title when the entity is the same concept under a different name; otherwise use null.
- In "links", reference nodes by title. Use a short camelCase relation type such as causedBy, solvedBy, or relatedTo. Omitted description defaults to empty, omitted weight to 1.0.
- In "update", rewrite the node's content in full. Use null for newCredibility and newImportance unless the conversation justified changing them.
- Use "merge" when the context below flags duplicate titles, or when two listed nodes clearly describe the same thing.
- In "user", record only what this exchange revealed about the user. Use "<UNCHANGED>" for every other field.
- Reuse listed folders before inventing new ones. Keep titles short and stable."#;

pub(crate) const CATEGORIZE_SYSTEM_PROMPT: &str = r#"You assign folder paths to memory nodes. Respond with a JSON array and nothing else:
[{"title": "...", "folder": "..."}, ...]

Reuse the existing folders when one fits; invent a short lowercase path only when nothing fits. Return every title you were given."#;

/// First `max_chars` characters of `text`.
pub(crate) fn cap_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Excerpt with an ellipsis when `text` exceeds `max_chars`.
pub(crate) fn excerpt(text: &str, max_chars: usize) -> String {
    let capped = cap_chars(text, max_chars);
    if capped.len() == text.len() {
        text.to_string()
    } else {
        format!("{}...", capped)
    }
}

pub(crate) fn render_candidates(nodes: &[MemoryNode]) -> String {
    if nodes.is_empty() {
        return String::new();
    }
    let mut out = String::from("Existing memory nodes related to this conversation:\n");
    for node in nodes {
        out.push_str(&format!(
            "- {}: {}\n",
            node.title,
            excerpt(&node.content, 200)
        ));
    }
    out
}

pub(crate) fn render_duplicate_warning(duplicates: &[(String, usize)]) -> String {
    if duplicates.is_empty() {
        return String::new();
    }
    let mut out = String::from(
        "Storage holds several nodes with the same title. Emit a merge operation this turn for each of:\n",
    );
    for (title, count) in duplicates {
        out.push_str(&format!("- \"{}\" ({} stored copies)\n", title, count));
    }
    out
}

pub(crate) fn render_folder_taxonomy(folders: &[String]) -> String {
    if folders.is_empty() {
        return String::new();
    }
    format!(
        "Known folders (reuse before inventing): {}\n",
        folders.join(", ")
    )
}

pub(crate) fn render_profile_block(summary: &str) -> String {
    if summary.is_empty() {
        return String::new();
    }
    format!("Current user profile (report only changes):\n{}\n", summary)
}

pub(crate) fn render_analysis_message(query: &str, solution: &str) -> String {
    format!(
        "User question:\n{}\n\nAssistant solution:\n{}\n\nExtract the memory operations as JSON.",
        query, solution
    )
}

pub(crate) fn render_categorize_message(nodes: &[MemoryNode], folders: &[String]) -> String {
    let mut out = String::from("Assign a folder to each of these nodes:\n");
    for node in nodes {
        out.push_str(&format!(
            "- title: {}, content: {}\n",
            node.title,
            excerpt(&node.content, 100)
        ));
    }
    if !folders.is_empty() {
        out.push('\n');
        out.push_str(&render_folder_taxonomy(folders));
    }
    out
}
