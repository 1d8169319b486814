//! Conversation types and transcript hygiene.
//!
//! Synthesis operates on raw chat transcripts, which carry machinery the
//! analysis model should never see: tool-result payloads, injected
//! `<memory>` blocks, and system turns. This module models the transcript
//! and scrubs it before any prompt assembly.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Role of a participant in a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// System instructions
    System,
    /// End user input
    User,
    /// Model output
    Assistant,
    /// Tool invocation result
    Tool,
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatRole::System => write!(f, "system"),
            ChatRole::User => write!(f, "user"),
            ChatRole::Assistant => write!(f, "assistant"),
            ChatRole::Tool => write!(f, "tool"),
        }
    }
}

/// A single turn in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(ChatRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant, content)
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Tool, content)
    }
}

/// An ordered chat transcript.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub turns: Vec<ChatTurn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_turns(turns: Vec<ChatTurn>) -> Self {
        Self { turns }
    }

    pub fn push(&mut self, turn: ChatTurn) {
        self.turns.push(turn);
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Get the last N turns.
    pub fn last_turns(&self, n: usize) -> &[ChatTurn] {
        let start = self.turns.len().saturating_sub(n);
        &self.turns[start..]
    }

    /// Find the most recent user turn, if any.
    pub fn last_user_message(&self) -> Option<&ChatTurn> {
        self.turns.iter().rev().find(|t| t.role == ChatRole::User)
    }

    /// Produce a scrubbed copy suitable for prompt assembly.
    ///
    /// System turns are dropped, `<memory>` blocks injected into user turns
    /// are stripped, tool-result bodies are pruned, and turns left blank by
    /// the scrubbing are removed.
    pub fn sanitized(&self) -> Conversation {
        let turns = self
            .turns
            .iter()
            .filter(|t| t.role != ChatRole::System)
            .map(|t| {
                let mut content = prune_tool_results(&t.content);
                if t.role == ChatRole::User {
                    content = strip_memory_markup(&content);
                }
                ChatTurn::new(t.role, content.trim())
            })
            .filter(|t| !t.content.is_empty())
            .collect();
        Conversation { turns }
    }
}

static TOOL_RESULT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<tool_result(?P<attrs>[^>]*)>.*?</tool_result>").expect("valid regex")
});

static MEMORY_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<memory>.*?</memory>").expect("valid regex"));

/// Replace tool-result bodies with a short placeholder, keeping the tag and
/// its attributes so the model still sees which tool ran and its status.
pub fn prune_tool_results(text: &str) -> String {
    TOOL_RESULT
        .replace_all(text, "<tool_result$attrs>[tool output pruned]</tool_result>")
        .into_owned()
}

/// Remove injected `<memory>` blocks from user text.
pub fn strip_memory_markup(text: &str) -> String {
    MEMORY_BLOCK.replace_all(text, "").trim().to_string()
}
