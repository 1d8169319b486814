//! Completion provider integration.
//!
//! The synthesis pipeline talks to language models through the
//! [`CompletionClient`] trait; [`AnthropicClient`] and [`OpenAiClient`]
//! implement it over HTTP. Responses carry [`TokenUsage`] so callers can
//! account for spend via [`UsageTracker`].
//!
//! # Example
//!
//! ```ignore
//! use memweave_core::llm::{AnthropicClient, ClientConfig, CompletionClient, CompletionRequest};
//! use memweave_core::conversation::ChatTurn;
//!
//! let client = AnthropicClient::new(ClientConfig::new(api_key));
//! let response = client
//!     .complete(
//!         CompletionRequest::new()
//!             .with_system("You extract knowledge from conversations.")
//!             .with_message(ChatTurn::user("Summarize what we learned.")),
//!     )
//!     .await?;
//! println!("{} ({} tokens)", response.content, response.usage.total());
//! ```

mod client;
mod types;

pub use client::{AnthropicClient, ClientConfig, CompletionClient, OpenAiClient};
pub use types::{CompletionRequest, CompletionResponse, TokenUsage, UsageTracker};
