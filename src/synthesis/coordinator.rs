//! Entry point for synthesis and categorization runs.
//!
//! One coordinator serializes every pass over a profile's graph behind a
//! single async mutex. Completion failures degrade to "nothing to
//! remember" rather than surfacing to the caller; repository failures in
//! the write phases do surface, with the already committed work kept.

use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::conversation::{ChatTurn, Conversation};
use crate::error::Result;
use crate::llm::{CompletionClient, CompletionRequest, TokenUsage, UsageTracker};
use crate::memory::NodeRepository;
use crate::profile::PreferenceStore;

use super::analysis::Analysis;
use super::categorize::{run_categorization, CategorizeReport};
use super::context::build_analysis_context;
use super::engine::{ApplyReport, ReconciliationEngine};
use super::parser::parse_analysis;

/// Tuning knobs for the synthesis pipeline.
#[derive(Debug, Clone)]
pub struct SynthesisOptions {
    /// Recall threshold for candidate retrieval.
    pub semantic_threshold: f32,
    /// Cap on retrieved candidate nodes.
    pub candidate_limit: usize,
    /// Precision threshold for entity title deduplication.
    pub title_dedup_threshold: f32,
    /// Solution prefix length mixed into the retrieval probe.
    pub probe_solution_chars: usize,
    /// Solution length included in the analysis message.
    pub solution_chars: usize,
    /// History turns sent along with the analysis message.
    pub history_turns: usize,
    /// Length cap per included history turn.
    pub history_turn_chars: usize,
    /// Model override for completion calls.
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    /// Replacement for the built-in analysis instructions.
    pub system_prompt: Option<String>,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            semantic_threshold: 0.4,
            candidate_limit: 15,
            title_dedup_threshold: 0.92,
            probe_solution_chars: 1000,
            solution_chars: 3000,
            history_turns: 10,
            history_turn_chars: 4000,
            model: None,
            max_tokens: None,
            temperature: None,
            system_prompt: None,
        }
    }
}

impl SynthesisOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_semantic_threshold(mut self, threshold: f32) -> Self {
        self.semantic_threshold = threshold;
        self
    }

    pub fn with_title_dedup_threshold(mut self, threshold: f32) -> Self {
        self.title_dedup_threshold = threshold;
        self
    }

    pub fn with_candidate_limit(mut self, limit: usize) -> Self {
        self.candidate_limit = limit;
        self
    }
}

/// How a synthesis pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesisOutcome {
    /// No user turn to anchor on; nothing was read or written.
    Skipped,
    /// The exchange produced no memorable content.
    NothingToRemember,
    /// Graph changes were applied.
    Applied(ApplyReport),
}

pub(crate) fn record_usage(tracker: &StdMutex<UsageTracker>, usage: &TokenUsage) {
    match tracker.lock() {
        Ok(mut tracker) => tracker.record(usage),
        Err(poisoned) => poisoned.into_inner().record(usage),
    }
}

pub struct SynthesisCoordinator {
    repository: Arc<dyn NodeRepository>,
    preferences: Arc<dyn PreferenceStore>,
    client: Arc<dyn CompletionClient>,
    options: SynthesisOptions,
    lock: Mutex<()>,
    usage: StdMutex<UsageTracker>,
}

impl SynthesisCoordinator {
    pub fn new(
        repository: Arc<dyn NodeRepository>,
        preferences: Arc<dyn PreferenceStore>,
        client: Arc<dyn CompletionClient>,
    ) -> Self {
        Self {
            repository,
            preferences,
            client,
            options: SynthesisOptions::default(),
            lock: Mutex::new(()),
            usage: StdMutex::new(UsageTracker::new()),
        }
    }

    pub fn with_options(mut self, options: SynthesisOptions) -> Self {
        self.options = options;
        self
    }

    /// Token accounting across every completion call made so far.
    pub fn usage(&self) -> UsageTracker {
        match self.usage.lock() {
            Ok(tracker) => *tracker,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Run one synthesis pass over a finished exchange.
    ///
    /// Passes on the same coordinator run one at a time; a second caller
    /// waits here until the first completes.
    pub async fn synthesize(
        &self,
        solution: &str,
        history: &Conversation,
    ) -> Result<SynthesisOutcome> {
        let _guard = self.lock.lock().await;

        let cleaned = history.sanitized();
        let query = match cleaned.last_user_message() {
            Some(turn) => turn.content.clone(),
            None => {
                debug!("no user turn to anchor the analysis, skipping");
                return Ok(SynthesisOutcome::Skipped);
            }
        };

        let analysis = self.analyze(&query, solution, &cleaned).await;
        if analysis.is_empty() {
            debug!("nothing to remember");
            return Ok(SynthesisOutcome::NothingToRemember);
        }

        let engine = ReconciliationEngine::new(
            self.repository.as_ref(),
            self.preferences.as_ref(),
        )
        .with_dedup_threshold(self.options.title_dedup_threshold);
        let report = engine.apply(&analysis).await?;
        info!(
            merged = report.merged,
            updated = report.updated,
            created = report.created,
            aliased = report.aliased,
            linked = report.linked,
            skipped = report.skipped,
            "synthesis applied"
        );
        Ok(SynthesisOutcome::Applied(report))
    }

    /// Assign folders to uncategorized nodes. Serialized with synthesis.
    pub async fn categorize(&self) -> Result<CategorizeReport> {
        let _guard = self.lock.lock().await;
        run_categorization(
            self.repository.as_ref(),
            self.client.as_ref(),
            &self.options,
            &self.usage,
        )
        .await
    }

    /// Run synthesis in the background. Failures are logged, not returned;
    /// abort the handle to cancel.
    pub fn spawn_synthesis(
        self: &Arc<Self>,
        solution: String,
        history: Conversation,
    ) -> JoinHandle<()> {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            match coordinator.synthesize(&solution, &history).await {
                Ok(outcome) => debug!(?outcome, "background synthesis finished"),
                Err(e) => warn!("background synthesis failed: {}", e),
            }
        })
    }

    /// Run categorization in the background. Failures are logged, not
    /// returned; abort the handle to cancel.
    pub fn spawn_categorization(self: &Arc<Self>) -> JoinHandle<()> {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            match coordinator.categorize().await {
                Ok(report) => debug!(?report, "background categorization finished"),
                Err(e) => warn!("background categorization failed: {}", e),
            }
        })
    }

    /// One completion round: build the context, call the model, decode.
    /// Any failure along the way degrades to the empty analysis.
    async fn analyze(&self, query: &str, solution: &str, history: &Conversation) -> Analysis {
        let context = match build_analysis_context(
            self.repository.as_ref(),
            self.preferences.as_ref(),
            &self.options,
            query,
            solution,
            history,
        )
        .await
        {
            Ok(context) => context,
            Err(e) => {
                warn!("context assembly failed: {}", e);
                return Analysis::empty();
            }
        };

        let mut request = CompletionRequest::new()
            .with_system(context.system_prompt)
            .with_messages(context.history)
            .with_message(ChatTurn::user(context.analysis_message));
        if let Some(model) = &self.options.model {
            request = request.with_model(model.clone());
        }
        if let Some(max_tokens) = self.options.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }
        if let Some(temperature) = self.options.temperature {
            request = request.with_temperature(temperature);
        }

        let response = match self.client.complete(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!("analysis completion failed: {}", e);
                return Analysis::empty();
            }
        };
        record_usage(&self.usage, &response.usage);

        parse_analysis(&response.content)
    }
}
