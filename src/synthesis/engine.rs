//! Reconciliation of a decoded analysis against the memory graph.
//!
//! Operations apply in a fixed order: merges, updates, preference
//! extraction, the main upsert, entity resolution, links. Earlier phases
//! commit even when a later phase fails; nothing is ever rolled back.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::error::Result;
use crate::memory::{MemoryNode, NodeRepository, UpdateFields};
use crate::profile::PreferenceStore;

use super::analysis::{Analysis, Entity, LinkSpec};
use super::preferences::extract_preferences;

/// Source tag stamped on nodes this engine creates.
const CONVERSATION_SOURCE: &str = "derived-from-conversation";

/// Counters for one `apply` pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub merged: usize,
    pub updated: usize,
    pub created: usize,
    pub aliased: usize,
    pub linked: usize,
    pub skipped: usize,
}

/// Titles already resolved during this run.
///
/// Later phases consult this map before the repository, so an operation can
/// reference a node another operation produced moments earlier, even though
/// storage may still hold stale rows under the same title.
struct RunContext {
    resolved: HashMap<String, MemoryNode>,
}

impl RunContext {
    fn new() -> Self {
        Self {
            resolved: HashMap::new(),
        }
    }

    fn register(&mut self, title: impl Into<String>, node: MemoryNode) {
        self.resolved.insert(title.into(), node);
    }

    fn get(&self, title: &str) -> Option<&MemoryNode> {
        self.resolved.get(title)
    }
}

pub struct ReconciliationEngine<'a> {
    repository: &'a dyn NodeRepository,
    preferences: &'a dyn PreferenceStore,
    dedup_threshold: f32,
}

impl<'a> ReconciliationEngine<'a> {
    pub fn new(
        repository: &'a dyn NodeRepository,
        preferences: &'a dyn PreferenceStore,
    ) -> Self {
        Self {
            repository,
            preferences,
            dedup_threshold: 0.92,
        }
    }

    pub fn with_dedup_threshold(mut self, threshold: f32) -> Self {
        self.dedup_threshold = threshold;
        self
    }

    /// Apply `analysis` to the graph.
    ///
    /// An empty analysis returns without touching storage. A repository
    /// failure in the merge, update or main phases aborts the run with the
    /// prior phases committed; a failure among entities or links abandons
    /// only what remains of those two phases.
    pub async fn apply(&self, analysis: &Analysis) -> Result<ApplyReport> {
        if analysis.is_empty() {
            debug!("analysis is empty, nothing to remember");
            return Ok(ApplyReport::default());
        }

        let mut run = RunContext::new();
        let mut report = ApplyReport::default();

        self.apply_merges(analysis, &mut run, &mut report).await?;
        self.apply_updates(analysis, &mut run, &mut report).await?;
        self.apply_preferences(analysis).await;

        let main = match self.upsert_main(analysis, &mut run, &mut report).await? {
            Some(main) => main,
            None => return Ok(report),
        };

        if let Err(e) = self
            .apply_entities_and_links(analysis, &main, &mut run, &mut report)
            .await
        {
            warn!("entity and link application aborted: {}", e);
        }

        Ok(report)
    }

    async fn apply_merges(
        &self,
        analysis: &Analysis,
        run: &mut RunContext,
        report: &mut ApplyReport,
    ) -> Result<()> {
        for merge in &analysis.merges {
            let merged = self
                .repository
                .merge(
                    &merge.source_titles,
                    &merge.new_title,
                    &merge.new_content,
                    &merge.new_tags,
                    &merge.folder_path,
                )
                .await?;
            match merged {
                Some(node) => {
                    debug!(
                        reason = %merge.reason,
                        "merged {:?} into \"{}\"",
                        merge.source_titles, merge.new_title
                    );
                    run.register(&merge.new_title, node);
                    report.merged += 1;
                }
                None => {
                    warn!(
                        "merge into \"{}\" matched none of {:?}",
                        merge.new_title, merge.source_titles
                    );
                    report.skipped += 1;
                }
            }
        }
        Ok(())
    }

    async fn apply_updates(
        &self,
        analysis: &Analysis,
        run: &mut RunContext,
        report: &mut ApplyReport,
    ) -> Result<()> {
        for update in &analysis.updates {
            let target = match run.get(&update.title) {
                Some(node) => Some(node.clone()),
                None => self.repository.find_by_title(&update.title).await?,
            };
            let target = match target {
                Some(node) => node,
                None => {
                    warn!("update target \"{}\" not found, skipping", update.title);
                    report.skipped += 1;
                    continue;
                }
            };

            let mut fields = UpdateFields::new().with_content(update.new_content.clone());
            if let Some(credibility) = update.new_credibility {
                fields = fields.with_credibility(credibility);
            }
            if let Some(importance) = update.new_importance {
                fields = fields.with_importance(importance);
            }

            match self.repository.update(target.id, fields).await? {
                Some(node) => {
                    debug!(reason = %update.reason, "updated \"{}\"", update.title);
                    run.register(&update.title, node);
                    report.updated += 1;
                }
                None => {
                    warn!("update of \"{}\" hit a missing row, skipping", update.title);
                    report.skipped += 1;
                }
            }
        }
        Ok(())
    }

    async fn apply_preferences(&self, analysis: &Analysis) {
        if analysis.user_preferences.trim().is_empty() {
            return;
        }
        let update = extract_preferences(&analysis.user_preferences);
        if update.is_empty() {
            return;
        }
        if let Err(e) = self.preferences.update_fields(update).await {
            warn!("preference update failed: {}", e);
        }
    }

    async fn upsert_main(
        &self,
        analysis: &Analysis,
        run: &mut RunContext,
        report: &mut ApplyReport,
    ) -> Result<Option<MemoryNode>> {
        let entity = match &analysis.main_problem {
            Some(entity) => entity,
            None => {
                debug!("no main problem, entities and links have nothing to anchor to");
                return Ok(None);
            }
        };

        let existing = match run.get(&entity.title) {
            Some(node) => Some(node.clone()),
            None => self.repository.find_by_title(&entity.title).await?,
        };

        let node = match existing {
            Some(found) => {
                let fields = UpdateFields::new().with_content(entity.content.clone());
                match self.repository.update(found.id, fields).await? {
                    Some(node) => {
                        report.updated += 1;
                        node
                    }
                    None => {
                        warn!("main problem \"{}\" vanished mid-run", entity.title);
                        report.skipped += 1;
                        return Ok(None);
                    }
                }
            }
            None => {
                let node = MemoryNode::new(&entity.title, &entity.content)
                    .with_tags(entity.tags.clone())
                    .with_folder_path(entity.folder_path.clone().unwrap_or_default())
                    .with_importance(0.8)
                    .with_credibility(1.0)
                    .with_source(CONVERSATION_SOURCE);
                let node = self.repository.create(node).await?;
                report.created += 1;
                node
            }
        };

        run.register(&entity.title, node.clone());
        Ok(Some(node))
    }

    async fn apply_entities_and_links(
        &self,
        analysis: &Analysis,
        main: &MemoryNode,
        run: &mut RunContext,
        report: &mut ApplyReport,
    ) -> Result<()> {
        for entity in &analysis.new_entities {
            let resolved = self.resolve_entity(entity, main, run, report).await?;
            run.register(&entity.title, resolved);
        }
        for link in &analysis.links {
            self.create_link(link, run, report).await?;
        }
        Ok(())
    }

    /// Map `entity` to a node: an explicit alias first, then a
    /// high-precision title match, and only then a fresh row.
    async fn resolve_entity(
        &self,
        entity: &Entity,
        main: &MemoryNode,
        run: &RunContext,
        report: &mut ApplyReport,
    ) -> Result<MemoryNode> {
        if let Some(alias_for) = &entity.alias_for {
            if let Some(node) = run.get(alias_for) {
                report.aliased += 1;
                return Ok(node.clone());
            }
            if let Some(node) = self.repository.find_by_title(alias_for).await? {
                report.aliased += 1;
                return Ok(node);
            }
            warn!(
                "alias target \"{}\" for \"{}\" not found, trying title similarity",
                alias_for, entity.title
            );
        }

        let matches = self
            .repository
            .search_similar_title(&entity.title, self.dedup_threshold)
            .await?;
        if let Some(existing) = matches.into_iter().next() {
            debug!(
                "\"{}\" resolved to existing node \"{}\"",
                entity.title, existing.title
            );
            report.aliased += 1;
            return Ok(existing);
        }

        let folder_path = entity
            .folder_path
            .clone()
            .unwrap_or_else(|| main.folder_path.clone());
        let node = MemoryNode::new(&entity.title, &entity.content)
            .with_tags(entity.tags.clone())
            .with_folder_path(folder_path)
            .with_source(CONVERSATION_SOURCE);
        let node = self.repository.create(node).await?;
        report.created += 1;
        Ok(node)
    }

    async fn create_link(
        &self,
        link: &LinkSpec,
        run: &RunContext,
        report: &mut ApplyReport,
    ) -> Result<()> {
        let source = match self.resolve_title(&link.source_title, run).await? {
            Some(node) => node,
            None => {
                warn!(
                    "link source \"{}\" not found, skipping link to \"{}\"",
                    link.source_title, link.target_title
                );
                report.skipped += 1;
                return Ok(());
            }
        };
        let target = match self.resolve_title(&link.target_title, run).await? {
            Some(node) => node,
            None => {
                warn!(
                    "link target \"{}\" not found, skipping link from \"{}\"",
                    link.target_title, link.source_title
                );
                report.skipped += 1;
                return Ok(());
            }
        };

        self.repository
            .link(
                source.id,
                target.id,
                &link.link_type,
                link.weight,
                &link.description,
            )
            .await?;
        report.linked += 1;
        Ok(())
    }

    async fn resolve_title(
        &self,
        title: &str,
        run: &RunContext,
    ) -> Result<Option<MemoryNode>> {
        if let Some(node) = run.get(title) {
            return Ok(Some(node.clone()));
        }
        self.repository.find_by_title(title).await
    }
}
