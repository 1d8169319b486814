//! Scripted fakes shared by the synthesis test modules.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::{Error, Result};
use crate::llm::{CompletionClient, CompletionRequest, CompletionResponse, TokenUsage};
use crate::memory::{Link, LinkId, MemoryNode, NodeId, NodeRepository, UpdateFields};
use crate::profile::{PreferenceProfile, PreferenceStore, PreferenceUpdate};

/// In-memory repository with scriptable similarity scores and failures.
pub(crate) struct FakeRepository {
    pub nodes: Mutex<Vec<MemoryNode>>,
    pub links: Mutex<Vec<Link>>,
    /// (probe, stored title) -> similarity score for `search_similar_title`.
    title_scores: Mutex<HashMap<(String, String), f32>>,
    /// Titles `search_semantic` returns, in order.
    semantic_results: Mutex<Vec<String>>,
    pub semantic_queries: Mutex<Vec<(String, f32, usize)>>,
    fail_create_titles: Mutex<Vec<String>>,
    writes: AtomicUsize,
}

impl FakeRepository {
    pub fn new() -> Self {
        Self {
            nodes: Mutex::new(Vec::new()),
            links: Mutex::new(Vec::new()),
            title_scores: Mutex::new(HashMap::new()),
            semantic_results: Mutex::new(Vec::new()),
            semantic_queries: Mutex::new(Vec::new()),
            fail_create_titles: Mutex::new(Vec::new()),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn with_nodes(nodes: Vec<MemoryNode>) -> Self {
        let repo = Self::new();
        *repo.nodes.lock().unwrap() = nodes;
        repo
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.lock().unwrap().len()
    }

    pub fn link_count(&self) -> usize {
        self.links.lock().unwrap().len()
    }

    pub fn node_by_title(&self, title: &str) -> Option<MemoryNode> {
        self.nodes
            .lock()
            .unwrap()
            .iter()
            .find(|n| n.title == title)
            .cloned()
    }

    pub fn set_title_score(&self, probe: &str, stored: &str, score: f32) {
        self.title_scores
            .lock()
            .unwrap()
            .insert((probe.to_string(), stored.to_string()), score);
    }

    pub fn set_semantic_results(&self, titles: Vec<String>) {
        *self.semantic_results.lock().unwrap() = titles;
    }

    pub fn fail_create_of(&self, title: &str) {
        self.fail_create_titles.lock().unwrap().push(title.to_string());
    }
}

#[async_trait]
impl NodeRepository for FakeRepository {
    async fn find_by_title(&self, title: &str) -> Result<Option<MemoryNode>> {
        Ok(self
            .nodes
            .lock()
            .unwrap()
            .iter()
            .find(|n| n.title == title)
            .cloned())
    }

    async fn find_all_by_title(&self, title: &str) -> Result<Vec<MemoryNode>> {
        Ok(self
            .nodes
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.title == title)
            .cloned()
            .collect())
    }

    async fn search_semantic(
        &self,
        text: &str,
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<MemoryNode>> {
        self.semantic_queries
            .lock()
            .unwrap()
            .push((text.to_string(), threshold, limit));
        let titles = self.semantic_results.lock().unwrap().clone();
        let nodes = self.nodes.lock().unwrap();
        Ok(titles
            .iter()
            .filter_map(|t| nodes.iter().find(|n| &n.title == t).cloned())
            .take(limit)
            .collect())
    }

    async fn search_similar_title(
        &self,
        title: &str,
        threshold: f32,
    ) -> Result<Vec<MemoryNode>> {
        let scores = self.title_scores.lock().unwrap();
        let nodes = self.nodes.lock().unwrap();

        let mut matches: Vec<(f32, MemoryNode)> = Vec::new();
        for node in nodes.iter() {
            let score = if node.title == title {
                1.0
            } else {
                scores
                    .get(&(title.to_string(), node.title.clone()))
                    .copied()
                    .unwrap_or(0.0)
            };
            if score >= threshold {
                matches.push((score, node.clone()));
            }
        }
        matches.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        Ok(matches.into_iter().map(|(_, n)| n).collect())
    }

    async fn list_folder_paths(&self) -> Result<Vec<String>> {
        let mut folders: Vec<String> = self
            .nodes
            .lock()
            .unwrap()
            .iter()
            .filter(|n| !n.folder_path.is_empty())
            .map(|n| n.folder_path.clone())
            .collect();
        folders.sort();
        folders.dedup();
        Ok(folders)
    }

    async fn list_uncategorized(&self) -> Result<Vec<MemoryNode>> {
        Ok(self
            .nodes
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.folder_path.is_empty())
            .cloned()
            .collect())
    }

    async fn create(&self, node: MemoryNode) -> Result<MemoryNode> {
        if self.fail_create_titles.lock().unwrap().contains(&node.title) {
            return Err(Error::storage(format!(
                "scripted create failure for \"{}\"",
                node.title
            )));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.nodes.lock().unwrap().push(node.clone());
        Ok(node)
    }

    async fn update(&self, id: NodeId, fields: UpdateFields) -> Result<Option<MemoryNode>> {
        let mut nodes = self.nodes.lock().unwrap();
        let node = match nodes.iter_mut().find(|n| n.id == id) {
            Some(node) => node,
            None => return Ok(None),
        };

        self.writes.fetch_add(1, Ordering::SeqCst);
        if let Some(content) = fields.content {
            node.content = content;
        }
        if let Some(credibility) = fields.credibility {
            node.credibility = credibility;
        }
        if let Some(importance) = fields.importance {
            node.importance = importance;
        }
        if let Some(folder_path) = fields.folder_path {
            node.folder_path = folder_path;
        }
        node.updated_at = Utc::now();
        Ok(Some(node.clone()))
    }

    async fn merge(
        &self,
        source_titles: &[String],
        new_title: &str,
        new_content: &str,
        new_tags: &[String],
        folder_path: &str,
    ) -> Result<Option<MemoryNode>> {
        let mut nodes = self.nodes.lock().unwrap();
        let absorbed: Vec<MemoryNode> = nodes
            .iter()
            .filter(|n| source_titles.contains(&n.title))
            .cloned()
            .collect();
        if absorbed.is_empty() {
            return Ok(None);
        }

        self.writes.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();
        let merged = MemoryNode {
            id: NodeId::new(),
            title: new_title.to_string(),
            content: new_content.to_string(),
            tags: new_tags.to_vec(),
            folder_path: folder_path.to_string(),
            credibility: absorbed.iter().fold(0.0f64, |acc, n| acc.max(n.credibility)),
            importance: absorbed.iter().fold(0.0f64, |acc, n| acc.max(n.importance)),
            source: "merge".to_string(),
            created_at: now,
            updated_at: now,
        };

        let absorbed_ids: Vec<NodeId> = absorbed.iter().map(|n| n.id).collect();
        nodes.retain(|n| !absorbed_ids.contains(&n.id));
        nodes.push(merged.clone());

        let mut links = self.links.lock().unwrap();
        for link in links.iter_mut() {
            if absorbed_ids.contains(&link.source_id) {
                link.source_id = merged.id;
            }
            if absorbed_ids.contains(&link.target_id) {
                link.target_id = merged.id;
            }
        }

        Ok(Some(merged))
    }

    async fn add_tag(&self, id: NodeId, tag: &str) -> Result<()> {
        let mut nodes = self.nodes.lock().unwrap();
        let node = nodes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| Error::storage("no such node"))?;
        if !node.tags.iter().any(|t| t == tag) {
            self.writes.fetch_add(1, Ordering::SeqCst);
            node.tags.push(tag.to_string());
        }
        Ok(())
    }

    async fn link(
        &self,
        source: NodeId,
        target: NodeId,
        link_type: &str,
        weight: f64,
        description: &str,
    ) -> Result<Link> {
        {
            let nodes = self.nodes.lock().unwrap();
            if !nodes.iter().any(|n| n.id == source) || !nodes.iter().any(|n| n.id == target) {
                return Err(Error::storage("link endpoint does not exist"));
            }
        }

        self.writes.fetch_add(1, Ordering::SeqCst);
        let link = Link {
            id: LinkId::new(),
            source_id: source,
            target_id: target,
            link_type: link_type.to_string(),
            weight,
            description: description.to_string(),
            created_at: Utc::now(),
        };
        self.links.lock().unwrap().push(link.clone());
        Ok(link)
    }
}

/// In-memory preference store with a scriptable failure switch.
pub(crate) struct FakeProfileStore {
    pub profile: Mutex<PreferenceProfile>,
    pub updates: Mutex<Vec<PreferenceUpdate>>,
    pub fail: AtomicBool,
}

impl FakeProfileStore {
    pub fn new() -> Self {
        Self {
            profile: Mutex::new(PreferenceProfile::default()),
            updates: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        }
    }

    pub fn update_count(&self) -> usize {
        self.updates.lock().unwrap().len()
    }
}

#[async_trait]
impl PreferenceStore for FakeProfileStore {
    async fn update_fields(&self, update: PreferenceUpdate) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::storage("scripted profile failure"));
        }

        let mut profile = self.profile.lock().unwrap();
        if update.birth_date.is_some() {
            profile.birth_date = update.birth_date.clone();
        }
        if update.birth_year.is_some() {
            profile.birth_year = update.birth_year;
        }
        if update.gender.is_some() {
            profile.gender = update.gender.clone();
        }
        if update.personality.is_some() {
            profile.personality = update.personality.clone();
        }
        if update.identity.is_some() {
            profile.identity = update.identity.clone();
        }
        if update.occupation.is_some() {
            profile.occupation = update.occupation.clone();
        }
        if update.ai_style.is_some() {
            profile.ai_style = update.ai_style.clone();
        }

        self.updates.lock().unwrap().push(update);
        Ok(())
    }

    async fn load(&self) -> Result<PreferenceProfile> {
        Ok(self.profile.lock().unwrap().clone())
    }
}

/// Completion client returning scripted responses in order.
pub(crate) struct FakeClient {
    responses: Mutex<VecDeque<Result<String>>>,
    pub requests: Mutex<Vec<CompletionRequest>>,
    delay: Option<Duration>,
}

impl FakeClient {
    pub fn scripted(responses: Vec<Result<String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    pub fn replying(content: &str) -> Self {
        Self::scripted(vec![Ok(content.to_string())])
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionClient for FakeClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.requests.lock().unwrap().push(request);

        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(Ok(content)) => Ok(CompletionResponse {
                id: "fake".to_string(),
                model: "fake-model".to_string(),
                content,
                usage: TokenUsage::new(100, 25),
                timestamp: Utc::now(),
            }),
            Some(Err(e)) => Err(e),
            None => Err(Error::Completion("fake client exhausted".to_string())),
        }
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}
