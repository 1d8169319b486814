//! Parsed analysis data.
//!
//! An [`Analysis`] is the ephemeral, structured description of "what this
//! conversation changed" produced by one model invocation. It references
//! nodes by title; resolution to stored nodes happens at apply time.

/// An entity extracted from a conversation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Entity {
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub folder_path: Option<String>,
    /// Title of an existing node this entity duplicates, per the model.
    pub alias_for: Option<String>,
}

impl Entity {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_folder_path(mut self, folder_path: impl Into<String>) -> Self {
        self.folder_path = Some(folder_path.into());
        self
    }

    pub fn with_alias_for(mut self, alias_for: impl Into<String>) -> Self {
        self.alias_for = Some(alias_for.into());
        self
    }
}

/// A relationship between two titles, resolved at apply time.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkSpec {
    pub source_title: String,
    pub target_title: String,
    pub link_type: String,
    pub description: String,
    pub weight: f64,
}

impl LinkSpec {
    pub fn new(
        source_title: impl Into<String>,
        target_title: impl Into<String>,
        link_type: impl Into<String>,
    ) -> Self {
        Self {
            source_title: source_title.into(),
            target_title: target_title.into(),
            link_type: link_type.into(),
            description: String::new(),
            weight: 1.0,
        }
    }
}

/// A content revision for an existing node.
///
/// None score fields leave the stored values untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateSpec {
    pub title: String,
    pub new_content: String,
    pub reason: String,
    pub new_credibility: Option<f64>,
    pub new_importance: Option<f64>,
}

impl UpdateSpec {
    pub fn new(
        title: impl Into<String>,
        new_content: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            new_content: new_content.into(),
            reason: reason.into(),
            new_credibility: None,
            new_importance: None,
        }
    }
}

/// A consolidation of several stored nodes into one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeSpec {
    pub source_titles: Vec<String>,
    pub new_title: String,
    pub new_content: String,
    pub new_tags: Vec<String>,
    pub folder_path: String,
    pub reason: String,
}

impl MergeSpec {
    pub fn new(
        source_titles: Vec<String>,
        new_title: impl Into<String>,
        new_content: impl Into<String>,
    ) -> Self {
        Self {
            source_titles,
            new_title: new_title.into(),
            new_content: new_content.into(),
            ..Default::default()
        }
    }
}

/// Parsed output of one analysis completion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Analysis {
    /// The central node for this turn; None when nothing anchors the turn.
    pub main_problem: Option<Entity>,
    pub new_entities: Vec<Entity>,
    pub links: Vec<LinkSpec>,
    pub updates: Vec<UpdateSpec>,
    pub merges: Vec<MergeSpec>,
    /// Free-text preference delta, one `label: value` line per field.
    pub user_preferences: String,
}

impl Analysis {
    /// The "nothing to remember" sentinel.
    pub fn empty() -> Self {
        Self::default()
    }

    /// True when this analysis carries no graph changes.
    ///
    /// The preference delta is deliberately not part of the check: a
    /// response with no main node and no list entries short-circuits the
    /// run before any write, preference text included.
    pub fn is_empty(&self) -> bool {
        self.main_problem.is_none()
            && self.new_entities.is_empty()
            && self.links.is_empty()
            && self.updates.is_empty()
            && self.merges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_the_sentinel() {
        assert!(Analysis::empty().is_empty());
    }

    #[test]
    fn preference_text_alone_is_still_empty() {
        let analysis = Analysis {
            user_preferences: "gender: female".to_string(),
            ..Default::default()
        };
        assert!(analysis.is_empty());
    }

    #[test]
    fn any_list_entry_is_not_empty() {
        let analysis = Analysis {
            merges: vec![MergeSpec::new(vec!["a".to_string()], "b", "c")],
            ..Default::default()
        };
        assert!(!analysis.is_empty());

        let analysis = Analysis {
            main_problem: Some(Entity::new("t", "c")),
            ..Default::default()
        };
        assert!(!analysis.is_empty());
    }
}
