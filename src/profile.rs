//! User preference profile storage.
//!
//! Preferences extracted from conversations live apart from the memory
//! graph: a single-row profile with typed fields. Updates are field-level
//! merges so one extraction never clobbers another field's value.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::memory::{initialize_schema, SqliteNodeStore};

/// The stored preference profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreferenceProfile {
    pub birth_date: Option<String>,
    pub birth_year: Option<i32>,
    pub gender: Option<String>,
    pub personality: Option<String>,
    pub identity: Option<String>,
    pub occupation: Option<String>,
    pub ai_style: Option<String>,
}

impl PreferenceProfile {
    pub fn is_empty(&self) -> bool {
        self.birth_date.is_none()
            && self.birth_year.is_none()
            && self.gender.is_none()
            && self.personality.is_none()
            && self.identity.is_none()
            && self.occupation.is_none()
            && self.ai_style.is_none()
    }

    /// Compact text block for prompt embedding; empty when nothing is set.
    pub fn render_summary(&self) -> String {
        let mut lines = Vec::new();
        if let Some(v) = &self.birth_date {
            lines.push(format!("- birth date: {}", v));
        }
        if let Some(v) = self.birth_year {
            lines.push(format!("- birth year: {}", v));
        }
        if let Some(v) = &self.gender {
            lines.push(format!("- gender: {}", v));
        }
        if let Some(v) = &self.personality {
            lines.push(format!("- personality: {}", v));
        }
        if let Some(v) = &self.identity {
            lines.push(format!("- identity: {}", v));
        }
        if let Some(v) = &self.occupation {
            lines.push(format!("- occupation: {}", v));
        }
        if let Some(v) = &self.ai_style {
            lines.push(format!("- preferred AI style: {}", v));
        }
        lines.join("\n")
    }
}

/// Field-level profile patch. None fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreferenceUpdate {
    pub birth_date: Option<String>,
    pub birth_year: Option<i32>,
    pub gender: Option<String>,
    pub personality: Option<String>,
    pub identity: Option<String>,
    pub occupation: Option<String>,
    pub ai_style: Option<String>,
}

impl PreferenceUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.birth_date.is_none()
            && self.birth_year.is_none()
            && self.gender.is_none()
            && self.personality.is_none()
            && self.identity.is_none()
            && self.occupation.is_none()
            && self.ai_style.is_none()
    }
}

/// Persistence seam for the preference profile.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Merge the provided fields into the stored profile.
    ///
    /// An all-None update performs no write.
    async fn update_fields(&self, update: PreferenceUpdate) -> Result<()>;

    /// Load the current profile; a missing row loads as the default.
    async fn load(&self) -> Result<PreferenceProfile>;
}

/// Preference store persisting to the `profile` table of the memweave
/// database.
pub struct SqliteProfileStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteProfileStore {
    /// Share the database of an existing node store.
    pub fn from_node_store(store: &SqliteNodeStore) -> Self {
        Self {
            conn: store.share_connection(),
        }
    }

    /// Open or create a database at the given path.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| Error::Storage(format!("Failed to open database: {}", e)))?;
        initialize_schema(&conn)
            .map_err(|e| Error::Storage(format!("Failed to initialize schema: {}", e)))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory store, useful for tests.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Storage(format!("Failed to open database: {}", e)))?;
        initialize_schema(&conn)
            .map_err(|e| Error::Storage(format!("Failed to initialize schema: {}", e)))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|_| Error::Internal("Connection lock poisoned".to_string()))?;
        f(&conn).map_err(|e| Error::Storage(e.to_string()))
    }
}

fn row_to_profile(row: &rusqlite::Row) -> rusqlite::Result<PreferenceProfile> {
    Ok(PreferenceProfile {
        birth_date: row.get(0)?,
        birth_year: row.get(1)?,
        gender: row.get(2)?,
        personality: row.get(3)?,
        identity: row.get(4)?,
        occupation: row.get(5)?,
        ai_style: row.get(6)?,
    })
}

const PROFILE_COLUMNS: &str =
    "birth_date, birth_year, gender, personality, identity, occupation, ai_style";

#[async_trait]
impl PreferenceStore for SqliteProfileStore {
    async fn update_fields(&self, update: PreferenceUpdate) -> Result<()> {
        if update.is_empty() {
            return Ok(());
        }

        self.with_conn(move |conn| {
            let existing = conn
                .query_row(
                    &format!("SELECT {} FROM profile WHERE id = 1", PROFILE_COLUMNS),
                    [],
                    row_to_profile,
                )
                .optional()?;
            let mut profile = existing.unwrap_or_default();

            if update.birth_date.is_some() {
                profile.birth_date = update.birth_date;
            }
            if update.birth_year.is_some() {
                profile.birth_year = update.birth_year;
            }
            if update.gender.is_some() {
                profile.gender = update.gender;
            }
            if update.personality.is_some() {
                profile.personality = update.personality;
            }
            if update.identity.is_some() {
                profile.identity = update.identity;
            }
            if update.occupation.is_some() {
                profile.occupation = update.occupation;
            }
            if update.ai_style.is_some() {
                profile.ai_style = update.ai_style;
            }

            conn.execute(
                "INSERT OR REPLACE INTO profile
                     (id, birth_date, birth_year, gender, personality, identity, occupation,
                      ai_style, updated_at)
                 VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, datetime('now'))",
                params![
                    profile.birth_date,
                    profile.birth_year,
                    profile.gender,
                    profile.personality,
                    profile.identity,
                    profile.occupation,
                    profile.ai_style,
                ],
            )?;
            Ok(())
        })
    }

    async fn load(&self) -> Result<PreferenceProfile> {
        self.with_conn(|conn| {
            let profile = conn
                .query_row(
                    &format!("SELECT {} FROM profile WHERE id = 1", PROFILE_COLUMNS),
                    [],
                    row_to_profile,
                )
                .optional()?;
            Ok(profile.unwrap_or_default())
        })
    }
}
