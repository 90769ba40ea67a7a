//! Concept entity: one learnable unit in the curriculum graph.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CtError, Result};

/// Opaque unique key for a concept.
pub type ConceptId = String;

/// Allowed difficulty range, inclusive.
pub const DIFFICULTY_MIN: u8 = 1;
pub const DIFFICULTY_MAX: u8 = 10;

/// A node in the curriculum graph.
///
/// `prerequisites` holds the ids of the concepts this one depends on (its
/// incoming edges). The relation over all concepts must stay acyclic; the
/// store enforces that on every mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Concept {
    pub id: ConceptId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    pub difficulty: u8,
    #[serde(default)]
    pub prerequisites: BTreeSet<ConceptId>,
    #[serde(default)]
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic-concurrency counter, bumped on every committed mutation.
    #[serde(default)]
    pub version: u64,
}

/// Input for creating a concept.
///
/// `id` is normally left empty and assigned by the store (UUID v4); an
/// explicit slug is accepted for authoring workflows that want stable,
/// human-readable ids.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConceptDraft {
    #[serde(default)]
    pub id: Option<ConceptId>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default = "default_difficulty")]
    pub difficulty: u8,
    #[serde(default)]
    pub prerequisites: Vec<ConceptId>,
}

const fn default_difficulty() -> u8 {
    DIFFICULTY_MIN
}

/// Partial update for an existing concept. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConceptPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub difficulty: Option<u8>,
    #[serde(default)]
    pub prerequisites: Option<Vec<ConceptId>>,
    #[serde(default)]
    pub archived: Option<bool>,
}

impl ConceptPatch {
    /// True when the patch carries no changes at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.difficulty.is_none()
            && self.prerequisites.is_none()
            && self.archived.is_none()
    }
}

impl ConceptDraft {
    /// Validate the draft's own fields (existence of prerequisites is the
    /// store's job, since it needs the graph).
    pub fn validate(&self) -> Result<()> {
        if let Some(id) = &self.id {
            validate_id(id)?;
        }
        validate_title(&self.title)?;
        validate_difficulty(self.difficulty)
    }

    /// Materialize the draft into a concept, assigning a fresh id when the
    /// draft did not carry one.
    #[must_use]
    pub fn into_concept(self, now: DateTime<Utc>) -> Concept {
        Concept {
            id: self.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            title: self.title,
            description: self.description,
            category: self.category,
            difficulty: self.difficulty,
            prerequisites: self.prerequisites.into_iter().collect(),
            archived: false,
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }
}

pub fn validate_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(CtError::Validation("concept id must not be empty".to_string()));
    }
    Ok(())
}

pub fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(CtError::Validation("title must not be empty".to_string()));
    }
    Ok(())
}

pub fn validate_difficulty(difficulty: u8) -> Result<()> {
    if !(DIFFICULTY_MIN..=DIFFICULTY_MAX).contains(&difficulty) {
        return Err(CtError::Validation(format!(
            "difficulty must be in [{DIFFICULTY_MIN},{DIFFICULTY_MAX}], got {difficulty}"
        )));
    }
    Ok(())
}
