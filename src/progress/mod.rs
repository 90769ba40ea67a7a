//! Skill progression: the per-user state machine layered on a graph snapshot.
//!
//! State is derived, never stored: the two authoritative sets on a
//! [`UserSkillRecord`] are `completed` and `in_progress`, and everything else
//! (available/blocked/locked) is recomputed on demand against the snapshot.
//! Transitions re-validate their preconditions at commit time, so a
//! concurrent prerequisite edit cannot smuggle an illegal completion through.

pub mod tracker;

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::RwLock;
use tracing::debug;

use crate::core::progress::UserSkillRecord;
use crate::error::{CtError, Result};

pub use tracker::{
    available_concepts, blocked_concepts, complete, mark_verified, start, state_of, BlockedConcept,
};

/// Collection of user skill records keyed by `(user_id, skill_tree_name)`.
///
/// Records are created lazily on first access and never deleted, only
/// superseded by import. Mutations are serialized per store and committed
/// through a version compare-and-swap, so two racing writers cannot both
/// succeed against a stale precondition.
#[derive(Debug, Default)]
pub struct ProgressStore {
    inner: RwLock<HashMap<(String, String), UserSkillRecord>>,
}

impl ProgressStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_records(records: Vec<UserSkillRecord>) -> Self {
        let map = records
            .into_iter()
            .map(|r| ((r.user_id.clone(), r.skill_tree_name.clone()), r))
            .collect();
        Self {
            inner: RwLock::new(map),
        }
    }

    /// Fetch the record for `(user_id, skill_tree_name)`, creating it on
    /// first interaction.
    #[must_use]
    pub fn get_or_create(&self, user_id: &str, skill_tree_name: &str) -> UserSkillRecord {
        let key = (user_id.to_string(), skill_tree_name.to_string());
        if let Some(record) = self.inner.read().get(&key) {
            return record.clone();
        }
        let mut map = self.inner.write();
        map.entry(key)
            .or_insert_with(|| {
                debug!(user_id, skill_tree_name, "user skill record created");
                UserSkillRecord::new(user_id, skill_tree_name, Utc::now())
            })
            .clone()
    }

    /// Apply `mutate` to the record under the write lock, committing only if
    /// the stored version still matches `expected_version` and the closure
    /// succeeds. The committed record gets a bumped version and a fresh
    /// `updated_at`.
    pub fn update<T>(
        &self,
        user_id: &str,
        skill_tree_name: &str,
        expected_version: u64,
        mutate: impl FnOnce(&mut UserSkillRecord) -> Result<T>,
    ) -> Result<(UserSkillRecord, T)> {
        let key = (user_id.to_string(), skill_tree_name.to_string());
        let mut map = self.inner.write();
        let stored = map
            .entry(key)
            .or_insert_with(|| UserSkillRecord::new(user_id, skill_tree_name, Utc::now()));

        if stored.version != expected_version {
            return Err(CtError::VersionConflict(format!(
                "user record {user_id}/{skill_tree_name}: expected version {expected_version}, found {}",
                stored.version
            )));
        }

        // Work on a scratch copy so a failed transition leaves the stored
        // record untouched.
        let mut candidate = stored.clone();
        let value = mutate(&mut candidate)?;
        candidate.version += 1;
        candidate.updated_at = Utc::now();
        *stored = candidate.clone();
        Ok((candidate, value))
    }

    /// Replace (or install) a record wholesale. Used by snapshot import.
    pub fn replace_record(&self, record: UserSkillRecord) {
        let key = (record.user_id.clone(), record.skill_tree_name.clone());
        debug!(user_id = %record.user_id, tree = %record.skill_tree_name, "user record replaced");
        self.inner.write().insert(key, record);
    }

    #[must_use]
    pub fn records(&self) -> Vec<UserSkillRecord> {
        self.inner.read().values().cloned().collect()
    }
}
