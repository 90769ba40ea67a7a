//! Per-user skill records and derived progression state.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::concept::ConceptId;

/// Derived state of one concept for one user.
///
/// Never stored; always recomputed from the record's `completed` and
/// `in_progress` sets against a graph snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillState {
    /// At least one prerequisite is not completed.
    Locked,
    /// All prerequisites completed, concept not archived, not yet touched.
    Available,
    /// The user has started the concept.
    InProgress,
    /// The user has completed the concept.
    Completed,
}

impl std::fmt::Display for SkillState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Locked => write!(f, "locked"),
            Self::Available => write!(f, "available"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// Progression record for one (user, skill tree) pair.
///
/// Created lazily on first interaction and never deleted, only superseded by
/// snapshot import. `completed` and `in_progress` are disjoint by
/// construction; history survives concept deletion/archival.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSkillRecord {
    pub user_id: String,
    pub skill_tree_name: String,
    #[serde(default)]
    pub completed: BTreeSet<ConceptId>,
    #[serde(default)]
    pub in_progress: BTreeSet<ConceptId>,
    /// Verification markers keyed by completed concept id. The marker is an
    /// opaque string (e.g., an assessment outcome id).
    #[serde(default)]
    pub verified: BTreeMap<ConceptId, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic-concurrency counter, bumped on every committed mutation.
    #[serde(default)]
    pub version: u64,
}

impl UserSkillRecord {
    #[must_use]
    pub fn new(user_id: &str, skill_tree_name: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            skill_tree_name: skill_tree_name.to_string(),
            completed: BTreeSet::new(),
            in_progress: BTreeSet::new(),
            verified: BTreeMap::new(),
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    #[must_use]
    pub fn is_completed(&self, id: &str) -> bool {
        self.completed.contains(id)
    }

    #[must_use]
    pub fn is_in_progress(&self, id: &str) -> bool {
        self.in_progress.contains(id)
    }
}

/// Aggregate counts for one record, for status views.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProgressSummary {
    pub completed: usize,
    pub in_progress: usize,
    pub verified: usize,
    /// Share of touched concepts that are completed, in percent.
    pub progress_percentage: f64,
}

impl ProgressSummary {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn of(record: &UserSkillRecord) -> Self {
        let completed = record.completed.len();
        let in_progress = record.in_progress.len();
        let touched = completed + in_progress;
        let progress_percentage = if touched == 0 {
            0.0
        } else {
            completed as f64 / touched as f64 * 100.0
        };
        Self {
            completed,
            in_progress,
            verified: record.verified.len(),
            progress_percentage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_record_is_empty() {
        let record = UserSkillRecord::new("alice", "default", Utc::now());
        assert!(record.completed.is_empty());
        assert!(record.in_progress.is_empty());
        assert!(record.verified.is_empty());
        assert_eq!(record.version, 1);
    }

    #[test]
    fn summary_percentage() {
        let mut record = UserSkillRecord::new("alice", "default", Utc::now());
        assert!((ProgressSummary::of(&record).progress_percentage - 0.0).abs() < f64::EPSILON);

        record.completed.insert("a".to_string());
        record.completed.insert("b".to_string());
        record.in_progress.insert("c".to_string());
        record.verified.insert("a".to_string(), "quiz-1".to_string());

        let summary = ProgressSummary::of(&record);
        assert_eq!(summary.completed, 2);
        assert_eq!(summary.in_progress, 1);
        assert_eq!(summary.verified, 1);
        assert!((summary.progress_percentage - 66.666).abs() < 0.01);
    }

    #[test]
    fn skill_state_display() {
        assert_eq!(SkillState::InProgress.to_string(), "in_progress");
        assert_eq!(SkillState::Locked.to_string(), "locked");
    }
}
