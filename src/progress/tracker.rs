//! Transition rules and derived availability for one user record.

use serde::Serialize;

use crate::core::concept::{Concept, ConceptId};
use crate::core::progress::{SkillState, UserSkillRecord};
use crate::error::{CtError, Result};
use crate::graph::query::GraphSnapshot;

/// A locked concept together with the prerequisites still standing in the
/// way, for "what's blocking me" views.
#[derive(Debug, Clone, Serialize)]
pub struct BlockedConcept {
    pub concept: Concept,
    pub blocked_by: Vec<ConceptId>,
}

/// Derived state of `concept` for this record.
///
/// Archived concepts that the user never touched count as locked: they can
/// no longer be started, but completed/in-progress history is preserved.
#[must_use]
pub fn state_of(record: &UserSkillRecord, concept: &Concept) -> SkillState {
    if record.is_completed(&concept.id) {
        return SkillState::Completed;
    }
    if record.is_in_progress(&concept.id) {
        return SkillState::InProgress;
    }
    if concept.archived {
        return SkillState::Locked;
    }
    if missing_prerequisites(record, concept).is_empty() {
        SkillState::Available
    } else {
        SkillState::Locked
    }
}

/// All non-archived concepts currently available to the user: untouched,
/// with every prerequisite completed.
#[must_use]
pub fn available_concepts(record: &UserSkillRecord, graph: &GraphSnapshot) -> Vec<Concept> {
    graph
        .concepts()
        .values()
        .filter(|c| !c.archived)
        .filter(|c| state_of(record, c) == SkillState::Available)
        .cloned()
        .collect()
}

/// All non-archived concepts currently locked for the user, each with its
/// unmet prerequisites.
#[must_use]
pub fn blocked_concepts(record: &UserSkillRecord, graph: &GraphSnapshot) -> Vec<BlockedConcept> {
    graph
        .concepts()
        .values()
        .filter(|c| !c.archived)
        .filter(|c| state_of(record, c) == SkillState::Locked)
        .map(|c| BlockedConcept {
            blocked_by: missing_prerequisites(record, c),
            concept: c.clone(),
        })
        .collect()
}

/// Move an available concept into `in_progress`.
pub fn start(record: &mut UserSkillRecord, graph: &GraphSnapshot, concept_id: &str) -> Result<()> {
    let concept = graph.get(concept_id)?;
    match state_of(record, concept) {
        SkillState::Available => {
            record.in_progress.insert(concept_id.to_string());
            Ok(())
        }
        SkillState::Completed => Err(CtError::State(format!(
            "concept '{concept_id}' is already completed"
        ))),
        SkillState::InProgress => Err(CtError::State(format!(
            "concept '{concept_id}' is already in progress"
        ))),
        SkillState::Locked => Err(CtError::State(format!(
            "concept '{concept_id}' is locked"
        ))),
    }
}

/// Move a concept into `completed`. Legal from `available` or `in_progress`
/// (an explicit start is not required). Prerequisites are re-validated here,
/// not just at start time, to guard against concurrent edge edits.
pub fn complete(
    record: &mut UserSkillRecord,
    graph: &GraphSnapshot,
    concept_id: &str,
) -> Result<()> {
    let concept = graph.get(concept_id)?;
    if record.is_completed(concept_id) {
        return Err(CtError::State(format!(
            "concept '{concept_id}' is already completed"
        )));
    }
    let missing = missing_prerequisites(record, concept);
    if !missing.is_empty() {
        return Err(CtError::PrerequisitesUnmet {
            concept_id: concept_id.to_string(),
            missing,
        });
    }
    if concept.archived && !record.is_in_progress(concept_id) {
        return Err(CtError::State(format!(
            "concept '{concept_id}' is archived"
        )));
    }
    record.in_progress.remove(concept_id);
    record.completed.insert(concept_id.to_string());
    Ok(())
}

/// Attach or replace the verification marker for a completed concept.
pub fn mark_verified(record: &mut UserSkillRecord, concept_id: &str, marker: &str) -> Result<()> {
    if !record.is_completed(concept_id) {
        return Err(CtError::NotCompleted(concept_id.to_string()));
    }
    record
        .verified
        .insert(concept_id.to_string(), marker.to_string());
    Ok(())
}

fn missing_prerequisites(record: &UserSkillRecord, concept: &Concept) -> Vec<ConceptId> {
    concept
        .prerequisites
        .iter()
        .filter(|prereq| !record.is_completed(prereq))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::concept::ConceptDraft;
    use crate::core::progress::UserSkillRecord;
    use crate::graph::store::ConceptGraphStore;
    use chrono::Utc;

    fn store_abc() -> ConceptGraphStore {
        let store = ConceptGraphStore::new();
        for (id, prereqs) in [("a", vec![]), ("b", vec!["a"]), ("c", vec!["a", "b"])] {
            store
                .create_concept(ConceptDraft {
                    id: Some(id.to_string()),
                    title: format!("Concept {id}"),
                    difficulty: 1,
                    prerequisites: prereqs.iter().map(ToString::to_string).collect(),
                    ..ConceptDraft::default()
                })
                .unwrap();
        }
        store
    }

    fn fresh_record() -> UserSkillRecord {
        UserSkillRecord::new("alice", "default", Utc::now())
    }

    fn ids(concepts: &[Concept]) -> Vec<&str> {
        concepts.iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn fresh_user_sees_roots_available_and_rest_blocked() {
        let graph = store_abc().snapshot();
        let record = fresh_record();
        assert_eq!(ids(&available_concepts(&record, &graph)), vec!["a"]);
        let blocked = blocked_concepts(&record, &graph);
        assert_eq!(
            blocked.iter().map(|b| b.concept.id.as_str()).collect::<Vec<_>>(),
            vec!["b", "c"]
        );
        assert_eq!(blocked[0].blocked_by, vec!["a"]);
        assert_eq!(blocked[1].blocked_by, vec!["a", "b"]);
    }

    #[test]
    fn completion_unlocks_dependents_step_by_step() {
        let graph = store_abc().snapshot();
        let mut record = fresh_record();

        complete(&mut record, &graph, "a").unwrap();
        assert_eq!(ids(&available_concepts(&record, &graph)), vec!["b"]);

        complete(&mut record, &graph, "b").unwrap();
        assert_eq!(ids(&available_concepts(&record, &graph)), vec!["c"]);
    }

    #[test]
    fn complete_out_of_order_fails_with_unmet_prerequisites() {
        let graph = store_abc().snapshot();
        let mut record = fresh_record();
        complete(&mut record, &graph, "a").unwrap();

        let err = complete(&mut record, &graph, "c").unwrap_err();
        match err {
            CtError::PrerequisitesUnmet { concept_id, missing } => {
                assert_eq!(concept_id, "c");
                assert_eq!(missing, vec!["b"]);
            }
            other => panic!("expected unmet prerequisites, got {other}"),
        }
        assert!(!record.is_completed("c"));
    }

    #[test]
    fn start_requires_availability() {
        let graph = store_abc().snapshot();
        let mut record = fresh_record();

        assert!(matches!(
            start(&mut record, &graph, "b"),
            Err(CtError::State(_))
        ));

        start(&mut record, &graph, "a").unwrap();
        assert!(record.is_in_progress("a"));
        assert!(matches!(
            start(&mut record, &graph, "a"),
            Err(CtError::State(_))
        ));
    }

    #[test]
    fn complete_moves_in_progress_to_completed() {
        let graph = store_abc().snapshot();
        let mut record = fresh_record();
        start(&mut record, &graph, "a").unwrap();
        complete(&mut record, &graph, "a").unwrap();
        assert!(record.is_completed("a"));
        assert!(!record.is_in_progress("a"));
        assert!(matches!(
            complete(&mut record, &graph, "a"),
            Err(CtError::State(_))
        ));
    }

    #[test]
    fn available_never_overlaps_completed_or_in_progress() {
        let graph = store_abc().snapshot();
        let mut record = fresh_record();
        complete(&mut record, &graph, "a").unwrap();
        start(&mut record, &graph, "b").unwrap();

        for concept in available_concepts(&record, &graph) {
            assert!(!record.is_completed(&concept.id));
            assert!(!record.is_in_progress(&concept.id));
        }
    }

    #[test]
    fn archived_concepts_are_excluded_from_availability() {
        let store = store_abc();
        store.archive_concept("a").unwrap();
        let graph = store.snapshot();
        let record = fresh_record();
        assert!(available_concepts(&record, &graph).is_empty());
        // Archived concepts do not show up in the blocked list either.
        assert_eq!(blocked_concepts(&record, &graph).len(), 2);
    }

    #[test]
    fn archived_in_progress_can_still_complete() {
        let store = store_abc();
        let mut record = fresh_record();
        start(&mut record, &store.snapshot(), "a").unwrap();
        store.archive_concept("a").unwrap();
        complete(&mut record, &store.snapshot(), "a").unwrap();
        assert!(record.is_completed("a"));
    }

    #[test]
    fn verify_requires_completion_and_replaces_marker() {
        let graph = store_abc().snapshot();
        let mut record = fresh_record();

        assert!(matches!(
            mark_verified(&mut record, "a", "quiz-1"),
            Err(CtError::NotCompleted(_))
        ));

        complete(&mut record, &graph, "a").unwrap();
        mark_verified(&mut record, "a", "quiz-1").unwrap();
        mark_verified(&mut record, "a", "quiz-2").unwrap();
        assert_eq!(record.verified.get("a").map(String::as_str), Some("quiz-2"));
    }

    #[test]
    fn history_survives_concept_deletion() {
        let store = store_abc();
        let mut record = fresh_record();
        complete(&mut record, &store.snapshot(), "a").unwrap();
        complete(&mut record, &store.snapshot(), "b").unwrap();
        complete(&mut record, &store.snapshot(), "c").unwrap();
        store.delete_concept("c").unwrap();
        assert!(record.is_completed("c"));
    }
}
