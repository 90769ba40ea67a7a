//! End-to-end engine scenarios: graph authoring, progression, persistence.

use chrono::Utc;

use ct::core::concept::{ConceptDraft, ConceptPatch};
use ct::core::progress::UserSkillRecord;
use ct::error::CtError;
use ct::graph::store::{ConceptGraphStore, ListFilter};
use ct::progress::{self, ProgressStore};
use ct::snapshot;
use ct::storage::Database;

fn draft(id: &str, title: &str, prereqs: &[&str]) -> ConceptDraft {
    ConceptDraft {
        id: Some(id.to_string()),
        title: title.to_string(),
        difficulty: 1,
        prerequisites: prereqs.iter().map(ToString::to_string).collect(),
        ..ConceptDraft::default()
    }
}

#[test]
fn linear_algebra_progression_scenario() {
    let store = ConceptGraphStore::new();
    store
        .create_concept(draft("basic_vectors", "Basic Vectors", &[]))
        .unwrap();
    store
        .create_concept(draft(
            "vector_operations",
            "Vector Operations",
            &["basic_vectors"],
        ))
        .unwrap();
    store
        .create_concept(draft(
            "matrix_transformations",
            "Matrix Transformations",
            &["basic_vectors", "vector_operations"],
        ))
        .unwrap();

    let graph = store.snapshot();
    let mut record = UserSkillRecord::new("alice", "linear-algebra", Utc::now());

    let available: Vec<String> = progress::available_concepts(&record, &graph)
        .into_iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(available, vec!["basic_vectors"]);
    assert_eq!(progress::blocked_concepts(&record, &graph).len(), 2);

    // Completing the chain unlocks one concept at a time.
    assert!(matches!(
        progress::complete(&mut record, &graph, "matrix_transformations"),
        Err(CtError::PrerequisitesUnmet { .. })
    ));
    progress::complete(&mut record, &graph, "basic_vectors").unwrap();
    progress::complete(&mut record, &graph, "vector_operations").unwrap();
    progress::complete(&mut record, &graph, "matrix_transformations").unwrap();
    assert!(progress::available_concepts(&record, &graph).is_empty());
    assert!(progress::blocked_concepts(&record, &graph).is_empty());
}

#[test]
fn graph_survives_sqlite_round_trip() {
    let db = Database::open_in_memory().unwrap();

    let store = ConceptGraphStore::new();
    for concept_draft in [
        draft("a", "Concept a", &[]),
        draft("b", "Concept b", &["a"]),
    ] {
        let concept = store.create_concept(concept_draft).unwrap();
        db.save_concept(&concept).unwrap();
    }

    let reloaded = ConceptGraphStore::from_concepts(db.load_concepts().unwrap()).unwrap();
    assert_eq!(
        reloaded.list_concepts(&ListFilter::default()),
        store.list_concepts(&ListFilter::default())
    );

    // A progression step persisted and reloaded keeps its state.
    let graph = reloaded.snapshot();
    let mut record = UserSkillRecord::new("bob", "default", Utc::now());
    progress::complete(&mut record, &graph, "a").unwrap();
    progress::mark_verified(&mut record, "a", "assessment-41").unwrap();
    db.save_user(&record).unwrap();

    let loaded = db.load_user("bob", "default").unwrap().unwrap();
    assert!(loaded.is_completed("a"));
    assert_eq!(
        loaded.verified.get("a").map(String::as_str),
        Some("assessment-41")
    );
    let available: Vec<String> = progress::available_concepts(&loaded, &graph)
        .into_iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(available, vec!["b"]);
}

#[test]
fn concurrent_writers_cannot_both_commit() {
    let db = Database::open_in_memory().unwrap();
    let base = UserSkillRecord::new("carol", "default", Utc::now());
    db.save_user(&base).unwrap();

    // Two clients load the same version and race their commits.
    let mut first = db.load_user("carol", "default").unwrap().unwrap();
    let mut second = first.clone();

    first.completed.insert("a".to_string());
    first.version += 1;
    db.save_user(&first).unwrap();

    second.in_progress.insert("a".to_string());
    second.version += 1;
    assert!(matches!(
        db.save_user(&second),
        Err(CtError::VersionConflict(_))
    ));
}

#[test]
fn import_supersedes_previous_record() {
    let store = ConceptGraphStore::new();
    store.create_concept(draft("a", "Concept a", &[])).unwrap();
    store
        .create_concept(draft("b", "Concept b", &["a"]))
        .unwrap();

    let progress_store = ProgressStore::new();
    let record = progress_store.get_or_create("dave", "default");
    progress_store
        .update("dave", "default", record.version, |r| {
            progress::complete(r, &store.snapshot(), "a")
        })
        .unwrap();

    let doc = snapshot::export(
        &progress_store.get_or_create("dave", "default"),
        &store.snapshot(),
    );

    // The target already has divergent state; import replaces it wholesale.
    let target_graph = ConceptGraphStore::new();
    target_graph
        .create_concept(draft("other", "Unrelated", &[]))
        .unwrap();
    let target_progress = ProgressStore::new();
    let stale = target_progress.get_or_create("dave", "default");
    target_progress
        .update("dave", "default", stale.version, |r| {
            r.in_progress.insert("other".to_string());
            Ok(())
        })
        .unwrap();

    snapshot::apply_import(&doc, &target_graph, &target_progress).unwrap();

    let record = target_progress.get_or_create("dave", "default");
    assert!(record.is_completed("a"));
    assert!(!record.is_in_progress("other"));
    assert!(target_graph.get_concept("other").is_err());
    assert!(target_graph.get_concept("b").is_ok());
}

#[test]
fn cycle_rejection_keeps_both_prerequisite_sets() {
    let store = ConceptGraphStore::new();
    store.create_concept(draft("c", "Concept c", &[])).unwrap();
    store
        .create_concept(draft("d", "Concept d", &["c"]))
        .unwrap();

    let err = store
        .update_concept(
            "c",
            ConceptPatch {
                prerequisites: Some(vec!["d".to_string()]),
                ..ConceptPatch::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, CtError::Cycle { .. }));

    assert!(store.get_concept("c").unwrap().prerequisites.is_empty());
    assert_eq!(
        store.get_concept("d").unwrap().prerequisites,
        ["c".to_string()].into_iter().collect()
    );
}
