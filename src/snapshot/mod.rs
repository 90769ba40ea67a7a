//! Export/import of a complete skill tree: full graph plus one user's
//! progress, carried in a versioned document.
//!
//! Import is all-or-nothing: the document is fully validated (schema
//! version, referential integrity, acyclicity, progress invariants) before
//! anything is applied, and on success it replaces the target graph and user
//! record atomically.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::concept::{Concept, ConceptId};
use crate::core::progress::UserSkillRecord;
use crate::error::{CtError, Result};
use crate::graph::query::GraphSnapshot;
use crate::graph::store::ConceptGraphStore;
use crate::progress::ProgressStore;

/// Current snapshot document schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// A complete, self-contained skill-tree state.
///
/// The full concept graph is embedded (not just the user's frontier), so the
/// document alone reconstructs identical behavior on import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotDocument {
    pub schema_version: u32,
    pub exported_at: DateTime<Utc>,
    pub user_id: String,
    pub skill_tree_name: String,
    pub concepts: Vec<Concept>,
    pub completed: BTreeSet<ConceptId>,
    pub in_progress: BTreeSet<ConceptId>,
    pub verified: BTreeMap<ConceptId, String>,
}

/// Serialize the user's record plus the full graph into a document.
#[must_use]
pub fn export(record: &UserSkillRecord, graph: &GraphSnapshot) -> SnapshotDocument {
    SnapshotDocument {
        schema_version: SCHEMA_VERSION,
        exported_at: Utc::now(),
        user_id: record.user_id.clone(),
        skill_tree_name: record.skill_tree_name.clone(),
        concepts: graph.concepts().values().cloned().collect(),
        completed: record.completed.clone(),
        in_progress: record.in_progress.clone(),
        verified: record.verified.clone(),
    }
}

/// Validate `doc` and convert it into a graph + user record pair without
/// touching any store. Every violation is an [`CtError::ImportIntegrity`]
/// (or [`CtError::SnapshotVersion`] for a format mismatch).
pub fn decode(doc: &SnapshotDocument) -> Result<(Vec<Concept>, UserSkillRecord)> {
    if doc.schema_version != SCHEMA_VERSION {
        return Err(CtError::SnapshotVersion {
            found: doc.schema_version,
            expected: SCHEMA_VERSION,
        });
    }

    let mut by_id: BTreeMap<&str, &Concept> = BTreeMap::new();
    for concept in &doc.concepts {
        if by_id.insert(concept.id.as_str(), concept).is_some() {
            return Err(CtError::ImportIntegrity(format!(
                "duplicate concept id '{}'",
                concept.id
            )));
        }
    }

    for concept in &doc.concepts {
        for prereq in &concept.prerequisites {
            if !by_id.contains_key(prereq.as_str()) {
                return Err(CtError::ImportIntegrity(format!(
                    "concept '{}' references unknown prerequisite '{prereq}'",
                    concept.id
                )));
            }
        }
    }
    check_embedded_acyclic(&by_id)?;

    for id in doc.completed.iter().chain(doc.in_progress.iter()) {
        if !by_id.contains_key(id.as_str()) {
            return Err(CtError::ImportIntegrity(format!(
                "progress references unknown concept '{id}'"
            )));
        }
    }
    for id in doc.verified.keys() {
        if !by_id.contains_key(id.as_str()) {
            return Err(CtError::ImportIntegrity(format!(
                "verification references unknown concept '{id}'"
            )));
        }
        if !doc.completed.contains(id) {
            return Err(CtError::ImportIntegrity(format!(
                "verification marker on non-completed concept '{id}'"
            )));
        }
    }

    if let Some(overlap) = doc.completed.intersection(&doc.in_progress).next() {
        return Err(CtError::ImportIntegrity(format!(
            "concept '{overlap}' is both completed and in progress"
        )));
    }

    // Every completed concept's prerequisites must themselves be completed.
    for id in &doc.completed {
        let concept = by_id[id.as_str()];
        for prereq in &concept.prerequisites {
            if !doc.completed.contains(prereq) {
                return Err(CtError::ImportIntegrity(format!(
                    "completed concept '{id}' is missing completed prerequisite '{prereq}'"
                )));
            }
        }
    }

    let now = Utc::now();
    let record = UserSkillRecord {
        user_id: doc.user_id.clone(),
        skill_tree_name: doc.skill_tree_name.clone(),
        completed: doc.completed.clone(),
        in_progress: doc.in_progress.clone(),
        verified: doc.verified.clone(),
        created_at: now,
        updated_at: now,
        version: 1,
    };
    Ok((doc.concepts.clone(), record))
}

/// Validate `doc` and, on success, replace the graph and the user's record
/// atomically. A failed validation leaves both stores untouched.
pub fn apply_import(
    doc: &SnapshotDocument,
    graph_store: &ConceptGraphStore,
    progress_store: &ProgressStore,
) -> Result<UserSkillRecord> {
    let (concepts, record) = decode(doc)?;
    // Both swaps happen before the graph write lock is released, so no
    // transition can observe the new graph with the old record.
    graph_store.replace_all_then(concepts, || {
        progress_store.replace_record(record.clone());
    })?;
    info!(
        user_id = %record.user_id,
        tree = %record.skill_tree_name,
        concepts = doc.concepts.len(),
        "snapshot imported"
    );
    Ok(record)
}

fn check_embedded_acyclic(by_id: &BTreeMap<&str, &Concept>) -> Result<()> {
    let mut indegree: BTreeMap<&str, usize> = by_id
        .values()
        .map(|c| (c.id.as_str(), c.prerequisites.len()))
        .collect();
    let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for concept in by_id.values() {
        for prereq in &concept.prerequisites {
            dependents
                .entry(prereq.as_str())
                .or_default()
                .push(concept.id.as_str());
        }
    }

    let mut queue: VecDeque<&str> = indegree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(id, _)| *id)
        .collect();
    let mut ordered = 0usize;
    while let Some(current) = queue.pop_front() {
        ordered += 1;
        for &dependent in dependents.get(current).map_or(&[][..], Vec::as_slice) {
            if let Some(degree) = indegree.get_mut(dependent) {
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(dependent);
                }
            }
        }
    }

    if ordered != by_id.len() {
        return Err(CtError::ImportIntegrity(
            "embedded graph contains a prerequisite cycle".to_string(),
        ));
    }
    Ok(())
}
