//! Concept graph store: validated mutations over the curriculum graph.
//!
//! All writes go through [`ConceptGraphStore`], which enforces the structural
//! invariants on every mutation: prerequisite ids must exist, and the
//! prerequisite relation must stay acyclic. Failed mutations leave the stored
//! graph untouched. Reads hand out an immutable [`GraphSnapshot`].

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use tracing::debug;

use crate::core::concept::{
    validate_difficulty, validate_title, Concept, ConceptDraft, ConceptId, ConceptPatch,
};
use crate::error::{CtError, Result};
use crate::graph::query::GraphSnapshot;

/// Filter for [`ConceptGraphStore::list_concepts`].
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub category: Option<String>,
    pub include_archived: bool,
}

#[derive(Debug, Default)]
struct GraphState {
    concepts: BTreeMap<ConceptId, Concept>,
    version: u64,
}

/// In-memory concept collection with single-writer mutation discipline.
#[derive(Debug, Default)]
pub struct ConceptGraphStore {
    inner: RwLock<GraphState>,
}

impl ConceptGraphStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from an existing concept set (e.g., loaded from
    /// storage), verifying referential integrity and acyclicity up front.
    pub fn from_concepts(concepts: Vec<Concept>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for concept in concepts {
            if map.insert(concept.id.clone(), concept.clone()).is_some() {
                return Err(CtError::DuplicateConcept(concept.id));
            }
        }
        verify_graph(&map)?;
        Ok(Self {
            inner: RwLock::new(GraphState {
                concepts: map,
                version: 1,
            }),
        })
    }

    /// Current graph version. Bumped on every committed mutation.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.read().version
    }

    /// Immutable snapshot of the current graph for queries.
    #[must_use]
    pub fn snapshot(&self) -> GraphSnapshot {
        let state = self.inner.read();
        GraphSnapshot::new(Arc::new(state.concepts.clone()), state.version)
    }

    /// Create a concept after validating its fields, the existence of every
    /// prerequisite, and that the new edges close no cycle.
    pub fn create_concept(&self, draft: ConceptDraft) -> Result<Concept> {
        draft.validate()?;

        let mut state = self.inner.write();
        if let Some(id) = &draft.id {
            if state.concepts.contains_key(id) {
                return Err(CtError::DuplicateConcept(id.clone()));
            }
        }

        let concept = draft.into_concept(Utc::now());
        for prereq in &concept.prerequisites {
            if !state.concepts.contains_key(prereq) {
                return Err(CtError::PrerequisiteMissing {
                    concept_id: concept.id.clone(),
                    prereq_id: prereq.clone(),
                });
            }
        }
        // A brand-new node cannot be reachable from existing nodes, but a
        // caller-supplied id could collide with a prerequisite of itself.
        check_acyclic(&state.concepts, &concept.id, &concept.prerequisites)?;

        debug!(concept_id = %concept.id, "concept created");
        state.concepts.insert(concept.id.clone(), concept.clone());
        state.version += 1;
        Ok(concept)
    }

    /// Apply a partial update. A prerequisite replacement is treated as a
    /// batch edge replacement and re-runs the acyclicity check; on any
    /// rejection the stored graph is unchanged.
    pub fn update_concept(&self, id: &str, patch: ConceptPatch) -> Result<Concept> {
        if let Some(title) = &patch.title {
            validate_title(title)?;
        }
        if let Some(difficulty) = patch.difficulty {
            validate_difficulty(difficulty)?;
        }

        let mut state = self.inner.write();
        if !state.concepts.contains_key(id) {
            return Err(CtError::ConceptNotFound(id.to_string()));
        }

        let new_prereqs: Option<BTreeSet<ConceptId>> = match &patch.prerequisites {
            Some(ids) => {
                let set: BTreeSet<ConceptId> = ids.iter().cloned().collect();
                for prereq in &set {
                    if !state.concepts.contains_key(prereq) {
                        return Err(CtError::PrerequisiteMissing {
                            concept_id: id.to_string(),
                            prereq_id: prereq.clone(),
                        });
                    }
                }
                check_acyclic(&state.concepts, id, &set)?;
                Some(set)
            }
            None => None,
        };

        let concept = state
            .concepts
            .get_mut(id)
            .ok_or_else(|| CtError::ConceptNotFound(id.to_string()))?;
        if let Some(title) = patch.title {
            concept.title = title;
        }
        if let Some(description) = patch.description {
            concept.description = description;
        }
        if let Some(category) = patch.category {
            concept.category = category;
        }
        if let Some(difficulty) = patch.difficulty {
            concept.difficulty = difficulty;
        }
        if let Some(prereqs) = new_prereqs {
            concept.prerequisites = prereqs;
        }
        if let Some(archived) = patch.archived {
            concept.archived = archived;
        }
        concept.updated_at = Utc::now();
        concept.version += 1;
        let updated = concept.clone();
        state.version += 1;
        debug!(concept_id = %id, version = updated.version, "concept updated");
        Ok(updated)
    }

    /// Hard delete. Rejected while any other concept lists `id` as a
    /// prerequisite; there is no cascade.
    pub fn delete_concept(&self, id: &str) -> Result<()> {
        let mut state = self.inner.write();
        if !state.concepts.contains_key(id) {
            return Err(CtError::ConceptNotFound(id.to_string()));
        }

        let dependents: Vec<ConceptId> = state
            .concepts
            .values()
            .filter(|c| c.prerequisites.contains(id))
            .map(|c| c.id.clone())
            .collect();
        if !dependents.is_empty() {
            return Err(CtError::HasDependents {
                concept_id: id.to_string(),
                dependents,
            });
        }

        state.concepts.remove(id);
        state.version += 1;
        debug!(concept_id = %id, "concept deleted");
        Ok(())
    }

    /// Soft removal: the concept is excluded from availability computation
    /// but kept for history.
    pub fn archive_concept(&self, id: &str) -> Result<Concept> {
        self.update_concept(
            id,
            ConceptPatch {
                archived: Some(true),
                ..ConceptPatch::default()
            },
        )
    }

    pub fn get_concept(&self, id: &str) -> Result<Concept> {
        self.inner
            .read()
            .concepts
            .get(id)
            .cloned()
            .ok_or_else(|| CtError::ConceptNotFound(id.to_string()))
    }

    /// List concepts, optionally filtered by category; archived concepts are
    /// excluded unless requested.
    #[must_use]
    pub fn list_concepts(&self, filter: &ListFilter) -> Vec<Concept> {
        self.inner
            .read()
            .concepts
            .values()
            .filter(|c| filter.include_archived || !c.archived)
            .filter(|c| {
                filter
                    .category
                    .as_ref()
                    .is_none_or(|category| &c.category == category)
            })
            .cloned()
            .collect()
    }

    /// Atomically replace the whole concept set (snapshot import). The new
    /// set is verified before anything is swapped in.
    pub fn replace_all(&self, concepts: Vec<Concept>) -> Result<()> {
        self.replace_all_then(concepts, || ())
    }

    /// Like [`ConceptGraphStore::replace_all`], but runs `follow_up` before
    /// the write lock is released, so a paired swap in another store cannot
    /// interleave with writers that read this graph.
    pub fn replace_all_then<T>(
        &self,
        concepts: Vec<Concept>,
        follow_up: impl FnOnce() -> T,
    ) -> Result<T> {
        let mut map = BTreeMap::new();
        for concept in concepts {
            if map.insert(concept.id.clone(), concept.clone()).is_some() {
                return Err(CtError::DuplicateConcept(concept.id));
            }
        }
        verify_graph(&map)?;

        let mut state = self.inner.write();
        state.concepts = map;
        state.version += 1;
        debug!(version = state.version, "graph replaced");
        Ok(follow_up())
    }
}

/// Reject the proposed prerequisite set for `concept_id` if any prerequisite
/// can reach `concept_id` through the current graph's prerequisite edges.
///
/// BFS from each proposed prerequisite; a path prereq -> ... -> concept_id
/// means the new edge would close a cycle. The discovered path is reported.
fn check_acyclic(
    concepts: &BTreeMap<ConceptId, Concept>,
    concept_id: &str,
    proposed: &BTreeSet<ConceptId>,
) -> Result<()> {
    for prereq in proposed {
        if prereq == concept_id {
            return Err(CtError::Cycle {
                concept_id: concept_id.to_string(),
                cycle: vec![concept_id.to_string(), concept_id.to_string()],
            });
        }
        if let Some(path) = path_between(concepts, prereq, concept_id) {
            let mut cycle = vec![concept_id.to_string()];
            cycle.extend(path);
            return Err(CtError::Cycle {
                concept_id: concept_id.to_string(),
                cycle,
            });
        }
    }
    Ok(())
}

/// BFS over prerequisite edges from `start`; returns the path
/// `start -> ... -> target` if `target` is reachable.
fn path_between(
    concepts: &BTreeMap<ConceptId, Concept>,
    start: &str,
    target: &str,
) -> Option<Vec<ConceptId>> {
    let mut parents: HashMap<ConceptId, ConceptId> = HashMap::new();
    let mut seen: HashSet<&str> = HashSet::from([start]);
    let mut queue: VecDeque<&str> = VecDeque::from([start]);

    while let Some(current) = queue.pop_front() {
        if current == target {
            let mut path = vec![target.to_string()];
            let mut cursor = target.to_string();
            while let Some(parent) = parents.get(&cursor) {
                path.push(parent.clone());
                cursor = parent.clone();
            }
            path.reverse();
            return Some(path);
        }
        let Some(concept) = concepts.get(current) else {
            continue;
        };
        for next in &concept.prerequisites {
            if seen.insert(next) {
                parents.insert(next.clone(), current.to_string());
                queue.push_back(next);
            }
        }
    }
    None
}

/// Full-graph verification used when adopting an externally supplied concept
/// set: every prerequisite must exist and the relation must be acyclic.
fn verify_graph(concepts: &BTreeMap<ConceptId, Concept>) -> Result<()> {
    for concept in concepts.values() {
        validate_title(&concept.title)?;
        validate_difficulty(concept.difficulty)?;
        for prereq in &concept.prerequisites {
            if !concepts.contains_key(prereq) {
                return Err(CtError::PrerequisiteMissing {
                    concept_id: concept.id.clone(),
                    prereq_id: prereq.clone(),
                });
            }
        }
    }

    // Kahn's algorithm: if a topological order covers every node, the
    // relation is acyclic.
    let mut indegree: BTreeMap<&str, usize> = concepts
        .values()
        .map(|c| (c.id.as_str(), c.prerequisites.len()))
        .collect();
    let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for concept in concepts.values() {
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

    if ordered != concepts.len() {
        let mut stuck: Vec<ConceptId> = indegree
            .iter()
            .filter(|(_, degree)| **degree > 0)
            .map(|(id, _)| (*id).to_string())
            .collect();
        stuck.sort();
        let concept_id = stuck.first().cloned().unwrap_or_default();
        return Err(CtError::Cycle {
            concept_id,
            cycle: stuck,
        });
    }
    Ok(())
}
