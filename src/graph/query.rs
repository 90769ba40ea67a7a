//! Pure, read-only computations over an immutable graph snapshot.
//!
//! Every function here terminates and yields duplicate-free results because
//! the store guarantees the prerequisite relation is acyclic. By construction
//! `b ∈ dependents(a) ⇔ a ∈ dependencies(b)`.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

use serde::Serialize;

use crate::core::concept::{Concept, ConceptId};
use crate::error::{CtError, Result};

/// Immutable view of the concept graph at one version.
///
/// Cheap to clone; queries against a snapshot never observe a half-applied
/// mutation, at the cost of possibly serving a slightly stale version.
#[derive(Debug, Clone)]
pub struct GraphSnapshot {
    concepts: Arc<BTreeMap<ConceptId, Concept>>,
    version: u64,
}

impl GraphSnapshot {
    #[must_use]
    pub const fn new(concepts: Arc<BTreeMap<ConceptId, Concept>>, version: u64) -> Self {
        Self { concepts, version }
    }

    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    #[must_use]
    pub fn concepts(&self) -> &BTreeMap<ConceptId, Concept> {
        &self.concepts
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.concepts.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Result<&Concept> {
        self.concepts
            .get(id)
            .ok_or_else(|| CtError::ConceptNotFound(id.to_string()))
    }

    /// Direct prerequisite ids of `id`.
    pub fn dependencies(&self, id: &str) -> Result<Vec<ConceptId>> {
        Ok(self.get(id)?.prerequisites.iter().cloned().collect())
    }

    /// Ids of all concepts whose prerequisites contain `id`.
    pub fn dependents(&self, id: &str) -> Result<Vec<ConceptId>> {
        self.get(id)?;
        Ok(self
            .concepts
            .values()
            .filter(|c| c.prerequisites.contains(id))
            .map(|c| c.id.clone())
            .collect())
    }

    /// Transitive prerequisite closure of `id` (excluding `id` itself),
    /// sorted.
    pub fn all_ancestors(&self, id: &str) -> Result<Vec<ConceptId>> {
        self.closure(id, |concept| concept.prerequisites.iter().cloned().collect())
    }

    /// Transitive dependent closure of `id` (excluding `id` itself), sorted.
    pub fn all_descendants(&self, id: &str) -> Result<Vec<ConceptId>> {
        self.closure(id, |concept| {
            self.concepts
                .values()
                .filter(|c| c.prerequisites.contains(&concept.id))
                .map(|c| c.id.clone())
                .collect()
        })
    }

    fn closure(
        &self,
        id: &str,
        neighbors: impl Fn(&Concept) -> Vec<ConceptId>,
    ) -> Result<Vec<ConceptId>> {
        self.get(id)?;
        let mut seen: BTreeSet<ConceptId> = BTreeSet::new();
        let mut queue: VecDeque<ConceptId> = VecDeque::from([id.to_string()]);
        while let Some(current) = queue.pop_front() {
            let Some(concept) = self.concepts.get(&current) else {
                continue;
            };
            for next in neighbors(concept) {
                if next != id && seen.insert(next.clone()) {
                    queue.push_back(next);
                }
            }
        }
        Ok(seen.into_iter().collect())
    }

    /// Nested prerequisite tree rooted at `id`, for human-readable views.
    /// Shared ancestors appear once; repeat visits are pruned.
    pub fn dependency_tree(&self, id: &str) -> Result<DependencyTree> {
        let mut visited = BTreeSet::new();
        self.build_tree(id, &mut visited)
    }

    fn build_tree(&self, id: &str, visited: &mut BTreeSet<ConceptId>) -> Result<DependencyTree> {
        let concept = self.get(id)?;
        visited.insert(concept.id.clone());
        let mut prerequisites = Vec::new();
        for prereq in &concept.prerequisites {
            if !visited.contains(prereq) {
                prerequisites.push(self.build_tree(prereq, visited)?);
            }
        }
        Ok(DependencyTree {
            concept_id: concept.id.clone(),
            title: concept.title.clone(),
            difficulty: concept.difficulty,
            category: concept.category.clone(),
            prerequisites,
        })
    }

    /// Per-concept prerequisites + dependents summary, optionally restricted
    /// to one category. Used by the CLI tree view.
    #[must_use]
    pub fn category_graph(&self, category: Option<&str>) -> CategoryGraph {
        let nodes: BTreeMap<ConceptId, CategoryNode> = self
            .concepts
            .values()
            .filter(|c| !c.archived)
            .filter(|c| category.is_none_or(|wanted| c.category == wanted))
            .map(|c| {
                let dependents = self
                    .concepts
                    .values()
                    .filter(|other| other.prerequisites.contains(&c.id))
                    .map(|other| other.id.clone())
                    .collect();
                (
                    c.id.clone(),
                    CategoryNode {
                        title: c.title.clone(),
                        difficulty: c.difficulty,
                        prerequisites: c.prerequisites.iter().cloned().collect(),
                        dependents,
                    },
                )
            })
            .collect();
        CategoryGraph {
            category: category.map_or_else(|| "All".to_string(), ToString::to_string),
            total_concepts: nodes.len(),
            concepts: nodes,
        }
    }
}

/// Nested prerequisite tree for a single concept.
#[derive(Debug, Clone, Serialize)]
pub struct DependencyTree {
    pub concept_id: ConceptId,
    pub title: String,
    pub difficulty: u8,
    pub category: String,
    pub prerequisites: Vec<DependencyTree>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryNode {
    pub title: String,
    pub difficulty: u8,
    pub prerequisites: Vec<ConceptId>,
    pub dependents: Vec<ConceptId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryGraph {
    pub category: String,
    pub total_concepts: usize,
    pub concepts: BTreeMap<ConceptId, CategoryNode>,
}
