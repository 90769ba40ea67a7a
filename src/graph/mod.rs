//! Concept dependency graph: validated store plus pure snapshot queries.

pub mod query;
pub mod store;

pub use query::{CategoryGraph, DependencyTree, GraphSnapshot};
pub use store::{ConceptGraphStore, ListFilter};
