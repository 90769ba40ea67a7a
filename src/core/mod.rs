//! Entity model: concepts and per-user progression records.

pub mod concept;
pub mod progress;

pub use concept::{Concept, ConceptDraft, ConceptId, ConceptPatch};
pub use progress::{ProgressSummary, SkillState, UserSkillRecord};
