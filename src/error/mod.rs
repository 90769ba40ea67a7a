//! Error handling for ct.
//!
//! This module provides:
//! - [`CtError`]: The main error enum for all ct operations
//! - [`ErrorCode`]: Standardized error codes for machine parsing
//!
//! All domain errors are synchronous, locally detected rejections: the
//! failing operation leaves state unchanged and reports the specific kind
//! and offending id(s). Nothing is retried internally.

mod codes;

use std::io;

use thiserror::Error;

pub use codes::ErrorCode;

/// Main error type for ct operations.
#[derive(Error, Debug)]
pub enum CtError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Concept not found: {0}")]
    ConceptNotFound(String),

    #[error("Prerequisite concept not found: {prereq_id} (required by {concept_id})")]
    PrerequisiteMissing {
        concept_id: String,
        prereq_id: String,
    },

    #[error("Concept already exists: {0}")]
    DuplicateConcept(String),

    #[error("Cyclic prerequisites for concept '{concept_id}': {}", .cycle.join(" -> "))]
    Cycle {
        concept_id: String,
        cycle: Vec<String>,
    },

    #[error("Cannot delete concept '{concept_id}': depended on by {}", .dependents.join(", "))]
    HasDependents {
        concept_id: String,
        dependents: Vec<String>,
    },

    #[error("Version conflict: {0}")]
    VersionConflict(String),

    #[error("Illegal skill transition: {0}")]
    State(String),

    #[error("Prerequisites unmet for concept '{concept_id}': missing {}", .missing.join(", "))]
    PrerequisitesUnmet {
        concept_id: String,
        missing: Vec<String>,
    },

    #[error("Concept '{0}' is not completed")]
    NotCompleted(String),

    #[error("Snapshot import rejected: {0}")]
    ImportIntegrity(String),

    #[error("Unsupported snapshot schema version {found} (expected {expected})")]
    SnapshotVersion { found: u32, expected: u32 },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Lock failed: {0}")]
    LockFailed(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl CtError {
    /// Get the error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Validation(_) => ErrorCode::ValidationFailed,
            Self::ConceptNotFound(_) => ErrorCode::ConceptNotFound,
            Self::PrerequisiteMissing { .. } => ErrorCode::PrerequisiteMissing,
            Self::DuplicateConcept(_) => ErrorCode::DuplicateConcept,
            Self::Cycle { .. } => ErrorCode::CyclicPrerequisite,
            Self::HasDependents { .. } => ErrorCode::HasDependents,
            Self::VersionConflict(_) => ErrorCode::VersionConflict,
            Self::State(_) => ErrorCode::IllegalTransition,
            Self::PrerequisitesUnmet { .. } => ErrorCode::PrerequisitesUnmet,
            Self::NotCompleted(_) => ErrorCode::NotCompleted,
            Self::ImportIntegrity(_) => ErrorCode::SnapshotIntegrity,
            Self::SnapshotVersion { .. } => ErrorCode::SnapshotVersionUnsupported,
            Self::Config(_) => ErrorCode::ConfigInvalid,
            Self::LockFailed(_) => ErrorCode::LockFailed,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::Json(_) => ErrorCode::SerializationError,
            Self::Io(_) => ErrorCode::IoError,
        }
    }

    /// Whether the caller may retry the operation unchanged.
    ///
    /// Only substrate failures qualify; domain rejections are deterministic.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::VersionConflict(_) | Self::Database(_) | Self::Io(_) | Self::LockFailed(_)
        )
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CtError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_error_formats_path() {
        let err = CtError::Cycle {
            concept_id: "c".to_string(),
            cycle: vec!["c".to_string(), "d".to_string(), "c".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Cyclic prerequisites for concept 'c': c -> d -> c"
        );
        assert_eq!(err.code(), ErrorCode::CyclicPrerequisite);
    }

    #[test]
    fn domain_errors_are_not_retryable() {
        let err = CtError::State("start on completed concept".to_string());
        assert!(!err.is_retryable());
        assert!(CtError::VersionConflict("graph".to_string()).is_retryable());
    }
}
