//! Standardized error codes for machine-parseable output.
//!
//! Error codes follow a numeric taxonomy:
//! - 1xx: Concept / graph errors
//! - 2xx: Progression errors
//! - 3xx: Snapshot errors
//! - 4xx: Config errors
//! - 5xx: Storage errors
//! - 8xx: Validation errors

use serde::{Deserialize, Serialize};

/// Standardized error codes for machine mode output.
///
/// Each variant maps to a numeric code (e.g., `ConceptNotFound` -> E101).
/// Codes are grouped by category for easy identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================
    // Concept / graph errors (1xx)
    // ========================================
    /// E101: Requested concept does not exist
    ConceptNotFound,
    /// E102: A prerequisite references a concept that doesn't exist
    PrerequisiteMissing,
    /// E103: The mutation would close a prerequisite cycle
    CyclicPrerequisite,
    /// E104: Delete blocked because other concepts depend on this one
    HasDependents,
    /// E105: Optimistic-concurrency version mismatch
    VersionConflict,
    /// E106: A concept with this id already exists
    DuplicateConcept,

    // ========================================
    // Progression errors (2xx)
    // ========================================
    /// E201: Skill-state transition not legal from the current state
    IllegalTransition,
    /// E202: Completion attempted with prerequisites still unmet
    PrerequisitesUnmet,
    /// E203: Verification attempted on a concept that is not completed
    NotCompleted,

    // ========================================
    // Snapshot errors (3xx)
    // ========================================
    /// E301: Snapshot schema version not supported
    SnapshotVersionUnsupported,
    /// E302: Snapshot failed referential/acyclicity/invariant checks
    SnapshotIntegrity,

    // ========================================
    // Config errors (4xx)
    // ========================================
    /// E401: Config file has invalid syntax or values
    ConfigInvalid,

    // ========================================
    // Storage errors (5xx)
    // ========================================
    /// E501: Database operation failed
    DatabaseError,
    /// E502: Serialization/deserialization failed
    SerializationError,
    /// E503: Filesystem operation failed
    IoError,
    /// E504: Could not acquire the import lock
    LockFailed,

    // ========================================
    // Validation errors (8xx)
    // ========================================
    /// E801: Input field is malformed or out of range
    ValidationFailed,
}

impl ErrorCode {
    /// Numeric code for this error (e.g., 101 for `ConceptNotFound`).
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        match self {
            Self::ConceptNotFound => 101,
            Self::PrerequisiteMissing => 102,
            Self::CyclicPrerequisite => 103,
            Self::HasDependents => 104,
            Self::VersionConflict => 105,
            Self::DuplicateConcept => 106,
            Self::IllegalTransition => 201,
            Self::PrerequisitesUnmet => 202,
            Self::NotCompleted => 203,
            Self::SnapshotVersionUnsupported => 301,
            Self::SnapshotIntegrity => 302,
            Self::ConfigInvalid => 401,
            Self::DatabaseError => 501,
            Self::SerializationError => 502,
            Self::IoError => 503,
            Self::LockFailed => 504,
            Self::ValidationFailed => 801,
        }
    }

    /// Formatted code string (e.g., "E101").
    #[must_use]
    pub fn as_code_string(self) -> String {
        format!("E{}", self.as_u16())
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "E{}", self.as_u16())
    }
}
