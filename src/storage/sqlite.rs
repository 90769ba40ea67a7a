//! SQLite database layer
//!
//! Persists the concept collection and the user skill records. Saves carry
//! the record's previous version in the WHERE clause, so a writer that lost
//! a race gets a zero-row update and a `VersionConflict` instead of
//! clobbering the other writer's commit.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Transaction, TransactionBehavior};

use crate::core::concept::{Concept, ConceptId};
use crate::core::progress::UserSkillRecord;
use crate::error::{CtError, Result};
use crate::graph::store::ConceptGraphStore;
use crate::storage::migrations;

/// SQLite database wrapper for the concept and progress collections.
pub struct Database {
    conn: Connection,
    schema_version: u32,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("schema_version", &self.schema_version)
            .finish_non_exhaustive()
    }
}

struct ConceptRow {
    id: String,
    title: String,
    description: String,
    category: String,
    difficulty: u8,
    prerequisites_json: String,
    archived: bool,
    created_at: String,
    updated_at: String,
    // SQLite integers are signed; converted at the domain boundary.
    version: i64,
}

struct UserRow {
    user_id: String,
    skill_tree_name: String,
    completed_json: String,
    in_progress_json: String,
    verified_json: String,
    created_at: String,
    updated_at: String,
    version: i64,
}

impl Database {
    /// Open database at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        Self::configure_pragmas(&conn)?;
        let schema_version = migrations::run_migrations(&conn)?;
        Ok(Self {
            conn,
            schema_version,
        })
    }

    /// In-memory database for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let schema_version = migrations::run_migrations(&conn)?;
        Ok(Self {
            conn,
            schema_version,
        })
    }

    fn configure_pragmas(conn: &Connection) -> Result<()> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "busy_timeout", 5000)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(())
    }

    #[must_use]
    pub const fn schema_version(&self) -> u32 {
        self.schema_version
    }

    // =========================================================================
    // Concepts
    // =========================================================================

    pub fn load_concepts(&self) -> Result<Vec<Concept>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, description, category, difficulty, prerequisites_json,
                    archived, created_at, updated_at, version
             FROM concepts ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ConceptRow {
                id: row.get(0)?,
                title: row.get(1)?,
                description: row.get(2)?,
                category: row.get(3)?,
                difficulty: row.get(4)?,
                prerequisites_json: row.get(5)?,
                archived: row.get(6)?,
                created_at: row.get(7)?,
                updated_at: row.get(8)?,
                version: row.get(9)?,
            })
        })?;

        let mut concepts = Vec::new();
        for row in rows {
            concepts.push(concept_from_row(row?)?);
        }
        Ok(concepts)
    }

    /// Insert or update one concept with an optimistic version check.
    ///
    /// The concept's `version` is the post-mutation value; the matching row
    /// must still hold `version - 1` (or not exist, for a fresh concept).
    ///
    /// The row CAS only protects this concept. Another process may have
    /// committed an edge change elsewhere since our graph was loaded, so the
    /// whole persisted set is re-verified inside the same transaction before
    /// the commit becomes durable.
    pub fn save_concept(&self, concept: &Concept) -> Result<()> {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        self.write_concept_row(concept)?;
        ConceptGraphStore::from_concepts(self.load_concepts()?)?;
        tx.commit()?;
        Ok(())
    }

    fn write_concept_row(&self, concept: &Concept) -> Result<()> {
        let prerequisites_json = serde_json::to_string(&concept.prerequisites)?;
        if concept.version > 1 {
            let version = version_to_db(concept.version)?;
            let expected = version_to_db(concept.version - 1)?;
            let updated = self.conn.execute(
                "UPDATE concepts
                 SET title=?2, description=?3, category=?4, difficulty=?5,
                     prerequisites_json=?6, archived=?7, updated_at=?8, version=?9
                 WHERE id=?1 AND version=?10",
                params![
                    concept.id,
                    concept.title,
                    concept.description,
                    concept.category,
                    concept.difficulty,
                    prerequisites_json,
                    concept.archived,
                    concept.updated_at.to_rfc3339(),
                    version,
                    expected,
                ],
            )?;
            if updated == 0 {
                return Err(CtError::VersionConflict(format!(
                    "concept '{}' was modified by another writer",
                    concept.id
                )));
            }
            return Ok(());
        }

        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO concepts
                 (id, title, description, category, difficulty, prerequisites_json,
                  archived, created_at, updated_at, version)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                concept.id,
                concept.title,
                concept.description,
                concept.category,
                concept.difficulty,
                prerequisites_json,
                concept.archived,
                concept.created_at.to_rfc3339(),
                concept.updated_at.to_rfc3339(),
                version_to_db(concept.version)?,
            ],
        )?;
        if inserted == 0 {
            return Err(CtError::VersionConflict(format!(
                "concept '{}' was created by another writer",
                concept.id
            )));
        }
        Ok(())
    }

    /// Delete one concept. The dependents check runs against the persisted
    /// rows inside the same transaction, so an edge committed by another
    /// process since our graph was loaded still blocks the delete.
    pub fn delete_concept(&self, id: &str) -> Result<()> {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        let deleted = self
            .conn
            .execute("DELETE FROM concepts WHERE id=?1", params![id])?;
        if deleted == 0 {
            return Err(CtError::ConceptNotFound(id.to_string()));
        }
        let dependents: Vec<ConceptId> = self
            .load_concepts()?
            .into_iter()
            .filter(|c| c.prerequisites.contains(id))
            .map(|c| c.id)
            .collect();
        if !dependents.is_empty() {
            return Err(CtError::HasDependents {
                concept_id: id.to_string(),
                dependents,
            });
        }
        tx.commit()?;
        Ok(())
    }

    /// Atomically replace the whole concept collection (snapshot import).
    pub fn replace_concepts(&self, concepts: &[Concept]) -> Result<()> {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        self.write_concept_rows(concepts)?;
        tx.commit()?;
        Ok(())
    }

    /// Replace the concept collection and the user's record in one
    /// transaction, so a failure between the two leaves neither applied.
    pub fn import(&self, concepts: &[Concept], record: &UserSkillRecord) -> Result<()> {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        self.write_concept_rows(concepts)?;
        self.replace_user(record)?;
        tx.commit()?;
        Ok(())
    }

    fn write_concept_rows(&self, concepts: &[Concept]) -> Result<()> {
        self.conn.execute("DELETE FROM concepts", [])?;
        let mut stmt = self.conn.prepare(
            "INSERT INTO concepts
                 (id, title, description, category, difficulty, prerequisites_json,
                  archived, created_at, updated_at, version)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )?;
        for concept in concepts {
            stmt.execute(params![
                concept.id,
                concept.title,
                concept.description,
                concept.category,
                concept.difficulty,
                serde_json::to_string(&concept.prerequisites)?,
                concept.archived,
                concept.created_at.to_rfc3339(),
                concept.updated_at.to_rfc3339(),
                version_to_db(concept.version)?,
            ])?;
        }
        Ok(())
    }

    // =========================================================================
    // User skill records
    // =========================================================================

    pub fn load_user(&self, user_id: &str, skill_tree_name: &str) -> Result<Option<UserSkillRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id, skill_tree_name, completed_json, in_progress_json,
                    verified_json, created_at, updated_at, version
             FROM user_skills WHERE user_id=?1 AND skill_tree_name=?2",
        )?;
        let mut rows = stmt.query_map(params![user_id, skill_tree_name], |row| {
            Ok(UserRow {
                user_id: row.get(0)?,
                skill_tree_name: row.get(1)?,
                completed_json: row.get(2)?,
                in_progress_json: row.get(3)?,
                verified_json: row.get(4)?,
                created_at: row.get(5)?,
                updated_at: row.get(6)?,
                version: row.get(7)?,
            })
        })?;
        rows.next().transpose()?.map(user_from_row).transpose()
    }

    pub fn load_users(&self) -> Result<Vec<UserSkillRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id, skill_tree_name, completed_json, in_progress_json,
                    verified_json, created_at, updated_at, version
             FROM user_skills ORDER BY user_id, skill_tree_name",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(UserRow {
                user_id: row.get(0)?,
                skill_tree_name: row.get(1)?,
                completed_json: row.get(2)?,
                in_progress_json: row.get(3)?,
                verified_json: row.get(4)?,
                created_at: row.get(5)?,
                updated_at: row.get(6)?,
                version: row.get(7)?,
            })
        })?;
        let mut records = Vec::new();
        for row in rows {
            records.push(user_from_row(row?)?);
        }
        Ok(records)
    }

    /// Insert or update one record with the same version discipline as
    /// [`Database::save_concept`]. An import (which resets the version) goes
    /// through [`Database::replace_user`] instead.
    pub fn save_user(&self, record: &UserSkillRecord) -> Result<()> {
        let completed_json = serde_json::to_string(&record.completed)?;
        let in_progress_json = serde_json::to_string(&record.in_progress)?;
        let verified_json = serde_json::to_string(&record.verified)?;

        if record.version > 1 {
            let version = version_to_db(record.version)?;
            let expected = version_to_db(record.version - 1)?;
            let updated = self.conn.execute(
                "UPDATE user_skills
                 SET completed_json=?3, in_progress_json=?4, verified_json=?5,
                     updated_at=?6, version=?7
                 WHERE user_id=?1 AND skill_tree_name=?2 AND version=?8",
                params![
                    record.user_id,
                    record.skill_tree_name,
                    completed_json,
                    in_progress_json,
                    verified_json,
                    record.updated_at.to_rfc3339(),
                    version,
                    expected,
                ],
            )?;
            if updated == 0 {
                return Err(CtError::VersionConflict(format!(
                    "user record {}/{} was modified by another writer",
                    record.user_id, record.skill_tree_name
                )));
            }
            return Ok(());
        }

        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO user_skills
                 (user_id, skill_tree_name, completed_json, in_progress_json,
                  verified_json, created_at, updated_at, version)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.user_id,
                record.skill_tree_name,
                completed_json,
                in_progress_json,
                verified_json,
                record.created_at.to_rfc3339(),
                record.updated_at.to_rfc3339(),
                version_to_db(record.version)?,
            ],
        )?;
        if inserted == 0 {
            return Err(CtError::VersionConflict(format!(
                "user record {}/{} was created by another writer",
                record.user_id, record.skill_tree_name
            )));
        }
        Ok(())
    }

    /// Unconditional upsert, used when an import supersedes the record.
    pub fn replace_user(&self, record: &UserSkillRecord) -> Result<()> {
        self.conn.execute(
            "INSERT INTO user_skills
                 (user_id, skill_tree_name, completed_json, in_progress_json,
                  verified_json, created_at, updated_at, version)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(user_id, skill_tree_name) DO UPDATE SET
                 completed_json=excluded.completed_json,
                 in_progress_json=excluded.in_progress_json,
                 verified_json=excluded.verified_json,
                 updated_at=excluded.updated_at,
                 version=excluded.version",
            params![
                record.user_id,
                record.skill_tree_name,
                serde_json::to_string(&record.completed)?,
                serde_json::to_string(&record.in_progress)?,
                serde_json::to_string(&record.verified)?,
                record.created_at.to_rfc3339(),
                record.updated_at.to_rfc3339(),
                version_to_db(record.version)?,
            ],
        )?;
        Ok(())
    }
}

fn version_to_db(version: u64) -> Result<i64> {
    i64::try_from(version)
        .map_err(|_| CtError::Validation(format!("version {version} exceeds storage range")))
}

fn version_from_db(raw: i64) -> Result<u64> {
    u64::try_from(raw)
        .map_err(|_| CtError::Validation(format!("corrupt version {raw} in storage")))
}

fn parse_timestamp(raw: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| CtError::Validation(format!("corrupt {field} timestamp in storage: {err}")))
}

fn concept_from_row(row: ConceptRow) -> Result<Concept> {
    let prerequisites: BTreeSet<ConceptId> = serde_json::from_str(&row.prerequisites_json)?;
    Ok(Concept {
        id: row.id,
        title: row.title,
        description: row.description,
        category: row.category,
        difficulty: row.difficulty,
        prerequisites,
        archived: row.archived,
        created_at: parse_timestamp(&row.created_at, "created_at")?,
        updated_at: parse_timestamp(&row.updated_at, "updated_at")?,
        version: version_from_db(row.version)?,
    })
}

fn user_from_row(row: UserRow) -> Result<UserSkillRecord> {
    let completed: BTreeSet<ConceptId> = serde_json::from_str(&row.completed_json)?;
    let in_progress: BTreeSet<ConceptId> = serde_json::from_str(&row.in_progress_json)?;
    let verified: BTreeMap<ConceptId, String> = serde_json::from_str(&row.verified_json)?;
    Ok(UserSkillRecord {
        user_id: row.user_id,
        skill_tree_name: row.skill_tree_name,
        completed,
        in_progress,
        verified,
        created_at: parse_timestamp(&row.created_at, "created_at")?,
        updated_at: parse_timestamp(&row.updated_at, "updated_at")?,
        version: version_from_db(row.version)?,
    })
}
