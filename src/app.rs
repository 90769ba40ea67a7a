//! Application context shared by CLI commands.

use std::fs::OpenOptions;
use std::path::PathBuf;

use chrono::Utc;
use fs2::FileExt;
use tracing::debug;

use crate::cli::Cli;
use crate::config::Config;
use crate::core::progress::UserSkillRecord;
use crate::error::{CtError, Result};
use crate::graph::store::ConceptGraphStore;
use crate::storage::Database;

/// Everything a command needs: resolved config plus an open database.
#[derive(Debug)]
pub struct AppContext {
    pub config: Config,
    pub db: Database,
    db_path: PathBuf,
}

impl AppContext {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let config = Config::load(cli.config.as_deref())?;
        let db_path = config.db_path();
        debug!(db_path = %db_path.display(), "opening database");
        let db = Database::open(&db_path)?;
        Ok(Self {
            config,
            db,
            db_path,
        })
    }

    #[must_use]
    pub fn db_path(&self) -> &std::path::Path {
        &self.db_path
    }

    /// Build the in-memory graph store from the persisted concept set.
    pub fn load_graph(&self) -> Result<ConceptGraphStore> {
        ConceptGraphStore::from_concepts(self.db.load_concepts()?)
    }

    /// The skill tree name to operate on: CLI flag wins over config default.
    #[must_use]
    pub fn tree_name(&self, cli_tree: Option<&str>) -> String {
        cli_tree.map_or_else(|| self.config.tree.default_name.clone(), ToString::to_string)
    }

    /// Load the user's record, creating it lazily on first interaction.
    pub fn load_record(&self, user_id: &str, tree: &str) -> Result<UserSkillRecord> {
        if let Some(record) = self.db.load_user(user_id, tree)? {
            return Ok(record);
        }
        let record = UserSkillRecord::new(user_id, tree, Utc::now());
        self.db.save_user(&record)?;
        Ok(record)
    }

    /// Exclusive advisory lock guarding import against concurrent writers
    /// from other processes. Held for the duration of validation and apply.
    pub fn import_lock(&self) -> Result<ImportLock> {
        let path = self.db_path.with_extension("import.lock");
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;
        file.try_lock_exclusive().map_err(|err| {
            CtError::LockFailed(format!("another import is running ({err})"))
        })?;
        Ok(ImportLock { file })
    }
}

/// Held lock token; the advisory lock is released on drop.
#[derive(Debug)]
pub struct ImportLock {
    file: std::fs::File,
}

impl Drop for ImportLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
    }
}
