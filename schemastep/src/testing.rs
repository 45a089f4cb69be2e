//! Testing utilities for migration folders and engine behaviour.
//!
//! [`MigrationFolder`] builds a throwaway migrations folder on disk and
//! [`RecordingBackend`] stands in for a database, remembering every write in
//! order so tests can assert on the exact call sequence.
//!
//! # Example
//!
//! ```
//! # #[cfg(not(feature = "testing"))]
//! # fn main() {}
//! # #[cfg(feature = "testing")]
//! # fn main() {
//! use schemastep::testing::{Call, MigrationFolder, RecordingBackend};
//! use schemastep::{Migrator, Status};
//!
//! let folder = MigrationFolder::new()
//!     .base("CREATE TABLE users (id INTEGER);")
//!     .up(1, "ALTER TABLE users ADD COLUMN name TEXT;");
//!
//! let mut migrator = Migrator::new(RecordingBackend::new(), folder.target());
//! migrator.reset(None).unwrap();
//!
//! assert_eq!(migrator.backend().calls().last(), Some(&Call::SetVersion(1, Status::Complete)));
//! # }
//! ```

use crate::core::{Status, VersionRecord, DEFAULT_VERSION_TABLE_NAME};
use crate::error::Error;
use crate::resolver::{MigrationTarget, BASE_SCRIPT};
use crate::store::{SqlExecutor, VersionStore};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A write observed by [`RecordingBackend`]. Reads are not recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    DropDatabase,
    CreateDatabase,
    CreateVersionTable,
    ExecuteSql(String),
    SetVersion(u32, Status),
}

/// An in-memory backend that records calls instead of talking to a database.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    table_exists: bool,
    record: Option<VersionRecord>,
    calls: Vec<Call>,
    fail_on: Option<String>,
}

impl RecordingBackend {
    /// A backend with no version table, like a freshly created database.
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose version record already holds `(version, status)`.
    pub fn at(version: u32, status: Status) -> Self {
        Self {
            table_exists: true,
            record: Some(VersionRecord::new(version, status)),
            ..Self::default()
        }
    }

    /// Make `execute_sql` fail for any script containing `needle`.
    pub fn fail_on(mut self, needle: impl Into<String>) -> Self {
        self.fail_on = Some(needle.into());
        self
    }

    pub fn clear_failure(&mut self) {
        self.fail_on = None;
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Scripts executed so far, in order.
    pub fn executed_sql(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::ExecuteSql(sql) => Some(sql.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl SqlExecutor for RecordingBackend {
    fn execute_sql(&mut self, sql: &str) -> Result<(), Error> {
        self.calls.push(Call::ExecuteSql(sql.to_string()));
        match self.fail_on {
            Some(ref needle) if sql.contains(needle.as_str()) => Err(Error::Generic(format!(
                "simulated failure executing script containing '{}'",
                needle
            ))),
            _ => Ok(()),
        }
    }

    fn drop_database(&mut self) -> Result<(), Error> {
        self.calls.push(Call::DropDatabase);
        self.table_exists = false;
        self.record = None;
        Ok(())
    }

    fn create_database(&mut self) -> Result<(), Error> {
        self.calls.push(Call::CreateDatabase);
        Ok(())
    }
}

impl VersionStore for RecordingBackend {
    fn create_version_table(&mut self) -> Result<(), Error> {
        self.calls.push(Call::CreateVersionTable);
        self.table_exists = true;
        Ok(())
    }

    fn get_version(&mut self) -> Result<VersionRecord, Error> {
        match self.record {
            Some(record) if self.table_exists => Ok(record),
            _ => Err(Error::UninitializedDatabase(
                DEFAULT_VERSION_TABLE_NAME.to_string(),
            )),
        }
    }

    fn set_version(&mut self, version: u32, status: Status) -> Result<(), Error> {
        if !self.table_exists {
            return Err(Error::UninitializedDatabase(
                DEFAULT_VERSION_TABLE_NAME.to_string(),
            ));
        }
        self.calls.push(Call::SetVersion(version, status));
        self.record = Some(VersionRecord::new(version, status));
        Ok(())
    }
}

/// A migrations folder on disk, removed when dropped if it was created in a temp dir.
///
/// Starts with an empty `base.sql` and empty `migrations/up` and `migrations/down`.
#[derive(Debug)]
pub struct MigrationFolder {
    root: PathBuf,
    _temp: Option<TempDir>,
}

impl MigrationFolder {
    pub fn new() -> Self {
        let temp = tempfile::tempdir().expect("failed to create temp migrations folder");
        let root = temp.path().to_path_buf();
        Self::init(root, Some(temp))
    }

    /// Build the folder at `root` instead of a fresh temp dir. `root` is not cleaned up.
    pub fn in_dir(root: impl Into<PathBuf>) -> Self {
        Self::init(root.into(), None)
    }

    fn init(root: PathBuf, temp: Option<TempDir>) -> Self {
        for dir in ["migrations/up", "migrations/down"] {
            fs::create_dir_all(root.join(dir)).expect("failed to create migrations folder");
        }
        fs::write(root.join(BASE_SCRIPT), "").expect("failed to write base.sql");
        Self { root, _temp: temp }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn target(&self) -> MigrationTarget {
        MigrationTarget::new(&self.root).expect("fixture folder always has base.sql")
    }

    pub fn base(self, sql: &str) -> Self {
        self.raw(BASE_SCRIPT, sql)
    }

    pub fn up(self, version: u32, sql: &str) -> Self {
        self.raw(&format!("migrations/up/{}.sql", version), sql)
    }

    pub fn up_dev(self, version: u32, sql: &str) -> Self {
        self.raw(&format!("migrations/up/{}-dev.sql", version), sql)
    }

    pub fn down(self, version: u32, sql: &str) -> Self {
        self.raw(&format!("migrations/down/{}.sql", version), sql)
    }

    pub fn down_dev(self, version: u32, sql: &str) -> Self {
        self.raw(&format!("migrations/down/{}-dev.sql", version), sql)
    }

    /// Write `contents` at `relative_path` inside the folder.
    pub fn raw(self, relative_path: &str, contents: &str) -> Self {
        let path = self.root.join(relative_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("failed to create fixture directory");
        }
        fs::write(&path, contents).expect("failed to write fixture file");
        self
    }
}

impl Default for MigrationFolder {
    fn default() -> Self {
        Self::new()
    }
}
