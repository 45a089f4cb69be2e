//! The seams between the migration engine and a concrete database.

use crate::core::{Status, VersionRecord, DEFAULT_VERSION_TABLE_NAME};
use crate::error::Error;
use std::time::Duration;

/// Runs SQL and manages the database object itself.
pub trait SqlExecutor {
    /// Execute a whole script as one batch. Scripts may contain several statements.
    fn execute_sql(&mut self, sql: &str) -> Result<(), Error>;

    /// Drop the target database and everything in it.
    fn drop_database(&mut self) -> Result<(), Error>;

    /// Create the target database and make it the active one for later calls.
    fn create_database(&mut self) -> Result<(), Error>;
}

/// Persists the single `(version, status)` record.
///
/// Implementations hold no business logic: the engine orders the calls so that
/// a crash between two of them is visible as a status other than `complete`.
pub trait VersionStore {
    /// Create the version table if it does not already exist.
    fn create_version_table(&mut self) -> Result<(), Error>;

    /// Read the record. Fails with [`Error::UninitializedDatabase`] when the
    /// table or its row is missing.
    fn get_version(&mut self) -> Result<VersionRecord, Error>;

    /// Overwrite the record unconditionally.
    fn set_version(&mut self, version: u32, status: Status) -> Result<(), Error>;
}

/// Everything the engine needs from a database.
pub trait Backend: SqlExecutor + VersionStore {}

impl<T: SqlExecutor + VersionStore + ?Sized> Backend for T {}

impl<T: SqlExecutor + ?Sized> SqlExecutor for Box<T> {
    fn execute_sql(&mut self, sql: &str) -> Result<(), Error> {
        (**self).execute_sql(sql)
    }

    fn drop_database(&mut self) -> Result<(), Error> {
        (**self).drop_database()
    }

    fn create_database(&mut self) -> Result<(), Error> {
        (**self).create_database()
    }
}

impl<T: VersionStore + ?Sized> VersionStore for Box<T> {
    fn create_version_table(&mut self) -> Result<(), Error> {
        (**self).create_version_table()
    }

    fn get_version(&mut self) -> Result<VersionRecord, Error> {
        (**self).get_version()
    }

    fn set_version(&mut self, version: u32, status: Status) -> Result<(), Error> {
        (**self).set_version(version, status)
    }
}

/// Settings shared by the built-in backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendOptions {
    /// Name of the table holding the version record. Defaults to `_schemastep_version_`.
    pub version_table: String,
    /// How long SQLite waits on a locked database before failing. Defaults to 30 seconds.
    pub busy_timeout: Duration,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            version_table: DEFAULT_VERSION_TABLE_NAME.to_string(),
            busy_timeout: Duration::from_secs(30),
        }
    }
}

impl BackendOptions {
    pub fn with_version_table(mut self, name: impl Into<String>) -> Self {
        self.version_table = name.into();
        self
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Reject table names that can't be spliced into SQL unquoted.
    pub(crate) fn validated_table(&self) -> Result<&str, Error> {
        let name = self.version_table.as_str();
        let valid = !name.is_empty()
            && !name.starts_with(|c: char| c.is_ascii_digit())
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if valid {
            Ok(name)
        } else {
            Err(Error::Configuration(format!(
                "version table name '{}' must be a plain identifier",
                name
            )))
        }
    }
}
