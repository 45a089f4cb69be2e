//!
//! # SQLite backend
//!
//! Runs migrations over a [`rusqlite::Connection`]. The "database" is the
//! file (or in-memory database) the connection has open: dropping it removes
//! every user table and view while keeping the connection alive, and creating
//! it is a no-op.
//!
//! Connection URLs:
//!
//! | URL | Database |
//! |-----|----------|
//! | `sqlite:///var/lib/app.db` | absolute path |
//! | `sqlite://data/app.db` | path relative to the working directory |
//! | `sqlite::memory:` | private in-memory database |
//!
//! ## Example
//!
//! ```
//! use schemastep::sqlite::SqliteBackend;
//! use schemastep::{BackendOptions, Migrator, MigrationTarget, Status, VersionRecord};
//! # let dir = tempfile::tempdir().unwrap();
//! # std::fs::create_dir_all(dir.path().join("migrations/up")).unwrap();
//! # std::fs::write(dir.path().join("base.sql"), "CREATE TABLE users (id INTEGER PRIMARY KEY);").unwrap();
//! # std::fs::write(dir.path().join("migrations/up/1.sql"), "ALTER TABLE users ADD COLUMN name TEXT;").unwrap();
//!
//! let backend = SqliteBackend::open_in_memory(BackendOptions::default()).unwrap();
//! let target = MigrationTarget::new(dir.path()).unwrap();
//! let mut migrator = Migrator::new(backend, target);
//!
//! let report = migrator.reset(None).unwrap();
//! assert_eq!(report.migrations_run, vec![1]);
//! assert_eq!(migrator.get_current_version().unwrap(), VersionRecord::complete(1));
//! ```

use crate::core::{Status, VersionRecord};
use crate::error::Error;
use crate::store::{Backend, BackendOptions, SqlExecutor, VersionStore};
use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

/// A [`Backend`] over one SQLite connection.
#[derive(Debug)]
pub struct SqliteBackend {
    conn: Connection,
    options: BackendOptions,
}

impl SqliteBackend {
    /// Wrap an open connection. Applies the configured busy timeout so
    /// concurrent writers wait instead of failing immediately.
    pub fn new(conn: Connection, options: BackendOptions) -> Result<Self, Error> {
        options.validated_table()?;
        conn.busy_timeout(options.busy_timeout)?;
        Ok(Self { conn, options })
    }

    pub fn open(path: impl AsRef<Path>, options: BackendOptions) -> Result<Self, Error> {
        Self::new(Connection::open(path)?, options)
    }

    pub fn open_in_memory(options: BackendOptions) -> Result<Self, Error> {
        Self::new(Connection::open_in_memory()?, options)
    }

    /// Open the database named by a `sqlite:` URL.
    pub fn connect(url: &Url, options: &BackendOptions) -> Result<Self, Error> {
        match database_location(url)? {
            Location::Memory => Self::open_in_memory(options.clone()),
            Location::File(path) => Self::open(path, options.clone()),
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    pub fn into_connection(self) -> Connection {
        self.conn
    }

    fn version_table_exists(&self) -> Result<bool, Error> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name=?1")?;
        let exists = stmt.query([&self.options.version_table])?.next()?.is_some();
        Ok(exists)
    }
}

impl SqlExecutor for SqliteBackend {
    fn execute_sql(&mut self, sql: &str) -> Result<(), Error> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    fn drop_database(&mut self) -> Result<(), Error> {
        let objects: Vec<(String, String)> = {
            let mut stmt = self.conn.prepare(
                "SELECT type, name FROM sqlite_master \
                 WHERE type IN ('table', 'view') AND substr(name, 1, 7) <> 'sqlite_' \
                 ORDER BY type = 'view' DESC",
            )?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        let foreign_keys: bool = self
            .conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))?;
        self.conn.execute_batch("PRAGMA foreign_keys = OFF")?;

        for (kind, name) in &objects {
            let kind = if kind == "view" { "VIEW" } else { "TABLE" };
            self.conn.execute_batch(&format!(
                "DROP {} IF EXISTS \"{}\"",
                kind,
                name.replace('"', "\"\"")
            ))?;
        }

        if foreign_keys {
            self.conn.execute_batch("PRAGMA foreign_keys = ON")?;
        }
        Ok(())
    }

    fn create_database(&mut self) -> Result<(), Error> {
        // the open connection already is the database
        Ok(())
    }
}

impl VersionStore for SqliteBackend {
    fn create_version_table(&mut self) -> Result<(), Error> {
        let table = self.options.validated_table()?;
        self.conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {} (id integer primary key check (id = 1), version integer not null, status text not null)",
                table
            ),
            [],
        )?;
        Ok(())
    }

    fn get_version(&mut self) -> Result<VersionRecord, Error> {
        if !self.version_table_exists()? {
            return Err(Error::UninitializedDatabase(
                self.options.version_table.clone(),
            ));
        }
        let table = self.options.validated_table()?;
        let row: Option<(i64, String)> = self
            .conn
            .query_row(
                &format!("SELECT version, status FROM {} WHERE id = 1", table),
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let (version, status) =
            row.ok_or_else(|| Error::UninitializedDatabase(table.to_string()))?;
        let version = u32::try_from(version).map_err(|_| {
            Error::InvalidVersion(format!("stored version {} is out of range", version))
        })?;
        Ok(VersionRecord::new(version, status.parse()?))
    }

    fn set_version(&mut self, version: u32, status: Status) -> Result<(), Error> {
        if !self.version_table_exists()? {
            return Err(Error::UninitializedDatabase(
                self.options.version_table.clone(),
            ));
        }
        let table = self.options.validated_table()?;
        self.conn.execute(
            &format!(
                "INSERT INTO {} (id, version, status) VALUES (1, ?1, ?2) \
                 ON CONFLICT(id) DO UPDATE SET version = excluded.version, status = excluded.status",
                table
            ),
            params![version, status.as_str()],
        )?;
        Ok(())
    }
}

enum Location {
    Memory,
    File(PathBuf),
}

fn database_location(url: &Url) -> Result<Location, Error> {
    if url.cannot_be_a_base() {
        return match url.path() {
            "" => Err(Error::Configuration(format!(
                "sqlite url '{}' names no database",
                url
            ))),
            ":memory:" => Ok(Location::Memory),
            path => Ok(Location::File(PathBuf::from(path))),
        };
    }
    let path = match url.host_str() {
        Some(host) if !host.is_empty() => format!("{}{}", host, url.path()),
        _ => url.path().to_string(),
    };
    if path.is_empty() || path == "/" {
        return Err(Error::Configuration(format!(
            "sqlite url '{}' names no database",
            url
        )));
    }
    Ok(Location::File(PathBuf::from(path)))
}

/// Create the database file and its parent directories if they are missing.
pub fn prepare_environment(url: &Url) -> Result<(), Error> {
    match database_location(url)? {
        Location::Memory => Ok(()),
        Location::File(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            Connection::open(&path)?;
            Ok(())
        }
    }
}

pub(crate) fn connect_backend(
    url: &Url,
    options: &BackendOptions,
) -> Result<Box<dyn Backend>, Error> {
    Ok(Box::new(SqliteBackend::connect(url, options)?))
}
