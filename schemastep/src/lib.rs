#![cfg_attr(docsrs, feature(doc_cfg))]
//! `schemastep` moves a SQL database between numbered schema versions using
//! plain SQL scripts kept in a folder.
//!
//! A migrations folder looks like this:
//!
//! ```text
//! base.sql                    schema for version 0
//! migrations/up/1.sql         version 0 -> 1
//! migrations/up/2-dev.sql     version 1 -> 2 (dev variant)
//! migrations/down/1.sql       version 2 -> 1
//! migrations/down/0.sql       version 1 -> 0
//! ```
//!
//! Up scripts are named after the version they produce, and so are down
//! scripts: `down/0.sql` undoes migration 1. The version is the integer a
//! file name starts with, so `0003.sql` is version 3 but `13.sql` is not.
//!
//! # Crash safety
//!
//! The database holds a single `(version, status)` record. Before each script
//! runs the record is set to `partial up` or `partial down`, and only after it
//! succeeds is it set to `complete`. An interrupted run therefore leaves a
//! partial status behind, and later runs refuse to start until the operator
//! fixes things and passes `force`.
//!
//! # Example
//!
//! ```
//! # #[cfg(not(feature = "sqlite"))]
//! # fn main() {}
//! # #[cfg(feature = "sqlite")]
//! # fn main() {
//! use schemastep::registry::Registry;
//! use schemastep::{BackendOptions, MigrationTarget, Migrator};
//! # let dir = tempfile::tempdir().unwrap();
//! # std::fs::create_dir_all(dir.path().join("migrations/up")).unwrap();
//! # std::fs::write(dir.path().join("base.sql"), "CREATE TABLE users (id INTEGER);").unwrap();
//! # std::fs::write(dir.path().join("migrations/up/1.sql"), "ALTER TABLE users ADD COLUMN name TEXT;").unwrap();
//! # let folder = dir.path();
//!
//! let backend = Registry::with_defaults()
//!     .connect("sqlite::memory:", &BackendOptions::default())
//!     .unwrap();
//! let mut migrator = Migrator::new(backend, MigrationTarget::new(folder).unwrap());
//!
//! migrator.reset(None).unwrap();
//! let report = migrator.up(None, false).unwrap();
//! assert!(report.migrations_run.is_empty());
//! # }
//! ```
//!
//! # Features
//!
//! - `sqlite` (default): the [`sqlite`] backend.
//! - `postgres`: the [`postgres`] backend.
//! - `mysql`: the [`mysql`] backend.
//! - `tracing`: spans and events for every run and step.
//! - `testing`: [`testing::RecordingBackend`] and [`testing::MigrationFolder`] for downstream tests.

mod core;
pub use core::{parse_version, Direction, MigrationReport, Phase, Status, VersionRecord};

mod error;
pub use error::Error;

pub mod resolver;
pub use resolver::{resolve, MigrationScript, MigrationTarget};

pub mod store;
pub use store::{Backend, BackendOptions, SqlExecutor, VersionStore};

mod migrator;
pub use migrator::Migrator;

pub mod registry;

#[cfg(feature = "sqlite")]
#[cfg_attr(docsrs, doc(cfg(feature = "sqlite")))]
pub mod sqlite;

#[cfg(feature = "postgres")]
#[cfg_attr(docsrs, doc(cfg(feature = "postgres")))]
pub mod postgres;

#[cfg(feature = "mysql")]
#[cfg_attr(docsrs, doc(cfg(feature = "mysql")))]
pub mod mysql;

#[cfg(any(test, feature = "testing"))]
#[cfg_attr(docsrs, doc(cfg(feature = "testing")))]
pub mod testing;

#[cfg(all(test, feature = "mysql"))]
pub(crate) mod test_mysql;

#[cfg(all(test, feature = "postgres"))]
pub(crate) mod test_postgres;
