//!
//! # MySQL backend
//!
//! Runs migrations over a blocking [`mysql::Conn`].
//!
//! MySQL commits implicitly around every DDL statement, so a script that fails
//! halfway leaves its earlier statements applied. The version record will say
//! `partial up` (or `partial down`) in that case, and the operator must repair
//! the schema by hand before forcing the run past it.
//!
//! Scripts are sent as one multi-statement text query.

use crate::core::{Status, VersionRecord};
use crate::error::Error;
use crate::store::{Backend, BackendOptions, SqlExecutor, VersionStore};
use mysql::prelude::*;
use mysql::{Conn, Opts, OptsBuilder};
use url::Url;

pub use mysql::Conn as MysqlConn;

/// A [`Backend`] over one MySQL schema.
pub struct MysqlBackend {
    conn: Conn,
    database: String,
    options: BackendOptions,
}

impl std::fmt::Debug for MysqlBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MysqlBackend")
            .field("database", &self.database)
            .field("options", &self.options)
            .finish()
    }
}

impl MysqlBackend {
    /// Connect to the schema named by a `mysql://` URL.
    pub fn connect(url: &Url, options: &BackendOptions) -> Result<Self, Error> {
        options.validated_table()?;
        let (opts, database) = parse_opts(url)?;
        let conn = Conn::new(opts)?;
        Ok(Self {
            conn,
            database,
            options: options.clone(),
        })
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn conn_mut(&mut self) -> &mut Conn {
        &mut self.conn
    }

    fn version_table_exists(&mut self) -> Result<bool, Error> {
        let count: Option<i64> = self.conn.exec_first(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = DATABASE() AND table_name = ?",
            (self.options.version_table.as_str(),),
        )?;
        Ok(count.unwrap_or(0) > 0)
    }
}

impl SqlExecutor for MysqlBackend {
    fn execute_sql(&mut self, sql: &str) -> Result<(), Error> {
        self.conn.query_drop(sql)?;
        Ok(())
    }

    fn drop_database(&mut self) -> Result<(), Error> {
        self.conn.query_drop(format!(
            "DROP DATABASE IF EXISTS {}",
            quote_ident(&self.database)
        ))?;
        Ok(())
    }

    fn create_database(&mut self) -> Result<(), Error> {
        let name = quote_ident(&self.database);
        self.conn.query_drop(format!("CREATE DATABASE {}", name))?;
        self.conn.query_drop(format!("USE {}", name))?;
        Ok(())
    }
}

impl VersionStore for MysqlBackend {
    fn create_version_table(&mut self) -> Result<(), Error> {
        let table = self.options.validated_table()?.to_string();
        self.conn.query_drop(format!(
            "CREATE TABLE IF NOT EXISTS {} (id INT PRIMARY KEY CHECK (id = 1), version BIGINT NOT NULL, status VARCHAR(32) NOT NULL)",
            table
        ))?;
        Ok(())
    }

    fn get_version(&mut self) -> Result<VersionRecord, Error> {
        let table = self.options.validated_table()?.to_string();
        if !self.version_table_exists()? {
            return Err(Error::UninitializedDatabase(table));
        }
        let row: Option<(i64, String)> = self
            .conn
            .query_first(format!("SELECT version, status FROM {} WHERE id = 1", table))?;
        let (version, status) = row.ok_or_else(|| Error::UninitializedDatabase(table.clone()))?;
        let version = u32::try_from(version).map_err(|_| {
            Error::InvalidVersion(format!("stored version {} is out of range", version))
        })?;
        Ok(VersionRecord::new(version, status.parse()?))
    }

    fn set_version(&mut self, version: u32, status: Status) -> Result<(), Error> {
        let table = self.options.validated_table()?.to_string();
        if !self.version_table_exists()? {
            return Err(Error::UninitializedDatabase(table));
        }
        self.conn.exec_drop(
            format!(
                "INSERT INTO {} (id, version, status) VALUES (1, ?, ?) \
                 ON DUPLICATE KEY UPDATE version = VALUES(version), status = VALUES(status)",
                table
            ),
            (i64::from(version), status.as_str()),
        )?;
        Ok(())
    }
}

fn parse_opts(url: &Url) -> Result<(Opts, String), Error> {
    let opts = Opts::from_url(url.as_str())?;
    let database = opts
        .get_db_name()
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .ok_or_else(|| Error::Configuration(format!("mysql url for host '{}' names no database", opts.get_ip_or_hostname())))?;
    Ok((opts, database))
}

fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Create the schema named in `url` if the server does not have it yet.
pub fn prepare_environment(url: &Url) -> Result<(), Error> {
    let (opts, database) = parse_opts(url)?;
    let server_opts = OptsBuilder::from_opts(opts).db_name(None::<String>);
    let mut conn = Conn::new(server_opts)?;
    conn.query_drop(format!(
        "CREATE DATABASE IF NOT EXISTS {}",
        quote_ident(&database)
    ))?;
    Ok(())
}

pub(crate) fn connect_backend(
    url: &Url,
    options: &BackendOptions,
) -> Result<Box<dyn Backend>, Error> {
    Ok(Box::new(MysqlBackend::connect(url, options)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Direction;
    use crate::test_mysql::{fresh_database_url, unused_database_url};
    use crate::testing::MigrationFolder;
    use crate::Migrator;

    fn backend() -> MysqlBackend {
        let url = Url::parse(&fresh_database_url()).unwrap();
        MysqlBackend::connect(&url, &BackendOptions::default()).unwrap()
    }

    fn table_names(backend: &mut MysqlBackend) -> Vec<String> {
        backend
            .conn_mut()
            .query(
                "SELECT CAST(table_name AS CHAR) FROM information_schema.tables WHERE table_schema = DATABASE() ORDER BY table_name",
            )
            .unwrap()
    }

    #[test]
    fn version_record_round_trips() {
        let mut backend = backend();
        assert!(matches!(
            backend.get_version(),
            Err(Error::UninitializedDatabase(_))
        ));
        backend.create_version_table().unwrap();
        backend.set_version(5, Status::Partial(Direction::Down)).unwrap();
        assert_eq!(
            backend.get_version().unwrap(),
            VersionRecord::new(5, Status::Partial(Direction::Down))
        );
        backend.set_version(4, Status::Complete).unwrap();
        assert_eq!(backend.get_version().unwrap(), VersionRecord::complete(4));
    }

    #[test]
    fn reset_then_step_down() {
        let folder = MigrationFolder::new()
            .base("CREATE TABLE users (id INT PRIMARY KEY AUTO_INCREMENT);")
            .up(1, "CREATE TABLE posts (id INT PRIMARY KEY);\nCREATE TABLE tags (id INT PRIMARY KEY);")
            .down(0, "DROP TABLE tags;\nDROP TABLE posts;");

        let mut backend = backend();
        backend.execute_sql("CREATE TABLE leftover (id INT);").unwrap();

        let mut migrator = Migrator::new(backend, folder.target());
        migrator.reset(None).unwrap();
        assert_eq!(
            table_names(migrator.backend_mut()),
            vec!["_schemastep_version_", "posts", "tags", "users"]
        );

        let report = migrator.down(0, false).unwrap();
        assert_eq!(report.migrations_run, vec![0]);
        assert_eq!(
            table_names(migrator.backend_mut()),
            vec!["_schemastep_version_", "users"]
        );
    }

    #[test]
    fn half_applied_script_stays_partial() {
        let folder = MigrationFolder::new()
            .base("CREATE TABLE users (id INT PRIMARY KEY);")
            .up(1, "CREATE TABLE posts (id INT PRIMARY KEY);\nALTER TABLE missing ADD COLUMN x INT;");

        let mut migrator = Migrator::new(backend(), folder.target());
        assert!(matches!(migrator.reset(None), Err(Error::Mysql(_))));
        assert_eq!(
            migrator.get_current_version().unwrap(),
            VersionRecord::new(1, Status::Partial(Direction::Up))
        );
        // DDL before the failure was committed
        assert!(table_names(migrator.backend_mut()).contains(&"posts".to_string()));
    }

    #[test]
    fn prepare_environment_creates_missing_schema() {
        let url = Url::parse(&unused_database_url()).unwrap();
        prepare_environment(&url).unwrap();
        prepare_environment(&url).unwrap();
        let mut backend = MysqlBackend::connect(&url, &BackendOptions::default()).unwrap();
        backend.create_version_table().unwrap();
    }
}
