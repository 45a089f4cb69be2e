use crate::core::{Direction, Status};
use std::path::PathBuf;

/// Error type for the schemastep crate.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The migrations folder or runner configuration is unusable.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// A version argument or a script filename prefix is not a non-negative integer.
    #[error("invalid version: {0}")]
    InvalidVersion(String),
    /// More than one script claims the same version in one direction.
    #[error(
        "ambiguous {direction} migration for version {version}: {} files match ({})",
        .candidates.len(),
        display_paths(.candidates)
    )]
    AmbiguousVersion {
        version: u32,
        direction: Direction,
        candidates: Vec<PathBuf>,
    },
    /// A previous run was interrupted and `force` was not given.
    #[error(
        "database is at version {version} with status '{status}'. \
        A previous migration did not finish; re-run with force to continue past it"
    )]
    IncompleteDatabase { version: u32, status: Status },
    /// The version table (or its row) does not exist yet.
    #[error("database has no version record in table '{0}'; run reset or create-version first")]
    UninitializedDatabase(String),
    /// The version table holds a status string this crate does not write.
    #[error("unrecognized migration status '{0}'")]
    InvalidStatus(String),
    /// No backend is registered for a connection URL scheme.
    #[error("no backend registered for scheme '{0}'")]
    UnsupportedScheme(String),
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "sqlite")]
    #[error("{0}")]
    Rusqlite(rusqlite::Error),
    #[cfg(feature = "mysql")]
    #[error("{0}")]
    Mysql(String),
    #[cfg(feature = "postgres")]
    #[error("{0}")]
    Postgres(#[from] postgres::Error),
    #[error("{0}")]
    Generic(String),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl Error {
    /// True for the errors an operator fixes by editing the migrations folder.
    pub fn is_folder_error(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::InvalidVersion(_) | Self::AmbiguousVersion { .. }
        )
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        Self::Rusqlite(value)
    }
}

#[cfg(feature = "mysql")]
impl From<mysql::Error> for Error {
    fn from(value: mysql::Error) -> Self {
        Self::Mysql(value.to_string())
    }
}

#[cfg(feature = "mysql")]
impl From<mysql::UrlError> for Error {
    fn from(value: mysql::UrlError) -> Self {
        Self::Configuration(value.to_string())
    }
}

impl From<glob::PatternError> for Error {
    fn from(value: glob::PatternError) -> Self {
        Self::Configuration(format!("invalid migration search pattern: {}", value))
    }
}

impl From<glob::GlobError> for Error {
    fn from(value: glob::GlobError) -> Self {
        Self::Io(value.into())
    }
}

impl From<url::ParseError> for Error {
    fn from(value: url::ParseError) -> Self {
        Self::Configuration(format!("invalid database url: {}", value))
    }
}

impl From<String> for Error {
    fn from(value: String) -> Self {
        Self::Generic(value)
    }
}

// Manual PartialEq implementation because io and driver errors don't implement PartialEq
impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Configuration(a), Self::Configuration(b)) => a == b,
            (Self::InvalidVersion(a), Self::InvalidVersion(b)) => a == b,
            (
                Self::AmbiguousVersion {
                    version: va,
                    direction: da,
                    candidates: ca,
                },
                Self::AmbiguousVersion {
                    version: vb,
                    direction: db,
                    candidates: cb,
                },
            ) => va == vb && da == db && ca == cb,
            (
                Self::IncompleteDatabase {
                    version: va,
                    status: sa,
                },
                Self::IncompleteDatabase {
                    version: vb,
                    status: sb,
                },
            ) => va == vb && sa == sb,
            (Self::UninitializedDatabase(a), Self::UninitializedDatabase(b)) => a == b,
            (Self::InvalidStatus(a), Self::InvalidStatus(b)) => a == b,
            (Self::UnsupportedScheme(a), Self::UnsupportedScheme(b)) => a == b,
            (Self::Io(a), Self::Io(b)) => a.kind() == b.kind() && a.to_string() == b.to_string(),
            #[cfg(feature = "sqlite")]
            (Self::Rusqlite(a), Self::Rusqlite(b)) => a == b,
            #[cfg(feature = "mysql")]
            (Self::Mysql(a), Self::Mysql(b)) => a == b,
            #[cfg(feature = "postgres")]
            (Self::Postgres(a), Self::Postgres(b)) => a.to_string() == b.to_string(),
            (Self::Generic(a), Self::Generic(b)) => a == b,
            _ => false,
        }
    }
}
