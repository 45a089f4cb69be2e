//! Locating migration scripts on disk.
//!
//! A migrations folder looks like:
//!
//! ```text
//! <folder>/base.sql
//! <folder>/migrations/up/<N>[-dev].sql
//! <folder>/migrations/down/<N>[-dev].sql
//! ```
//!
//! An up script `N` takes the schema from `N - 1` to `N`. A down script `N`
//! takes it from `N + 1` back to `N`, so `down/0.sql` undoes the first
//! migration.

use crate::core::Direction;
use crate::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

pub(crate) const BASE_SCRIPT: &str = "base.sql";
const MIGRATIONS_DIR: &str = "migrations";

/// The migrations folder a run works against.
/// Construction fails unless `base.sql` is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationTarget {
    folder: PathBuf,
}

impl MigrationTarget {
    /// Validate `folder` and build a target for it.
    pub fn new(folder: impl AsRef<Path>) -> Result<Self, Error> {
        let folder = folder.as_ref().to_path_buf();
        let base = folder.join(BASE_SCRIPT);
        if !base.is_file() {
            return Err(Error::Configuration(format!(
                "migrations folder '{}' has no {}",
                folder.display(),
                BASE_SCRIPT
            )));
        }
        Ok(Self { folder })
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn base_script(&self) -> PathBuf {
        self.folder.join(BASE_SCRIPT)
    }

    /// Directory holding the scripts for one direction.
    pub fn direction_dir(&self, direction: Direction) -> PathBuf {
        self.folder
            .join(MIGRATIONS_DIR)
            .join(direction.folder_name())
    }

    /// Find the script for `version` in `direction`. See [`resolve`].
    pub fn resolve(
        &self,
        version: u32,
        direction: Direction,
    ) -> Result<Option<MigrationScript>, Error> {
        resolve(&self.folder, version, direction)
    }
}

/// One migration script file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationScript {
    pub version: u32,
    pub direction: Direction,
    pub path: PathBuf,
}

impl MigrationScript {
    /// True for the `N-dev.sql` variant.
    pub fn is_dev(&self) -> bool {
        self.path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with("-dev.sql"))
    }

    /// Read the full script text.
    pub fn read_sql(&self) -> Result<String, Error> {
        Ok(fs::read_to_string(&self.path)?)
    }
}

/// Locate the migration script for `version` in the `direction` subfolder of `folder`.
///
/// Candidates are files ending in `{version}.sql` or `{version}-dev.sql`.
/// A candidate whose leading integer differs from `version` (`13.sql` when
/// looking for `3`) is ignored; one with no leading integer at all is an
/// [`Error::InvalidVersion`]. Two surviving candidates are an
/// [`Error::AmbiguousVersion`]. No candidate returns `Ok(None)`.
pub fn resolve(
    folder: &Path,
    version: u32,
    direction: Direction,
) -> Result<Option<MigrationScript>, Error> {
    let dir = folder.join(MIGRATIONS_DIR).join(direction.folder_name());
    let escaped = glob::Pattern::escape(&dir.to_string_lossy());

    // hidden files (editor backups, `._N.sql` resource forks) are never scripts
    let match_options = glob::MatchOptions {
        require_literal_leading_dot: true,
        ..Default::default()
    };

    let mut candidates = Vec::new();
    for suffix in [format!("{}.sql", version), format!("{}-dev.sql", version)] {
        for entry in glob::glob_with(&format!("{}/*{}", escaped, suffix), match_options)? {
            let path = entry?;
            if !path.is_file() {
                continue;
            }
            if filename_version(&path)? == version && !candidates.contains(&path) {
                candidates.push(path);
            }
        }
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(
        version = version,
        direction = %direction,
        candidates = ?candidates,
        "Resolved migration candidates"
    );

    match candidates.len() {
        0 => Ok(None),
        1 => Ok(candidates.pop().map(|path| MigrationScript {
            version,
            direction,
            path,
        })),
        _ => {
            candidates.sort();
            Err(Error::AmbiguousVersion {
                version,
                direction,
                candidates,
            })
        }
    }
}

/// The integer a script filename starts with.
fn filename_version(path: &Path) -> Result<u32, Error> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::InvalidVersion(format!("unreadable filename {}", path.display())))?;
    let digits: &str = {
        let end = name
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(name.len());
        &name[..end]
    };
    if digits.is_empty() {
        return Err(Error::InvalidVersion(format!(
            "migration file '{}' does not start with a version number",
            path.display()
        )));
    }
    digits.parse::<u32>().map_err(|e| {
        Error::InvalidVersion(format!(
            "migration file '{}' has an unusable version prefix: {}",
            path.display(),
            e
        ))
    })
}
