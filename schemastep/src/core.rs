use crate::error::Error;
use std::fmt;
use std::str::FromStr;

pub(crate) const DEFAULT_VERSION_TABLE_NAME: &str = "_schemastep_version_";

/// Which way a run walks the version line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Forward, towards higher versions, using `migrations/up`.
    Up,
    /// Backward, towards lower versions, using `migrations/down`.
    Down,
}

impl Direction {
    /// The signed distance between two consecutive versions visited in this direction.
    pub fn step(self) -> i64 {
        match self {
            Direction::Up => 1,
            Direction::Down => -1,
        }
    }

    /// Name of the subdirectory of `migrations/` holding scripts for this direction.
    pub fn folder_name(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }

    /// Whether `current` has already moved past `target` in this direction.
    /// Reaching the target exactly is not past it.
    pub(crate) fn has_passed(self, current: i64, target: i64) -> bool {
        match self {
            Direction::Up => current > target,
            Direction::Down => current < target,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.folder_name())
    }
}

/// State of the persisted version record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// The schema reflects the recorded version.
    Complete,
    /// A transition to the recorded version started in the given direction and never confirmed.
    Partial(Direction),
}

impl Status {
    pub fn is_partial(self) -> bool {
        matches!(self, Status::Partial(_))
    }

    /// The string stored in the version table.
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Complete => "complete",
            Status::Partial(Direction::Up) => "partial up",
            Status::Partial(Direction::Down) => "partial down",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "complete" => Ok(Status::Complete),
            "partial up" => Ok(Status::Partial(Direction::Up)),
            "partial down" => Ok(Status::Partial(Direction::Down)),
            other => Err(Error::InvalidStatus(other.to_string())),
        }
    }
}

/// The single row of migration state held in the target database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionRecord {
    /// The last version whose transition was started.
    pub version: u32,
    pub status: Status,
}

impl VersionRecord {
    pub fn new(version: u32, status: Status) -> Self {
        Self { version, status }
    }

    pub fn complete(version: u32) -> Self {
        Self::new(version, Status::Complete)
    }
}

impl fmt::Display for VersionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "version {} ({})", self.version, self.status)
    }
}

/// Phase reported to the progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The environment is about to be rebuilt from `base.sql`.
    Reset,
    /// A migration script is about to be applied.
    Migrate,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Reset => f.write_str("reset"),
            Phase::Migrate => f.write_str("migrate"),
        }
    }
}

/// A report of actions performed during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub direction: Direction,
    /// The record read before the run started.
    pub starting_version: VersionRecord,
    /// Versions applied, in the order they ran.
    pub migrations_run: Vec<u32>,
}

impl MigrationReport {
    /// The version recorded after the last applied step, or the starting version if nothing ran.
    pub fn final_version(&self) -> u32 {
        self.migrations_run
            .last()
            .copied()
            .unwrap_or(self.starting_version.version)
    }
}

/// Parse a version given as text (command line, configuration).
///
/// Accepts non-negative integers only; `"2.5"`, `"-1"` and `"two"` fail with
/// [`Error::InvalidVersion`]. Surrounding whitespace is ignored.
pub fn parse_version(input: &str) -> Result<u32, Error> {
    let trimmed = input.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidVersion(format!(
            "'{}' is not a non-negative integer",
            input
        )));
    }
    trimmed
        .parse::<u32>()
        .map_err(|e| Error::InvalidVersion(format!("'{}': {}", input, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_round_trip() {
        for status in [
            Status::Complete,
            Status::Partial(Direction::Up),
            Status::Partial(Direction::Down),
        ] {
            assert_eq!(status.as_str().parse::<Status>().unwrap(), status);
        }
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert_eq!(
            "partial sideways".parse::<Status>(),
            Err(Error::InvalidStatus("partial sideways".to_string()))
        );
    }

    #[test]
    fn parse_version_accepts_integers_only() {
        assert_eq!(parse_version("0").unwrap(), 0);
        assert_eq!(parse_version(" 12 ").unwrap(), 12);
        assert!(matches!(parse_version("2.5"), Err(Error::InvalidVersion(_))));
        assert!(matches!(parse_version("-1"), Err(Error::InvalidVersion(_))));
        assert!(matches!(parse_version("two"), Err(Error::InvalidVersion(_))));
        assert!(matches!(parse_version(""), Err(Error::InvalidVersion(_))));
        assert!(matches!(
            parse_version("99999999999"),
            Err(Error::InvalidVersion(_))
        ));
    }

    #[test]
    fn target_boundary_is_inclusive() {
        assert!(!Direction::Up.has_passed(3, 3));
        assert!(Direction::Up.has_passed(4, 3));
        assert!(!Direction::Down.has_passed(0, 0));
        assert!(Direction::Down.has_passed(-1, 0));
    }

    #[test]
    fn final_version_falls_back_to_start() {
        let report = MigrationReport {
            direction: Direction::Up,
            starting_version: VersionRecord::complete(4),
            migrations_run: vec![],
        };
        assert_eq!(report.final_version(), 4);
    }
}
