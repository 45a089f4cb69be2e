use crate::core::{Direction, MigrationReport, Phase, Status, VersionRecord};
use crate::error::Error;
use crate::registry::Registry;
use crate::resolver::MigrationTarget;
use crate::store::Backend;
use std::fs;
use std::time::{Duration, Instant};

type ProgressCallback = Box<dyn Fn(Phase, u32) + Send + Sync>;
type CompleteCallback = Box<dyn Fn(u32, Direction, Duration) + Send + Sync>;

/// The entrypoint for moving a database along its version line.
///
/// Owns an already-connected [`Backend`] and the [`MigrationTarget`] folder.
/// Every step is written to the version record twice: `partial <direction>`
/// before the script runs and `complete` after it succeeds. A script error is
/// returned as-is and leaves the record partial, which later runs refuse to
/// move past unless forced.
pub struct Migrator<B: Backend> {
    backend: B,
    target: MigrationTarget,
    on_progress: Option<ProgressCallback>,
    on_migration_complete: Option<CompleteCallback>,
}

// Manual Debug impl since closures don't implement Debug
impl<B: Backend> std::fmt::Debug for Migrator<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migrator")
            .field("target", &self.target)
            .field("on_progress", &self.on_progress.is_some())
            .field(
                "on_migration_complete",
                &self.on_migration_complete.is_some(),
            )
            .finish_non_exhaustive()
    }
}

impl<B: Backend> Migrator<B> {
    pub fn new(backend: B, target: MigrationTarget) -> Self {
        Self {
            backend,
            target,
            on_progress: None,
            on_migration_complete: None,
        }
    }

    /// Set a callback invoked before each transition: once with
    /// `(Phase::Reset, 0)` when a reset starts and with
    /// `(Phase::Migrate, version)` before each script. It runs on the calling
    /// thread and must not panic.
    ///
    /// # Example
    /// ```
    /// # #[cfg(not(feature = "testing"))]
    /// # fn main() {}
    /// # #[cfg(feature = "testing")]
    /// # fn main() {
    /// use schemastep::Migrator;
    /// use schemastep::testing::{MigrationFolder, RecordingBackend};
    ///
    /// let folder = MigrationFolder::new();
    /// let migrator = Migrator::new(RecordingBackend::new(), folder.target())
    ///     .on_progress(|phase, version| println!("{} {}", phase, version));
    /// # drop(migrator);
    /// # }
    /// ```
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(Phase, u32) + Send + Sync + 'static,
    {
        self.on_progress = Some(Box::new(callback));
        self
    }

    /// Set a callback invoked after a step has been recorded `complete`.
    /// The callback receives the version, the direction and how long the script took.
    pub fn on_migration_complete<F>(mut self, callback: F) -> Self
    where
        F: Fn(u32, Direction, Duration) + Send + Sync + 'static,
    {
        self.on_migration_complete = Some(Box::new(callback));
        self
    }

    pub fn target(&self) -> &MigrationTarget {
        &self.target
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Read the version record.
    pub fn get_current_version(&mut self) -> Result<VersionRecord, Error> {
        self.backend.get_version()
    }

    /// Create the version table if it is missing.
    pub fn create_version(&mut self) -> Result<(), Error> {
        self.backend.create_version_table()
    }

    /// Create the database named by `url` server-side, using the default registry.
    pub fn prepare_environment(url: &str) -> Result<(), Error> {
        Registry::with_defaults().prepare_environment(url)
    }

    /// Apply up scripts until `target` (inclusive) or until no further script exists.
    pub fn up(&mut self, target: Option<u32>, force: bool) -> Result<MigrationReport, Error> {
        self.run_to(target, Direction::Up, force)
    }

    /// Apply down scripts until `target` (inclusive) or until no further script exists.
    pub fn down(&mut self, target: u32, force: bool) -> Result<MigrationReport, Error> {
        self.run_to(Some(target), Direction::Down, force)
    }

    /// Go down when `target` is below the recorded version, up otherwise.
    pub fn update(&mut self, target: Option<u32>, force: bool) -> Result<MigrationReport, Error> {
        let current = self.backend.get_version()?;
        match target {
            Some(target) if target < current.version => self.down(target, force),
            _ => self.up(target, force),
        }
    }

    /// Rebuild the database from `base.sql` and migrate up to `target`.
    ///
    /// Destructive: the database is dropped first.
    pub fn reset(&mut self, target: Option<u32>) -> Result<MigrationReport, Error> {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("reset", target = ?target).entered();

        if let Some(ref callback) = self.on_progress {
            callback(Phase::Reset, 0);
        }

        #[cfg(feature = "tracing")]
        tracing::info!("Dropping and recreating database");

        self.backend.drop_database()?;
        self.backend.create_database()?;
        self.backend.create_version_table()?;

        let base = fs::read_to_string(self.target.base_script())?;
        self.backend.execute_sql(&base)?;
        self.backend.set_version(0, Status::Complete)?;

        #[cfg(feature = "tracing")]
        tracing::info!("Base schema applied");

        self.up(target, false)
    }

    /// Walk the version line in `direction` until `target` is passed or no
    /// script exists for the next version.
    pub fn run_to(
        &mut self,
        target: Option<u32>,
        direction: Direction,
        force: bool,
    ) -> Result<MigrationReport, Error> {
        let record = self.backend.get_version()?;

        let mut current = match record.status {
            Status::Complete => i64::from(record.version) + direction.step(),
            Status::Partial(_) if !force => {
                #[cfg(feature = "tracing")]
                tracing::error!(
                    version = record.version,
                    status = %record.status,
                    "Refusing to migrate past an interrupted migration"
                );
                return Err(Error::IncompleteDatabase {
                    version: record.version,
                    status: record.status,
                });
            }
            // retry the interrupted step itself
            Status::Partial(interrupted) if interrupted == direction => i64::from(record.version),
            Status::Partial(_) => i64::from(record.version) + direction.step(),
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(
            recorded_version = record.version,
            recorded_status = %record.status,
            direction = %direction,
            target_version = ?target,
            first_candidate = current,
            "Considering migrations to run"
        );

        let mut migrations_run = Vec::new();
        loop {
            if let Some(target) = target {
                if direction.has_passed(current, i64::from(target)) {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        version = current,
                        target_version = target,
                        "Stopping (beyond target version)"
                    );
                    break;
                }
            }

            let Ok(version) = u32::try_from(current) else {
                break;
            };
            let Some(script) = self.target.resolve(version, direction)? else {
                #[cfg(feature = "tracing")]
                tracing::debug!(version = version, "Stopping (no script for version)");
                break;
            };

            #[cfg(feature = "tracing")]
            let _span = tracing::info_span!(
                "migration",
                version = version,
                direction = %direction,
                path = %script.path.display()
            )
            .entered();

            // an unreadable script must not leave the record partial
            let sql = script.read_sql()?;

            if let Some(ref callback) = self.on_progress {
                callback(Phase::Migrate, version);
            }

            #[cfg(feature = "tracing")]
            tracing::info!("Starting migration");

            let started = Instant::now();
            self.backend.set_version(version, Status::Partial(direction))?;
            if let Err(error) = self.backend.execute_sql(&sql) {
                #[cfg(feature = "tracing")]
                tracing::error!(error = %error, "Migration failed; version record left partial");
                return Err(error);
            }
            self.backend.set_version(version, Status::Complete)?;
            let elapsed = started.elapsed();

            #[cfg(feature = "tracing")]
            tracing::info!(
                duration_ms = elapsed.as_millis(),
                "Migration completed successfully"
            );

            if let Some(ref callback) = self.on_migration_complete {
                callback(version, direction, elapsed);
            }

            migrations_run.push(version);
            current += direction.step();
        }

        Ok(MigrationReport {
            direction,
            starting_version: record,
            migrations_run,
        })
    }
}
