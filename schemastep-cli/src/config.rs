//! Settings for the command line runner.
//!
//! Values come from command line flags (which clap may fill from the
//! environment), then the database URL environment variable, then the TOML
//! config file, then built-in defaults.

use schemastep::{BackendOptions, Error};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file picked up from the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "schemastep.toml";

/// Contents of `schemastep.toml`. Every key is optional.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Migrations folder, relative to the config file.
    pub folder: Option<PathBuf>,
    pub database_url: Option<String>,
    /// Environment variable holding the database URL (default: "DATABASE_URL")
    #[serde(default = "default_database_url_env")]
    pub database_url_env: String,
    pub version_table: Option<String>,
    pub busy_timeout_secs: Option<u64>,
}

fn default_database_url_env() -> String {
    "DATABASE_URL".to_string()
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            folder: None,
            database_url: None,
            database_url_env: default_database_url_env(),
            version_table: None,
            busy_timeout_secs: None,
        }
    }
}

impl FileConfig {
    pub fn parse(content: &str) -> Result<Self, Error> {
        toml::from_str(content)
            .map_err(|e| Error::Configuration(format!("invalid config file: {}", e)))
    }

    /// Load `explicit` if given (it must exist), otherwise `schemastep.toml`
    /// in the working directory if there is one.
    pub fn load(explicit: Option<&Path>) -> Result<Self, Error> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.is_file() {
                    return Ok(Self::default());
                }
                default
            }
        };
        let content = fs::read_to_string(&path).map_err(|e| {
            Error::Configuration(format!("cannot read config file {}: {}", path.display(), e))
        })?;
        let mut config = Self::parse(&content)?;
        // folder paths in the file are relative to the file
        if let (Some(folder), Some(dir)) = (config.folder.as_mut(), path.parent()) {
            if folder.is_relative() {
                *folder = dir.join(&*folder);
            }
        }
        Ok(config)
    }
}

/// Values given on the command line.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub folder: Option<PathBuf>,
    pub database_url: Option<String>,
    pub version_table: Option<String>,
}

/// Fully resolved runner settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub folder: PathBuf,
    pub database_url: Option<String>,
    /// Where the database URL was expected to come from, for error messages.
    pub database_url_env: String,
    pub options: BackendOptions,
}

impl Settings {
    pub fn resolve<F>(overrides: Overrides, file: FileConfig, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let folder = overrides
            .folder
            .or(file.folder)
            .unwrap_or_else(|| PathBuf::from("."));

        let database_url = overrides
            .database_url
            .or_else(|| env(&file.database_url_env).filter(|url| !url.is_empty()))
            .or(file.database_url);

        let mut options = BackendOptions::default();
        if let Some(table) = overrides.version_table.or(file.version_table) {
            options = options.with_version_table(table);
        }
        if let Some(secs) = file.busy_timeout_secs {
            options = options.with_busy_timeout(Duration::from_secs(secs));
        }

        Self {
            folder,
            database_url,
            database_url_env: file.database_url_env,
            options,
        }
    }

    pub fn require_database_url(&self) -> Result<&str, Error> {
        self.database_url.as_deref().ok_or_else(|| {
            Error::Configuration(format!(
                "no database url: pass --database-url, set {} or add database_url to {}",
                self.database_url_env, DEFAULT_CONFIG_FILE
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn parse_full_file() {
        let config = FileConfig::parse(
            r#"
            folder = "db"
            database_url = "sqlite://app.db"
            database_url_env = "APP_DB"
            version_table = "schema_version"
            busy_timeout_secs = 5
            "#,
        )
        .unwrap();
        assert_eq!(
            config,
            FileConfig {
                folder: Some(PathBuf::from("db")),
                database_url: Some("sqlite://app.db".to_string()),
                database_url_env: "APP_DB".to_string(),
                version_table: Some("schema_version".to_string()),
                busy_timeout_secs: Some(5),
            }
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(
            FileConfig::parse("folder = \"db\"\nmigrator_fn = \"x\""),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn defaults_without_any_source() {
        let settings = Settings::resolve(
            Overrides::default(),
            FileConfig::parse("").unwrap(),
            no_env,
        );
        assert_eq!(settings.folder, PathBuf::from("."));
        assert_eq!(settings.database_url, None);
        assert_eq!(settings.options, BackendOptions::default());
        let err = settings.require_database_url().unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn flag_beats_env_beats_file() {
        let file = FileConfig::parse(
            "database_url = \"sqlite://file.db\"\nfolder = \"from-file\"\nversion_table = \"file_table\"",
        )
        .unwrap();
        let env = |key: &str| (key == "DATABASE_URL").then(|| "sqlite://env.db".to_string());

        let from_env = Settings::resolve(
            Overrides::default(),
            FileConfig::parse("database_url = \"sqlite://file.db\"").unwrap(),
            env,
        );
        assert_eq!(from_env.database_url.as_deref(), Some("sqlite://env.db"));

        let from_flag = Settings::resolve(
            Overrides {
                folder: Some(PathBuf::from("from-flag")),
                database_url: Some("sqlite://flag.db".to_string()),
                version_table: Some("flag_table".to_string()),
            },
            file,
            env,
        );
        assert_eq!(from_flag.database_url.as_deref(), Some("sqlite://flag.db"));
        assert_eq!(from_flag.folder, PathBuf::from("from-flag"));
        assert_eq!(from_flag.options.version_table, "flag_table");
    }

    #[test]
    fn file_fills_gaps() {
        let file = FileConfig::parse(
            "database_url = \"sqlite://file.db\"\nfolder = \"from-file\"\nbusy_timeout_secs = 2",
        )
        .unwrap();
        let settings = Settings::resolve(Overrides::default(), file, no_env);
        assert_eq!(settings.database_url.as_deref(), Some("sqlite://file.db"));
        assert_eq!(settings.folder, PathBuf::from("from-file"));
        assert_eq!(settings.options.busy_timeout, Duration::from_secs(2));
    }

    #[test]
    fn custom_url_variable() {
        let file = FileConfig::parse("database_url_env = \"APP_DB\"").unwrap();
        let env = |key: &str| match key {
            "APP_DB" => Some("postgres://localhost/app".to_string()),
            _ => Some("sqlite://wrong.db".to_string()),
        };
        let settings = Settings::resolve(Overrides::default(), file, env);
        assert_eq!(
            settings.database_url.as_deref(),
            Some("postgres://localhost/app")
        );
    }

    #[test]
    fn load_resolves_folder_against_file_location() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schemastep.toml");
        fs::write(&path, "folder = \"db\"").unwrap();

        let config = FileConfig::load(Some(&path)).unwrap();
        assert_eq!(config.folder, Some(dir.path().join("db")));
        assert_eq!(config.database_url_env, "DATABASE_URL");
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            FileConfig::load(Some(&dir.path().join("nope.toml"))),
            Err(Error::Configuration(_))
        ));
    }
}
