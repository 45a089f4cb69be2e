//! Choosing a backend from a connection URL.
//!
//! Backends are registered explicitly against a URL scheme; nothing is
//! discovered at runtime. [`Registry::with_defaults`] registers the built-in
//! backends enabled by cargo features.
//!
//! ```
//! # #[cfg(not(feature = "sqlite"))]
//! # fn main() {}
//! # #[cfg(feature = "sqlite")]
//! # fn main() {
//! use schemastep::registry::Registry;
//! use schemastep::{BackendOptions, VersionStore};
//!
//! let registry = Registry::with_defaults();
//! let mut backend = registry
//!     .connect("sqlite::memory:", &BackendOptions::default())
//!     .unwrap();
//! backend.create_version_table().unwrap();
//! # }
//! ```

use crate::error::Error;
use crate::store::{Backend, BackendOptions};
use url::Url;

/// Creates the database object server-side before a connection to it is possible.
pub type PrepareFn = fn(&Url) -> Result<(), Error>;

/// Opens a connection and wraps it in a backend.
pub type ConnectFn = fn(&Url, &BackendOptions) -> Result<Box<dyn Backend>, Error>;

/// What a registry knows about one URL scheme.
#[derive(Debug, Clone, Copy)]
pub struct BackendFactory {
    pub scheme: &'static str,
    pub prepare_environment: PrepareFn,
    pub connect: ConnectFn,
}

/// Maps URL schemes to backend factories.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    factories: Vec<BackendFactory>,
}

impl Registry {
    /// A registry with nothing registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every backend compiled into this build.
    pub fn with_defaults() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::new();

        #[cfg(feature = "sqlite")]
        registry.register(BackendFactory {
            scheme: "sqlite",
            prepare_environment: crate::sqlite::prepare_environment,
            connect: crate::sqlite::connect_backend,
        });

        #[cfg(feature = "postgres")]
        for scheme in ["postgres", "postgresql"] {
            registry.register(BackendFactory {
                scheme,
                prepare_environment: crate::postgres::prepare_environment,
                connect: crate::postgres::connect_backend,
            });
        }

        #[cfg(feature = "mysql")]
        registry.register(BackendFactory {
            scheme: "mysql",
            prepare_environment: crate::mysql::prepare_environment,
            connect: crate::mysql::connect_backend,
        });

        registry
    }

    /// Add a factory. A later registration for the same scheme replaces the earlier one.
    pub fn register(&mut self, factory: BackendFactory) -> &mut Self {
        self.factories.retain(|f| f.scheme != factory.scheme);
        self.factories.push(factory);
        self
    }

    /// Registered schemes, in registration order.
    pub fn schemes(&self) -> Vec<&'static str> {
        self.factories.iter().map(|f| f.scheme).collect()
    }

    pub fn lookup(&self, scheme: &str) -> Result<&BackendFactory, Error> {
        self.factories
            .iter()
            .find(|f| f.scheme.eq_ignore_ascii_case(scheme))
            .ok_or_else(|| Error::UnsupportedScheme(scheme.to_string()))
    }

    /// Connect to the database at `url` with the backend registered for its scheme.
    pub fn connect(&self, url: &str, options: &BackendOptions) -> Result<Box<dyn Backend>, Error> {
        let url = Url::parse(url)?;
        let factory = self.lookup(url.scheme())?;

        #[cfg(feature = "tracing")]
        tracing::debug!(scheme = factory.scheme, "Connecting backend");

        (factory.connect)(&url, options)
    }

    /// Create the database at `url` server-side, if the backend needs that.
    pub fn prepare_environment(&self, url: &str) -> Result<(), Error> {
        let url = Url::parse(url)?;
        let factory = self.lookup(url.scheme())?;

        #[cfg(feature = "tracing")]
        tracing::info!(scheme = factory.scheme, "Preparing environment");

        (factory.prepare_environment)(&url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::VersionStore;
    use crate::testing::RecordingBackend;

    fn fake_prepare(url: &Url) -> Result<(), Error> {
        if url.path() == "/fail" {
            Err(Error::Generic("prepare failed".to_string()))
        } else {
            Ok(())
        }
    }

    fn fake_connect(_url: &Url, _options: &BackendOptions) -> Result<Box<dyn Backend>, Error> {
        Ok(Box::new(RecordingBackend::new()))
    }

    fn fake_factory() -> BackendFactory {
        BackendFactory {
            scheme: "fake",
            prepare_environment: fake_prepare,
            connect: fake_connect,
        }
    }

    #[test]
    fn unknown_scheme_is_rejected() {
        let registry = Registry::new();
        assert_eq!(
            registry
                .connect("oracle://db/x", &BackendOptions::default())
                .err(),
            Some(Error::UnsupportedScheme("oracle".to_string()))
        );
    }

    #[test]
    fn registered_factory_is_used() {
        let mut registry = Registry::new();
        registry.register(fake_factory());

        let mut backend = registry
            .connect("fake://host/db", &BackendOptions::default())
            .unwrap();
        backend.create_version_table().unwrap();
        assert!(matches!(
            backend.get_version(),
            Err(Error::UninitializedDatabase(_))
        ));

        assert!(registry.prepare_environment("fake://host/db").is_ok());
        assert_eq!(
            registry.prepare_environment("fake://host/fail"),
            Err(Error::Generic("prepare failed".to_string()))
        );
    }

    #[test]
    fn re_registering_replaces() {
        let mut registry = Registry::new();
        registry.register(fake_factory()).register(fake_factory());
        assert_eq!(registry.schemes(), vec!["fake"]);
    }

    #[test]
    fn malformed_url_is_a_configuration_error() {
        let registry = Registry::with_defaults();
        assert!(matches!(
            registry.prepare_environment("not a url"),
            Err(Error::Configuration(_))
        ));
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn defaults_include_sqlite() {
        assert!(Registry::with_defaults().schemes().contains(&"sqlite"));
    }
}
