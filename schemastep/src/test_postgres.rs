//! Shared PostgreSQL container for integration tests.
//!
//! The container starts on first use and lives for the rest of the test
//! binary. Every test gets its own database on it.

use std::sync::OnceLock;

use postgres::{Client, NoTls};
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::postgres::Postgres;
use uuid::Uuid;

// credentials baked into the testcontainers-modules image
const PG_USER: &str = "postgres";
const PG_PASSWORD: &str = "postgres";
const PG_DB: &str = "postgres";

struct SharedPostgres {
    port: u16,
    // keeps the container's async plumbing alive
    _runtime: tokio::runtime::Runtime,
}

static SHARED: OnceLock<SharedPostgres> = OnceLock::new();

fn port() -> u16 {
    SHARED
        .get_or_init(|| {
            let runtime = tokio::runtime::Runtime::new().expect("failed to create tokio runtime");
            let port = runtime.block_on(async {
                let container = Postgres::default()
                    .start()
                    .await
                    .expect("failed to start postgres container");
                let port = container
                    .get_host_port_ipv4(5432)
                    .await
                    .expect("failed to get postgres port");
                // leaked so the container outlives this block
                std::mem::forget(container);
                port
            });
            SharedPostgres {
                port,
                _runtime: runtime,
            }
        })
        .port
}

fn url_with_db(db: &str) -> String {
    format!(
        "postgres://{}:{}@127.0.0.1:{}/{}",
        PG_USER,
        PG_PASSWORD,
        port(),
        db
    )
}

/// URL of a database name nobody has created yet.
pub fn unused_database_url() -> String {
    url_with_db(&format!("test_{}", Uuid::new_v4().simple()))
}

/// Create an empty database with a unique name and return its URL.
pub fn fresh_database_url() -> String {
    let db_name = format!("test_{}", Uuid::new_v4().simple());
    let mut admin =
        Client::connect(&url_with_db(PG_DB), NoTls).expect("failed to connect as admin");
    admin
        .batch_execute(&format!("CREATE DATABASE \"{}\"", db_name))
        .expect("failed to create test database");
    url_with_db(&db_name)
}
