//! Shared helpers for integration tests.
//!
//! Every test gets its own SQLite file inside a temporary directory, so tests
//! can run in parallel and see a fresh ODB.

#![allow(dead_code)]

use std::path::Path;

use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter};
use tempfile::TempDir;

use zato_quickstart::config::{Config, SettingsSource};
use zato_quickstart::models::prelude::*;
use zato_quickstart::models::server;
use zato_quickstart::services::{ScriptCatalog, SqlActionRunner};

pub const ADMIN_USERNAME: &str = "zato";
pub const ADMIN_PASSWORD: &str = "quickstart-secret";
pub const CLUSTER_NAME: &str = "quickstart";

/// Settings for a quickstart against `<dir>/odb.db` with a short retry budget.
pub fn sqlite_settings(dir: &Path) -> Vec<(String, String)> {
    vec![
        ("ZATO_QUICKSTART_ENABLED", "true".to_string()),
        ("ZATO_ODB_TYPE", "sqlite".to_string()),
        (
            "ZATO_ODB_SQLITE_PATH",
            dir.join("odb.db").display().to_string(),
        ),
        ("ZATO_ADMIN_USERNAME", ADMIN_USERNAME.to_string()),
        ("ZATO_ADMIN_PASSWORD", ADMIN_PASSWORD.to_string()),
        ("ZATO_CLUSTER_NAME", CLUSTER_NAME.to_string()),
        (
            "ZATO_QUICKSTART_MARKER",
            dir.join(".quickstart-complete").display().to_string(),
        ),
        ("ZATO_DB_MAX_WAIT_SECS", "2".to_string()),
        ("ZATO_DB_RETRY_INITIAL_MS", "50".to_string()),
        ("ZATO_DB_RETRY_MAX_INTERVAL_MS", "200".to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

/// Config for `dir`, with `overrides` replacing or adding settings.
pub fn config_with(dir: &Path, overrides: &[(&str, &str)]) -> Config {
    let mut settings = sqlite_settings(dir);
    for (key, value) in overrides {
        settings.retain(|(k, _)| k != key);
        settings.push((key.to_string(), value.to_string()));
    }
    Config::from_source(&SettingsSource::from_pairs(settings)).expect("valid test config")
}

pub fn test_config(dir: &Path) -> Config {
    config_with(dir, &[])
}

pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

pub fn test_runner(config: &Config) -> SqlActionRunner {
    SqlActionRunner::with_catalog(config.database.clone(), ScriptCatalog::bundled())
}

pub async fn connection(runner: &SqlActionRunner) -> &DatabaseConnection {
    runner.connection().await.expect("test database reachable")
}

pub async fn count_admins(db: &DatabaseConnection) -> u64 {
    AdminPrincipal::find().count(db).await.expect("count admins")
}

pub async fn count_clusters(db: &DatabaseConnection) -> u64 {
    Cluster::find().count(db).await.expect("count clusters")
}

pub async fn count_servers(db: &DatabaseConnection, cluster: &str) -> u64 {
    Server::find()
        .filter(server::Column::ClusterName.eq(cluster))
        .count(db)
        .await
        .expect("count servers")
}
