//! Executes the bundled provisioning scripts against the ODB.

use std::future::Future;
use std::time::{Duration, Instant};

use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr, Statement, TransactionTrait};
use sea_orm_migration::SchemaManager;
use tokio::sync::OnceCell;

use crate::config::database::DatabaseConfig;
use crate::db::{connect_with_url, is_connectivity_error};
use crate::error::{ConfigError, SqlError};
use crate::services::retry::{retry_transient, RetryError};
use crate::services::scripts::{render, RenderedStatement, ScriptCatalog, ScriptId, ScriptParams};

/// Runs named scripts, opening the connection lazily on first use.
///
/// The connection is established with bounded exponential backoff because
/// the database container is commonly still starting when we are.
pub struct SqlActionRunner {
    config: DatabaseConfig,
    catalog: ScriptCatalog,
    conn: OnceCell<DatabaseConnection>,
}

impl SqlActionRunner {
    /// Runner using the bundled scripts plus any overrides from `scripts_dir`.
    pub fn new(config: DatabaseConfig) -> Result<Self, ConfigError> {
        let catalog = ScriptCatalog::load(config.scripts_dir.as_deref())?;
        Ok(Self::with_catalog(config, catalog))
    }

    pub fn with_catalog(config: DatabaseConfig, catalog: ScriptCatalog) -> Self {
        Self {
            config,
            catalog,
            conn: OnceCell::new(),
        }
    }

    /// Whether a connection has been opened. Stays false until the first
    /// call that needs the database.
    pub fn is_connected(&self) -> bool {
        self.conn.initialized()
    }

    /// The shared connection, opening it on first use.
    pub async fn connection(&self) -> Result<&DatabaseConnection, SqlError> {
        self.conn.get_or_try_init(|| self.connect()).await
    }

    async fn connect(&self) -> Result<DatabaseConnection, SqlError> {
        let target = self.config.describe();
        tracing::info!("Connecting to ODB at {}", target);

        let url = self.config.url();
        let url = url.as_str();
        let timeout = self.config.connect_timeout;
        let conn = retry_transient(
            &self.config.retry,
            "ODB",
            move || connect_with_url(url, timeout),
            is_connectivity_error,
        )
        .await
        .map_err(|e| db_failure(e, SqlError::Query))?;

        tracing::info!("Connected to ODB at {}", target);
        Ok(conn)
    }

    /// Run every statement of `id` in one transaction, bounded by the
    /// configured statement timeout. Nothing is committed on failure.
    ///
    /// A transaction that loses its connection is rolled back and run again
    /// within the connectivity budget.
    pub async fn run_script(&self, id: ScriptId, params: &ScriptParams) -> Result<(), SqlError> {
        let conn = self.connection().await?;
        let statements = render(id, self.catalog.get(id), params, conn.get_database_backend())?;

        let started = Instant::now();
        tracing::debug!("Running script {} ({} statements)", id.name(), statements.len());

        let timeout = self.config.statement_timeout;
        let committed = retry_transient(
            &self.config.retry,
            "ODB",
            || run_in_transaction(conn, statements.clone(), timeout),
            is_connectivity_error,
        )
        .await
        .map_err(|e| {
            db_failure(e, |source| SqlError::Script {
                script: id.name(),
                source,
            })
        })?;

        if !committed {
            return Err(SqlError::Timeout {
                script: id.name(),
                timeout,
            });
        }
        tracing::debug!("Script {} committed in {:?}", id.name(), started.elapsed());
        Ok(())
    }

    /// Run a read-only check, retrying it while the database is unreachable.
    pub async fn query<'s, T, F, Fut>(&'s self, op: F) -> Result<T, SqlError>
    where
        F: Fn(&'s DatabaseConnection) -> Fut,
        Fut: Future<Output = Result<T, DbErr>>,
    {
        let conn = self.connection().await?;
        retry_transient(&self.config.retry, "ODB", || op(conn), is_connectivity_error)
            .await
            .map_err(|e| db_failure(e, SqlError::Query))
    }

    pub async fn has_table(&self, table: &str) -> Result<bool, SqlError> {
        self.query(|db| async move { SchemaManager::new(db).has_table(table).await })
            .await
    }
}

/// Ok(false) when the statement timeout fired; the transaction is dropped
/// and so rolled back.
async fn run_in_transaction(
    conn: &DatabaseConnection,
    statements: Vec<RenderedStatement>,
    timeout: Duration,
) -> Result<bool, DbErr> {
    let attempt = async {
        let txn = conn.begin().await?;
        for statement in statements {
            if statement.values.is_empty() {
                txn.execute_unprepared(&statement.sql).await?;
            } else {
                txn.execute(Statement::from_sql_and_values(
                    txn.get_database_backend(),
                    statement.sql,
                    statement.values,
                ))
                .await?;
            }
        }
        txn.commit().await
    };

    match tokio::time::timeout(timeout, attempt).await {
        Ok(result) => result.map(|()| true),
        Err(_) => Ok(false),
    }
}

/// Exhausted retries are connectivity failures; anything else goes to `other`.
fn db_failure(err: RetryError<DbErr>, other: impl FnOnce(DbErr) -> SqlError) -> SqlError {
    match err {
        RetryError::Exhausted {
            attempts,
            waited,
            last,
        } => SqlError::Connectivity {
            attempts,
            waited,
            message: last.to_string(),
        },
        RetryError::Permanent(err) => other(err),
    }
}
