use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;

use crate::migrations::Migrator;

pub type DbConn = DatabaseConnection;

/// Open a single connection attempt and apply the crate's own migrations.
pub async fn connect_with_url(
    database_url: &str,
    connect_timeout: Duration,
) -> Result<DbConn, DbErr> {
    let mut opts = ConnectOptions::new(database_url);
    opts.max_connections(2)
        .min_connections(1)
        .connect_timeout(connect_timeout)
        .acquire_timeout(connect_timeout)
        .sqlx_logging(false);

    let db = Database::connect(opts).await?;

    tracing::debug!("Running quickstart migrations...");
    Migrator::up(&db, None).await?;
    tracing::debug!("Quickstart migrations completed");

    Ok(db)
}

/// Errors that mean "the database is not there (yet)" rather than "the
/// statement is wrong".
pub fn is_connectivity_error(err: &DbErr) -> bool {
    matches!(err, DbErr::Conn(_) | DbErr::ConnectionAcquire(_))
}
