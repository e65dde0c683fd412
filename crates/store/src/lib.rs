//! PostgreSQL adapters for the workflow engine.

pub mod error;
pub mod journal;
pub mod transaction;

pub use error::{Result, StoreError};
pub use journal::PostgresJournal;
pub use transaction::{PgTransaction, PgUnitOfWork, pg_transaction};

/// Runs the database migrations.
pub async fn run_migrations(pool: &sqlx::PgPool) -> Result<()> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    Ok(())
}
