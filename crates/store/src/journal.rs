use async_trait::async_trait;
use common::RunId;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;
use workflow::journal::Result;
use workflow::{ExecutionJournal, JournalEntry, JournalError};

/// PostgreSQL-backed execution journal.
#[derive(Clone)]
pub struct PostgresJournal {
    pool: PgPool,
}

impl PostgresJournal {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to `database_url` and runs the migrations.
    pub async fn connect(database_url: &str) -> crate::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        crate::run_migrations(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_entry(row: PgRow) -> Result<JournalEntry> {
        let sequence: i64 = row.try_get("sequence").map_err(backend)?;
        Ok(JournalEntry {
            run_id: RunId::from_uuid(row.try_get::<Uuid, _>("run_id").map_err(backend)?),
            workflow_id: row.try_get("workflow_id").map_err(backend)?,
            sequence: sequence as u64,
            event_type: row.try_get("event_type").map_err(backend)?,
            payload: row.try_get("payload").map_err(backend)?,
            recorded_at: row.try_get("recorded_at").map_err(backend)?,
        })
    }
}

fn backend(err: sqlx::Error) -> JournalError {
    JournalError::Backend(Box::new(err))
}

#[async_trait]
impl ExecutionJournal for PostgresJournal {
    async fn append(&self, entry: JournalEntry) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let current: Option<i64> =
            sqlx::query_scalar("SELECT MAX(sequence) FROM workflow_journal WHERE run_id = $1")
                .bind(entry.run_id.as_uuid())
                .fetch_one(&mut *tx)
                .await
                .map_err(backend)?;
        let expected = current.unwrap_or(0) as u64 + 1;

        if entry.sequence != expected {
            return Err(JournalError::SequenceConflict {
                run_id: entry.run_id,
                expected,
                actual: entry.sequence,
            });
        }

        sqlx::query(
            r#"
            INSERT INTO workflow_journal (run_id, workflow_id, sequence, event_type, payload, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(entry.run_id.as_uuid())
        .bind(&entry.workflow_id)
        .bind(entry.sequence as i64)
        .bind(&entry.event_type)
        .bind(&entry.payload)
        .bind(entry.recorded_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            // A concurrent writer took the same sequence number
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("workflow_journal_pkey")
            {
                return JournalError::SequenceConflict {
                    run_id: entry.run_id,
                    expected,
                    actual: entry.sequence,
                };
            }
            backend(e)
        })?;

        tx.commit().await.map_err(backend)?;
        metrics::counter!("workflow_journal_entries_total").increment(1);
        Ok(())
    }

    async fn entries_for_run(&self, run_id: RunId) -> Result<Vec<JournalEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT run_id, workflow_id, sequence, event_type, payload, recorded_at
            FROM workflow_journal
            WHERE run_id = $1
            ORDER BY sequence ASC
            "#,
        )
        .bind(run_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.into_iter().map(Self::row_to_entry).collect()
    }

    async fn runs_for_workflow(&self, workflow_id: &str) -> Result<Vec<RunId>> {
        let rows = sqlx::query(
            r#"
            SELECT run_id, MIN(recorded_at) AS started_at
            FROM workflow_journal
            WHERE workflow_id = $1
            GROUP BY run_id
            ORDER BY started_at ASC, run_id ASC
            "#,
        )
        .bind(workflow_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.into_iter()
            .map(|row| {
                row.try_get::<Uuid, _>("run_id")
                    .map(RunId::from_uuid)
                    .map_err(backend)
            })
            .collect()
    }
}
