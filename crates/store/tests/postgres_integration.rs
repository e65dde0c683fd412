//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use common::RunId;
use futures_util::FutureExt;
use serde_json::{Value, json};
use sqlx::PgPool;
use store::{PgUnitOfWork, PostgresJournal, pg_transaction};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use workflow::step::from_fn;
use workflow::{
    Container, ExecutionJournal, ExecutionJournalExt, JournalEntry,
    JournalError, RunState, StepError, StepResponse, UnitOfWork, Workflow, WorkflowEngine,
    WorkflowEvent, within_transaction,
};

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_workflow_journal.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();

            sqlx::raw_sql("CREATE TABLE IF NOT EXISTS account_holders (id TEXT PRIMARY KEY)")
                .execute(&temp_pool)
                .await
                .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh pool with cleared tables
async fn get_test_pool() -> PgPool {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE workflow_journal, account_holders")
        .execute(&pool)
        .await
        .unwrap();

    pool
}

async fn holder_count(pool: &PgPool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM account_holders")
        .fetch_one(pool)
        .await
        .unwrap()
}

fn entry(run_id: RunId, sequence: u64, event: WorkflowEvent) -> JournalEntry {
    JournalEntry::new(run_id, "pg-test", sequence, &event).unwrap()
}

// ---------------------------------------------------------------------------
// Journal
// ---------------------------------------------------------------------------

#[tokio::test]
async fn journal_append_and_retrieve() {
    let journal = PostgresJournal::new(get_test_pool().await);
    let run_id = RunId::new();

    journal
        .append(entry(run_id, 1, WorkflowEvent::run_started(run_id, "pg-test")))
        .await
        .unwrap();
    journal
        .append(entry(run_id, 2, WorkflowEvent::run_succeeded()))
        .await
        .unwrap();

    let entries = journal.entries_for_run(run_id).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].event_type, "RunStarted");
    assert_eq!(entries[1].sequence, 2);
    assert_eq!(journal.last_sequence(run_id).await.unwrap(), 2);

    let summary = journal.load_summary(run_id).await.unwrap().unwrap();
    assert_eq!(summary.state(), RunState::Succeeded);
}

#[tokio::test]
async fn journal_sequence_conflict() {
    let journal = PostgresJournal::new(get_test_pool().await);
    let run_id = RunId::new();

    journal
        .append(entry(run_id, 1, WorkflowEvent::run_started(run_id, "pg-test")))
        .await
        .unwrap();

    let result = journal
        .append(entry(run_id, 1, WorkflowEvent::run_succeeded()))
        .await;
    assert!(matches!(
        result,
        Err(JournalError::SequenceConflict {
            expected: 2,
            actual: 1,
            ..
        })
    ));
}

#[tokio::test]
async fn journal_lists_runs_per_workflow() {
    let journal = PostgresJournal::new(get_test_pool().await);
    let first = RunId::new();
    let second = RunId::new();

    journal
        .append(entry(first, 1, WorkflowEvent::run_started(first, "pg-test")))
        .await
        .unwrap();
    journal
        .append(entry(second, 1, WorkflowEvent::run_started(second, "pg-test")))
        .await
        .unwrap();

    let runs = journal.runs_for_workflow("pg-test").await.unwrap();
    assert_eq!(runs, vec![first, second]);
    assert!(journal.runs_for_workflow("unknown").await.unwrap().is_empty());
}

#[tokio::test]
async fn engine_journals_into_postgres() {
    let journal = Arc::new(PostgresJournal::new(get_test_pool().await));
    let engine = WorkflowEngine::with_journal(journal.clone());

    let wf = Workflow::<Value, Value>::builder("pg-journaled")
        .step(
            "echo",
            from_fn("echo", |v: Value, _ctx| {
                async move { Ok(StepResponse::compensate_with_output(v)) }.boxed()
            }),
        )
        .build()
        .unwrap();

    let result = engine
        .run(&wf, json!({ "id": 1 }), Container::new())
        .await
        .unwrap();

    let summary = journal.load_summary(result.run_id).await.unwrap().unwrap();
    assert_eq!(summary.state(), RunState::Succeeded);
    assert_eq!(summary.record().unwrap(), result.record);
}

// ---------------------------------------------------------------------------
// Unit of work
// ---------------------------------------------------------------------------

fn insert_holder() -> impl workflow::Step {
    from_fn("insert-holder", |id: String, ctx| {
        async move {
            let handle = ctx
                .transaction()
                .ok_or_else(|| StepError::Invalid("no transaction".into()))?;
            let tx = pg_transaction(handle)?;
            let mut conn = tx.connection().await?;
            sqlx::query("INSERT INTO account_holders (id) VALUES ($1)")
                .bind(&id)
                .execute(&mut *conn)
                .await
                .map_err(|e| StepError::Service(e.to_string()))?;
            Ok(StepResponse::compensate_with_output(id))
        }
        .boxed()
    })
}

fn reject_holder() -> impl workflow::Step {
    from_fn("reject-holder", |_id: String, _ctx| {
        async move {
            Err::<StepResponse<String, String>, _>(StepError::Conflict("duplicate holder".into()))
        }
        .boxed()
    })
}

#[tokio::test]
async fn run_in_transaction_commits() {
    let pool = get_test_pool().await;
    let uow = PgUnitOfWork::new(pool.clone());
    let wf = Workflow::<String, String>::builder("pg-commit")
        .step("holder", insert_holder())
        .build()
        .unwrap();

    WorkflowEngine::new()
        .run_in_transaction(&wf, "acchld_1".to_string(), Arc::new(Container::new()), &uow)
        .await
        .unwrap();

    assert_eq!(holder_count(&pool).await, 1);
}

#[tokio::test]
async fn run_in_transaction_rolls_back_on_failure() {
    let pool = get_test_pool().await;
    let uow = PgUnitOfWork::new(pool.clone());
    let wf = Workflow::<String, String>::builder("pg-rollback")
        .step("holder", insert_holder())
        .step("rejected", reject_holder())
        .build()
        .unwrap();

    let failure = WorkflowEngine::new()
        .run_in_transaction(&wf, "acchld_2".to_string(), Arc::new(Container::new()), &uow)
        .await
        .unwrap_err();

    assert_eq!(failure.cause.step(), Some("reject-holder"));
    assert_eq!(holder_count(&pool).await, 0);
}

#[tokio::test]
async fn within_transaction_legacy_path() {
    let pool = get_test_pool().await;
    let uow = PgUnitOfWork::new(pool.clone());

    let result: Result<(), StepError> = within_transaction(&uow, |handle| async move {
        let tx = pg_transaction(&handle)?;
        let mut conn = tx.connection().await?;
        sqlx::query("INSERT INTO account_holders (id) VALUES ('acchld_3')")
            .execute(&mut *conn)
            .await
            .map_err(|e| StepError::Service(e.to_string()))?;
        Err(StepError::Conflict("abort".into()))
    })
    .await;

    assert!(result.is_err());
    assert_eq!(holder_count(&pool).await, 0);
}

#[tokio::test]
async fn closed_transaction_rejects_connection() {
    let uow = PgUnitOfWork::new(get_test_pool().await);
    let handle = uow.begin().await.unwrap();
    handle.commit().await.unwrap();

    assert!(!handle.is_active());
    let tx = pg_transaction(&handle).unwrap();
    assert!(tx.connection().await.is_err());
    assert!(handle.rollback().await.is_err());
}
