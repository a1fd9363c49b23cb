//! Deferred one-shot tasks that outlive the process that scheduled them.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::SqlitePool;

use crate::{auth::new_id, error::StoreError};

pub const TASK_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

const STATUS_PENDING: &str = "pending";
const STATUS_RUNNING: &str = "running";
const STATUS_FAILED: &str = "failed";

#[derive(Debug, Clone, PartialEq)]
pub struct DeferredTask {
    pub id: String,
    pub kind: String,
    /// Lets a later cancellation target the task without knowing its id.
    pub tag: String,
    pub payload: serde_json::Value,
    /// Local wall-clock time at which the task becomes due.
    pub run_at: NaiveDateTime,
    pub attempts: i64,
}

impl DeferredTask {
    pub fn new(kind: &str, tag: String, payload: serde_json::Value, run_at: NaiveDateTime) -> Self {
        Self {
            id: new_id(),
            kind: kind.to_string(),
            tag,
            payload,
            run_at,
            attempts: 0,
        }
    }
}

#[async_trait]
pub trait TaskQueue: Send + Sync {
    async fn enqueue(&self, task: DeferredTask) -> Result<(), StoreError>;
    /// Drops every pending task carrying `tag`, returning how many went.
    async fn cancel_tag(&self, tag: &str) -> Result<u64, StoreError>;
    /// Marks up to `limit` due tasks as running and hands them out.
    async fn claim_due(&self, now: NaiveDateTime, limit: i64) -> Result<Vec<DeferredTask>, StoreError>;
    /// Removes a delivered task; completed tasks leave no row behind.
    async fn complete(&self, id: &str) -> Result<(), StoreError>;
    async fn fail(&self, id: &str, error: &str) -> Result<(), StoreError>;
    /// Puts tasks left running by a crashed worker back in the queue.
    async fn recover_running(&self) -> Result<u64, StoreError>;
    /// Deletes failed tasks kept since the previous worker start.
    async fn prune_failed(&self) -> Result<u64, StoreError>;
    async fn pending(&self) -> Result<Vec<DeferredTask>, StoreError>;
}

#[derive(Debug, sqlx::FromRow)]
struct TaskRow {
    id: String,
    kind: String,
    tag: String,
    payload: String,
    run_at: String,
    attempts: i64,
}

impl TryFrom<TaskRow> for DeferredTask {
    type Error = StoreError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let run_at = NaiveDateTime::parse_from_str(&row.run_at, TASK_TIME_FORMAT).map_err(|_| {
            StoreError::InvalidValue {
                key: "run_at".to_string(),
                value: row.run_at.clone(),
            }
        })?;
        Ok(DeferredTask {
            id: row.id,
            kind: row.kind,
            tag: row.tag,
            payload: serde_json::from_str(&row.payload)?,
            run_at,
            attempts: row.attempts,
        })
    }
}

#[derive(Clone)]
pub struct SqliteTaskQueue {
    db: SqlitePool,
}

impl SqliteTaskQueue {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TaskQueue for SqliteTaskQueue {
    async fn enqueue(&self, task: DeferredTask) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO deferred_tasks (id, kind, tag, payload, run_at, status, attempts, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&task.id)
        .bind(&task.kind)
        .bind(&task.tag)
        .bind(task.payload.to_string())
        .bind(task.run_at.format(TASK_TIME_FORMAT).to_string())
        .bind(STATUS_PENDING)
        .bind(task.attempts)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn cancel_tag(&self, tag: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM deferred_tasks WHERE tag = ? AND status = ?")
            .bind(tag)
            .bind(STATUS_PENDING)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected())
    }

    async fn claim_due(&self, now: NaiveDateTime, limit: i64) -> Result<Vec<DeferredTask>, StoreError> {
        let rows = sqlx::query_as::<_, TaskRow>(
            r#"UPDATE deferred_tasks
               SET status = ?, attempts = attempts + 1
               WHERE id IN (
                   SELECT id FROM deferred_tasks
                   WHERE status = ? AND run_at <= ?
                   ORDER BY run_at
                   LIMIT ?
               )
               RETURNING id, kind, tag, payload, run_at, attempts"#,
        )
        .bind(STATUS_RUNNING)
        .bind(STATUS_PENDING)
        .bind(now.format(TASK_TIME_FORMAT).to_string())
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        let mut tasks = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.id.clone();
            match DeferredTask::try_from(row) {
                Ok(task) => tasks.push(task),
                Err(err) => {
                    log::warn!("Deferred task {id} is unreadable: {err}");
                    self.fail(&id, &err.to_string()).await?;
                }
            }
        }
        tasks.sort_by(|a, b| a.run_at.cmp(&b.run_at));
        Ok(tasks)
    }

    async fn complete(&self, id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM deferred_tasks WHERE id = ?")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn fail(&self, id: &str, error: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE deferred_tasks SET status = ?, last_error = ? WHERE id = ?")
            .bind(STATUS_FAILED)
            .bind(error)
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn recover_running(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("UPDATE deferred_tasks SET status = ? WHERE status = ?")
            .bind(STATUS_PENDING)
            .bind(STATUS_RUNNING)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected())
    }

    async fn prune_failed(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM deferred_tasks WHERE status = ?")
            .bind(STATUS_FAILED)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected())
    }

    async fn pending(&self) -> Result<Vec<DeferredTask>, StoreError> {
        let rows = sqlx::query_as::<_, TaskRow>(
            r#"SELECT id, kind, tag, payload, run_at, attempts
               FROM deferred_tasks
               WHERE status = ?
               ORDER BY run_at"#,
        )
        .bind(STATUS_PENDING)
        .fetch_all(&self.db)
        .await?;
        rows.into_iter().map(DeferredTask::try_from).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MemoryStatus {
    Pending,
    Running,
    Failed,
}

/// Process-local queue, for tests and hosts without a database.
#[derive(Default)]
pub struct MemoryTaskQueue {
    tasks: Mutex<Vec<(DeferredTask, MemoryStatus)>>,
}

impl MemoryTaskQueue {
    fn with_tasks<R>(&self, f: impl FnOnce(&mut Vec<(DeferredTask, MemoryStatus)>) -> R) -> R {
        let mut tasks = self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut tasks)
    }

    fn set_status(&self, id: &str, status: MemoryStatus) {
        self.with_tasks(|tasks| {
            if let Some(entry) = tasks.iter_mut().find(|(task, _)| task.id == id) {
                entry.1 = status;
            }
        });
    }

    /// Number of tasks held in any state.
    pub fn len(&self) -> usize {
        self.with_tasks(|tasks| tasks.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn failed(&self) -> usize {
        self.with_tasks(|tasks| {
            tasks
                .iter()
                .filter(|(_, status)| *status == MemoryStatus::Failed)
                .count()
        })
    }
}

#[async_trait]
impl TaskQueue for MemoryTaskQueue {
    async fn enqueue(&self, task: DeferredTask) -> Result<(), StoreError> {
        self.with_tasks(|tasks| tasks.push((task, MemoryStatus::Pending)));
        Ok(())
    }

    async fn cancel_tag(&self, tag: &str) -> Result<u64, StoreError> {
        Ok(self.with_tasks(|tasks| {
            let before = tasks.len();
            tasks.retain(|(task, status)| !(task.tag == tag && *status == MemoryStatus::Pending));
            (before - tasks.len()) as u64
        }))
    }

    async fn claim_due(&self, now: NaiveDateTime, limit: i64) -> Result<Vec<DeferredTask>, StoreError> {
        Ok(self.with_tasks(|tasks| {
            let mut due: Vec<&mut (DeferredTask, MemoryStatus)> = tasks
                .iter_mut()
                .filter(|(task, status)| *status == MemoryStatus::Pending && task.run_at <= now)
                .collect();
            due.sort_by(|a, b| a.0.run_at.cmp(&b.0.run_at));
            due.into_iter()
                .take(usize::try_from(limit).unwrap_or(0))
                .map(|entry| {
                    entry.1 = MemoryStatus::Running;
                    entry.0.attempts += 1;
                    entry.0.clone()
                })
                .collect()
        }))
    }

    async fn complete(&self, id: &str) -> Result<(), StoreError> {
        self.with_tasks(|tasks| tasks.retain(|(task, _)| task.id != id));
        Ok(())
    }

    async fn fail(&self, id: &str, _error: &str) -> Result<(), StoreError> {
        self.set_status(id, MemoryStatus::Failed);
        Ok(())
    }

    async fn recover_running(&self) -> Result<u64, StoreError> {
        Ok(self.with_tasks(|tasks| {
            let mut recovered = 0;
            for entry in tasks.iter_mut().filter(|(_, status)| *status == MemoryStatus::Running) {
                entry.1 = MemoryStatus::Pending;
                recovered += 1;
            }
            recovered
        }))
    }

    async fn prune_failed(&self) -> Result<u64, StoreError> {
        Ok(self.with_tasks(|tasks| {
            let before = tasks.len();
            tasks.retain(|(_, status)| *status != MemoryStatus::Failed);
            (before - tasks.len()) as u64
        }))
    }

    async fn pending(&self) -> Result<Vec<DeferredTask>, StoreError> {
        Ok(self.with_tasks(|tasks| {
            tasks
                .iter()
                .filter(|(_, status)| *status == MemoryStatus::Pending)
                .map(|(task, _)| task.clone())
                .collect()
        }))
    }
}
