//! Repository for `task_states`: CRUD, hierarchy queries, and progress aggregation.

use std::sync::Arc;

use compozy_core::{jsonb, Id};
use sqlx::postgres::{PgArguments, PgPool, PgRow};
use sqlx::query::{Query, QueryAs};
use sqlx::{FromRow, Postgres, Transaction};
use tokio::sync::Mutex;
use tracing::debug;

use super::error::{Result, TaskStateError};
use super::model::{
    ChildOutput, ListStatesFilter, NewTaskState, ProgressInfo, TaskState, TaskStateRow,
    TaskStatus, TaskTreeNode,
};

const STATE_COLUMNS: &str = "task_exec_id, workflow_exec_id, workflow_id, task_id, \
     parent_task_exec_id, component, agent_id, action_id, tool_id, execution_type, status, \
     input, output, error, created_at, updated_at";

/// Appends `column = $n` to `clauses` and records `value` as the next positional bind,
/// building up a conjunction for [`TaskStateRepository::list_states`].
fn push_filter(clauses: &mut Vec<String>, binds: &mut Vec<String>, column: &str, value: String) {
    binds.push(value);
    clauses.push(format!("{column} = ${}", binds.len()));
}

#[derive(Clone)]
enum Runner {
    Pool(PgPool),
    Tx(Arc<Mutex<Option<Transaction<'static, Postgres>>>>),
}

/// The task-state repository. Cheaply `Clone`; transaction-scoped instances returned
/// by [`TaskStateRepository::with_transaction`] share the same underlying connection.
#[derive(Clone)]
pub struct TaskStateRepository {
    runner: Runner,
}

impl TaskStateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            runner: Runner::Pool(pool),
        }
    }

    /// Runs `f` against a repository scoped to a single transaction, committing on
    /// `Ok` and rolling back (by dropping the transaction) on `Err`.
    pub async fn with_transaction<F, Fut, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(TaskStateRepository) -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let pool = match &self.runner {
            Runner::Pool(pool) => pool.clone(),
            Runner::Tx(_) => {
                return Err(TaskStateError::Other(anyhow::anyhow!(
                    "nested transactions are not supported"
                )))
            }
        };
        let tx = pool.begin().await?;
        let slot = Arc::new(Mutex::new(Some(tx)));
        let scoped = TaskStateRepository {
            runner: Runner::Tx(slot.clone()),
        };
        let result = f(scoped).await;
        let mut guard = slot.lock().await;
        match (result, guard.take()) {
            (Ok(value), Some(tx)) => {
                tx.commit().await?;
                Ok(value)
            }
            (Ok(value), None) => Ok(value),
            (Err(err), _) => Err(err),
        }
    }

    async fn fetch_one<T>(&self, query: QueryAs<'_, Postgres, T, PgArguments>) -> Result<T>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        match &self.runner {
            Runner::Pool(pool) => Ok(query.fetch_one(pool).await?),
            Runner::Tx(slot) => {
                let mut guard = slot.lock().await;
                let tx = guard
                    .as_mut()
                    .ok_or_else(|| TaskStateError::Other(anyhow::anyhow!("transaction closed")))?;
                Ok(query.fetch_one(&mut **tx).await?)
            }
        }
    }

    async fn fetch_optional<T>(
        &self,
        query: QueryAs<'_, Postgres, T, PgArguments>,
    ) -> Result<Option<T>>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        match &self.runner {
            Runner::Pool(pool) => Ok(query.fetch_optional(pool).await?),
            Runner::Tx(slot) => {
                let mut guard = slot.lock().await;
                let tx = guard
                    .as_mut()
                    .ok_or_else(|| TaskStateError::Other(anyhow::anyhow!("transaction closed")))?;
                Ok(query.fetch_optional(&mut **tx).await?)
            }
        }
    }

    async fn fetch_all<T>(&self, query: QueryAs<'_, Postgres, T, PgArguments>) -> Result<Vec<T>>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        match &self.runner {
            Runner::Pool(pool) => Ok(query.fetch_all(pool).await?),
            Runner::Tx(slot) => {
                let mut guard = slot.lock().await;
                let tx = guard
                    .as_mut()
                    .ok_or_else(|| TaskStateError::Other(anyhow::anyhow!("transaction closed")))?;
                Ok(query.fetch_all(&mut **tx).await?)
            }
        }
    }

    async fn execute(&self, query: Query<'_, Postgres, PgArguments>) -> Result<u64> {
        match &self.runner {
            Runner::Pool(pool) => Ok(query.execute(pool).await?.rows_affected()),
            Runner::Tx(slot) => {
                let mut guard = slot.lock().await;
                let tx = guard
                    .as_mut()
                    .ok_or_else(|| TaskStateError::Other(anyhow::anyhow!("transaction closed")))?;
                Ok(query.execute(&mut **tx).await?.rows_affected())
            }
        }
    }

    #[tracing::instrument(skip(self, state))]
    pub async fn upsert_state(&self, state: NewTaskState) -> Result<TaskState> {
        let input = jsonb::to_json_value(state.input.as_ref())?;
        let output = jsonb::to_json_value(state.output.as_ref())?;
        let error = jsonb::to_json_value(state.error.as_ref())?;
        let sql = format!(
            r#"
            INSERT INTO task_states (
                task_exec_id, workflow_exec_id, workflow_id, task_id,
                parent_task_exec_id, component, agent_id, action_id, tool_id,
                execution_type, status, input, output, error, created_at, updated_at
            ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14, now(), now())
            ON CONFLICT (task_exec_id) DO UPDATE SET
                status = EXCLUDED.status,
                agent_id = EXCLUDED.agent_id,
                action_id = EXCLUDED.action_id,
                tool_id = EXCLUDED.tool_id,
                input = EXCLUDED.input,
                output = EXCLUDED.output,
                error = EXCLUDED.error,
                updated_at = now()
            RETURNING {STATE_COLUMNS}
            "#
        );
        let row: TaskStateRow = self
            .fetch_one(
                sqlx::query_as(&sql)
                    .bind(state.task_exec_id.as_str())
                    .bind(state.workflow_exec_id.as_str())
                    .bind(&state.workflow_id)
                    .bind(&state.task_id)
                    .bind(state.parent_task_exec_id.as_ref().map(Id::as_str))
                    .bind(state.component.as_str())
                    .bind(&state.agent_id)
                    .bind(&state.action_id)
                    .bind(&state.tool_id)
                    .bind(&state.execution_type)
                    .bind(state.status.as_str())
                    .bind(input)
                    .bind(output)
                    .bind(error),
            )
            .await?;
        debug!(task_exec_id = %row.task_exec_id, status = %row.status, "task state upserted");
        row.into_domain().map_err(Into::into)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_state(&self, task_exec_id: &Id) -> Result<Option<TaskState>> {
        let sql = format!("SELECT {STATE_COLUMNS} FROM task_states WHERE task_exec_id = $1");
        let row: Option<TaskStateRow> = self
            .fetch_optional(sqlx::query_as(&sql).bind(task_exec_id.as_str()))
            .await?;
        row.map(TaskStateRow::into_domain).transpose().map_err(Into::into)
    }

    /// Like `get_state`, but locks the row (`SELECT ... FOR UPDATE`). Must be called
    /// through [`Self::with_transaction`] — the lock is released at commit/rollback.
    #[tracing::instrument(skip(self))]
    pub async fn get_state_for_update(&self, task_exec_id: &Id) -> Result<Option<TaskState>> {
        if matches!(self.runner, Runner::Pool(_)) {
            return Err(TaskStateError::not_in_transaction());
        }
        let sql =
            format!("SELECT {STATE_COLUMNS} FROM task_states WHERE task_exec_id = $1 FOR UPDATE");
        let row: Option<TaskStateRow> = self
            .fetch_optional(sqlx::query_as(&sql).bind(task_exec_id.as_str()))
            .await?;
        row.map(TaskStateRow::into_domain).transpose().map_err(Into::into)
    }

    /// Rows matching the conjunction of every predicate set on `filter`. An all-`None`
    /// filter returns every row in the store.
    pub async fn list_states(&self, filter: &ListStatesFilter) -> Result<Vec<TaskState>> {
        let mut clauses: Vec<String> = Vec::new();
        let mut binds: Vec<String> = Vec::new();

        if let Some(status) = &filter.status {
            push_filter(&mut clauses, &mut binds, "status", status.as_str().to_string());
        }
        if let Some(workflow_id) = &filter.workflow_id {
            push_filter(&mut clauses, &mut binds, "workflow_id", workflow_id.clone());
        }
        if let Some(workflow_exec_id) = &filter.workflow_exec_id {
            push_filter(
                &mut clauses,
                &mut binds,
                "workflow_exec_id",
                workflow_exec_id.as_str().to_string(),
            );
        }
        if let Some(task_id) = &filter.task_id {
            push_filter(&mut clauses, &mut binds, "task_id", task_id.clone());
        }
        if let Some(task_exec_id) = &filter.task_exec_id {
            push_filter(&mut clauses, &mut binds, "task_exec_id", task_exec_id.as_str().to_string());
        }
        if let Some(parent_task_exec_id) = &filter.parent_task_exec_id {
            push_filter(
                &mut clauses,
                &mut binds,
                "parent_task_exec_id",
                parent_task_exec_id.as_str().to_string(),
            );
        }
        if let Some(agent_id) = &filter.agent_id {
            push_filter(&mut clauses, &mut binds, "agent_id", agent_id.clone());
        }
        if let Some(action_id) = &filter.action_id {
            push_filter(&mut clauses, &mut binds, "action_id", action_id.clone());
        }
        if let Some(tool_id) = &filter.tool_id {
            push_filter(&mut clauses, &mut binds, "tool_id", tool_id.clone());
        }
        if let Some(execution_type) = &filter.execution_type {
            push_filter(&mut clauses, &mut binds, "execution_type", execution_type.clone());
        }

        let where_clause =
            if clauses.is_empty() { String::new() } else { format!("WHERE {}", clauses.join(" AND ")) };
        let sql = format!("SELECT {STATE_COLUMNS} FROM task_states {where_clause} ORDER BY created_at");
        let mut query = sqlx::query_as(&sql);
        for bind in &binds {
            query = query.bind(bind.as_str());
        }
        let rows: Vec<TaskStateRow> = self.fetch_all(query).await?;
        rows.into_iter().map(TaskStateRow::into_domain).collect::<std::result::Result<_, _>>().map_err(Into::into)
    }

    /// One row per distinct `task_id` in the workflow execution — the tasks/agents/
    /// tools it ran, excluding the workflow's own row, selecting whichever attempt has
    /// the greatest `created_at` when a task was retried.
    pub async fn list_tasks_in_workflow(&self, workflow_exec_id: &Id) -> Result<Vec<TaskState>> {
        let sql = format!(
            "SELECT DISTINCT ON (task_id) {STATE_COLUMNS} FROM task_states \
             WHERE workflow_exec_id = $1 AND component <> 'workflow' \
             ORDER BY task_id, created_at DESC"
        );
        let rows: Vec<TaskStateRow> = self
            .fetch_all(sqlx::query_as(&sql).bind(workflow_exec_id.as_str()))
            .await?;
        rows.into_iter().map(TaskStateRow::into_domain).collect::<std::result::Result<_, _>>().map_err(Into::into)
    }

    pub async fn list_tasks_by_status(
        &self,
        workflow_exec_id: &Id,
        status: TaskStatus,
    ) -> Result<Vec<TaskState>> {
        let sql = format!(
            "SELECT {STATE_COLUMNS} FROM task_states \
             WHERE workflow_exec_id = $1 AND status = $2 ORDER BY created_at"
        );
        let rows: Vec<TaskStateRow> = self
            .fetch_all(
                sqlx::query_as(&sql)
                    .bind(workflow_exec_id.as_str())
                    .bind(status.as_str()),
            )
            .await?;
        rows.into_iter().map(TaskStateRow::into_domain).collect::<std::result::Result<_, _>>().map_err(Into::into)
    }

    pub async fn list_tasks_by_agent(
        &self,
        workflow_exec_id: &Id,
        agent_id: &str,
    ) -> Result<Vec<TaskState>> {
        let sql = format!(
            "SELECT {STATE_COLUMNS} FROM task_states \
             WHERE workflow_exec_id = $1 AND agent_id = $2 ORDER BY created_at"
        );
        let rows: Vec<TaskStateRow> = self
            .fetch_all(sqlx::query_as(&sql).bind(workflow_exec_id.as_str()).bind(agent_id))
            .await?;
        rows.into_iter().map(TaskStateRow::into_domain).collect::<std::result::Result<_, _>>().map_err(Into::into)
    }

    pub async fn list_tasks_by_tool(
        &self,
        workflow_exec_id: &Id,
        tool_id: &str,
    ) -> Result<Vec<TaskState>> {
        let sql = format!(
            "SELECT {STATE_COLUMNS} FROM task_states \
             WHERE workflow_exec_id = $1 AND tool_id = $2 ORDER BY created_at"
        );
        let rows: Vec<TaskStateRow> = self
            .fetch_all(sqlx::query_as(&sql).bind(workflow_exec_id.as_str()).bind(tool_id))
            .await?;
        rows.into_iter().map(TaskStateRow::into_domain).collect::<std::result::Result<_, _>>().map_err(Into::into)
    }

    pub async fn list_children(&self, parent_task_exec_id: &Id) -> Result<Vec<TaskState>> {
        let sql = format!(
            "SELECT {STATE_COLUMNS} FROM task_states \
             WHERE parent_task_exec_id = $1 ORDER BY created_at"
        );
        let rows: Vec<TaskStateRow> = self
            .fetch_all(sqlx::query_as(&sql).bind(parent_task_exec_id.as_str()))
            .await?;
        rows.into_iter().map(TaskStateRow::into_domain).collect::<std::result::Result<_, _>>().map_err(Into::into)
    }

    pub async fn list_children_outputs(
        &self,
        parent_task_exec_id: &Id,
    ) -> Result<Vec<ChildOutput>> {
        #[derive(sqlx::FromRow)]
        struct Row {
            task_id: String,
            output: Option<serde_json::Value>,
        }
        let rows: Vec<Row> = self
            .fetch_all(
                sqlx::query_as(
                    "SELECT task_id, output FROM task_states \
                     WHERE parent_task_exec_id = $1 ORDER BY created_at",
                )
                .bind(parent_task_exec_id.as_str()),
            )
            .await?;
        rows.into_iter()
            .filter(|r| r.output.is_some())
            .map(|r| {
                Ok(ChildOutput {
                    task_id: r.task_id,
                    output: jsonb::from_json_value(r.output)?,
                })
            })
            .collect::<Result<Vec<_>>>()
    }

    /// The most recently created child with the given `task_id` — the latest attempt,
    /// when the task was retried more than once.
    pub async fn get_child_by_task_id(
        &self,
        parent_task_exec_id: &Id,
        task_id: &str,
    ) -> Result<Option<TaskState>> {
        let sql = format!(
            "SELECT {STATE_COLUMNS} FROM task_states \
             WHERE parent_task_exec_id = $1 AND task_id = $2 \
             ORDER BY created_at DESC LIMIT 1"
        );
        let row: Option<TaskStateRow> = self
            .fetch_optional(
                sqlx::query_as(&sql)
                    .bind(parent_task_exec_id.as_str())
                    .bind(task_id),
            )
            .await?;
        row.map(TaskStateRow::into_domain).transpose().map_err(Into::into)
    }

    /// The full subtree rooted at `task_exec_id`, breadth-first by depth, down to
    /// `max_depth` levels below the root (the root itself is depth 0 and always
    /// included).
    pub async fn get_task_tree(
        &self,
        task_exec_id: &Id,
        max_depth: i64,
    ) -> Result<Vec<TaskTreeNode>> {
        #[derive(sqlx::FromRow)]
        struct Row {
            task_exec_id: String,
            workflow_exec_id: String,
            workflow_id: String,
            task_id: String,
            parent_task_exec_id: Option<String>,
            component: String,
            agent_id: Option<String>,
            action_id: Option<String>,
            tool_id: Option<String>,
            execution_type: String,
            status: String,
            input: Option<serde_json::Value>,
            output: Option<serde_json::Value>,
            error: Option<serde_json::Value>,
            created_at: chrono::DateTime<chrono::Utc>,
            updated_at: chrono::DateTime<chrono::Utc>,
            depth: i64,
        }
        let sql = r#"
            WITH RECURSIVE tree AS (
                SELECT t.*, 0::bigint AS depth
                FROM task_states t
                WHERE t.task_exec_id = $1
                UNION ALL
                SELECT c.*, tr.depth + 1
                FROM task_states c
                JOIN tree tr ON c.parent_task_exec_id = tr.task_exec_id
                WHERE tr.depth + 1 < $2
            )
            SELECT task_exec_id, workflow_exec_id, workflow_id, task_id,
                   parent_task_exec_id, component, agent_id, action_id, tool_id,
                   execution_type, status, input, output, error, created_at, updated_at, depth
            FROM tree
            ORDER BY depth, created_at
        "#;
        let rows: Vec<Row> = self
            .fetch_all(sqlx::query_as(sql).bind(task_exec_id.as_str()).bind(max_depth))
            .await?;
        rows.into_iter()
            .map(|r| {
                let state = TaskStateRow {
                    task_exec_id: r.task_exec_id,
                    workflow_exec_id: r.workflow_exec_id,
                    workflow_id: r.workflow_id,
                    task_id: r.task_id,
                    parent_task_exec_id: r.parent_task_exec_id,
                    component: r.component,
                    agent_id: r.agent_id,
                    action_id: r.action_id,
                    tool_id: r.tool_id,
                    execution_type: r.execution_type,
                    status: r.status,
                    input: r.input,
                    output: r.output,
                    error: r.error,
                    created_at: r.created_at,
                    updated_at: r.updated_at,
                }
                .into_domain()?;
                Ok(TaskTreeNode { state, depth: r.depth })
            })
            .collect::<Result<Vec<_>>>()
    }

    pub async fn get_progress_info(&self, parent_task_exec_id: &Id) -> Result<ProgressInfo> {
        #[derive(sqlx::FromRow)]
        struct Row {
            total_children: i64,
            pending_count: i64,
            running_count: i64,
            success_count: i64,
            failed_count: i64,
            canceled_count: i64,
            waiting_count: i64,
            paused_count: i64,
            timed_out_count: i64,
        }
        let sql = r#"
            SELECT
                COUNT(*) AS total_children,
                COUNT(*) FILTER (WHERE status = 'pending') AS pending_count,
                COUNT(*) FILTER (WHERE status = 'running') AS running_count,
                COUNT(*) FILTER (WHERE status = 'success') AS success_count,
                COUNT(*) FILTER (WHERE status = 'failed') AS failed_count,
                COUNT(*) FILTER (WHERE status = 'canceled') AS canceled_count,
                COUNT(*) FILTER (WHERE status = 'waiting') AS waiting_count,
                COUNT(*) FILTER (WHERE status = 'paused') AS paused_count,
                COUNT(*) FILTER (WHERE status = 'timed_out') AS timed_out_count
            FROM task_states
            WHERE parent_task_exec_id = $1
        "#;
        let row: Row = self
            .fetch_optional(sqlx::query_as(sql).bind(parent_task_exec_id.as_str()))
            .await?
            .unwrap_or(Row {
                total_children: 0,
                pending_count: 0,
                running_count: 0,
                success_count: 0,
                failed_count: 0,
                canceled_count: 0,
                waiting_count: 0,
                paused_count: 0,
                timed_out_count: 0,
            });
        Ok(ProgressInfo::from_counts(
            row.total_children,
            row.pending_count,
            row.running_count,
            row.success_count,
            row.failed_count,
            row.canceled_count,
            row.waiting_count,
            row.paused_count,
            row.timed_out_count,
        ))
    }

    /// Deletes a single row by id. Present for test cleanup and cascading deletes from
    /// higher layers; not part of the read path above.
    pub async fn delete_state(&self, task_exec_id: &Id) -> Result<bool> {
        let affected = self
            .execute(
                sqlx::query("DELETE FROM task_states WHERE task_exec_id = $1")
                    .bind(task_exec_id.as_str()),
            )
            .await?;
        Ok(affected > 0)
    }
}
