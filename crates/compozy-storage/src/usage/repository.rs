//! Repository for `execution_llm_usage`: upsert and aggregation.

use std::collections::HashMap;

use compozy_core::{scan, Id};
use sqlx::error::DatabaseError;
use sqlx::PgPool;
use tracing::debug;

use super::error::{Result, UsageError};
use super::model::{LlmUsage, NewLlmUsage, UsageRow, UsageSummary, UsageSummaryEntry};

const USAGE_COLUMNS: &str = "id, task_exec_id, workflow_exec_id, component, agent_id, \
     provider, model, prompt_tokens, completion_tokens, total_tokens, reasoning_tokens, \
     cached_prompt_tokens, input_audio_tokens, output_audio_tokens, created_at, updated_at";

#[derive(Clone)]
pub struct UsageRepository {
    pool: PgPool,
}

impl UsageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_id(input: &NewLlmUsage) -> String {
        match (&input.task_exec_id, &input.workflow_exec_id) {
            (Some(task_exec_id), _) => {
                format!("task:{}:{}", task_exec_id.as_str(), input.component.as_str())
            }
            (None, Some(workflow_exec_id)) => {
                format!("workflow:{}:{}", workflow_exec_id.as_str(), input.component.as_str())
            }
            (None, None) => String::new(),
        }
    }

    fn map_upsert_error(err: sqlx::Error) -> UsageError {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_foreign_key_violation() {
                return UsageError::referenced_execution_not_found(db_err.message().to_string());
            }
        }
        UsageError::from(err)
    }

    /// Replaces the row for `input`'s `(execution, component)` key with its token
    /// counts, creating the row on first use. The conflict target differs by scope —
    /// task-scoped rows upsert on `(task_exec_id, component)`, workflow-scoped rows on
    /// `(workflow_exec_id, component)`, matching the table's two partial unique indexes.
    /// A second call with the same key replaces every field rather than accumulating —
    /// callers that want running totals must read-then-add themselves.
    #[tracing::instrument(skip(self, input))]
    pub async fn upsert(&self, input: NewLlmUsage) -> Result<LlmUsage> {
        if input.provider.trim().is_empty() {
            return Err(UsageError::validation("provider must not be empty"));
        }
        if input.model.trim().is_empty() {
            return Err(UsageError::validation("model must not be empty"));
        }
        if input.task_exec_id.is_none() && input.workflow_exec_id.is_none() {
            return Err(UsageError::validation(
                "at least one of task_exec_id or workflow_exec_id must be set",
            ));
        }

        let id = Self::row_id(&input);
        let row: UsageRow = if let Some(task_exec_id) = &input.task_exec_id {
            let sql = format!(
                r#"
                INSERT INTO execution_llm_usage (
                    id, task_exec_id, workflow_exec_id, component, agent_id, provider, model,
                    prompt_tokens, completion_tokens, total_tokens, reasoning_tokens,
                    cached_prompt_tokens, input_audio_tokens, output_audio_tokens,
                    created_at, updated_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, now(), now())
                ON CONFLICT (task_exec_id, component) WHERE task_exec_id IS NOT NULL
                DO UPDATE SET
                    workflow_exec_id = EXCLUDED.workflow_exec_id,
                    agent_id = EXCLUDED.agent_id,
                    provider = EXCLUDED.provider,
                    model = EXCLUDED.model,
                    prompt_tokens = EXCLUDED.prompt_tokens,
                    completion_tokens = EXCLUDED.completion_tokens,
                    total_tokens = EXCLUDED.total_tokens,
                    reasoning_tokens = EXCLUDED.reasoning_tokens,
                    cached_prompt_tokens = EXCLUDED.cached_prompt_tokens,
                    input_audio_tokens = EXCLUDED.input_audio_tokens,
                    output_audio_tokens = EXCLUDED.output_audio_tokens,
                    updated_at = now()
                RETURNING {USAGE_COLUMNS}
                "#
            );
            sqlx::query_as(&sql)
                .bind(&id)
                .bind(task_exec_id.as_str())
                .bind(input.workflow_exec_id.as_ref().map(Id::as_str))
                .bind(input.component.as_str())
                .bind(&input.agent_id)
                .bind(&input.provider)
                .bind(&input.model)
                .bind(input.prompt_tokens)
                .bind(input.completion_tokens)
                .bind(input.total_tokens)
                .bind(input.reasoning_tokens)
                .bind(input.cached_prompt_tokens)
                .bind(input.input_audio_tokens)
                .bind(input.output_audio_tokens)
                .fetch_one(&self.pool)
                .await
                .map_err(Self::map_upsert_error)?
        } else {
            let workflow_exec_id = input.workflow_exec_id.as_ref().expect("validated above");
            let sql = format!(
                r#"
                INSERT INTO execution_llm_usage (
                    id, task_exec_id, workflow_exec_id, component, agent_id, provider, model,
                    prompt_tokens, completion_tokens, total_tokens, reasoning_tokens,
                    cached_prompt_tokens, input_audio_tokens, output_audio_tokens,
                    created_at, updated_at
                ) VALUES ($1, NULL, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, now(), now())
                ON CONFLICT (workflow_exec_id, component) WHERE task_exec_id IS NULL
                DO UPDATE SET
                    agent_id = EXCLUDED.agent_id,
                    provider = EXCLUDED.provider,
                    model = EXCLUDED.model,
                    prompt_tokens = EXCLUDED.prompt_tokens,
                    completion_tokens = EXCLUDED.completion_tokens,
                    total_tokens = EXCLUDED.total_tokens,
                    reasoning_tokens = EXCLUDED.reasoning_tokens,
                    cached_prompt_tokens = EXCLUDED.cached_prompt_tokens,
                    input_audio_tokens = EXCLUDED.input_audio_tokens,
                    output_audio_tokens = EXCLUDED.output_audio_tokens,
                    updated_at = now()
                RETURNING {USAGE_COLUMNS}
                "#
            );
            sqlx::query_as(&sql)
                .bind(&id)
                .bind(workflow_exec_id.as_str())
                .bind(input.component.as_str())
                .bind(&input.agent_id)
                .bind(&input.provider)
                .bind(&input.model)
                .bind(input.prompt_tokens)
                .bind(input.completion_tokens)
                .bind(input.total_tokens)
                .bind(input.reasoning_tokens)
                .bind(input.cached_prompt_tokens)
                .bind(input.input_audio_tokens)
                .bind(input.output_audio_tokens)
                .fetch_one(&self.pool)
                .await
                .map_err(Self::map_upsert_error)?
        };
        debug!(usage_id = %row.id, provider = %row.provider, model = %row.model, "usage upserted");
        row.into_domain()
    }

    pub async fn get_by_task_exec_id(&self, task_exec_id: &Id) -> Result<Vec<LlmUsage>> {
        let sql = format!(
            "SELECT {USAGE_COLUMNS} FROM execution_llm_usage \
             WHERE task_exec_id = $1 ORDER BY provider, model"
        );
        let rows: Vec<UsageRow> =
            scan::scan_all(sqlx::query_as(&sql).bind(task_exec_id.as_str()), &self.pool).await?;
        rows.into_iter().map(UsageRow::into_domain).collect()
    }

    /// Every usage row attributable to the workflow execution: its own workflow-scoped
    /// row (if any) plus every task-scoped row whose task belongs to it.
    pub async fn get_by_workflow_exec_id(&self, workflow_exec_id: &Id) -> Result<Vec<LlmUsage>> {
        let sql = format!(
            r#"
            SELECT u.id, u.task_exec_id, u.workflow_exec_id, u.component, u.agent_id,
                   u.provider, u.model, u.prompt_tokens, u.completion_tokens, u.total_tokens,
                   u.reasoning_tokens, u.cached_prompt_tokens, u.input_audio_tokens,
                   u.output_audio_tokens, u.created_at, u.updated_at
            FROM execution_llm_usage u
            LEFT JOIN task_states ts ON ts.task_exec_id = u.task_exec_id
            WHERE u.workflow_exec_id = $1 OR ts.workflow_exec_id = $1
            ORDER BY u.provider, u.model
            "#
        );
        let rows: Vec<UsageRow> = scan::scan_all(
            sqlx::query_as(&sql).bind(workflow_exec_id.as_str()),
            &self.pool,
        )
        .await?;
        rows.into_iter().map(UsageRow::into_domain).collect()
    }

    /// Aggregated usage of the workflow's task-scoped calls only. The workflow's own
    /// usage row is excluded — including it would double-count a rollup of a rollup.
    pub async fn summarize_by_workflow_exec_id(
        &self,
        workflow_exec_id: &Id,
    ) -> Result<UsageSummary> {
        #[derive(sqlx::FromRow)]
        struct Row {
            provider: String,
            model: String,
            prompt_tokens: i64,
            completion_tokens: i64,
            total_tokens: i64,
            reasoning_tokens: Option<i64>,
            cached_prompt_tokens: Option<i64>,
            input_audio_tokens: Option<i64>,
            output_audio_tokens: Option<i64>,
        }
        let sql = r#"
            SELECT u.provider, u.model,
                   SUM(u.prompt_tokens) AS prompt_tokens,
                   SUM(u.completion_tokens) AS completion_tokens,
                   SUM(u.total_tokens) AS total_tokens,
                   SUM(u.reasoning_tokens)::bigint AS reasoning_tokens,
                   SUM(u.cached_prompt_tokens)::bigint AS cached_prompt_tokens,
                   SUM(u.input_audio_tokens)::bigint AS input_audio_tokens,
                   SUM(u.output_audio_tokens)::bigint AS output_audio_tokens
            FROM execution_llm_usage u
            LEFT JOIN task_states ts ON ts.task_exec_id = u.task_exec_id
            WHERE ts.workflow_exec_id = $1
            GROUP BY u.provider, u.model
            ORDER BY u.provider, u.model
        "#;
        let rows: Vec<Row> =
            scan::scan_all(sqlx::query_as(sql).bind(workflow_exec_id.as_str()), &self.pool)
                .await?;
        let entries = rows
            .into_iter()
            .map(|r| UsageSummaryEntry {
                provider: r.provider,
                model: r.model,
                prompt_tokens: r.prompt_tokens,
                completion_tokens: r.completion_tokens,
                total_tokens: r.total_tokens,
                reasoning_tokens: r.reasoning_tokens,
                cached_prompt_tokens: r.cached_prompt_tokens,
                input_audio_tokens: r.input_audio_tokens,
                output_audio_tokens: r.output_audio_tokens,
            })
            .collect();
        Ok(UsageSummary::from_entries(workflow_exec_id.clone(), entries))
    }

    /// Batch form of [`Self::summarize_by_workflow_exec_id`]: one query, grouped by
    /// `workflow_exec_id` in memory afterward. Every id in `workflow_exec_ids` gets a
    /// `UsageSummary` in the result, empty if it had no task-scoped usage.
    pub async fn summaries_by_workflow_exec_ids(
        &self,
        workflow_exec_ids: &[Id],
    ) -> Result<Vec<UsageSummary>> {
        #[derive(sqlx::FromRow)]
        struct Row {
            workflow_exec_id: String,
            provider: String,
            model: String,
            prompt_tokens: i64,
            completion_tokens: i64,
            total_tokens: i64,
            reasoning_tokens: Option<i64>,
            cached_prompt_tokens: Option<i64>,
            input_audio_tokens: Option<i64>,
            output_audio_tokens: Option<i64>,
        }
        if workflow_exec_ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<String> = workflow_exec_ids.iter().map(|id| id.as_str().to_string()).collect();
        let sql = r#"
            SELECT ts.workflow_exec_id AS workflow_exec_id, u.provider, u.model,
                   SUM(u.prompt_tokens) AS prompt_tokens,
                   SUM(u.completion_tokens) AS completion_tokens,
                   SUM(u.total_tokens) AS total_tokens,
                   SUM(u.reasoning_tokens)::bigint AS reasoning_tokens,
                   SUM(u.cached_prompt_tokens)::bigint AS cached_prompt_tokens,
                   SUM(u.input_audio_tokens)::bigint AS input_audio_tokens,
                   SUM(u.output_audio_tokens)::bigint AS output_audio_tokens
            FROM execution_llm_usage u
            LEFT JOIN task_states ts ON ts.task_exec_id = u.task_exec_id
            WHERE ts.workflow_exec_id = ANY($1)
            GROUP BY ts.workflow_exec_id, u.provider, u.model
            ORDER BY ts.workflow_exec_id, u.provider, u.model
        "#;
        let rows: Vec<Row> = scan::scan_all(sqlx::query_as(sql).bind(&ids[..]), &self.pool).await?;

        let mut by_workflow: HashMap<String, Vec<UsageSummaryEntry>> = HashMap::new();
        for row in rows {
            by_workflow.entry(row.workflow_exec_id).or_default().push(UsageSummaryEntry {
                provider: row.provider,
                model: row.model,
                prompt_tokens: row.prompt_tokens,
                completion_tokens: row.completion_tokens,
                total_tokens: row.total_tokens,
                reasoning_tokens: row.reasoning_tokens,
                cached_prompt_tokens: row.cached_prompt_tokens,
                input_audio_tokens: row.input_audio_tokens,
                output_audio_tokens: row.output_audio_tokens,
            });
        }

        Ok(workflow_exec_ids
            .iter()
            .map(|id| {
                let entries = by_workflow.remove(id.as_str()).unwrap_or_default();
                UsageSummary::from_entries(id.clone(), entries)
            })
            .collect())
    }
}
