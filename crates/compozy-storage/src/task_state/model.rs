//! Row and domain shapes for `task_states`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use compozy_core::{jsonb, Id, Output};
use serde::{Deserialize, Serialize};

use super::error::TaskStateError;

/// Lifecycle status of a task execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Waiting,
    Paused,
    Success,
    Failed,
    Canceled,
    TimedOut,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Waiting => "waiting",
            TaskStatus::Paused => "paused",
            TaskStatus::Success => "success",
            TaskStatus::Failed => "failed",
            TaskStatus::Canceled => "canceled",
            TaskStatus::TimedOut => "timed_out",
        }
    }

    /// True for statuses a task cannot leave once reached.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Success | TaskStatus::Failed | TaskStatus::Canceled | TaskStatus::TimedOut
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = TaskStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "waiting" => Ok(Self::Waiting),
            "paused" => Ok(Self::Paused),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            "canceled" => Ok(Self::Canceled),
            "timed_out" => Ok(Self::TimedOut),
            other => Err(TaskStateError::invalid_status(other)),
        }
    }
}

/// What kind of node in the hierarchy a `task_states` row represents. The workflow's
/// own row (`component == Workflow`) is excluded from usage summaries — see
/// `compozy_storage::usage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskComponent {
    Workflow,
    Task,
    Agent,
    Tool,
}

impl TaskComponent {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskComponent::Workflow => "workflow",
            TaskComponent::Task => "task",
            TaskComponent::Agent => "agent",
            TaskComponent::Tool => "tool",
        }
    }
}

impl fmt::Display for TaskComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskComponent {
    type Err = TaskStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "workflow" => Ok(Self::Workflow),
            "task" => Ok(Self::Task),
            "agent" => Ok(Self::Agent),
            "tool" => Ok(Self::Tool),
            other => Err(TaskStateError::invalid_component(other)),
        }
    }
}

/// The raw shape of a `task_states` row, decoded directly by sqlx. Converted into
/// [`TaskState`] at the repository boundary so enum validity is checked exactly once.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct TaskStateRow {
    pub task_exec_id: String,
    pub workflow_exec_id: String,
    pub workflow_id: String,
    pub task_id: String,
    pub parent_task_exec_id: Option<String>,
    pub component: String,
    pub agent_id: Option<String>,
    pub action_id: Option<String>,
    pub tool_id: Option<String>,
    pub execution_type: String,
    pub status: String,
    pub input: Option<serde_json::Value>,
    pub output: Option<serde_json::Value>,
    pub error: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskStateRow {
    pub(crate) fn into_domain(self) -> Result<TaskState, TaskStateError> {
        Ok(TaskState {
            task_exec_id: Id::from(self.task_exec_id),
            workflow_exec_id: Id::from(self.workflow_exec_id),
            workflow_id: self.workflow_id,
            task_id: self.task_id,
            parent_task_exec_id: self.parent_task_exec_id.map(Id::from),
            component: self.component.parse()?,
            agent_id: self.agent_id,
            action_id: self.action_id,
            tool_id: self.tool_id,
            execution_type: self.execution_type,
            status: self.status.parse()?,
            input: jsonb::from_json_value(self.input)?,
            output: jsonb::from_json_value(self.output)?,
            error: jsonb::from_json_value(self.error)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// A fully decoded `task_states` row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskState {
    pub task_exec_id: Id,
    pub workflow_exec_id: Id,
    pub workflow_id: String,
    pub task_id: String,
    pub parent_task_exec_id: Option<Id>,
    pub component: TaskComponent,
    pub agent_id: Option<String>,
    pub action_id: Option<String>,
    pub tool_id: Option<String>,
    pub execution_type: String,
    pub status: TaskStatus,
    pub input: Option<Output>,
    pub output: Option<Output>,
    pub error: Option<Output>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A [`TaskState`] annotated with its depth in a `GetTaskTree` result, 0 at the root.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskTreeNode {
    pub state: TaskState,
    pub depth: i64,
}

/// Input to `UpsertState`: every field the repository can set on insert or update.
#[derive(Debug, Clone)]
pub struct NewTaskState {
    pub task_exec_id: Id,
    pub workflow_exec_id: Id,
    pub workflow_id: String,
    pub task_id: String,
    pub parent_task_exec_id: Option<Id>,
    pub component: TaskComponent,
    pub agent_id: Option<String>,
    pub action_id: Option<String>,
    pub tool_id: Option<String>,
    pub execution_type: String,
    pub status: TaskStatus,
    pub input: Option<Output>,
    pub output: Option<Output>,
    pub error: Option<Output>,
}

/// A conjunction of optional equality predicates for `ListStates`. Every field left
/// `None` is simply omitted from the query; an all-`None` filter returns every row.
#[derive(Debug, Clone, Default)]
pub struct ListStatesFilter {
    pub status: Option<TaskStatus>,
    pub workflow_id: Option<String>,
    pub workflow_exec_id: Option<Id>,
    pub task_id: Option<String>,
    pub task_exec_id: Option<Id>,
    pub parent_task_exec_id: Option<Id>,
    pub agent_id: Option<String>,
    pub action_id: Option<String>,
    pub tool_id: Option<String>,
    pub execution_type: Option<String>,
}

/// Child-status counts of a parent task, as returned by `GetProgressInfo`, plus the
/// derived rates spec'd alongside them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ProgressInfo {
    pub total_children: i64,
    pub pending_count: i64,
    pub running_count: i64,
    pub success_count: i64,
    pub failed_count: i64,
    pub canceled_count: i64,
    pub waiting_count: i64,
    pub paused_count: i64,
    pub timed_out_count: i64,
    /// `success + failed + canceled + timed_out`.
    pub terminal_count: i64,
    /// `running + waiting + paused` — distinct from the raw `running_count` bucket,
    /// which only counts the `running` status itself. Pending is excluded.
    pub in_progress_count: i64,
    /// `success / total_children`, or 0 when there are no children.
    pub completion_rate: f64,
    /// `(failed + timed_out) / total_children`, or 0 when there are no children.
    /// Canceled does not contribute.
    pub failure_rate: f64,
}

impl ProgressInfo {
    pub(crate) fn from_counts(
        total_children: i64,
        pending_count: i64,
        running_count: i64,
        success_count: i64,
        failed_count: i64,
        canceled_count: i64,
        waiting_count: i64,
        paused_count: i64,
        timed_out_count: i64,
    ) -> Self {
        let terminal_count = success_count + failed_count + canceled_count + timed_out_count;
        let in_progress_count = running_count + waiting_count + paused_count;
        let (completion_rate, failure_rate) = if total_children > 0 {
            (
                success_count as f64 / total_children as f64,
                (failed_count + timed_out_count) as f64 / total_children as f64,
            )
        } else {
            (0.0, 0.0)
        };
        Self {
            total_children,
            pending_count,
            running_count,
            success_count,
            failed_count,
            canceled_count,
            waiting_count,
            paused_count,
            timed_out_count,
            terminal_count,
            in_progress_count,
            completion_rate,
            failure_rate,
        }
    }

    /// True once every child has reached a terminal status and there is at least one
    /// child to begin with.
    pub fn is_complete(&self) -> bool {
        self.total_children > 0 && self.terminal_count == self.total_children
    }
}

/// A child's task id paired with its output, the projection `ListChildrenOutputs`
/// returns instead of the full row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChildOutput {
    pub task_id: String,
    pub output: Option<Output>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_status_roundtrips_through_its_string_form() {
        for status in [
            TaskStatus::Pending,
            TaskStatus::Running,
            TaskStatus::Waiting,
            TaskStatus::Paused,
            TaskStatus::Success,
            TaskStatus::Failed,
            TaskStatus::Canceled,
            TaskStatus::TimedOut,
        ] {
            let parsed: TaskStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!("bogus".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn terminal_statuses() {
        assert!(TaskStatus::Success.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Canceled.is_terminal());
        assert!(TaskStatus::TimedOut.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Waiting.is_terminal());
        assert!(!TaskStatus::Paused.is_terminal());
    }

    #[test]
    fn progress_arithmetic_matches_the_worked_example() {
        // success×3, failed×1, timed_out×1, running×2, pending×1 — total 8.
        let progress = ProgressInfo::from_counts(8, 1, 2, 3, 1, 0, 0, 0, 1);
        assert_eq!(progress.terminal_count, 5);
        assert_eq!(progress.in_progress_count, 2);
        assert_eq!(progress.completion_rate, 3.0 / 8.0);
        assert_eq!(progress.failure_rate, 2.0 / 8.0);
        assert!(!progress.is_complete());
    }

    #[test]
    fn progress_info_is_complete_once_every_child_reaches_a_terminal_status() {
        let progress = ProgressInfo::from_counts(3, 0, 0, 2, 1, 0, 0, 0, 0);
        assert!(progress.is_complete());
    }

    #[test]
    fn progress_info_with_no_children_is_not_complete() {
        assert!(!ProgressInfo::default().is_complete());
        assert_eq!(ProgressInfo::default().completion_rate, 0.0);
        assert_eq!(ProgressInfo::default().failure_rate, 0.0);
    }

    #[test]
    fn canceled_children_do_not_count_toward_failure_rate() {
        let progress = ProgressInfo::from_counts(2, 0, 0, 0, 0, 2, 0, 0, 0);
        assert_eq!(progress.failure_rate, 0.0);
        assert_eq!(progress.terminal_count, 2);
    }
}
