//! Row and domain shapes for `execution_llm_usage`.

use chrono::{DateTime, Utc};
use compozy_core::Id;
use serde::Serialize;

use crate::task_state::TaskComponent;

use super::error::UsageError;

/// Input to `Upsert`: a single component's usage delta for an execution. At least one
/// of `workflow_exec_id` / `task_exec_id` must be set; the repository validates this
/// before writing.
#[derive(Debug, Clone)]
pub struct NewLlmUsage {
    pub workflow_exec_id: Option<Id>,
    pub task_exec_id: Option<Id>,
    pub component: TaskComponent,
    pub agent_id: Option<String>,
    pub provider: String,
    pub model: String,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
    pub reasoning_tokens: Option<i64>,
    pub cached_prompt_tokens: Option<i64>,
    pub input_audio_tokens: Option<i64>,
    pub output_audio_tokens: Option<i64>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct UsageRow {
    pub id: String,
    pub task_exec_id: Option<String>,
    pub workflow_exec_id: Option<String>,
    pub component: String,
    pub agent_id: Option<String>,
    pub provider: String,
    pub model: String,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
    pub reasoning_tokens: Option<i64>,
    pub cached_prompt_tokens: Option<i64>,
    pub input_audio_tokens: Option<i64>,
    pub output_audio_tokens: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UsageRow {
    pub(crate) fn into_domain(self) -> Result<LlmUsage, UsageError> {
        Ok(LlmUsage {
            id: Id::from(self.id),
            task_exec_id: self.task_exec_id.map(Id::from),
            workflow_exec_id: self.workflow_exec_id.map(Id::from),
            component: self
                .component
                .parse()
                .map_err(|_| UsageError::invalid_component(self.component.clone()))?,
            agent_id: self.agent_id,
            provider: self.provider,
            model: self.model,
            prompt_tokens: self.prompt_tokens,
            completion_tokens: self.completion_tokens,
            total_tokens: self.total_tokens,
            reasoning_tokens: self.reasoning_tokens,
            cached_prompt_tokens: self.cached_prompt_tokens,
            input_audio_tokens: self.input_audio_tokens,
            output_audio_tokens: self.output_audio_tokens,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// A fully decoded `execution_llm_usage` row. At least one of `task_exec_id` /
/// `workflow_exec_id` is set, mirroring the table's check constraint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LlmUsage {
    pub id: Id,
    pub task_exec_id: Option<Id>,
    pub workflow_exec_id: Option<Id>,
    pub component: TaskComponent,
    pub agent_id: Option<String>,
    pub provider: String,
    pub model: String,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
    pub reasoning_tokens: Option<i64>,
    pub cached_prompt_tokens: Option<i64>,
    pub input_audio_tokens: Option<i64>,
    pub output_audio_tokens: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One provider/model's aggregated usage within a `UsageSummary`. The optional fields
/// are `None` when none of the summarized rows ever reported that token kind — a
/// provider that never returns `reasoning_tokens` should not appear to report zero of
/// them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageSummaryEntry {
    pub provider: String,
    pub model: String,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
    pub reasoning_tokens: Option<i64>,
    pub cached_prompt_tokens: Option<i64>,
    pub input_audio_tokens: Option<i64>,
    pub output_audio_tokens: Option<i64>,
}

/// The aggregated usage of a workflow execution's task-scoped LLM calls (the
/// workflow's own usage row, if any, is excluded — see `Repository::summarize`).
///
/// List-shaped: one [`UsageSummaryEntry`] per distinct `(provider, model)` pair, plus
/// flat totals at the top level. `provider`/`model` at the top level report the single
/// provider/model when there's exactly one, or the literal `"mixed"` when there's more
/// than one — that string is an observable, tested property, not an internal detail.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageSummary {
    pub workflow_exec_id: Id,
    pub provider: String,
    pub model: String,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
    pub reasoning_tokens: Option<i64>,
    pub cached_prompt_tokens: Option<i64>,
    pub input_audio_tokens: Option<i64>,
    pub output_audio_tokens: Option<i64>,
    pub entries: Vec<UsageSummaryEntry>,
}

/// Sums an `Option<i64>` column across entries, preserving three-valued semantics:
/// `None` iff every input was `None`, otherwise the sum of whichever were `Some`.
fn sum_optional(values: impl Iterator<Item = Option<i64>>) -> Option<i64> {
    let mut seen = false;
    let mut total = 0i64;
    for v in values {
        if let Some(v) = v {
            seen = true;
            total += v;
        }
    }
    seen.then_some(total)
}

impl UsageSummary {
    pub(crate) fn from_entries(workflow_exec_id: Id, entries: Vec<UsageSummaryEntry>) -> Self {
        let prompt_tokens = entries.iter().map(|e| e.prompt_tokens).sum();
        let completion_tokens = entries.iter().map(|e| e.completion_tokens).sum();
        let mut total_tokens: i64 = entries.iter().map(|e| e.total_tokens).sum();
        if total_tokens == 0 {
            total_tokens = prompt_tokens + completion_tokens;
        }
        let reasoning_tokens = sum_optional(entries.iter().map(|e| e.reasoning_tokens));
        let cached_prompt_tokens = sum_optional(entries.iter().map(|e| e.cached_prompt_tokens));
        let input_audio_tokens = sum_optional(entries.iter().map(|e| e.input_audio_tokens));
        let output_audio_tokens = sum_optional(entries.iter().map(|e| e.output_audio_tokens));
        let (provider, model) = match entries.as_slice() {
            [] => (String::new(), String::new()),
            [one] => (one.provider.clone(), one.model.clone()),
            _ => ("mixed".to_string(), "mixed".to_string()),
        };
        Self {
            workflow_exec_id,
            provider,
            model,
            prompt_tokens,
            completion_tokens,
            total_tokens,
            reasoning_tokens,
            cached_prompt_tokens,
            input_audio_tokens,
            output_audio_tokens,
            entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(provider: &str, model: &str, prompt: i64, completion: i64, total: i64) -> UsageSummaryEntry {
        UsageSummaryEntry {
            provider: provider.to_string(),
            model: model.to_string(),
            prompt_tokens: prompt,
            completion_tokens: completion,
            total_tokens: total,
            reasoning_tokens: None,
            cached_prompt_tokens: None,
            input_audio_tokens: None,
            output_audio_tokens: None,
        }
    }

    #[test]
    fn single_entry_keeps_its_own_provider_and_model() {
        let summary =
            UsageSummary::from_entries(Id::new("wf-1"), vec![entry("openai", "gpt-4o", 10, 5, 15)]);
        assert_eq!(summary.provider, "openai");
        assert_eq!(summary.model, "gpt-4o");
        assert_eq!(summary.total_tokens, 15);
    }

    #[test]
    fn multiple_entries_report_mixed_at_the_top_level() {
        let summary = UsageSummary::from_entries(
            Id::new("wf-1"),
            vec![
                entry("openai", "gpt-4o", 10, 5, 15),
                entry("anthropic", "claude", 20, 8, 28),
            ],
        );
        assert_eq!(summary.provider, "mixed");
        assert_eq!(summary.model, "mixed");
        assert_eq!(summary.total_tokens, 43);
        assert_eq!(summary.entries.len(), 2);
    }

    #[test]
    fn no_entries_yields_zeroed_summary() {
        let summary = UsageSummary::from_entries(Id::new("wf-1"), vec![]);
        assert_eq!(summary.total_tokens, 0);
        assert!(summary.entries.is_empty());
    }

    #[test]
    fn total_tokens_falls_back_to_prompt_plus_completion_when_absent() {
        let mut e = entry("openai", "gpt-4o", 10, 5, 0);
        e.total_tokens = 0;
        let summary = UsageSummary::from_entries(Id::new("wf-1"), vec![e]);
        assert_eq!(summary.total_tokens, 15);
    }

    #[test]
    fn optional_token_kinds_stay_absent_when_no_entry_reports_them() {
        let summary =
            UsageSummary::from_entries(Id::new("wf-1"), vec![entry("openai", "gpt-4o", 10, 5, 15)]);
        assert_eq!(summary.reasoning_tokens, None);
        assert_eq!(summary.cached_prompt_tokens, None);
    }

    #[test]
    fn optional_token_kinds_sum_across_entries_that_report_them() {
        let mut a = entry("openai", "gpt-4o", 10, 5, 15);
        a.reasoning_tokens = Some(3);
        let mut b = entry("openai", "gpt-4o-mini", 10, 5, 15);
        b.reasoning_tokens = Some(7);
        let c = entry("anthropic", "claude", 10, 5, 15);
        let summary = UsageSummary::from_entries(Id::new("wf-1"), vec![a, b, c]);
        assert_eq!(summary.reasoning_tokens, Some(10));
    }
}
