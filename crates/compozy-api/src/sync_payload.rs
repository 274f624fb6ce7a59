//! Sync-execution payload builder.
//!
//! The state fetch and usage resolution run inside a spawned task rather than being
//! awaited inline: a `tokio::spawn`ed task keeps running on the runtime even if its
//! `JoinHandle` is dropped, so a client disconnect drops our await point, not the
//! snapshot work itself.

use std::sync::Arc;

use serde_json::{Map, Value};

use compozy_core::{Id, Output};
use compozy_storage::task_state::{TaskState, TaskStateRepository};
use compozy_storage::usage::{UsageRepository, UsageSummary};

pub struct SyncPayloadOptions {
    pub exec_id: Id,
    pub known_output: Option<Output>,
    pub include_state: bool,
}

/// `encode_state` maps a freshly fetched state to its JSON encoding plus a flag:
/// `true` if the encoding already embeds a usage summary (so the builder must not
/// attach one at the top level too).
pub async fn build_sync_payload<F>(
    task_states: Arc<TaskStateRepository>,
    usage: Arc<UsageRepository>,
    options: SyncPayloadOptions,
    encode_state: F,
) -> Map<String, Value>
where
    F: FnOnce(&TaskState) -> (Value, bool) + Send + 'static,
{
    let exec_id = options.exec_id.clone();
    let handle = tokio::spawn(async move {
        let mut payload = Map::new();
        payload.insert("exec_id".to_string(), Value::String(exec_id.as_str().to_string()));
        if let Some(output) = &options.known_output {
            payload.insert("output".to_string(), Value::Object(output.as_map().clone()));
        }

        if !options.include_state {
            return payload;
        }

        let state = match task_states.get_state(&exec_id).await {
            Ok(state) => state,
            Err(err) => {
                tracing::warn!(exec_id = %exec_id, error = %err, "failed to fetch state for sync payload");
                None
            }
        };

        let Some(state) = state else {
            return payload;
        };

        let (encoded_state, usage_embedded) = encode_state(&state);
        payload.insert("state".to_string(), encoded_state);
        if let Some(output) = &state.output {
            payload.insert("output".to_string(), Value::Object(output.as_map().clone()));
        }

        if !usage_embedded {
            match usage.summarize_by_workflow_exec_id(&state.workflow_exec_id).await {
                Ok(summary) => attach_usage(&mut payload, &summary),
                Err(err) => {
                    tracing::warn!(
                        workflow_exec_id = %state.workflow_exec_id,
                        error = %err,
                        "failed to resolve usage summary for sync payload"
                    );
                }
            }
        }

        payload
    });

    match handle.await {
        Ok(payload) => payload,
        Err(err) => {
            tracing::error!(error = %err, "sync payload task panicked");
            Map::new()
        }
    }
}

fn attach_usage(payload: &mut Map<String, Value>, summary: &UsageSummary) {
    if let Ok(value) = serde_json::to_value(summary) {
        payload.insert("usage".to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    fn fake_pool() -> sqlx::PgPool {
        PgPoolOptions::new()
            .max_connections(1)
            .connect_lazy("postgres://localhost/nonexistent")
            .expect("lazy pool construction never touches the network")
    }

    #[tokio::test]
    async fn payload_without_state_carries_only_exec_id_and_output() {
        let task_states = Arc::new(TaskStateRepository::new(fake_pool()));
        let usage = Arc::new(UsageRepository::new(fake_pool()));
        let payload = build_sync_payload(
            task_states,
            usage,
            SyncPayloadOptions {
                exec_id: Id::new("exec-1"),
                known_output: Some(Output::empty()),
                include_state: false,
            },
            |_state| (Value::Null, false),
        )
        .await;
        assert_eq!(payload.get("exec_id").unwrap(), "exec-1");
        assert!(payload.contains_key("output"));
        assert!(!payload.contains_key("state"));
    }
}
