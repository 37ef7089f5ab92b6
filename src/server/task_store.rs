//! Task store — persistence layer for A2A tasks, with state-machine
//! enforcement built into every mutation.
//!
//! Backed by a `RwLock<HashMap>` plus an insertion-order `Vec` for stable
//! listing, with a `create`/`get`/`set_state`/`add_artifacts`/`cancel`/
//! `list` trait surface that enforces the task lifecycle on every mutation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rand::RngCore;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::TaskStoreError;
use crate::types::{Artifact, Message, Task, TaskState, TaskStatus};

/// Generate a fresh task or context id: 32 lowercase hex characters derived
/// from 16 random bytes.
pub fn new_task_id() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Trait for persisting and mutating A2A tasks.
///
/// Implementations must be `Send + Sync` for use in async server contexts.
/// Every mutating method enforces the task lifecycle state machine —
/// callers never need to re-check [`TaskState::can_transition_to`] before
/// calling.
///
/// # Provided implementations
///
/// - [`InMemoryTaskStore`] — in-memory store (data lost on restart)
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Create a new task in the `submitted` state. Fails with
    /// [`TaskStoreError::AlreadyExists`] if `task_id` is already in use.
    async fn create(&self, task_id: &str, context_id: &str) -> Result<Task, TaskStoreError>;

    /// Retrieve a task by id.
    async fn get(&self, task_id: &str) -> Result<Task, TaskStoreError>;

    /// Transition a task to `new_state`, stamping the current time and
    /// optionally attaching a status message.
    ///
    /// Fails with [`TaskStoreError::Terminal`] if the task is already in a
    /// terminal state, or [`TaskStoreError::InvalidTransition`] if the edge
    /// is not allowed from the task's current state.
    async fn set_state(
        &self,
        task_id: &str,
        new_state: TaskState,
        message: Option<Message>,
    ) -> Result<(), TaskStoreError>;

    /// Append artifacts to a task. Append-only — existing artifacts are
    /// never reordered or removed.
    async fn add_artifacts(
        &self,
        task_id: &str,
        artifacts: Vec<Artifact>,
    ) -> Result<(), TaskStoreError>;

    /// Transition a task to `canceled` from any non-terminal state,
    /// bypassing the normal transition table. Fails with
    /// [`TaskStoreError::Terminal`] if the task is already terminal.
    async fn cancel(&self, task_id: &str) -> Result<(), TaskStoreError>;

    /// List tasks. An empty `context_id` matches every task. `offset` at or
    /// beyond the matching count returns an empty list. `limit <= 0` means
    /// no limit. Ordering is stable within a call but otherwise
    /// unspecified — callers must not depend on it.
    async fn list(&self, context_id: &str, limit: i64, offset: i64) -> Vec<Task>;
}

/// In-memory [`TaskStore`] backed by a `HashMap`, with an insertion-order
/// `Vec` for deterministic-within-a-call listing.
///
/// Suitable for development, testing, and short-lived server instances. All
/// task data is lost when the process exits — durable storage is an
/// interface-only concern; swap in another [`TaskStore`] impl for that.
#[derive(Debug)]
pub struct InMemoryTaskStore {
    tasks: Arc<RwLock<HashMap<String, Task>>>,
    insertion_order: Arc<RwLock<Vec<String>>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self {
            tasks: Arc::new(RwLock::new(HashMap::new())),
            insertion_order: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl Default for InMemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn create(&self, task_id: &str, context_id: &str) -> Result<Task, TaskStoreError> {
        let mut tasks = self.tasks.write().await;
        if tasks.contains_key(task_id) {
            warn!(task_id = %task_id, "task already exists");
            return Err(TaskStoreError::AlreadyExists(task_id.to_string()));
        }

        let task = Task {
            id: task_id.to_string(),
            context_id: context_id.to_string(),
            status: TaskStatus::new(TaskState::Submitted),
            artifacts: Vec::new(),
            history: None,
        };
        tasks.insert(task_id.to_string(), task.clone());
        drop(tasks);

        self.insertion_order.write().await.push(task_id.to_string());
        debug!(task_id = %task_id, context_id = %context_id, "task created");
        Ok(task)
    }

    async fn get(&self, task_id: &str) -> Result<Task, TaskStoreError> {
        let tasks = self.tasks.read().await;
        let task = tasks
            .get(task_id)
            .cloned()
            .ok_or_else(|| TaskStoreError::NotFound(task_id.to_string()))?;
        debug!(task_id = %task_id, "task read");
        Ok(task)
    }

    async fn set_state(
        &self,
        task_id: &str,
        new_state: TaskState,
        message: Option<Message>,
    ) -> Result<(), TaskStoreError> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(task_id)
            .ok_or_else(|| TaskStoreError::NotFound(task_id.to_string()))?;

        let current = task.status.state;
        if current.is_terminal() {
            warn!(task_id = %task_id, state = %current, "rejected set_state on terminal task");
            return Err(TaskStoreError::Terminal {
                state: current.to_string(),
            });
        }
        if current != new_state && !current.can_transition_to(new_state) {
            warn!(task_id = %task_id, from = %current, to = %new_state, "rejected invalid transition");
            return Err(TaskStoreError::InvalidTransition {
                from: current.to_string(),
                to: new_state.to_string(),
            });
        }

        task.status = TaskStatus {
            state: new_state,
            message,
            timestamp: Some(chrono::Utc::now().to_rfc3339()),
        };
        debug!(task_id = %task_id, from = %current, to = %new_state, "task transitioned");
        Ok(())
    }

    async fn add_artifacts(
        &self,
        task_id: &str,
        artifacts: Vec<Artifact>,
    ) -> Result<(), TaskStoreError> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(task_id)
            .ok_or_else(|| TaskStoreError::NotFound(task_id.to_string()))?;
        task.artifacts.extend(artifacts);
        debug!(task_id = %task_id, "artifacts appended");
        Ok(())
    }

    async fn cancel(&self, task_id: &str) -> Result<(), TaskStoreError> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(task_id)
            .ok_or_else(|| TaskStoreError::NotFound(task_id.to_string()))?;

        if task.status.state.is_terminal() {
            warn!(task_id = %task_id, state = %task.status.state, "rejected cancel on terminal task");
            return Err(TaskStoreError::Terminal {
                state: task.status.state.to_string(),
            });
        }

        task.status = TaskStatus::new(TaskState::Canceled);
        debug!(task_id = %task_id, "task canceled");
        Ok(())
    }

    async fn list(&self, context_id: &str, limit: i64, offset: i64) -> Vec<Task> {
        let order = self.insertion_order.read().await;
        let tasks = self.tasks.read().await;

        let mut matching: Vec<Task> = order
            .iter()
            .filter_map(|id| tasks.get(id))
            .filter(|t| context_id.is_empty() || t.context_id == context_id)
            .cloned()
            .collect();

        let count = matching.len() as i64;
        if offset < 0 || offset >= count {
            return Vec::new();
        }
        matching.drain(0..offset as usize);

        if limit > 0 && (matching.len() as i64) > limit {
            matching.truncate(limit as usize);
        }

        debug!(context_id = %context_id, returned = matching.len(), "tasks listed");
        matching
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_get() {
        let store = InMemoryTaskStore::new();
        let task = store.create("t1", "ctx1").await.unwrap();
        assert_eq!(task.status.state, TaskState::Submitted);
        let fetched = store.get("t1").await.unwrap();
        assert_eq!(fetched.context_id, "ctx1");
    }

    #[tokio::test]
    async fn create_duplicate_rejected() {
        let store = InMemoryTaskStore::new();
        store.create("t1", "ctx1").await.unwrap();
        let err = store.create("t1", "ctx1").await.unwrap_err();
        assert!(matches!(err, TaskStoreError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let store = InMemoryTaskStore::new();
        let err = store.get("missing").await.unwrap_err();
        assert!(matches!(err, TaskStoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn state_machine_rejects_after_terminal() {
        let store = InMemoryTaskStore::new();
        store.create("t1", "ctx1").await.unwrap();
        store.set_state("t1", TaskState::Working, None).await.unwrap();
        store
            .set_state("t1", TaskState::Completed, None)
            .await
            .unwrap();

        let err = store
            .set_state("t1", TaskState::Working, None)
            .await
            .unwrap_err();
        assert!(matches!(err, TaskStoreError::Terminal { .. }));

        let task = store.get("t1").await.unwrap();
        assert_eq!(task.status.state, TaskState::Completed);
    }

    #[tokio::test]
    async fn invalid_transition_rejected() {
        let store = InMemoryTaskStore::new();
        store.create("t1", "ctx1").await.unwrap();
        let err = store
            .set_state("t1", TaskState::Completed, None)
            .await
            .unwrap_err();
        assert!(matches!(err, TaskStoreError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn cancel_from_any_nonterminal_state() {
        let store = InMemoryTaskStore::new();
        store.create("t1", "ctx1").await.unwrap();
        store.cancel("t1").await.unwrap();
        let task = store.get("t1").await.unwrap();
        assert_eq!(task.status.state, TaskState::Canceled);
    }

    #[tokio::test]
    async fn cancel_terminal_rejected() {
        let store = InMemoryTaskStore::new();
        store.create("t1", "ctx1").await.unwrap();
        store.set_state("t1", TaskState::Working, None).await.unwrap();
        store.set_state("t1", TaskState::Failed, None).await.unwrap();
        let err = store.cancel("t1").await.unwrap_err();
        assert!(matches!(err, TaskStoreError::Terminal { .. }));
    }

    #[tokio::test]
    async fn add_artifacts_appends() {
        let store = InMemoryTaskStore::new();
        store.create("t1", "ctx1").await.unwrap();
        store
            .add_artifacts(
                "t1",
                vec![Artifact {
                    artifact_id: "a1".to_string(),
                    name: None,
                    description: None,
                    parts: vec![],
                }],
            )
            .await
            .unwrap();
        let task = store.get("t1").await.unwrap();
        assert_eq!(task.artifacts.len(), 1);
    }

    #[tokio::test]
    async fn list_filters_by_context_and_paginates() {
        let store = InMemoryTaskStore::new();
        for i in 0..5 {
            store.create(&format!("t{i}"), "ctx1").await.unwrap();
        }
        store.create("other", "ctx2").await.unwrap();

        let all = store.list("ctx1", 0, 0).await;
        assert_eq!(all.len(), 5);

        let page = store.list("ctx1", 2, 1).await;
        assert_eq!(page.len(), 2);

        let empty = store.list("ctx1", 10, 100).await;
        assert!(empty.is_empty());

        let everyone = store.list("", 0, 0).await;
        assert_eq!(everyone.len(), 6);
    }

    #[test]
    fn task_id_is_32_hex_chars() {
        let id = new_task_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
