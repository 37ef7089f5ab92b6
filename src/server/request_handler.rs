//! Request handler — dispatches the six JSON-RPC methods against a
//! [`ConversationOpener`], a [`TaskStore`], a per-context conversation
//! cache, per-task [`Broadcaster`]s, and a cancellation-token table.
//!
//! There is one broadcaster per in-flight task rather than one shared
//! across every task: each `message/send` or `message/stream` call spawns a
//! worker, tracks it for cancellation, drives it to a terminal state, and
//! persists every transition through the store.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::stream::{self, BoxStream, Stream, StreamExt};
use tokio::sync::{Mutex, RwLock};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::codec;
use crate::error::{A2AError, A2AResult};
use crate::types::{
    Artifact, CancelTaskParams, GetTaskParams, ListTasksParams, ListTasksResponse, Message,
    SendMessageParams, StreamEvent, SubscribeToTaskParams, Task, TaskArtifactUpdateEvent,
    TaskState, TaskStatusUpdateEvent,
};

use super::broadcaster::Broadcaster;
use super::conversation::{Conversation, ConversationOpener, ConversationReply, StreamChunk};
use super::task_store::{new_task_id, TaskStore};

/// Non-blocking `message/send` waits this long before returning the
/// current task snapshot, giving fast-completing turns a chance to settle
/// into a terminal state before the caller observes `working`.
const SETTLE_WINDOW: Duration = Duration::from_millis(5);

const DEFAULT_PAGE_SIZE: i64 = 100;

/// Coordinates the A2A JSON-RPC surface against a [`ConversationOpener`]
/// and a [`TaskStore`].
pub struct RequestHandler {
    opener: ConversationOpener,
    store: Arc<dyn TaskStore>,
    conversations: RwLock<HashMap<String, Arc<dyn Conversation>>>,
    broadcasters: Mutex<HashMap<String, Arc<Broadcaster>>>,
    cancel_tokens: Arc<Mutex<HashMap<String, CancellationToken>>>,
}

impl RequestHandler {
    pub fn new(opener: ConversationOpener, store: Arc<dyn TaskStore>) -> Self {
        Self {
            opener,
            store,
            conversations: RwLock::new(HashMap::new()),
            broadcasters: Mutex::new(HashMap::new()),
            cancel_tokens: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Double-checked-locking lookup/creation of the conversation for a
    /// context. The opener runs at most once per context even under
    /// concurrent first calls.
    async fn get_or_open_conversation(&self, context_id: &str) -> A2AResult<Arc<dyn Conversation>> {
        {
            let conversations = self.conversations.read().await;
            if let Some(conv) = conversations.get(context_id) {
                return Ok(conv.clone());
            }
        }

        let mut conversations = self.conversations.write().await;
        if let Some(conv) = conversations.get(context_id) {
            return Ok(conv.clone());
        }

        let opened = (self.opener)(context_id)
            .await
            .map_err(|e| A2AError::internal_error(format!("conversation open failed: {e}")))?;
        let conv: Arc<dyn Conversation> = Arc::from(opened);
        conversations.insert(context_id.to_string(), conv.clone());
        debug!(context_id = %context_id, "conversation opened");
        Ok(conv)
    }

    async fn register_cancel_token(&self, task_id: &str) -> CancellationToken {
        let token = CancellationToken::new();
        self.cancel_tokens
            .lock()
            .await
            .insert(task_id.to_string(), token.clone());
        token
    }

    async fn take_cancel_token(&self, task_id: &str) -> Option<CancellationToken> {
        self.cancel_tokens.lock().await.remove(task_id)
    }

    async fn broadcaster_for(&self, task_id: &str) -> Arc<Broadcaster> {
        let mut broadcasters = self.broadcasters.lock().await;
        broadcasters
            .entry(task_id.to_string())
            .or_insert_with(|| Arc::new(Broadcaster::new()))
            .clone()
    }

    async fn close_broadcaster(&self, task_id: &str) {
        if let Some(broadcaster) = self.broadcasters.lock().await.remove(task_id) {
            broadcaster.close().await;
        }
    }

    // ------------------------------------------------------------------
    // message/send
    // ------------------------------------------------------------------

    pub async fn on_message_send(&self, params: SendMessageParams) -> A2AResult<Task> {
        let context_id = params
            .message
            .context_id
            .clone()
            .unwrap_or_else(new_task_id);
        let conversation = self.get_or_open_conversation(&context_id).await?;

        let task_id = new_task_id();
        self.store.create(&task_id, &context_id).await?;

        let cancel_token = self.register_cancel_token(&task_id).await;
        let blocking = params
            .configuration
            .as_ref()
            .and_then(|c| c.blocking)
            .unwrap_or(false);

        let store = self.store.clone();
        let message = params.message.clone();
        let worker_task_id = task_id.clone();
        let cancel_tokens = self.cancel_tokens.clone();

        let join = tokio::spawn(async move {
            run_send_worker(
                store,
                worker_task_id,
                message,
                conversation,
                cancel_token,
                cancel_tokens,
            )
            .await;
        });

        if blocking {
            let _ = join.await;
        } else {
            tokio::time::sleep(SETTLE_WINDOW).await;
        }

        self.store.get(&task_id).await.map_err(Into::into)
    }

    // ------------------------------------------------------------------
    // message/stream
    // ------------------------------------------------------------------

    pub async fn on_message_send_stream(
        &self,
        params: SendMessageParams,
    ) -> A2AResult<StreamHandle> {
        let context_id = params
            .message
            .context_id
            .clone()
            .unwrap_or_else(new_task_id);
        let conversation = self.get_or_open_conversation(&context_id).await?;

        if conversation.as_streaming().is_none() {
            return Err(A2AError::method_not_found("streaming not supported"));
        }

        let task_id = new_task_id();
        self.store.create(&task_id, &context_id).await?;
        self.store
            .set_state(&task_id, TaskState::Working, None)
            .await?;

        let broadcaster = self.broadcaster_for(&task_id).await;
        let rx = broadcaster.subscribe().await;

        broadcaster
            .send(StreamEvent::Status(TaskStatusUpdateEvent {
                task_id: task_id.clone(),
                context_id: context_id.clone(),
                status: self.store.get(&task_id).await?.status,
            }))
            .await;

        let cancel_token = self.register_cancel_token(&task_id).await;
        let handle_cancel_token = cancel_token.clone();
        let store = self.store.clone();
        let message = params.message.clone();
        let worker_task_id = task_id.clone();
        let worker_context_id = context_id.clone();
        let worker_broadcaster = broadcaster.clone();
        let cancel_tokens = self.cancel_tokens.clone();

        tokio::spawn(async move {
            run_stream_worker(
                store,
                worker_task_id,
                worker_context_id,
                message,
                conversation,
                worker_broadcaster,
                cancel_token,
                cancel_tokens,
            )
            .await;
        });

        Ok(StreamHandle::new(
            task_id,
            handle_cancel_token,
            ReceiverStream::new(rx).boxed(),
        ))
    }

    // ------------------------------------------------------------------
    // tasks/get, tasks/cancel, tasks/list, tasks/subscribe
    // ------------------------------------------------------------------

    pub async fn on_get_task(&self, params: GetTaskParams) -> A2AResult<Task> {
        self.store.get(&params.id).await.map_err(Into::into)
    }

    pub async fn on_cancel_task(&self, params: CancelTaskParams) -> A2AResult<Task> {
        if let Some(token) = self.take_cancel_token(&params.id).await {
            token.cancel();
        }
        self.close_broadcaster(&params.id).await;
        self.store.cancel(&params.id).await?;
        self.store.get(&params.id).await.map_err(Into::into)
    }

    pub async fn on_list_tasks(&self, params: ListTasksParams) -> A2AResult<ListTasksResponse> {
        let context_id = params.context_id.unwrap_or_default();
        let page_size = params
            .page_size
            .filter(|&size| size > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE);

        let tasks = self.store.list(&context_id, page_size, 0).await;
        let total_size = self.store.list(&context_id, 0, 0).await.len() as i64;

        Ok(ListTasksResponse {
            tasks,
            next_page_token: None,
            page_size,
            total_size,
        })
    }

    pub async fn on_subscribe_to_task(
        &self,
        params: SubscribeToTaskParams,
    ) -> A2AResult<BoxStream<'static, StreamEvent>> {
        if let Some(broadcaster) = self.broadcasters.lock().await.get(&params.id).cloned() {
            let rx = broadcaster.subscribe().await;
            return Ok(ReceiverStream::new(rx).boxed());
        }

        let task = self.store.get(&params.id).await?;
        let snapshot = StreamEvent::Status(TaskStatusUpdateEvent {
            task_id: task.id.clone(),
            context_id: task.context_id.clone(),
            status: task.status,
        });
        Ok(stream::once(async move { snapshot }).boxed())
    }

    // ------------------------------------------------------------------
    // Graceful shutdown
    // ------------------------------------------------------------------

    /// Cancel every in-flight worker, close every open conversation and
    /// broadcaster, and return within `deadline`. Returns the first error
    /// encountered closing a conversation, if any; cancellation itself
    /// cannot fail. Exceeding the deadline is not itself an error — whatever
    /// has closed by then is left closed, and the rest is abandoned along
    /// with the process.
    pub async fn shutdown(&self, deadline: Duration) -> A2AResult<()> {
        let tokens: Vec<CancellationToken> =
            self.cancel_tokens.lock().await.drain().map(|(_, t)| t).collect();
        for token in &tokens {
            token.cancel();
        }

        let broadcasters: Vec<Arc<Broadcaster>> =
            self.broadcasters.lock().await.drain().map(|(_, b)| b).collect();
        for broadcaster in &broadcasters {
            broadcaster.close().await;
        }

        let conversations: Vec<Arc<dyn Conversation>> = self
            .conversations
            .write()
            .await
            .drain()
            .map(|(_, c)| c)
            .collect();

        let close_all = async {
            for conversation in &conversations {
                conversation.close().await;
            }
        };

        match tokio::time::timeout(deadline, close_all).await {
            Ok(()) => Ok(()),
            Err(_) => {
                warn!("shutdown deadline exceeded while closing conversations");
                Err(A2AError::internal_error(
                    "shutdown deadline exceeded closing conversations",
                ))
            }
        }
    }
}

/// Removes `task_id`'s entry from the shared cancel-token table. Called by a
/// worker once it reaches a terminal outcome so a late `tasks/cancel` call
/// doesn't find a stale token for a task that no longer has anything running.
async fn clear_cancel_token(
    cancel_tokens: &Mutex<HashMap<String, CancellationToken>>,
    task_id: &str,
) {
    cancel_tokens.lock().await.remove(task_id);
}

async fn run_send_worker(
    store: Arc<dyn TaskStore>,
    task_id: String,
    message: Message,
    conversation: Arc<dyn Conversation>,
    cancel_token: CancellationToken,
    cancel_tokens: Arc<Mutex<HashMap<String, CancellationToken>>>,
) {
    if store
        .set_state(&task_id, TaskState::Working, None)
        .await
        .is_err()
    {
        warn!(task_id = %task_id, "worker could not transition to working");
        clear_cancel_token(&cancel_tokens, &task_id).await;
        return;
    }

    let runtime_message = codec::message_ingress(&message);

    tokio::select! {
        _ = cancel_token.cancelled() => {
            debug!(task_id = %task_id, "worker canceled");
        }
        result = conversation.send(&runtime_message.content, &runtime_message.parts) => {
            apply_send_result(&store, &task_id, result).await;
        }
    }

    clear_cancel_token(&cancel_tokens, &task_id).await;
}

async fn apply_send_result(
    store: &Arc<dyn TaskStore>,
    task_id: &str,
    result: A2AResult<ConversationReply>,
) {
    match result {
        Ok(reply) if reply.pending_tools => {
            let _ = store
                .set_state(task_id, TaskState::InputRequired, None)
                .await;
        }
        Ok(reply) => match codec::synthesize_artifact(&reply.parts) {
            Ok(Some(artifact)) => {
                let _ = store.add_artifacts(task_id, vec![artifact]).await;
                let _ = store.set_state(task_id, TaskState::Completed, None).await;
            }
            Ok(None) => {
                let _ = store
                    .set_state(task_id, TaskState::InputRequired, None)
                    .await;
            }
            Err(e) => fail_task(store, task_id, &e.to_string()).await,
        },
        Err(e) => fail_task(store, task_id, &e.to_string()).await,
    }
}

async fn fail_task(store: &Arc<dyn TaskStore>, task_id: &str, error_text: &str) {
    let _ = store
        .set_state(
            task_id,
            TaskState::Failed,
            Some(Message::agent(error_text)),
        )
        .await;
}

#[allow(clippy::too_many_arguments)]
async fn run_stream_worker(
    store: Arc<dyn TaskStore>,
    task_id: String,
    context_id: String,
    message: Message,
    conversation: Arc<dyn Conversation>,
    broadcaster: Arc<Broadcaster>,
    cancel_token: CancellationToken,
    cancel_tokens: Arc<Mutex<HashMap<String, CancellationToken>>>,
) {
    let Some(streaming) = conversation.as_streaming() else {
        // Capability was checked at request time; a conversation cannot
        // lose it between then and now under this architecture.
        clear_cancel_token(&cancel_tokens, &task_id).await;
        return;
    };

    let runtime_message = codec::message_ingress(&message);

    let chunk_stream = tokio::select! {
        _ = cancel_token.cancelled() => {
            debug!(task_id = %task_id, "stream worker canceled before start");
            broadcaster.close().await;
            clear_cancel_token(&cancel_tokens, &task_id).await;
            return;
        }
        result = streaming.stream(&runtime_message.content, &runtime_message.parts) => result,
    };

    let mut chunks = match chunk_stream {
        Ok(s) => s,
        Err(e) => {
            emit_failed(&store, &broadcaster, &task_id, &context_id, &e.to_string()).await;
            clear_cancel_token(&cancel_tokens, &task_id).await;
            return;
        }
    };

    let mut artifact_index: u64 = 0;
    let mut ended_with_done = false;

    loop {
        let next = tokio::select! {
            _ = cancel_token.cancelled() => {
                debug!(task_id = %task_id, "stream worker canceled");
                broadcaster.close().await;
                clear_cancel_token(&cancel_tokens, &task_id).await;
                return;
            }
            chunk = chunks.next() => chunk,
        };

        let Some(chunk) = next else {
            break;
        };

        match chunk {
            StreamChunk::Text(text) => {
                emit_artifact_chunk(
                    &store,
                    &broadcaster,
                    &task_id,
                    &context_id,
                    codec::ContentPart::Text(text),
                    &mut artifact_index,
                )
                .await;
            }
            StreamChunk::Media(part) => {
                emit_artifact_chunk(
                    &store,
                    &broadcaster,
                    &task_id,
                    &context_id,
                    part,
                    &mut artifact_index,
                )
                .await;
            }
            StreamChunk::ToolCall { .. } => {
                // Agent-opacity: suppressed from the event stream, task stays `working`.
            }
            StreamChunk::Done => {
                ended_with_done = true;
                break;
            }
            StreamChunk::Error(message) => {
                emit_failed(&store, &broadcaster, &task_id, &context_id, &message).await;
                clear_cancel_token(&cancel_tokens, &task_id).await;
                return;
            }
        }
    }

    let _ = ended_with_done; // a sequence that ends without Done is treated as completed too
    let _ = store.set_state(&task_id, TaskState::Completed, None).await;
    if let Ok(task) = store.get(&task_id).await {
        broadcaster
            .send(StreamEvent::Status(TaskStatusUpdateEvent {
                task_id: task_id.clone(),
                context_id: context_id.clone(),
                status: task.status,
            }))
            .await;
    }
    broadcaster.close().await;
    clear_cancel_token(&cancel_tokens, &task_id).await;
}

async fn emit_artifact_chunk(
    store: &Arc<dyn TaskStore>,
    broadcaster: &Broadcaster,
    task_id: &str,
    context_id: &str,
    part: codec::ContentPart,
    artifact_index: &mut u64,
) {
    let wire_part = match codec::egress(&part) {
        Ok(p) => p,
        Err(e) => {
            warn!(task_id = %task_id, error = %e, "dropping unencodable stream chunk");
            return;
        }
    };

    let artifact_id = format!("artifact-{artifact_index}");
    *artifact_index += 1;

    let artifact = Artifact {
        artifact_id: artifact_id.clone(),
        name: None,
        description: None,
        parts: vec![wire_part],
    };

    let _ = store.add_artifacts(task_id, vec![artifact.clone()]).await;

    broadcaster
        .send(StreamEvent::Artifact(TaskArtifactUpdateEvent {
            task_id: task_id.to_string(),
            context_id: context_id.to_string(),
            artifact,
            append: Some(true),
            last_chunk: Some(false),
        }))
        .await;
}

async fn emit_failed(
    store: &Arc<dyn TaskStore>,
    broadcaster: &Broadcaster,
    task_id: &str,
    context_id: &str,
    error_text: &str,
) {
    let _ = store
        .set_state(
            task_id,
            TaskState::Failed,
            Some(Message::agent(error_text)),
        )
        .await;
    if let Ok(task) = store.get(task_id).await {
        broadcaster
            .send(StreamEvent::Status(TaskStatusUpdateEvent {
                task_id: task_id.to_string(),
                context_id: context_id.to_string(),
                status: task.status,
            }))
            .await;
    }
    broadcaster.close().await;
}

/// A `message/stream` response: the event stream itself plus the task id and
/// cancellation token that drive it, so the HTTP layer can cancel the
/// underlying worker when the peer disconnects mid-stream without waiting
/// for an explicit `tasks/cancel` call. Dropping the handle — which happens
/// when axum drops the SSE response body on disconnect — fires the token.
pub struct StreamHandle {
    pub task_id: String,
    pub cancel_token: CancellationToken,
    inner: BoxStream<'static, StreamEvent>,
}

impl StreamHandle {
    fn new(
        task_id: String,
        cancel_token: CancellationToken,
        inner: BoxStream<'static, StreamEvent>,
    ) -> Self {
        Self {
            task_id,
            cancel_token,
            inner,
        }
    }
}

impl Stream for StreamHandle {
    type Item = StreamEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        this.inner.poll_next_unpin(cx)
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}
