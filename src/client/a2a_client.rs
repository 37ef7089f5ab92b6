//! `A2AClient` — the callable half of the protocol.
//!
//! Discovers a remote agent's card once and caches it for the client's
//! lifetime, then dispatches `message/send`, `message/stream`, `tasks/get`,
//! `tasks/cancel`, and `tasks/list` as JSON-RPC calls through a [`Transport`].

use std::sync::Arc;

use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

use crate::error::{A2AError, A2AResult};
use crate::types::{
    AgentCard, CancelTaskParams, GetTaskParams, ListTasksParams, ListTasksResponse, Message,
    SendMessageConfiguration, SendMessageParams, Task,
};

use super::card_resolver::CardResolver;
use super::sse::SseStream;
use super::transport::{JsonRpcTransport, Transport, TransportConfig};

/// A client for calling a single remote A2A agent.
///
/// Construction is cheap; discovery happens lazily on the first call that
/// needs the agent card (or eagerly via [`A2AClient::discover`]) and is
/// cached for the client's lifetime — concurrent callers converge on a
/// single in-flight HTTP request.
pub struct A2AClient {
    base_url: String,
    transport: Arc<dyn Transport>,
    card_resolver: CardResolver,
    card: OnceCell<AgentCard>,
}

impl std::fmt::Debug for A2AClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("A2AClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl A2AClient {
    /// Build a client targeting `base_url` (trailing slash trimmed). The
    /// JSON-RPC endpoint is assumed to be `{base_url}/a2a`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_config(base_url, TransportConfig::default())
    }

    /// Build a client with explicit transport configuration (timeout,
    /// extra headers, auth scheme).
    pub fn with_config(base_url: impl Into<String>, config: TransportConfig) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let rpc_url = format!("{base_url}/a2a");
        Self {
            card_resolver: CardResolver::new(),
            transport: Arc::new(JsonRpcTransport::with_config(rpc_url, config)),
            base_url,
            card: OnceCell::new(),
        }
    }

    /// Build a client around a caller-supplied transport, e.g. for tests.
    pub fn with_transport(base_url: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            transport,
            card_resolver: CardResolver::new(),
            card: OnceCell::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch and cache the peer's agent card. `GET {base}/.well-known/
    /// agent.json` (or its current-path variant, see [`CardResolver`]) is
    /// invoked at most once across any number of concurrent callers — later
    /// calls observe the cached card.
    pub async fn discover(&self) -> A2AResult<&AgentCard> {
        self.card
            .get_or_try_init(|| async { self.card_resolver.resolve(&self.base_url).await })
            .await
    }

    /// The cached agent card, if [`A2AClient::discover`] has already
    /// succeeded.
    pub fn cached_card(&self) -> Option<&AgentCard> {
        self.card.get()
    }

    /// Send a message and block until the call returns a `Task`.
    pub async fn send_message(&self, message: Message) -> A2AResult<Task> {
        self.send_message_with(message, None).await
    }

    /// Send a message with explicit [`SendMessageConfiguration`].
    pub async fn send_message_with(
        &self,
        message: Message,
        configuration: Option<SendMessageConfiguration>,
    ) -> A2AResult<Task> {
        let params = SendMessageParams {
            message,
            configuration,
        };
        let value = serde_json::to_value(&params)?;
        let response = self.transport.send("message/send", value).await?;
        extract_result(response)
    }

    /// Send a message and stream [`crate::types::StreamEvent`]s as the task
    /// progresses. Firing `cancel` tears down the underlying SSE connection
    /// and releases the response body.
    pub async fn send_message_stream(
        &self,
        message: Message,
        configuration: Option<SendMessageConfiguration>,
        cancel: CancellationToken,
    ) -> A2AResult<SseStream> {
        let params = SendMessageParams {
            message,
            configuration,
        };
        let value = serde_json::to_value(&params)?;
        self.transport
            .send_stream("message/stream", value, cancel)
            .await
    }

    /// Fetch a task by id.
    pub async fn get_task(&self, task_id: impl Into<String>) -> A2AResult<Task> {
        self.get_task_with_history(task_id, None).await
    }

    /// Fetch a task by id, truncating returned history to `history_length`
    /// entries when given.
    pub async fn get_task_with_history(
        &self,
        task_id: impl Into<String>,
        history_length: Option<i32>,
    ) -> A2AResult<Task> {
        let params = GetTaskParams {
            id: task_id.into(),
            history_length,
        };
        let value = serde_json::to_value(&params)?;
        let response = self.transport.send("tasks/get", value).await?;
        extract_result(response)
    }

    /// Cancel a task. Returns the task in its post-cancellation state.
    pub async fn cancel_task(&self, task_id: impl Into<String>) -> A2AResult<Task> {
        let params = CancelTaskParams { id: task_id.into() };
        let value = serde_json::to_value(&params)?;
        let response = self.transport.send("tasks/cancel", value).await?;
        extract_result(response)
    }

    /// List tasks, optionally filtered by context and paginated.
    pub async fn list_tasks(&self, params: ListTasksParams) -> A2AResult<ListTasksResponse> {
        let value = serde_json::to_value(&params)?;
        let response = self.transport.send("tasks/list", value).await?;
        extract_result(response)
    }

    /// Subscribe to an existing task's stream of events. The server's
    /// late-subscriber fan-in replays the task's current state first if it
    /// isn't actively broadcasting.
    pub async fn subscribe_to_task(
        &self,
        task_id: impl Into<String>,
        cancel: CancellationToken,
    ) -> A2AResult<SseStream> {
        let params = serde_json::json!({ "id": task_id.into() });
        self.transport
            .send_stream("tasks/subscribe", params, cancel)
            .await
    }
}

fn extract_result<T: serde::de::DeserializeOwned>(
    response: crate::types::JsonRpcResponse,
) -> A2AResult<T> {
    if let Some(error) = response.error {
        return Err(A2AError::JsonRpc {
            code: error.code,
            message: error.message,
            data: error.data,
        });
    }
    let result = response.result.ok_or_else(|| {
        A2AError::InvalidJson("JSON-RPC response has neither result nor error".into())
    })?;
    serde_json::from_value(result)
        .map_err(|e| A2AError::InvalidJson(format!("failed to parse JSON-RPC result: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{JsonRpcError, JsonRpcId, JsonRpcResponse};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct MockTransport {
        calls: AtomicUsize,
        response: Mutex<Option<JsonRpcResponse>>,
    }

    impl MockTransport {
        fn new(response: JsonRpcResponse) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                response: Mutex::new(Some(response)),
            }
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(
            &self,
            _method: &str,
            _params: serde_json::Value,
        ) -> A2AResult<JsonRpcResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.response
                .lock()
                .unwrap()
                .take()
                .ok_or_else(|| A2AError::Other("mock transport exhausted".into()))
        }

        async fn send_stream(
            &self,
            _method: &str,
            _params: serde_json::Value,
            _cancel: CancellationToken,
        ) -> A2AResult<SseStream> {
            unimplemented!("not exercised in these tests")
        }
    }

    fn sample_task() -> Task {
        Task {
            id: "a".repeat(32),
            context_id: "b".repeat(32),
            status: crate::types::TaskStatus::new(crate::types::TaskState::Completed),
            artifacts: Vec::new(),
            history: None,
        }
    }

    #[tokio::test]
    async fn send_message_extracts_task_result() {
        let task = sample_task();
        let response = JsonRpcResponse::success(
            Some(JsonRpcId::Number(1)),
            serde_json::to_value(&task).unwrap(),
        );
        let transport = Arc::new(MockTransport::new(response));
        let client = A2AClient::with_transport("http://localhost:7420", transport);

        let result = client.send_message(Message::user("hello")).await.unwrap();
        assert_eq!(result.id, task.id);
    }

    #[tokio::test]
    async fn rpc_error_surfaces_as_json_rpc_variant() {
        let response = JsonRpcResponse {
            jsonrpc: "2.0".to_string(),
            id: Some(JsonRpcId::Number(1)),
            result: None,
            error: Some(JsonRpcError {
                code: -32001,
                message: "task not found".to_string(),
                data: None,
            }),
        };
        let transport = Arc::new(MockTransport::new(response));
        let client = A2AClient::with_transport("http://localhost:7420", transport);

        let err = client.get_task("missing").await.unwrap_err();
        assert!(matches!(err, A2AError::JsonRpc { code: -32001, .. }));
    }

    #[test]
    fn discover_caches_after_first_success() {
        let client = A2AClient::new("http://localhost:7420");
        assert!(client.cached_card().is_none());

        let card = AgentCard {
            name: "peer".to_string(),
            description: "a peer agent".to_string(),
            version: "1.0.0".to_string(),
            provider: None,
            capabilities: Default::default(),
            skills: Vec::new(),
            default_input_modes: vec!["text".to_string()],
            default_output_modes: vec!["text".to_string()],
            supported_interfaces: Vec::new(),
            icon_url: None,
            documentation_url: None,
        };
        client.card.set(card.clone()).unwrap();
        assert_eq!(client.cached_card(), Some(&card));
    }
}
