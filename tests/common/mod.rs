//! Shared test harness for the integration suite: a handful of
//! [`Conversation`] implementations plus helpers to stand up a real axum
//! server on a random port.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use a2a_runtime::codec::ContentPart;
use a2a_runtime::error::A2AResult;
use a2a_runtime::server::{
    a2a_router, Conversation, ConversationOpener, ConversationReply, InMemoryTaskStore,
    RequestHandler, StreamChunk, StreamingConversation, TaskStore,
};
use a2a_runtime::types::AgentCard;
use a2a_runtime::AgentCardBuilder;
use async_trait::async_trait;
use futures::stream::{self, BoxStream};

/// Echoes the incoming text back as `Echo: <text>`.
pub struct EchoConversation;

#[async_trait]
impl Conversation for EchoConversation {
    async fn send(&self, message: &str, _parts: &[ContentPart]) -> A2AResult<ConversationReply> {
        Ok(ConversationReply::parts(vec![ContentPart::Text(format!(
            "Echo: {message}"
        ))]))
    }
}

/// Same reply as [`EchoConversation`] but also implements streaming: emits a
/// "thinking..." chunk, a suppressed tool call, then the answer.
pub struct StreamingEchoConversation;

#[async_trait]
impl Conversation for StreamingEchoConversation {
    async fn send(&self, message: &str, _parts: &[ContentPart]) -> A2AResult<ConversationReply> {
        Ok(ConversationReply::parts(vec![ContentPart::Text(format!(
            "Echo: {message}"
        ))]))
    }

    fn as_streaming(&self) -> Option<&dyn StreamingConversation> {
        Some(self)
    }
}

#[async_trait]
impl StreamingConversation for StreamingEchoConversation {
    async fn stream(
        &self,
        message: &str,
        _parts: &[ContentPart],
    ) -> A2AResult<BoxStream<'static, StreamChunk>> {
        let chunks = vec![
            StreamChunk::Text("thinking...".to_string()),
            StreamChunk::ToolCall {
                name: "lookup".to_string(),
            },
            StreamChunk::Text(format!("Echo: {message}")),
            StreamChunk::Done,
        ];
        Ok(Box::pin(stream::iter(chunks)))
    }
}

/// A conversation that always fails, to exercise the `failed` terminal state.
pub struct FailingConversation;

#[async_trait]
impl Conversation for FailingConversation {
    async fn send(&self, _message: &str, _parts: &[ContentPart]) -> A2AResult<ConversationReply> {
        Err(a2a_runtime::A2AError::internal_error(
            "conversation intentionally failed",
        ))
    }
}

/// Stalls until dropped — used to exercise peer-disconnect cancellation on
/// `message/stream`.
pub struct StallingConversation;

#[async_trait]
impl Conversation for StallingConversation {
    async fn send(&self, _message: &str, _parts: &[ContentPart]) -> A2AResult<ConversationReply> {
        std::future::pending::<()>().await;
        unreachable!()
    }

    fn as_streaming(&self) -> Option<&dyn StreamingConversation> {
        Some(self)
    }
}

#[async_trait]
impl StreamingConversation for StallingConversation {
    async fn stream(
        &self,
        _message: &str,
        _parts: &[ContentPart],
    ) -> A2AResult<BoxStream<'static, StreamChunk>> {
        std::future::pending::<()>().await;
        unreachable!()
    }
}

/// Emits one chunk, then parks on a shared `Notify` before emitting the rest
/// — used to make a late `tasks/subscribe` call land while the worker is
/// still mid-stream, rather than after the broadcaster has already closed.
pub struct GatedStreamingConversation {
    gate: Arc<tokio::sync::Notify>,
}

#[async_trait]
impl Conversation for GatedStreamingConversation {
    async fn send(&self, message: &str, _parts: &[ContentPart]) -> A2AResult<ConversationReply> {
        Ok(ConversationReply::parts(vec![ContentPart::Text(format!(
            "Echo: {message}"
        ))]))
    }

    fn as_streaming(&self) -> Option<&dyn StreamingConversation> {
        Some(self)
    }
}

#[async_trait]
impl StreamingConversation for GatedStreamingConversation {
    async fn stream(
        &self,
        message: &str,
        _parts: &[ContentPart],
    ) -> A2AResult<BoxStream<'static, StreamChunk>> {
        let gate = self.gate.clone();
        let message = message.to_string();
        let s = async_stream::stream! {
            yield StreamChunk::Text("thinking...".to_string());
            gate.notified().await;
            yield StreamChunk::Text(format!("Echo: {message}"));
            yield StreamChunk::Done;
        };
        Ok(Box::pin(s))
    }
}

pub fn gated_streaming_opener(gate: Arc<tokio::sync::Notify>) -> ConversationOpener {
    Box::new(move |_ctx: &str| {
        let gate = gate.clone();
        Box::pin(async move {
            let conv: Box<dyn Conversation> = Box::new(GatedStreamingConversation { gate });
            Ok(conv)
        })
    })
}

/// Counts how many times its opener has actually constructed a conversation,
/// so tests can assert the double-checked-lock opener runs once per context.
pub struct OpenCounter(pub Arc<AtomicUsize>);

pub fn counting_opener(counter: Arc<AtomicUsize>) -> ConversationOpener {
    Box::new(move |_ctx: &str| {
        let counter = counter.clone();
        Box::pin(async move {
            counter.fetch_add(1, Ordering::SeqCst);
            let conv: Box<dyn Conversation> = Box::new(EchoConversation);
            Ok(conv)
        })
    })
}

pub fn echo_opener() -> ConversationOpener {
    Box::new(|_ctx: &str| {
        Box::pin(async move {
            let conv: Box<dyn Conversation> = Box::new(EchoConversation);
            Ok(conv)
        })
    })
}

pub fn streaming_opener() -> ConversationOpener {
    Box::new(|_ctx: &str| {
        Box::pin(async move {
            let conv: Box<dyn Conversation> = Box::new(StreamingEchoConversation);
            Ok(conv)
        })
    })
}

pub fn failing_opener() -> ConversationOpener {
    Box::new(|_ctx: &str| {
        Box::pin(async move {
            let conv: Box<dyn Conversation> = Box::new(FailingConversation);
            Ok(conv)
        })
    })
}

pub fn stalling_opener() -> ConversationOpener {
    Box::new(|_ctx: &str| {
        Box::pin(async move {
            let conv: Box<dyn Conversation> = Box::new(StallingConversation);
            Ok(conv)
        })
    })
}

pub fn test_agent_card(url: &str) -> AgentCard {
    AgentCardBuilder::new("Test Echo Agent")
        .description("An echo agent for integration tests")
        .version("0.1.0")
        .jsonrpc_url(url)
        .streaming(true)
        .with_skill(
            "echo",
            "Echo",
            "Echoes back messages",
            vec!["test".to_string()],
        )
        .build()
}

/// Start a test server on a random port with a fresh in-memory store.
/// Returns the base URL (no trailing slash) and a handle that tears the
/// server down when aborted.
pub async fn start_test_server(opener: ConversationOpener) -> (String, tokio::task::JoinHandle<()>) {
    start_test_server_with_store(opener, Arc::new(InMemoryTaskStore::new())).await
}

pub async fn start_test_server_with_store(
    opener: ConversationOpener,
    store: Arc<dyn TaskStore>,
) -> (String, tokio::task::JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base_url = format!("http://{addr}");

    let handler = Arc::new(RequestHandler::new(opener, store));
    let agent_card = test_agent_card(&format!("{base_url}/a2a"));
    let app = a2a_router(handler, agent_card);

    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    tokio::time::sleep(std::time::Duration::from_millis(30)).await;

    (base_url, handle)
}

pub fn jsonrpc_request(
    id: serde_json::Value,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params,
    })
}

pub fn message_send_request(id: i64, text: &str) -> serde_json::Value {
    jsonrpc_request(
        serde_json::json!(id),
        "message/send",
        serde_json::json!({
            "message": {
                "messageId": format!("test-msg-{id}"),
                "role": "user",
                "parts": [{"text": text}],
            },
            "configuration": {"blocking": true},
        }),
    )
}

pub fn message_send_with_context(id: i64, text: &str, context_id: &str) -> serde_json::Value {
    jsonrpc_request(
        serde_json::json!(id),
        "message/send",
        serde_json::json!({
            "message": {
                "messageId": format!("test-msg-{id}"),
                "role": "user",
                "parts": [{"text": text}],
                "contextId": context_id,
            },
            "configuration": {"blocking": true},
        }),
    )
}
