//! # a2a-runtime — JSON-RPC + SSE runtime for the Agent-to-Agent (A2A) protocol
//!
//! This crate implements the wire protocol agents use to exchange
//! long-running, streamable task turns over JSON-RPC 2.0 and Server-Sent
//! Events: a task lifecycle state machine, a content-part codec between the
//! wire format and an agent's own representation, an HTTP client, an axum
//! server, and a tool bridge that exposes a remote agent's skills as local
//! callable tools.
//!
//! ## Feature flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `client` | yes     | HTTP client for calling A2A agents (reqwest + SSE), plus the tool bridge |
//! | `server` | yes     | `RequestHandler` + axum integration for building agents |
//! | `full`   | no      | Enable all features |
//!
//! ## Quick Start: Client
//!
//! ```no_run
//! use a2a_runtime::client::A2AClient;
//! use a2a_runtime::types::Message;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = A2AClient::new("http://localhost:7420");
//!     client.discover().await?;
//!
//!     let task = client.send_message(Message::user("Write a haiku about Rust")).await?;
//!     println!("Task {} — status: {}", task.id, task.status.state);
//!     Ok(())
//! }
//! ```
//!
//! ## Quick Start: Server
//!
//! Implement [`server::Conversation`] to define your agent's behavior:
//!
//! ```rust,ignore
//! use a2a_runtime::codec::ContentPart;
//! use a2a_runtime::error::A2AResult;
//! use a2a_runtime::server::{Conversation, ConversationReply};
//! use async_trait::async_trait;
//!
//! struct EchoConversation;
//!
//! #[async_trait]
//! impl Conversation for EchoConversation {
//!     async fn send(&self, message: &str, _parts: &[ContentPart]) -> A2AResult<ConversationReply> {
//!         Ok(ConversationReply::parts(vec![ContentPart::Text(format!("echo: {message}"))]))
//!     }
//! }
//! ```
//!
//! Then set up the HTTP server:
//!
//! ```rust,ignore
//! use a2a_runtime::server::{a2a_router, InMemoryTaskStore, RequestHandler};
//! use a2a_runtime::AgentCardBuilder;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let agent_card = AgentCardBuilder::new("Echo Agent")
//!         .description("A simple agent that echoes back your messages")
//!         .version("1.0.0")
//!         .jsonrpc_url("http://localhost:3000/a2a")
//!         .build();
//!
//!     let opener = Box::new(|_ctx: &str| {
//!         Box::pin(async move {
//!             let conv: Box<dyn a2a_runtime::server::Conversation> = Box::new(EchoConversation);
//!             Ok(conv)
//!         })
//!     });
//!     let handler = Arc::new(RequestHandler::new(opener, Arc::new(InMemoryTaskStore::new())));
//!
//!     let app = a2a_router(handler, agent_card);
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! The server automatically provides:
//! - `POST /a2a` — JSON-RPC 2.0 endpoint for all six A2A methods
//! - `GET /.well-known/agent.json` — agent card discovery
//!
//! ## Protocol
//!
//! Supported JSON-RPC methods:
//! - `message/send` — Send a message and get a task
//! - `message/stream` — Send a message with SSE streaming
//! - `tasks/get` — Retrieve a task by ID
//! - `tasks/list` — List tasks with filtering
//! - `tasks/cancel` — Cancel a running task
//! - `tasks/subscribe` — Subscribe to an in-flight or completed task's stream
//!
//! ## Architecture
//!
//! ### Client
//!
//! - [`client::A2AClient`] — typed methods for every A2A operation, with agent-card discovery cached for the client's lifetime
//! - [`client::CardResolver`] — discovers agent cards via the well-known URL convention
//! - [`client::JsonRpcTransport`] — HTTP transport with JSON-RPC 2.0 encoding and W3C trace-context propagation
//! - [`client::SseStream`] — cancellation-aware, parsed SSE event stream
//! - [`tools`] — turns a peer's [`types::AgentCard`] into local callable tools
//!
//! ### Server
//!
//! - [`server::Conversation`] / [`server::StreamingConversation`] — the interface an agent implementation provides
//! - [`server::RequestHandler`] — dispatches the six JSON-RPC methods against a [`server::TaskStore`] and a conversation opener
//! - [`server::TaskStore`] / [`server::InMemoryTaskStore`] — task persistence with state-machine enforcement
//! - [`server::Broadcaster`] — per-task SSE fan-out
//! - [`server::a2a_router`] — builds an axum `Router` with the A2A routes
//!
//! ### Core Types
//!
//! - [`types::Task`] — an A2A task with status, history, and artifacts
//! - [`types::Message`] / [`types::Part`] — a message and its content parts
//! - [`types::TaskState`] — the task lifecycle state machine
//! - [`types::StreamEvent`] — SSE event types (status updates, artifact updates)
//! - [`types::AgentCard`] — agent metadata and capabilities
//! - [`error::A2AError`] — error types with JSON-RPC error codes
//! - [`codec`] — the boundary between wire [`types::Part`]s and an agent's own content representation

pub mod builders;
pub mod codec;
pub mod error;
pub mod types;

#[cfg(feature = "client")]
pub mod client;

#[cfg(feature = "client")]
pub mod tools;

#[cfg(feature = "server")]
pub mod server;

/// Prelude module that re-exports commonly used types and traits.
///
/// Import this module with `use a2a_runtime::prelude::*;` to get access to the most
/// frequently used types without having to import them individually.
///
/// # Example
///
/// ```
/// use a2a_runtime::prelude::*;
///
/// // Now you have access to common types like:
/// // - Message, Part, Task, TaskState, Role
/// // - AgentCard, AgentSkill, AgentCapabilities
/// // - A2AError, A2AResult
/// // - builders like AgentCardBuilder
/// ```
pub mod prelude {
    // Core types
    pub use crate::types::{
        AgentCapabilities, AgentCard, AgentInterface, AgentSkill, Artifact, Message, Part, Role,
        SendMessageConfiguration, SendMessageParams, StreamEvent, Task, TaskArtifactUpdateEvent,
        TaskState, TaskStatus, TaskStatusUpdateEvent,
    };

    // The codec boundary between wire parts and an agent's own representation.
    pub use crate::codec::ContentPart;

    // Error types
    pub use crate::error::{A2AError, A2AResult};

    // Builders
    pub use crate::builders::AgentCardBuilder;

    #[cfg(feature = "client")]
    pub use crate::builders::ClientBuilder;

    #[cfg(feature = "client")]
    pub use crate::client::A2AClient;

    #[cfg(feature = "client")]
    pub use crate::tools::{Executor as ToolExecutor, ToolDescriptor};

    #[cfg(feature = "server")]
    pub use crate::builders::ServerBuilder;

    #[cfg(feature = "server")]
    pub use crate::server::{
        a2a_router, Broadcaster, Conversation, ConversationOpener, ConversationReply,
        InMemoryTaskStore, RequestHandler, StreamChunk, StreamingConversation, TaskStore,
    };
}

// Re-export core types at crate root for convenience.
pub use builders::AgentCardBuilder;
pub use error::{A2AError, A2AResult};
pub use types::*;

#[cfg(feature = "client")]
pub use builders::ClientBuilder;

#[cfg(feature = "server")]
pub use builders::ServerBuilder;
