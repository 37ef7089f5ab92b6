//! A2A server framework — the pieces needed to build an A2A-compatible agent.
//!
//! - [`Conversation`] / [`StreamingConversation`] — the interface an agent
//!   implementation provides, opened per-context by a [`ConversationOpener`].
//! - [`TaskStore`] trait + [`InMemoryTaskStore`] — task persistence with
//!   state-machine enforcement.
//! - [`Broadcaster`] — per-task SSE fan-out to concurrent subscribers.
//! - [`RequestHandler`] — dispatches the six JSON-RPC methods against an
//!   opener and a store.
//! - [`a2a_router`] — ready-made axum routes for A2A servers.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use a2a_runtime::server::{a2a_router, Conversation, ConversationReply, InMemoryTaskStore, RequestHandler};
//! use a2a_runtime::codec::ContentPart;
//! use async_trait::async_trait;
//!
//! struct EchoConversation;
//!
//! #[async_trait]
//! impl Conversation for EchoConversation {
//!     async fn send(&self, message: &str, _parts: &[ContentPart]) -> a2a_runtime::A2AResult<ConversationReply> {
//!         Ok(ConversationReply::parts(vec![ContentPart::Text(format!("echo: {message}"))]))
//!     }
//! }
//!
//! let opener = Box::new(|_ctx: &str| {
//!     Box::pin(async move {
//!         let conv: Box<dyn Conversation> = Box::new(EchoConversation);
//!         Ok(conv)
//!     })
//! });
//! let store = Arc::new(InMemoryTaskStore::new());
//! let handler = Arc::new(RequestHandler::new(opener, store));
//! let app = a2a_router(handler, agent_card);
//! ```

pub mod axum_integration;
pub mod broadcaster;
pub mod conversation;
pub mod request_handler;
pub mod task_store;

pub use axum_integration::a2a_router;
pub use broadcaster::Broadcaster;
pub use conversation::{
    Conversation, ConversationOpener, ConversationReply, StreamChunk, StreamingConversation,
};
pub use request_handler::{RequestHandler, StreamHandle};
pub use task_store::{new_task_id, InMemoryTaskStore, TaskStore};
