//! The `Conversation` abstraction — the interface an agent implementation
//! provides to the server.
//!
//! A `Conversation` is opened per-context by a [`ConversationOpener`] and
//! handles one turn at a time through `send`. Streaming is an optional
//! capability: an implementation that also wants to emit incremental
//! chunks implements [`StreamingConversation`] and returns itself from
//! `as_streaming`, letting the server discover the capability with a single
//! downcast query rather than a flag on every conversation.

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::stream::BoxStream;

use crate::codec::ContentPart;
use crate::error::A2AResult;

/// The result of one `Conversation::send` turn.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationReply {
    /// Reply content, synthesized into a single task artifact on success.
    pub parts: Vec<ContentPart>,
    /// When `true`, the turn produced no artifact and the task should move
    /// to `input-required` instead of `completed` — the agent is waiting on
    /// a tool call or further input before it can reply.
    pub pending_tools: bool,
}

impl ConversationReply {
    /// A completed reply carrying content parts.
    pub fn parts(parts: Vec<ContentPart>) -> Self {
        Self {
            parts,
            pending_tools: false,
        }
    }

    /// A reply that needs more input before it can produce content.
    pub fn pending_tools() -> Self {
        Self {
            parts: Vec::new(),
            pending_tools: true,
        }
    }
}

/// One incremental unit of a streamed reply.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    /// A fragment of text to append to the current reply.
    Text(String),
    /// A complete content part (e.g. media) to attach to the reply.
    Media(ContentPart),
    /// The agent is invoking a named tool; not surfaced as reply content,
    /// only as a status message so callers can show progress.
    ToolCall { name: String },
    /// The stream has finished; any accumulated content is final.
    Done,
    /// The agent failed partway through the turn.
    Error(String),
}

/// A conversation turn: send a message, get back the reply content parts.
///
/// Implementations are held behind `Arc<dyn Conversation>` and may be
/// called concurrently for different turns of the same context, so
/// internal state must be synchronized.
#[async_trait]
pub trait Conversation: Send + Sync {
    /// Send a message and wait for the complete reply.
    async fn send(&self, message: &str, parts: &[ContentPart]) -> A2AResult<ConversationReply>;

    /// Release any resources held for this conversation (e.g. a cached
    /// upstream session). Default no-op.
    async fn close(&self) {}

    /// Downcast query: returns `Some` if this conversation also supports
    /// streaming replies via [`StreamingConversation::stream`].
    fn as_streaming(&self) -> Option<&dyn StreamingConversation> {
        None
    }
}

/// Optional supertrait for conversations that can emit incremental chunks
/// instead of (or in addition to) a single final `send` result.
#[async_trait]
pub trait StreamingConversation: Conversation {
    /// Send a message and stream the reply as it is produced.
    async fn stream(
        &self,
        message: &str,
        parts: &[ContentPart],
    ) -> A2AResult<BoxStream<'static, StreamChunk>>;
}

/// Opens a [`Conversation`] for a given context id. Implementations
/// typically cache the opened conversation per context (double-checked
/// locking over a `RwLock<HashMap<String, Arc<dyn Conversation>>>`) so
/// repeated turns in the same context reuse state.
pub type ConversationOpener =
    Box<dyn for<'a> Fn(&'a str) -> BoxFuture<'a, A2AResult<Box<dyn Conversation>>> + Send + Sync>;
