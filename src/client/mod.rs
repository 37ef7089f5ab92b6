//! A2A client — call remote A2A agents.
//!
//! - [`A2AClient`] — typed methods for every A2A JSON-RPC operation (send
//!   messages, get/cancel/list tasks, subscribe to streams), with agent-card
//!   discovery cached for the client's lifetime.
//! - [`CardResolver`] — discover agent cards via the well-known URL convention.
//! - [`Transport`] / [`JsonRpcTransport`] — pluggable transport layer.
//! - [`SseStream`] — cancellation-aware, parsed SSE event stream.
//! - [`trace`] — W3C trace-context propagation for outbound calls.
//!
//! # Quick Start
//!
//! ```no_run
//! use a2a_runtime::client::A2AClient;
//! use a2a_runtime::types::Message;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = A2AClient::new("http://localhost:7420");
//! client.discover().await?;
//!
//! let task = client.send_message(Message::user("Hello, agent!")).await?;
//! println!("Task {} — status: {}", task.id, task.status.state);
//! # Ok(())
//! # }
//! ```

mod a2a_client;
mod card_resolver;
mod sse;
pub mod trace;
mod transport;

pub use a2a_client::A2AClient;
pub use card_resolver::CardResolver;
pub use sse::{parse_payload, SseFrameParser, SseStream};
pub use trace::TraceContext;
pub use transport::{AuthConfig, JsonRpcTransport, Transport, TransportConfig};
