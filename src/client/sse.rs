//! SSE framing and event dispatch — a pure parser over lines, independent
//! of any transport, so it is unit-testable without an HTTP server.
//!
//! [`SseFrameParser`] consumes lines one at a time and yields a dispatched
//! payload string whenever the SSE framing rules say an event is complete.
//! [`SseStream`] wraps that parser around a live `reqwest::Response` body
//! and turns dispatched payloads into [`StreamEvent`]s, handling the
//! JSON-RPC envelope unwrap and the artifact/status discrimination.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::Stream;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{A2AError, A2AResult};
use crate::types::StreamEvent;

/// Accumulates SSE `data:` lines into dispatched event payloads.
///
/// Framing rules: a line starting with `:` is a comment and ignored; a
/// `data:` line strips one leading space after the colon and is appended to
/// the current event buffer; an empty line dispatches the accumulated
/// buffer (joined with `\n` across multiple `data:` lines) and resets it.
/// Any other field (`event:`, `id:`, `retry:`) is ignored.
#[derive(Debug, Default)]
pub struct SseFrameParser {
    buffer: Vec<String>,
}

impl SseFrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line (without its trailing newline). Returns `Some(payload)`
    /// if this line completed an event.
    pub fn feed_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            if self.buffer.is_empty() {
                return None;
            }
            return Some(self.dispatch());
        }

        if line.starts_with(':') {
            return None;
        }

        if let Some(data) = line.strip_prefix("data:") {
            let data = data.strip_prefix(' ').unwrap_or(data);
            self.buffer.push(data.to_string());
        }
        // Other fields (event:, id:, retry:) are ignored — field discovery
        // happens entirely through payload shape, not SSE event names.

        None
    }

    /// At EOF, dispatch any buffered data as a final event.
    pub fn finish(mut self) -> Option<String> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(self.dispatch())
        }
    }

    fn dispatch(&mut self) -> String {
        std::mem::take(&mut self.buffer).join("\n")
    }
}

/// Parse one dispatched SSE payload into a [`StreamEvent`], unwrapping a
/// JSON-RPC envelope if present and discriminating by field presence.
/// Returns `Ok(None)` for payloads that are neither an artifact nor a
/// status event — forward compatibility with future event shapes.
pub fn parse_payload(payload: &str) -> A2AResult<Option<StreamEvent>> {
    let value: serde_json::Value = serde_json::from_str(payload)
        .map_err(|e| A2AError::InvalidJson(format!("invalid SSE JSON payload: {e}")))?;

    let value = if value.get("jsonrpc").is_some() {
        if let Some(error) = value.get("error") {
            let code = error.get("code").and_then(|c| c.as_i64()).unwrap_or(-1);
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown error")
                .to_string();
            let data = error.get("data").cloned();
            return Err(A2AError::JsonRpc {
                code,
                message,
                data,
            });
        }
        match value.get("result") {
            Some(result) => result.clone(),
            None => return Ok(None),
        }
    } else {
        value
    };

    if value.get("artifact").is_some() || value.get("status").is_some() {
        let event: StreamEvent = serde_json::from_value(value)
            .map_err(|e| A2AError::InvalidJson(format!("invalid stream event: {e}")))?;
        Ok(Some(event))
    } else {
        Ok(None)
    }
}

/// A cancellation-aware stream of [`StreamEvent`]s parsed from a live SSE
/// HTTP response body.
pub struct SseStream {
    receiver: mpsc::Receiver<A2AResult<StreamEvent>>,
    _task: tokio::task::JoinHandle<()>,
}

impl std::fmt::Debug for SseStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SseStream").finish_non_exhaustive()
    }
}

impl SseStream {
    /// Parse `response`'s body as SSE, cancellable via `cancel`. The
    /// response body is guaranteed to be released exactly once: the
    /// background task owns it for its entire lifetime and drops it when
    /// the byte stream ends, the parser finishes, or `cancel` fires.
    pub(crate) fn from_response(response: reqwest::Response, cancel: CancellationToken) -> Self {
        let (tx, rx) = mpsc::channel(64);

        let task = tokio::spawn(async move {
            run_parser(response, tx, cancel).await;
        });

        Self {
            receiver: rx,
            _task: task,
        }
    }

    /// Pull the next event. `None` means the stream ended (peer closed the
    /// connection, cancellation fired, or a protocol error was already
    /// delivered as the final item).
    pub async fn next(&mut self) -> Option<A2AResult<StreamEvent>> {
        self.receiver.recv().await
    }
}

impl Stream for SseStream {
    type Item = A2AResult<StreamEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

async fn run_parser(
    response: reqwest::Response,
    tx: mpsc::Sender<A2AResult<StreamEvent>>,
    cancel: CancellationToken,
) {
    let mut byte_stream = response.bytes_stream();
    let mut parser = SseFrameParser::new();
    let mut carry = String::new();

    loop {
        let chunk = tokio::select! {
            _ = cancel.cancelled() => break,
            chunk = byte_stream.next() => chunk,
        };

        let Some(chunk) = chunk else { break };
        let chunk = match chunk {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = tx
                    .send(Err(A2AError::Transport(format!(
                        "error reading SSE stream: {e}"
                    ))))
                    .await;
                return;
            }
        };

        let text = match std::str::from_utf8(&chunk) {
            Ok(t) => t,
            Err(e) => {
                let _ = tx
                    .send(Err(A2AError::Transport(format!(
                        "invalid UTF-8 in SSE stream: {e}"
                    ))))
                    .await;
                return;
            }
        };

        carry.push_str(text);

        while let Some(pos) = carry.find('\n') {
            let line = carry[..pos].trim_end_matches('\r').to_string();
            carry = carry[pos + 1..].to_string();

            if let Some(payload) = parser.feed_line(&line) {
                if !dispatch(&payload, &tx).await {
                    return;
                }
            }
        }
    }

    if !carry.is_empty() {
        if let Some(payload) = parser.feed_line(&carry) {
            let _ = dispatch(&payload, &tx).await;
        }
    }
    if let Some(payload) = parser.finish() {
        let _ = dispatch(&payload, &tx).await;
    }
}

/// Send the parsed result of `payload` to `tx`. Returns `false` if the
/// receiver has gone away and the caller should stop producing.
async fn dispatch(payload: &str, tx: &mpsc::Sender<A2AResult<StreamEvent>>) -> bool {
    match parse_payload(payload) {
        Ok(Some(event)) => tx.send(Ok(event)).await.is_ok(),
        Ok(None) => true,
        Err(e) => {
            let _ = tx.send(Err(e)).await;
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TaskState, TaskStatus, TaskStatusUpdateEvent};

    #[test]
    fn comment_lines_are_ignored() {
        let mut parser = SseFrameParser::new();
        assert_eq!(parser.feed_line(": keepalive"), None);
    }

    #[test]
    fn single_data_line_dispatches_on_blank_line() {
        let mut parser = SseFrameParser::new();
        assert_eq!(parser.feed_line("data: {\"a\":1}"), None);
        assert_eq!(parser.feed_line(""), Some("{\"a\":1}".to_string()));
    }

    #[test]
    fn multiple_data_lines_join_with_newline() {
        let mut parser = SseFrameParser::new();
        assert_eq!(parser.feed_line("data: line one"), None);
        assert_eq!(parser.feed_line("data: line two"), None);
        assert_eq!(
            parser.feed_line(""),
            Some("line one\nline two".to_string())
        );
    }

    #[test]
    fn eof_dispatches_buffered_data() {
        let mut parser = SseFrameParser::new();
        parser.feed_line("data: trailing");
        assert_eq!(parser.finish(), Some("trailing".to_string()));
    }

    #[test]
    fn eof_with_empty_buffer_dispatches_nothing() {
        let parser = SseFrameParser::new();
        assert_eq!(parser.finish(), None);
    }

    #[test]
    fn other_fields_are_ignored() {
        let mut parser = SseFrameParser::new();
        assert_eq!(parser.feed_line("event: update"), None);
        assert_eq!(parser.feed_line("id: 1"), None);
        assert_eq!(parser.feed_line("retry: 5000"), None);
    }

    #[test]
    fn parse_payload_discriminates_status() {
        let event = TaskStatusUpdateEvent {
            task_id: "t1".into(),
            context_id: "c1".into(),
            status: TaskStatus::new(TaskState::Working),
        };
        let payload = serde_json::to_string(&event).unwrap();
        let parsed = parse_payload(&payload).unwrap().unwrap();
        assert!(matches!(parsed, StreamEvent::Status(_)));
    }

    #[test]
    fn parse_payload_unwraps_json_rpc_envelope() {
        let event = TaskStatusUpdateEvent {
            task_id: "t1".into(),
            context_id: "c1".into(),
            status: TaskStatus::new(TaskState::Working),
        };
        let wrapped = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": event,
        });
        let parsed = parse_payload(&wrapped.to_string()).unwrap().unwrap();
        assert!(matches!(parsed, StreamEvent::Status(_)));
    }

    #[test]
    fn parse_payload_surfaces_json_rpc_error() {
        let wrapped = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": -32600, "message": "Invalid Request"},
        });
        let err = parse_payload(&wrapped.to_string()).unwrap_err();
        assert!(matches!(err, A2AError::JsonRpc { code: -32600, .. }));
    }

    #[test]
    fn parse_payload_discards_unrecognized_shape_silently() {
        let payload = serde_json::json!({"unrelated": true}).to_string();
        assert_eq!(parse_payload(&payload).unwrap(), None);
    }
}
