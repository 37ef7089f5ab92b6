//! `message/stream` over real HTTP via SSE, including tool-call suppression
//! and peer-disconnect cancellation.

mod common;

use std::sync::Arc;
use std::time::Duration;

use a2a_runtime::client::A2AClient;
use a2a_runtime::types::{Message, StreamEvent};
use common::{gated_streaming_opener, stalling_opener, start_test_server, streaming_opener};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn message_stream_emits_working_then_artifact_then_completed() {
    let (base_url, server) = start_test_server(streaming_opener()).await;
    let client = A2AClient::new(&base_url);

    let mut stream = client
        .send_message_stream(Message::user("stream this"), None, CancellationToken::new())
        .await
        .unwrap();

    let mut saw_working = false;
    let mut saw_artifact = false;
    let mut saw_completed = false;

    while let Some(event) = stream.next().await {
        match event.unwrap() {
            StreamEvent::Status(status) => {
                match status.status.state.to_string().as_str() {
                    "working" => saw_working = true,
                    "completed" => saw_completed = true,
                    _ => {}
                }
            }
            StreamEvent::Artifact(update) => {
                saw_artifact = true;
                let text = &update.artifact.parts[0];
                assert_eq!(text.text.as_deref(), Some("Echo: stream this"));
            }
        }
    }

    assert!(saw_working, "expected an initial working status event");
    assert!(saw_artifact, "expected the streamed text to land in an artifact");
    assert!(saw_completed, "expected a terminal completed status event");

    server.abort();
}

#[tokio::test]
async fn message_stream_suppresses_tool_call_chunks() {
    // The StreamingEchoConversation test double emits a ToolCall chunk
    // between its two text chunks; the handler must never surface it as a
    // StreamEvent (agent-opacity — tool use is an implementation detail).
    let (base_url, server) = start_test_server(streaming_opener()).await;
    let client = A2AClient::new(&base_url);

    let mut stream = client
        .send_message_stream(Message::user("hi"), None, CancellationToken::new())
        .await
        .unwrap();

    let mut artifact_count = 0;
    while let Some(event) = stream.next().await {
        if let StreamEvent::Artifact(_) = event.unwrap() {
            artifact_count += 1;
        }
    }
    assert_eq!(
        artifact_count, 1,
        "the tool-call chunk must not surface as its own artifact event"
    );

    server.abort();
}

#[tokio::test]
async fn late_subscriber_observes_completion_alongside_the_original_stream() {
    // The worker parks mid-stream on a gate; a second `tasks/subscribe` call
    // joins the still-open broadcaster before the gate is released, so both
    // the original stream and the late one must see the final event.
    let gate = Arc::new(tokio::sync::Notify::new());
    let (base_url, server) = start_test_server(gated_streaming_opener(gate.clone())).await;
    let client = A2AClient::new(&base_url);

    let mut primary = client
        .send_message_stream(Message::user("gate this"), None, CancellationToken::new())
        .await
        .unwrap();

    let first = primary.next().await.unwrap().unwrap();
    let task_id = match first {
        StreamEvent::Status(status) => status.task_id.clone(),
        other => panic!("expected an initial working status event, got {other:?}"),
    };

    let mut late = client
        .subscribe_to_task(&task_id, CancellationToken::new())
        .await
        .unwrap();

    gate.notify_one();

    let mut primary_saw_completed = false;
    while let Some(event) = primary.next().await {
        if let StreamEvent::Status(status) = event.unwrap() {
            if status.status.state.to_string() == "completed" {
                primary_saw_completed = true;
            }
        }
    }
    assert!(
        primary_saw_completed,
        "the original subscriber should still observe completion"
    );

    let mut late_saw_completed = false;
    while let Some(event) = late.next().await {
        if let StreamEvent::Status(status) = event.unwrap() {
            if status.status.state.to_string() == "completed" {
                late_saw_completed = true;
            }
        }
    }
    assert!(
        late_saw_completed,
        "the late subscriber should observe completion through the shared broadcaster"
    );

    server.abort();
}

#[tokio::test]
async fn dropping_the_client_stream_cancels_the_server_worker() {
    let (base_url, server) = start_test_server(stalling_opener()).await;
    let client = A2AClient::new(&base_url);

    let cancel = CancellationToken::new();
    let stream = client
        .send_message_stream(Message::user("hang forever"), None, cancel.clone())
        .await
        .unwrap();

    // Give the server a moment to register the worker and its cancel token,
    // then simulate peer disconnect by dropping/cancelling the client side.
    tokio::time::sleep(Duration::from_millis(50)).await;
    drop(stream);
    cancel.cancel();

    // No assertion beyond "this completes" — the point is that the server's
    // StreamHandle::drop fires cancellation instead of leaking the stalled
    // worker forever. Give the server a beat to act on it before teardown.
    tokio::time::sleep(Duration::from_millis(50)).await;

    server.abort();
}
