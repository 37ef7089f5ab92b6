//! JSON-RPC error code mapping over real HTTP.

mod common;

use common::{echo_opener, start_test_server};

async fn post_raw(base_url: &str, body: &str) -> serde_json::Value {
    reqwest::Client::new()
        .post(format!("{base_url}/a2a"))
        .header("content-type", "application/json")
        .body(body.to_string())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

#[tokio::test]
async fn malformed_json_body_yields_parse_error() {
    let (base_url, server) = start_test_server(echo_opener()).await;

    let resp = post_raw(&base_url, "{ not valid json").await;
    assert_eq!(resp["error"]["code"], -32700);
    assert!(resp["id"].is_null());

    server.abort();
}

#[tokio::test]
async fn unknown_method_yields_method_not_found() {
    let (base_url, server) = start_test_server(echo_opener()).await;

    let body = serde_json::json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "tasks/frobnicate",
        "params": {},
    });
    let resp = post_raw(&base_url, &body.to_string()).await;
    assert_eq!(resp["error"]["code"], -32601);
    assert_eq!(resp["id"], 1);

    server.abort();
}

#[tokio::test]
async fn bad_params_yields_invalid_params() {
    let (base_url, server) = start_test_server(echo_opener()).await;

    // `message/send` requires a `message` field; send params missing it.
    let body = serde_json::json!({
        "jsonrpc": "2.0",
        "id": 2,
        "method": "message/send",
        "params": {"not_a_message": true},
    });
    let resp = post_raw(&base_url, &body.to_string()).await;
    assert_eq!(resp["error"]["code"], -32602);

    server.abort();
}

#[tokio::test]
async fn unknown_task_id_yields_task_not_found() {
    let (base_url, server) = start_test_server(echo_opener()).await;

    let body = serde_json::json!({
        "jsonrpc": "2.0",
        "id": 3,
        "method": "tasks/get",
        "params": {"id": "ghost-task"},
    });
    let resp = post_raw(&base_url, &body.to_string()).await;
    assert_eq!(resp["error"]["code"], -32001);

    server.abort();
}

#[tokio::test]
async fn streaming_rejected_when_conversation_is_not_streaming() {
    // `EchoConversation` does not implement `StreamingConversation`, so
    // `message/stream` must be rejected as an unsupported method rather
    // than silently falling back to a single blocking reply.
    let (base_url, server) = start_test_server(echo_opener()).await;

    let body = serde_json::json!({
        "jsonrpc": "2.0",
        "id": 4,
        "method": "message/stream",
        "params": {
            "message": {
                "messageId": "m1",
                "role": "user",
                "parts": [{"text": "hi"}],
            },
        },
    });

    let resp = reqwest::Client::new()
        .post(format!("{base_url}/a2a"))
        .json(&body)
        .send()
        .await
        .unwrap();

    // The handler rejects before ever upgrading to an SSE response.
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["error"]["code"], -32601);

    server.abort();
}
