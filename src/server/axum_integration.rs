//! Axum integration — ready-made HTTP routes for A2A servers.
//!
//! Provides an [`a2a_router`] function that creates an axum `Router` with:
//! - `POST /a2a` — JSON-RPC 2.0 dispatch for all six A2A methods
//! - `GET /.well-known/agent.json` — agent card discovery
//!
//! # Example
//!
//! ```rust,ignore
//! use a2a_runtime::server::{a2a_router, InMemoryTaskStore, RequestHandler};
//! use std::sync::Arc;
//!
//! let handler = Arc::new(RequestHandler::new(opener, Arc::new(InMemoryTaskStore::new())));
//! let app = a2a_router(handler, agent_card);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, app).await?;
//! ```

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use futures::stream::{Stream, StreamExt};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{self, A2AError};
use crate::types::{
    AgentCard, CancelTaskParams, GetTaskParams, JsonRpcError as A2AJsonRpcError, ListTasksParams,
    SendMessageParams, StreamEvent, SubscribeToTaskParams,
};

use super::request_handler::{RequestHandler, StreamHandle};

struct AppState {
    handler: Arc<RequestHandler>,
    agent_card: AgentCard,
}

/// Build an axum `Router` serving the A2A JSON-RPC endpoint and agent card.
pub fn a2a_router(handler: Arc<RequestHandler>, agent_card: AgentCard) -> Router {
    let state = Arc::new(AppState {
        handler,
        agent_card,
    });

    Router::new()
        .route("/.well-known/agent.json", get(handle_agent_card))
        .route("/a2a", post(handle_jsonrpc))
        .with_state(state)
}

async fn handle_agent_card(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(&state.agent_card)
}

#[derive(Debug, serde::Deserialize)]
struct JsonRpcRequestEnvelope {
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, serde::Serialize)]
struct JsonRpcResponseEnvelope {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<A2AJsonRpcError>,
}

impl JsonRpcResponseEnvelope {
    fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    fn error(id: Option<Value>, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(A2AJsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    fn from_a2a_error(id: Option<Value>, err: A2AError) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(err.into()),
        }
    }
}

/// Parse `request.params` into `T`, mapping a decode failure to `-32602`.
fn parse_params<T: serde::de::DeserializeOwned>(params: Value) -> Result<T, A2AError> {
    serde_json::from_value(params)
        .map_err(|e| A2AError::invalid_params(format!("invalid params: {e}")))
}

/// Dispatches a single JSON-RPC request over `POST /a2a`.
///
/// The body is read as raw bytes rather than through axum's `Json`
/// extractor so a malformed payload can be reported as a `-32700` JSON-RPC
/// error (with no `id`, since none could be parsed) instead of a bare HTTP
/// 400.
async fn handle_jsonrpc(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let request: JsonRpcRequestEnvelope = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(e) => {
            return Json(JsonRpcResponseEnvelope::error(
                None,
                error::PARSE_ERROR,
                format!("parse error: {e}"),
            ))
            .into_response();
        }
    };

    debug!(method = %request.method, "dispatching JSON-RPC request");

    match request.method.as_str() {
        "message/send" => handle_message_send(state, request).await,
        "message/stream" => handle_message_stream(state, request).await,
        "tasks/get" => handle_tasks_get(state, request).await,
        "tasks/cancel" => handle_tasks_cancel(state, request).await,
        "tasks/list" => handle_tasks_list(state, request).await,
        "tasks/subscribe" => handle_tasks_subscribe(state, request).await,
        method => {
            warn!(method = %method, "unknown JSON-RPC method");
            Json(JsonRpcResponseEnvelope::error(
                request.id,
                error::METHOD_NOT_FOUND,
                format!("method not found: {method}"),
            ))
            .into_response()
        }
    }
}

async fn handle_message_send(state: Arc<AppState>, request: JsonRpcRequestEnvelope) -> Response {
    let params: SendMessageParams = match parse_params(request.params) {
        Ok(p) => p,
        Err(e) => return Json(JsonRpcResponseEnvelope::from_a2a_error(request.id, e)).into_response(),
    };

    match state.handler.on_message_send(params).await {
        Ok(task) => respond_with(request.id, &task),
        Err(e) => Json(JsonRpcResponseEnvelope::from_a2a_error(request.id, e)).into_response(),
    }
}

async fn handle_message_stream(state: Arc<AppState>, request: JsonRpcRequestEnvelope) -> Response {
    let params: SendMessageParams = match parse_params(request.params) {
        Ok(p) => p,
        Err(e) => return Json(JsonRpcResponseEnvelope::from_a2a_error(request.id, e)).into_response(),
    };

    match state.handler.on_message_send_stream(params).await {
        Ok(handle) => sse_response(request.id, handle),
        Err(e) => Json(JsonRpcResponseEnvelope::from_a2a_error(request.id, e)).into_response(),
    }
}

async fn handle_tasks_get(state: Arc<AppState>, request: JsonRpcRequestEnvelope) -> Response {
    let params: GetTaskParams = match parse_params(request.params) {
        Ok(p) => p,
        Err(e) => return Json(JsonRpcResponseEnvelope::from_a2a_error(request.id, e)).into_response(),
    };

    match state.handler.on_get_task(params).await {
        Ok(task) => respond_with(request.id, &task),
        Err(e) => Json(JsonRpcResponseEnvelope::from_a2a_error(request.id, e)).into_response(),
    }
}

async fn handle_tasks_cancel(state: Arc<AppState>, request: JsonRpcRequestEnvelope) -> Response {
    let params: CancelTaskParams = match parse_params(request.params) {
        Ok(p) => p,
        Err(e) => return Json(JsonRpcResponseEnvelope::from_a2a_error(request.id, e)).into_response(),
    };

    match state.handler.on_cancel_task(params).await {
        Ok(task) => respond_with(request.id, &task),
        Err(e) => Json(JsonRpcResponseEnvelope::from_a2a_error(request.id, e)).into_response(),
    }
}

async fn handle_tasks_list(state: Arc<AppState>, request: JsonRpcRequestEnvelope) -> Response {
    let params: ListTasksParams = match parse_params(request.params) {
        Ok(p) => p,
        Err(e) => return Json(JsonRpcResponseEnvelope::from_a2a_error(request.id, e)).into_response(),
    };

    match state.handler.on_list_tasks(params).await {
        Ok(response) => respond_with(request.id, &response),
        Err(e) => Json(JsonRpcResponseEnvelope::from_a2a_error(request.id, e)).into_response(),
    }
}

async fn handle_tasks_subscribe(state: Arc<AppState>, request: JsonRpcRequestEnvelope) -> Response {
    let params: SubscribeToTaskParams = match parse_params(request.params) {
        Ok(p) => p,
        Err(e) => return Json(JsonRpcResponseEnvelope::from_a2a_error(request.id, e)).into_response(),
    };

    match state.handler.on_subscribe_to_task(params).await {
        Ok(events) => {
            let stream = render_sse(request.id, events);
            Sse::new(stream).keep_alive(KeepAlive::default()).into_response()
        }
        Err(e) => Json(JsonRpcResponseEnvelope::from_a2a_error(request.id, e)).into_response(),
    }
}

fn respond_with<T: serde::Serialize>(id: Option<Value>, value: &T) -> Response {
    match serde_json::to_value(value) {
        Ok(v) => Json(JsonRpcResponseEnvelope::success(id, v)).into_response(),
        Err(e) => Json(JsonRpcResponseEnvelope::error(
            id,
            error::INTERNAL_ERROR,
            format!("failed to serialize result: {e}"),
        ))
        .into_response(),
    }
}

/// Wrap a `message/stream` [`StreamHandle`] in an axum SSE response. Dropping
/// the response body — which axum does the moment the peer disconnects —
/// drops the handle, firing its cancellation token and tearing down the
/// worker driving it.
fn sse_response(id: Option<Value>, handle: StreamHandle) -> Response {
    let stream = render_sse(id, handle);
    Sse::new(stream).keep_alive(KeepAlive::default()).into_response()
}

/// Frame a stream of [`StreamEvent`]s as `data: <json>\n\n` SSE events, each
/// wrapped in a JSON-RPC success envelope. Field presence in the JSON
/// payload carries event discrimination; no SSE `event:` name is set.
fn render_sse(
    id: Option<Value>,
    mut events: impl Stream<Item = StreamEvent> + Unpin + Send + 'static,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        while let Some(event) = events.next().await {
            match serde_json::to_value(&event) {
                Ok(result) => {
                    let envelope = JsonRpcResponseEnvelope::success(id.clone(), result);
                    match serde_json::to_string(&envelope) {
                        Ok(json) => yield Ok(Event::default().data(json)),
                        Err(e) => warn!(error = %e, "failed to serialize SSE JSON-RPC envelope"),
                    }
                }
                Err(e) => warn!(error = %e, "failed to serialize stream event"),
            }
        }
    }
}
