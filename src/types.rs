//! Wire types for the A2A JSON-RPC protocol.
//!
//! These are the types that cross the network: JSON-RPC envelopes, tasks,
//! messages, parts, agent cards, and the streaming event types. The runtime
//! `ContentPart` representation used by the conversation-reply layer lives in
//! [`crate::codec`], which converts bidirectionally between it and [`Part`].

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Task state machine
// ============================================================================

/// The lifecycle state of a [`Task`].
///
/// See the module-level state machine: `submitted -> working ->
/// {completed, failed, canceled, input_required, auth_required, rejected}`,
/// with `input_required`/`auth_required` each looping back to `working` or
/// out to `canceled`. `completed`, `failed`, `canceled`, and `rejected` are
/// terminal — no further transitions are accepted from them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskState {
    Submitted,
    Working,
    Completed,
    Failed,
    Canceled,
    InputRequired,
    AuthRequired,
    Rejected,
}

impl TaskState {
    /// Returns `true` if this state has no outgoing transitions.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Canceled | TaskState::Rejected
        )
    }

    /// Returns `true` if `self -> next` is a legal transition per the state
    /// machine, or if `next == self` is requested as a no-op re-assertion of
    /// a non-terminal state (treated as legal: setting `working` while
    /// already `working` is not a transition at all).
    pub fn can_transition_to(self, next: TaskState) -> bool {
        use TaskState::*;
        if self.is_terminal() {
            return false;
        }
        match self {
            Submitted => matches!(next, Working),
            Working => matches!(
                next,
                Completed | Failed | Canceled | InputRequired | AuthRequired | Rejected
            ),
            InputRequired => matches!(next, Working | Canceled),
            AuthRequired => matches!(next, Working | Canceled),
            Completed | Failed | Canceled | Rejected => false,
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Submitted => "submitted",
            TaskState::Working => "working",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
            TaskState::Canceled => "canceled",
            TaskState::InputRequired => "input-required",
            TaskState::AuthRequired => "auth-required",
            TaskState::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// Role of a [`Message`]'s author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::User => "user",
            Role::Agent => "agent",
        })
    }
}

// ============================================================================
// Part — wire content unit, discriminated by field presence
// ============================================================================

/// A single unit of message/artifact content.
///
/// Exactly one of `text`, `raw`, `url`, or `data` should be populated; the
/// codec (see [`crate::codec`]) dispatches on presence in that order.
/// `raw` bytes are carried on the wire as standard base64.
/// `data` (structured content) is accepted on the wire for round-tripping
/// but is rejected during codec ingress — see [`crate::codec::ingress`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", default, with = "base64_bytes_opt")]
    pub raw: Option<Vec<u8>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(rename = "mediaType", skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Part {
    /// Build a text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    /// Build a raw-bytes part.
    pub fn raw(bytes: Vec<u8>, media_type: impl Into<String>) -> Self {
        Self {
            raw: Some(bytes),
            media_type: Some(media_type.into()),
            ..Default::default()
        }
    }

    /// Build a raw-bytes part with a filename hint.
    pub fn raw_with_filename(
        bytes: Vec<u8>,
        media_type: impl Into<String>,
        filename: impl Into<String>,
    ) -> Self {
        Self {
            raw: Some(bytes),
            media_type: Some(media_type.into()),
            filename: Some(filename.into()),
            ..Default::default()
        }
    }

    /// Build a URL-referenced part.
    pub fn url(url: impl Into<String>, media_type: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            media_type: Some(media_type.into()),
            ..Default::default()
        }
    }

    /// Build a structured-data part. Ingress through the codec rejects these.
    pub fn data(data: Value) -> Self {
        Self {
            data: Some(data),
            ..Default::default()
        }
    }

    /// Returns `true` if no content field is populated at all.
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.raw.is_none() && self.url.is_none() && self.data.is_none()
    }
}

mod base64_bytes_opt {
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(bytes) => {
                let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
                serializer.serialize_some(&encoded)
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt: Option<String> = Option::deserialize(deserializer)?;
        opt.map(|s| {
            base64::engine::general_purpose::STANDARD
                .decode(s.as_bytes())
                .map_err(serde::de::Error::custom)
        })
        .transpose()
    }
}

// ============================================================================
// Message, Artifact, Task
// ============================================================================

/// A single message exchanged between a user and an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub role: Role,
    pub parts: Vec<Part>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl Message {
    /// Build a user message with a single text part.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::text(text)],
            message_id: Some(uuid::Uuid::new_v4().to_string()),
            context_id: None,
            task_id: None,
            metadata: None,
        }
    }

    /// Build an agent message with a single text part.
    pub fn agent(text: impl Into<String>) -> Self {
        Self {
            role: Role::Agent,
            parts: vec![Part::text(text)],
            message_id: Some(uuid::Uuid::new_v4().to_string()),
            context_id: None,
            task_id: None,
            metadata: None,
        }
    }

    /// Build an agent message from arbitrary parts.
    pub fn agent_parts(parts: Vec<Part>) -> Self {
        Self {
            role: Role::Agent,
            parts,
            message_id: Some(uuid::Uuid::new_v4().to_string()),
            context_id: None,
            task_id: None,
            metadata: None,
        }
    }
}

/// A named, ordered collection of parts produced by a task. Artifacts are
/// append-only within a task's lifetime — never reordered or removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub artifact_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub parts: Vec<Part>,
}

/// The status of a [`Task`] at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatus {
    pub state: TaskState,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,

    /// RFC 3339 UTC timestamp of the transition into `state`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl TaskStatus {
    pub fn new(state: TaskState) -> Self {
        Self {
            state,
            message: None,
            timestamp: Some(chrono::Utc::now().to_rfc3339()),
        }
    }
}

/// A unit of asynchronous work tracked through the task lifecycle state
/// machine, identified by a 32-hex-character ID derived from 16 random
/// bytes (see [`crate::server::task_store::new_task_id`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub context_id: String,
    pub status: TaskStatus,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<Artifact>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<Message>>,
}

// ============================================================================
// Streaming events
// ============================================================================

/// `message/stream` / `tasks/subscribe` status transition event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatusUpdateEvent {
    pub task_id: String,
    pub context_id: String,
    pub status: TaskStatus,
}

/// `message/stream` / `tasks/subscribe` artifact-produced event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskArtifactUpdateEvent {
    pub task_id: String,
    pub context_id: String,
    pub artifact: Artifact,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub append: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_chunk: Option<bool>,
}

/// A streaming event as seen by a client or broadcaster subscriber.
///
/// Discriminated on the wire by field presence: a payload with an
/// `"artifact"` field is a [`TaskArtifactUpdateEvent`]; one with a
/// `"status"` field is a [`TaskStatusUpdateEvent`]. Serialization is
/// flattened (no wrapper tag) to match this presence-based discrimination.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Status(TaskStatusUpdateEvent),
    Artifact(TaskArtifactUpdateEvent),
}

impl Serialize for StreamEvent {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            StreamEvent::Status(e) => e.serialize(serializer),
            StreamEvent::Artifact(e) => e.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for StreamEvent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        if value.get("artifact").is_some() {
            TaskArtifactUpdateEvent::deserialize(value)
                .map(StreamEvent::Artifact)
                .map_err(serde::de::Error::custom)
        } else if value.get("status").is_some() {
            TaskStatusUpdateEvent::deserialize(value)
                .map(StreamEvent::Status)
                .map_err(serde::de::Error::custom)
        } else {
            Err(serde::de::Error::custom(
                "stream event has neither 'artifact' nor 'status' field",
            ))
        }
    }
}

use serde::Deserializer;

// ============================================================================
// Agent card
// ============================================================================

/// One capability a peer agent advertises.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSkill {
    pub id: String,
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub examples: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_modes: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_modes: Option<Vec<String>>,
}

/// Describes who publishes an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentProvider {
    pub organization: String,
    pub url: String,
}

/// Boolean capability flags advertised by an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCapabilities {
    #[serde(default)]
    pub streaming: bool,

    #[serde(default)]
    pub push_notifications: bool,
}

/// One network interface an agent is reachable through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentInterface {
    pub url: String,
    pub transport: String,
}

/// Describes an agent: identity, capabilities, skills, and supported MIME
/// modes. Served at `GET /.well-known/agent.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCard {
    pub name: String,
    pub description: String,
    pub version: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<AgentProvider>,

    #[serde(default)]
    pub capabilities: AgentCapabilities,

    pub skills: Vec<AgentSkill>,

    #[serde(default)]
    pub default_input_modes: Vec<String>,

    #[serde(default)]
    pub default_output_modes: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supported_interfaces: Vec<AgentInterface>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation_url: Option<String>,
}

// ============================================================================
// JSON-RPC envelope
// ============================================================================

/// A JSON-RPC 2.0 request identifier — string or number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcId {
    String(String),
    Number(i64),
}

impl fmt::Display for JsonRpcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsonRpcId::String(s) => write!(f, "{s}"),
            JsonRpcId::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<i64> for JsonRpcId {
    fn from(n: i64) -> Self {
        JsonRpcId::Number(n)
    }
}

impl From<String> for JsonRpcId {
    fn from(s: String) -> Self {
        JsonRpcId::String(s)
    }
}

/// A JSON-RPC 2.0 request. `params` is left as a raw [`Value`] — each method
/// handler parses its own expected shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<JsonRpcId>,

    pub method: String,

    #[serde(default)]
    pub params: Value,
}

impl JsonRpcRequest {
    pub fn new(id: impl Into<JsonRpcId>, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: Some(id.into()),
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// A JSON-RPC 2.0 response. Exactly one of `result`/`error` is populated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,

    pub id: Option<JsonRpcId>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<JsonRpcId>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<JsonRpcId>, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

// ============================================================================
// Request parameter shapes
// ============================================================================

/// `SendMessageConfiguration` carried on `message/send` and `message/stream`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_output_modes: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_length: Option<i32>,

    /// When `true`, `message/send` blocks until the worker finishes instead
    /// of returning after the ~5ms settle window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocking: Option<bool>,
}

/// `message/send` / `message/stream` request params.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageParams {
    pub message: Message,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<SendMessageConfiguration>,
}

/// `tasks/get` request params.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetTaskParams {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_length: Option<i32>,
}

/// `tasks/cancel` request params.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelTaskParams {
    pub id: String,
}

/// `tasks/subscribe` request params.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribeToTaskParams {
    pub id: String,
}

/// `tasks/list` request params.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTasksParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_token: Option<String>,
}

/// `tasks/list` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTasksResponse {
    pub tasks: Vec<Task>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,

    pub page_size: i64,
    pub total_size: i64,
}
