//! Tool Bridge & Executor — exposes a remote agent's skills as local,
//! callable tools for an LLM tool-calling loop.
//!
//! Turns a peer's [`AgentCard`] into function-calling descriptors, dispatched
//! through [`A2AClient`]. [`register_agent`] synthesizes one
//! [`ToolDescriptor`] per skill; [`Executor`] dispatches calls against those
//! descriptors, caching one client per `agent_url` behind a double-checked
//! lock — the same idiom the server uses for its per-context conversation
//! cache.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use schemars::schema::{InstanceType, Schema, SchemaObject};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::client::A2AClient;
use crate::error::{A2AError, A2AResult};
use crate::types::{AgentCard, AgentSkill, Message, Part, Role, SendMessageConfiguration, Task};

/// Fixed shape every tool's input schema starts from: a single required
/// `query` string, widened with optional media fields per skill modality.
#[derive(JsonSchema)]
struct BaseToolInput {
    query: String,
}

/// Fixed shape every tool's output schema starts from.
#[derive(JsonSchema)]
struct BaseToolOutput {
    response: String,
}

/// A local tool synthesized from one skill of a remote agent's card, bound
/// to the `agent_url` + `skill_id` that [`Executor::execute`] dispatches
/// against.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub output_schema: Value,
    pub agent_url: String,
    pub skill_id: String,
}

/// Lowercase `input`, replacing runs of non-`[a-z0-9]` characters with a
/// single `_`, trimming leading/trailing underscores.
fn sanitize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_was_sep = false;
    for ch in input.chars() {
        let lower = ch.to_ascii_lowercase();
        if lower.is_ascii_alphanumeric() {
            out.push(lower);
            last_was_sep = false;
        } else if !last_was_sep {
            out.push('_');
            last_was_sep = true;
        }
    }
    out.trim_matches('_').to_string()
}

fn mode_matches(mode: &str, prefix: &str) -> bool {
    mode.split('/')
        .next()
        .map(|p| p.eq_ignore_ascii_case(prefix))
        .unwrap_or(false)
}

fn string_property() -> Schema {
    Schema::Object(SchemaObject {
        instance_type: Some(InstanceType::String.into()),
        ..Default::default()
    })
}

fn insert_properties(schema: &mut SchemaObject, extra: &[&str]) {
    let object = schema.object();
    for name in extra {
        object.properties.insert((*name).to_string(), string_property());
    }
}

/// Discover `card`'s skills and synthesize one tool per skill.
pub fn register_agent(card: &AgentCard, agent_url: &str) -> Vec<ToolDescriptor> {
    let agent_slug = sanitize(&card.name);
    let agent_url = agent_url.trim_end_matches('/').to_string();
    card.skills
        .iter()
        .map(|skill| build_descriptor(card, &agent_slug, skill, &agent_url))
        .collect()
}

fn build_descriptor(
    card: &AgentCard,
    agent_slug: &str,
    skill: &AgentSkill,
    agent_url: &str,
) -> ToolDescriptor {
    let skill_slug = sanitize(&skill.id);
    let name = format!("a2a_{agent_slug}_{skill_slug}");
    let description = skill
        .description
        .clone()
        .unwrap_or_else(|| skill.name.clone());

    let input_modes = skill
        .input_modes
        .as_deref()
        .unwrap_or(&card.default_input_modes);
    let output_modes = skill
        .output_modes
        .as_deref()
        .unwrap_or(&card.default_output_modes);

    let supports_image_in = input_modes.iter().any(|m| mode_matches(m, "image"));
    let supports_audio_in = input_modes.iter().any(|m| mode_matches(m, "audio"));
    let supports_media_out = output_modes
        .iter()
        .any(|m| mode_matches(m, "image") || mode_matches(m, "audio"));

    let mut input_root = schemars::schema_for!(BaseToolInput).schema;
    let mut extra_input = Vec::new();
    if supports_image_in {
        extra_input.extend(["image_url", "image_data"]);
    }
    if supports_audio_in {
        extra_input.push("audio_data");
    }
    insert_properties(&mut input_root, &extra_input);

    let mut output_root = schemars::schema_for!(BaseToolOutput).schema;
    if supports_media_out {
        insert_properties(&mut output_root, &["media_url", "media_type"]);
    }

    ToolDescriptor {
        name,
        description,
        input_schema: serde_json::to_value(input_root).unwrap_or_else(|_| json!({})),
        output_schema: serde_json::to_value(output_root).unwrap_or_else(|_| json!({})),
        agent_url: agent_url.to_string(),
        skill_id: skill.id.clone(),
    }
}

#[derive(Debug, Deserialize)]
struct ToolCallArgs {
    query: String,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    image_data: Option<String>,
    #[serde(default)]
    audio_data: Option<String>,
}

/// Dispatches tool calls against remote agents, caching one [`A2AClient`]
/// per `agent_url`.
pub struct Executor {
    clients: RwLock<HashMap<String, Arc<A2AClient>>>,
    call_timeout: Duration,
}

impl Executor {
    /// `call_timeout` bounds each individual tool call, layered atop
    /// whatever cancellation the caller supplies to [`Executor::execute`].
    pub fn new(call_timeout: Duration) -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
            call_timeout,
        }
    }

    async fn client_for(&self, agent_url: &str) -> Arc<A2AClient> {
        {
            let clients = self.clients.read().await;
            if let Some(client) = clients.get(agent_url) {
                return client.clone();
            }
        }

        let mut clients = self.clients.write().await;
        if let Some(client) = clients.get(agent_url) {
            return client.clone();
        }
        let client = Arc::new(A2AClient::new(agent_url.to_string()));
        clients.insert(agent_url.to_string(), client.clone());
        client
    }

    /// Execute `descriptor` with JSON `args` matching its input schema.
    /// Returns `{"response": <text>}`.
    pub async fn execute(
        &self,
        descriptor: &ToolDescriptor,
        args: Value,
        cancel: CancellationToken,
    ) -> A2AResult<Value> {
        let call: ToolCallArgs = serde_json::from_value(args)
            .map_err(|e| A2AError::invalid_params(format!("invalid tool call arguments: {e}")))?;

        let mut parts = vec![Part::text(call.query)];
        if let Some(url) = call.image_url {
            parts.push(Part::url(url, "image/*"));
        }
        if let Some(data) = call.image_data {
            parts.push(Part::raw(decode_base64(&data)?, "image/*"));
        }
        if let Some(data) = call.audio_data {
            parts.push(Part::raw(decode_base64(&data)?, "audio/*"));
        }

        let message = Message {
            role: Role::User,
            parts,
            message_id: Some(uuid::Uuid::new_v4().to_string()),
            context_id: None,
            task_id: None,
            metadata: Some(json!({ "skillId": descriptor.skill_id })),
        };

        let client = self.client_for(&descriptor.agent_url).await;
        let configuration = Some(SendMessageConfiguration {
            blocking: Some(true),
            ..Default::default()
        });

        let task = tokio::select! {
            _ = cancel.cancelled() => {
                return Err(A2AError::internal_error("tool call canceled"));
            }
            result = tokio::time::timeout(
                self.call_timeout,
                client.send_message_with(message, configuration),
            ) => {
                result.map_err(|_| A2AError::Timeout(format!(
                    "tool call to {} timed out", descriptor.agent_url
                )))??
            }
        };

        Ok(json!({ "response": extract_response_text(&task) }))
    }
}

fn decode_base64(data: &str) -> A2AResult<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(data.as_bytes())
        .map_err(|e| A2AError::invalid_params(format!("invalid base64 payload: {e}")))
}

fn extract_response_text(task: &Task) -> String {
    if let Some(message) = &task.status.message {
        let text = concat_part_text(&message.parts, "");
        if !text.is_empty() {
            return text;
        }
    }

    let artifact_parts: Vec<&Part> = task
        .artifacts
        .iter()
        .flat_map(|artifact| artifact.parts.iter())
        .collect();
    concat_part_text(&artifact_parts, "\n")
}

fn concat_part_text<P: AsRef<Part>>(parts: &[P], separator: &str) -> String {
    parts
        .iter()
        .filter_map(|p| p.as_ref().text.clone())
        .collect::<Vec<_>>()
        .join(separator)
}

impl AsRef<Part> for Part {
    fn as_ref(&self) -> &Part {
        self
    }
}

impl AsRef<Part> for &Part {
    fn as_ref(&self) -> &Part {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AgentCapabilities, TaskState, TaskStatus};

    fn sample_card(skills: Vec<AgentSkill>) -> AgentCard {
        AgentCard {
            name: "Research Helper!".to_string(),
            description: "does research".to_string(),
            version: "1.0.0".to_string(),
            provider: None,
            capabilities: AgentCapabilities::default(),
            skills,
            default_input_modes: vec!["text".to_string()],
            default_output_modes: vec!["text".to_string()],
            supported_interfaces: Vec::new(),
            icon_url: None,
            documentation_url: None,
        }
    }

    fn text_skill(id: &str) -> AgentSkill {
        AgentSkill {
            id: id.to_string(),
            name: "Summarize".to_string(),
            description: Some("Summarizes text".to_string()),
            tags: None,
            examples: None,
            input_modes: None,
            output_modes: None,
        }
    }

    #[test]
    fn sanitize_collapses_non_alphanumeric_runs() {
        assert_eq!(sanitize("Research Helper!"), "research_helper");
        assert_eq!(sanitize("__leading"), "leading");
        assert_eq!(sanitize("trailing__"), "trailing");
    }

    #[test]
    fn tool_name_combines_agent_and_skill() {
        let card = sample_card(vec![text_skill("summarize-v1")]);
        let tools = register_agent(&card, "http://localhost:7420/");
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "a2a_research_helper_summarize_v1");
        assert_eq!(tools[0].agent_url, "http://localhost:7420");
    }

    #[test]
    fn text_only_skill_has_no_media_fields() {
        let card = sample_card(vec![text_skill("summarize")]);
        let tools = register_agent(&card, "http://localhost:7420");
        let props = tools[0].input_schema["properties"].as_object().unwrap();
        assert!(props.contains_key("query"));
        assert!(!props.contains_key("image_url"));
        assert!(!props.contains_key("audio_data"));
    }

    #[test]
    fn image_skill_adds_image_fields() {
        let mut skill = text_skill("caption");
        skill.input_modes = Some(vec!["image/png".to_string()]);
        let card = sample_card(vec![skill]);
        let tools = register_agent(&card, "http://localhost:7420");
        let props = tools[0].input_schema["properties"].as_object().unwrap();
        assert!(props.contains_key("image_url"));
        assert!(props.contains_key("image_data"));
        assert!(!props.contains_key("audio_data"));
    }

    #[test]
    fn media_output_skill_adds_media_fields() {
        let mut skill = text_skill("narrate");
        skill.output_modes = Some(vec!["audio/mp3".to_string()]);
        let card = sample_card(vec![skill]);
        let tools = register_agent(&card, "http://localhost:7420");
        let props = tools[0].output_schema["properties"].as_object().unwrap();
        assert!(props.contains_key("response"));
        assert!(props.contains_key("media_url"));
        assert!(props.contains_key("media_type"));
    }

    fn completed_task_with_message_text(text: &str) -> Task {
        Task {
            id: "a".repeat(32),
            context_id: "b".repeat(32),
            status: TaskStatus {
                state: TaskState::Completed,
                message: Some(Message::agent(text)),
                timestamp: None,
            },
            artifacts: Vec::new(),
            history: None,
        }
    }

    #[test]
    fn response_text_prefers_status_message() {
        let task = completed_task_with_message_text("final answer");
        assert_eq!(extract_response_text(&task), "final answer");
    }

    #[test]
    fn response_text_falls_back_to_artifacts_joined_by_newline() {
        let mut task = completed_task_with_message_text("");
        task.status.message = None;
        task.artifacts = vec![
            crate::types::Artifact {
                artifact_id: "artifact-0".to_string(),
                name: None,
                description: None,
                parts: vec![Part::text("first")],
            },
            crate::types::Artifact {
                artifact_id: "artifact-1".to_string(),
                name: None,
                description: None,
                parts: vec![Part::text("second")],
            },
        ];
        assert_eq!(extract_response_text(&task), "first\nsecond");
    }

    #[tokio::test]
    async fn execute_rejects_malformed_args() {
        let executor = Executor::new(Duration::from_secs(5));
        let descriptor = ToolDescriptor {
            name: "a2a_x_y".to_string(),
            description: "x".to_string(),
            input_schema: json!({}),
            output_schema: json!({}),
            agent_url: "http://localhost:7420".to_string(),
            skill_id: "y".to_string(),
        };
        let err = executor
            .execute(&descriptor, json!({"no_query": true}), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, A2AError::InvalidParams { .. }));
    }
}
