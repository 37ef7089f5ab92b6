//! Builder patterns for ergonomic construction of A2A types.

use crate::types::*;
use std::collections::HashMap;

/// Builder for constructing an [`AgentCard`] with sensible defaults.
///
/// # Example
///
/// ```
/// use a2a_runtime::builders::AgentCardBuilder;
///
/// let card = AgentCardBuilder::new("My Agent")
///     .description("An example agent")
///     .version("1.0.0")
///     .jsonrpc_url("http://localhost:8080/a2a")
///     .with_skill("chat", "Chat", "Conversational AI", vec!["conversation".to_string()])
///     .streaming(true)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct AgentCardBuilder {
    name: String,
    description: String,
    version: String,
    provider: Option<AgentProvider>,
    capabilities: AgentCapabilities,
    skills: Vec<AgentSkill>,
    default_input_modes: Vec<String>,
    default_output_modes: Vec<String>,
    supported_interfaces: Vec<AgentInterface>,
    icon_url: Option<String>,
    documentation_url: Option<String>,
}

impl AgentCardBuilder {
    /// Create a new builder with the agent's name. Description and version
    /// default to empty strings — set them with [`description`](Self::description)
    /// and [`version`](Self::version) before [`build`](Self::build).
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            version: String::new(),
            provider: None,
            capabilities: AgentCapabilities::default(),
            skills: Vec::new(),
            default_input_modes: vec!["text/plain".to_string()],
            default_output_modes: vec!["text/plain".to_string()],
            supported_interfaces: Vec::new(),
            icon_url: None,
            documentation_url: None,
        }
    }

    /// Set the agent description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the agent version string (e.g. `"1.0.0"`).
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Add a JSON-RPC interface at the given URL.
    pub fn jsonrpc_url(mut self, url: impl Into<String>) -> Self {
        self.supported_interfaces.push(AgentInterface {
            url: url.into(),
            transport: "JSONRPC".to_string(),
        });
        self
    }

    /// Add a custom interface.
    pub fn with_interface(mut self, interface: AgentInterface) -> Self {
        self.supported_interfaces.push(interface);
        self
    }

    /// Set the provider information.
    pub fn with_provider(mut self, organization: impl Into<String>, url: impl Into<String>) -> Self {
        self.provider = Some(AgentProvider {
            organization: organization.into(),
            url: url.into(),
        });
        self
    }

    /// Set the documentation URL.
    pub fn with_documentation_url(mut self, url: impl Into<String>) -> Self {
        self.documentation_url = Some(url.into());
        self
    }

    /// Enable or disable streaming support.
    pub fn streaming(mut self, enabled: bool) -> Self {
        self.capabilities.streaming = enabled;
        self
    }

    /// Enable or disable push notification support.
    pub fn push_notifications(mut self, enabled: bool) -> Self {
        self.capabilities.push_notifications = enabled;
        self
    }

    /// Add a skill to the agent card.
    pub fn with_skill(
        mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        tags: Vec<String>,
    ) -> Self {
        self.skills.push(AgentSkill {
            id: id.into(),
            name: name.into(),
            description: Some(description.into()),
            tags: if tags.is_empty() { None } else { Some(tags) },
            examples: None,
            input_modes: None,
            output_modes: None,
        });
        self
    }

    /// Add a skill with usage examples.
    pub fn with_skill_examples(
        mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        tags: Vec<String>,
        examples: Vec<String>,
    ) -> Self {
        self.skills.push(AgentSkill {
            id: id.into(),
            name: name.into(),
            description: Some(description.into()),
            tags: if tags.is_empty() { None } else { Some(tags) },
            examples: Some(examples),
            input_modes: None,
            output_modes: None,
        });
        self
    }

    /// Set the default input MIME types.
    pub fn with_input_modes(mut self, modes: Vec<String>) -> Self {
        self.default_input_modes = modes;
        self
    }

    /// Set the default output MIME types.
    pub fn with_output_modes(mut self, modes: Vec<String>) -> Self {
        self.default_output_modes = modes;
        self
    }

    /// Set the icon URL.
    pub fn with_icon_url(mut self, url: impl Into<String>) -> Self {
        self.icon_url = Some(url.into());
        self
    }

    /// Build the [`AgentCard`].
    pub fn build(self) -> AgentCard {
        AgentCard {
            name: self.name,
            description: self.description,
            version: self.version,
            provider: self.provider,
            capabilities: self.capabilities,
            skills: self.skills,
            default_input_modes: self.default_input_modes,
            default_output_modes: self.default_output_modes,
            supported_interfaces: self.supported_interfaces,
            icon_url: self.icon_url,
            documentation_url: self.documentation_url,
        }
    }
}

/// Builder for constructing [`crate::client::A2AClient`] with custom transport
/// configuration.
///
/// # Example
///
/// ```no_run
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// use a2a_runtime::builders::ClientBuilder;
/// use std::time::Duration;
///
/// let client = ClientBuilder::new("http://localhost:7420")
///     .with_timeout(Duration::from_secs(30))
///     .build()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[cfg(feature = "client")]
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    url: String,
    timeout: Option<std::time::Duration>,
    headers: HashMap<String, String>,
    auth: Option<crate::client::AuthConfig>,
}

#[cfg(feature = "client")]
impl ClientBuilder {
    /// Create a new client builder for the given base URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: None,
            headers: HashMap::new(),
            auth: None,
        }
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Add a custom HTTP header.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Authenticate outbound requests with a bearer token.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.auth = Some(crate::client::AuthConfig::bearer(token));
        self
    }

    fn transport_config(self) -> (String, crate::client::TransportConfig) {
        let config = crate::client::TransportConfig {
            timeout: self.timeout,
            headers: self.headers,
            auth: self.auth,
        };
        (self.url, config)
    }

    /// Build the client, discovering the peer's agent card over the network
    /// to resolve the configured base URL (discovery happens lazily on the
    /// first call via [`crate::client::A2AClient::discover`], not here —
    /// this just wires up the transport).
    pub async fn build(self) -> crate::A2AResult<crate::client::A2AClient> {
        let (url, config) = self.transport_config();
        Ok(crate::client::A2AClient::with_config(url, config))
    }
}

/// Builder for constructing an A2A axum server with fluent configuration.
///
/// # Example
///
/// ```rust,ignore
/// use a2a_runtime::builders::ServerBuilder;
/// use a2a_runtime::server::{Conversation, ConversationReply, InMemoryTaskStore};
/// use std::sync::Arc;
///
/// # async fn example() {
/// let opener = Box::new(|_ctx: &str| {
///     Box::pin(async move {
///         let conv: Box<dyn Conversation> = todo!();
///         Ok(conv)
///     })
/// });
///
/// let app = ServerBuilder::new(opener)
///     .with_agent_card(|builder| {
///         builder
///             .jsonrpc_url("http://localhost:8080/a2a")
///             .with_skill("chat", "Chat", "Conversational AI", vec!["conversation".to_string()])
///             .streaming(true)
///     })
///     .with_task_store(Arc::new(InMemoryTaskStore::new()))
///     .with_cors(true)
///     .build();
/// # }
/// ```
#[cfg(feature = "server")]
pub struct ServerBuilder {
    opener: crate::server::ConversationOpener,
    task_store: Option<std::sync::Arc<dyn crate::server::TaskStore>>,
    agent_card: Option<AgentCard>,
    cors_enabled: bool,
}

#[cfg(feature = "server")]
impl ServerBuilder {
    /// Create a new server builder around a [`ConversationOpener`](crate::server::ConversationOpener).
    pub fn new(opener: crate::server::ConversationOpener) -> Self {
        Self {
            opener,
            task_store: None,
            agent_card: None,
            cors_enabled: false,
        }
    }

    /// Set the task store implementation.
    pub fn with_task_store(mut self, store: std::sync::Arc<dyn crate::server::TaskStore>) -> Self {
        self.task_store = Some(store);
        self
    }

    /// Configure the agent card using a builder callback.
    pub fn with_agent_card<F>(mut self, f: F) -> Self
    where
        F: FnOnce(AgentCardBuilder) -> AgentCardBuilder,
    {
        let builder = AgentCardBuilder::new("A2A Agent")
            .description("An A2A-compatible agent")
            .version("1.0.0");
        self.agent_card = Some(f(builder).build());
        self
    }

    /// Set the agent card directly.
    pub fn with_agent_card_direct(mut self, card: AgentCard) -> Self {
        self.agent_card = Some(card);
        self
    }

    /// Enable or disable permissive CORS middleware.
    pub fn with_cors(mut self, enabled: bool) -> Self {
        self.cors_enabled = enabled;
        self
    }

    /// Build the axum router.
    pub fn build(self) -> axum::Router {
        use crate::server::{a2a_router, InMemoryTaskStore, RequestHandler};
        use std::sync::Arc;

        let store = self
            .task_store
            .unwrap_or_else(|| Arc::new(InMemoryTaskStore::new()));
        let handler = Arc::new(RequestHandler::new(self.opener, store));
        let card = self.agent_card.unwrap_or_else(|| {
            AgentCardBuilder::new("A2A Agent")
                .description("An A2A-compatible agent")
                .version("1.0.0")
                .build()
        });

        let mut router = a2a_router(handler, card);

        if self.cors_enabled {
            use tower_http::cors::CorsLayer;
            router = router.layer(CorsLayer::permissive());
        }

        router
    }
}
