//! Configuration schema structs

use std::time::Duration;

use parley_client::{EngineConfig, ReconnectPolicy};
use parley_protocol::{Credentials, Implementation, DEFAULT_PROTOCOL_VERSION};
use serde::{Deserialize, Serialize};

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub server: ServerConfig,
    pub reconnect: ReconnectConfig,
    pub agent: AgentConfig,
    pub rooms: RoomsConfig,
}

/// Remote MCP server settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// URL used by `/mcp-connect` without an argument (ws://, wss:// or tcp://)
    pub url: String,
    /// Connect on startup instead of waiting for `/mcp-connect`
    pub auto_connect: bool,
    /// Deadline for each request (default: 30000)
    pub request_timeout_ms: u64,
    /// Protocol revision sent in `initialize`
    pub protocol_version: String,
    /// `clientInfo.name` sent in `initialize`
    pub client_name: String,
    /// Credentials for servers that require authentication
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthConfig>,
}

/// `[server.auth]`
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthConfig {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:3001".into(),
            auto_connect: false,
            request_timeout_ms: 30_000,
            protocol_version: DEFAULT_PROTOCOL_VERSION.into(),
            client_name: "parley".into(),
            auth: None,
        }
    }
}

/// Automatic reconnection after the server drops
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub enabled: bool,
    /// Attempts before giving up (default: 5)
    pub max_attempts: u32,
    /// Delay before the first attempt, doubled for each further one
    /// (default: 1000)
    pub base_delay_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 5,
            base_delay_ms: 1000,
        }
    }
}

/// How the remote agent appears in chat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Sender name for agent replies
    pub name: String,
    /// Sender name for bridge status and error messages
    pub system_sender: String,
    /// Mention that addresses the agent (matched case-insensitively)
    pub mention: String,
    /// Command prefix that addresses the agent
    pub command_prefix: String,
    /// Remote tool that answers agent-addressed messages
    pub process_tool: String,
    /// Prior room messages sent as context (default: 10)
    pub context_messages: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "mcp-agent".into(),
            system_sender: "mcp-bridge".into(),
            mention: "@agent".into(),
            command_prefix: "/ask".into(),
            process_tool: "process_message".into(),
            context_messages: 10,
        }
    }
}

/// Per-room state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomsConfig {
    /// Messages remembered per room (default: 100)
    pub window_capacity: usize,
    /// Rooms that receive server alerts from startup
    pub active: Vec<String>,
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            window_capacity: 100,
            active: Vec::new(),
        }
    }
}

impl BridgeConfig {
    /// Engine settings derived from `[server]` and `[reconnect]`
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            request_timeout: Duration::from_millis(self.server.request_timeout_ms),
            reconnect: ReconnectPolicy {
                enabled: self.reconnect.enabled,
                max_attempts: self.reconnect.max_attempts,
                base_delay: Duration::from_millis(self.reconnect.base_delay_ms),
            },
            protocol_version: self.server.protocol_version.clone(),
            client_info: Implementation::new(
                self.server.client_name.clone(),
                env!("CARGO_PKG_VERSION"),
            ),
            credentials: self.server.auth.as_ref().map(|auth| Credentials {
                username: auth.username.clone(),
                password: auth.password.clone(),
            }),
            ..EngineConfig::default()
        }
    }
}
