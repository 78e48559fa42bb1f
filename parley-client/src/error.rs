//! Client error types

use std::time::Duration;

use parley_protocol::JsonRpcError;

/// Errors surfaced by the protocol client
///
/// Cloneable so the same failure can be broadcast to every event subscriber.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClientError {
    // === Connection Errors ===

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),

    #[error("Not connected to an MCP server")]
    NotConnected,

    #[error("Reconnection failed after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    // === Protocol Errors ===

    #[error("Server error {code}: {message}")]
    Protocol { code: i32, message: String },

    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Request timeout after {}ms: {method}", .timeout.as_millis())]
    Timeout { method: String, timeout: Duration },

    #[error("Tool {tool} failed: {message}")]
    ToolInvocation { tool: String, message: String },

    #[error("JSON error: {0}")]
    Json(String),

    // === Internal Errors ===

    #[error("Protocol engine stopped")]
    EngineStopped,
}

impl ClientError {
    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a tool invocation error
    pub fn tool(tool: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::ToolInvocation {
            tool: tool.into(),
            message: msg.into(),
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Timeout { .. } | Self::NotConnected
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::AuthenticationFailed(_))
    }
}

impl From<JsonRpcError> for ClientError {
    fn from(err: JsonRpcError) -> Self {
        Self::Protocol {
            code: err.code,
            message: err.message,
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Result type alias using ClientError
pub type Result<T> = std::result::Result<T, ClientError>;
