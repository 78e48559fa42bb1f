//! parley-protocol: JSON-RPC 2.0 envelopes and MCP payloads
//!
//! This crate defines the wire types exchanged with a remote MCP server
//! over a persistent socket, and the classifier that turns an inbound text
//! frame into a response, notification or server-initiated request.

pub mod jsonrpc;
pub mod mcp;
pub mod methods;

// Re-export main types at crate root
pub use jsonrpc::{
    FrameError, IncomingMessage, JsonRpcError, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse, RequestId, JSONRPC_VERSION,
};
pub use mcp::{
    AuthenticateParams, AuthenticateResult, CallToolParams, CallToolResult, ClientCapabilities, CompleteParams, CompleteResult,
    Completion, CompletionArgument, Content, Credentials, Implementation, InitializeParams, InitializeResult,
    ListResourcesResult, ListToolsResult, LogLevel, LogMessageParams, PaginatedParams,
    ReadResourceParams, ReadResourceResult, Resource, ResourceContents, ServerCapabilities, Tool,
};

/// MCP protocol revision requested during `initialize`
pub const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";
