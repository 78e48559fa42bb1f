//! Command and agent handlers
//!
//! Every handler ends by posting into the originating room. Protocol, tool
//! and timeout failures become chat-visible messages; nothing propagates
//! back into the bridge loop.

use std::sync::Arc;

use parley_client::{ClientError, EngineHandle, ToolRegistry};
use serde_json::json;
use tracing::{debug, warn};

use crate::chat::{ChatMessage, ChatSink, RoomId};
use crate::commands::{parse_call, parse_tool_arguments, AdminCommand, ToolBinding, ADMIN_COMMANDS};
use crate::config::ConfigHandle;
use crate::context::ContextEntry;
use crate::format;

/// Shared state handed to spawned handler tasks
#[derive(Clone)]
pub struct BridgeContext {
    pub(crate) config: ConfigHandle,
    pub(crate) engine: EngineHandle,
    pub(crate) registry: ToolRegistry,
    sink: Arc<dyn ChatSink>,
}

impl BridgeContext {
    pub(crate) fn new(
        config: ConfigHandle,
        engine: EngineHandle,
        registry: ToolRegistry,
        sink: Arc<dyn ChatSink>,
    ) -> Self {
        Self {
            config,
            engine,
            registry,
            sink,
        }
    }

    /// Post as the bridge's system sender
    pub(crate) fn post_system(&self, room: &RoomId, text: &str) {
        let sender = self.config.load().agent.system_sender.clone();
        self.post(room, &sender, text);
    }

    fn post(&self, room: &RoomId, sender: &str, text: &str) {
        if let Err(e) = self.sink.send_message(room, sender, text) {
            warn!(%room, error = %e, "Failed to post chat message");
        }
    }

    // ==================== Admin Commands ====================

    pub(crate) async fn run_admin(&self, room: &RoomId, command: AdminCommand, args: &str) {
        let reply = match command {
            AdminCommand::Connect => self.connect(args).await,
            AdminCommand::Disconnect => self.disconnect().await,
            AdminCommand::Status => format::status(&self.engine.status(), self.registry.len()),
            AdminCommand::Tools => match self.registry.refresh(&self.engine).await {
                Ok(tools) => format::tool_list(&tools),
                Err(e) => format::client_error("Listing tools", &e),
            },
            AdminCommand::Resources => match self.engine.list_resources(None).await {
                Ok(result) => format::resource_list(&result),
                Err(e) => format::client_error("Listing resources", &e),
            },
            AdminCommand::Call => self.call(args).await,
            AdminCommand::Read => self.read(args).await,
            // Answered inline by the bridge loop, which owns the binding list
            AdminCommand::Help => format::help(&[]),
        };
        self.post_system(room, &reply);
    }

    async fn connect(&self, args: &str) -> String {
        let url = match args.split_whitespace().next() {
            Some(url) => url.to_string(),
            None => self.config.load().server.url.clone(),
        };

        match self.engine.connect(url.as_str()).await {
            Ok(server) => format::connected(&server),
            Err(e) => format::client_error(&format!("Connecting to {}", url), &e),
        }
    }

    async fn disconnect(&self) -> String {
        match self.engine.disconnect().await {
            Ok(()) => {
                self.registry.clear();
                "Disconnected from MCP server".to_string()
            }
            Err(e) => format::client_error("Disconnecting", &e),
        }
    }

    async fn call(&self, args: &str) -> String {
        let (tool, arguments) = match parse_call(args) {
            Ok(parsed) => parsed,
            Err(e) => return format!("{} ({})", usage(AdminCommand::Call), e),
        };
        self.invoke_tool(&tool, arguments).await
    }

    async fn read(&self, args: &str) -> String {
        let Some(uri) = args.split_whitespace().next() else {
            return usage(AdminCommand::Read);
        };

        match self.engine.read_resource(uri).await {
            Ok(result) => format::resource_contents(uri, &result),
            Err(e) => format::client_error(&format!("Reading {}", uri), &e),
        }
    }

    // ==================== Tool Bindings ====================

    pub(crate) async fn run_binding(&self, room: &RoomId, binding: &ToolBinding, args: &str) {
        let reply = self.invoke_tool(&binding.tool, parse_tool_arguments(args)).await;
        self.post_system(room, &reply);
    }

    async fn invoke_tool(&self, tool: &str, arguments: serde_json::Value) -> String {
        debug!(%tool, "Invoking tool");
        match self.engine.call_tool(tool, arguments).await {
            Ok(result) if result.is_error() => format::tool_reported_error(tool, &result),
            Ok(result) => format::tool_output(&result),
            Err(e) => format::tool_failure(tool, &e.to_string()),
        }
    }

    // ==================== Agent ====================

    /// Send an agent-addressed message with its room context to the process
    /// tool and post the answer
    pub(crate) async fn ask_agent(
        &self,
        message: &ChatMessage,
        request: &str,
        context: Vec<ContextEntry>,
    ) {
        let agent = self.config.load().agent.clone();
        let payload = json!({
            "message": request,
            "sender": message.sender,
            "room": message.room,
            "context": context,
        });

        debug!(room = %message.room, context = context_len(&payload), "Forwarding to remote agent");
        match self.engine.call_tool(&agent.process_tool, payload).await {
            Ok(result) if result.is_error() => {
                let text = format::tool_reported_error(&agent.process_tool, &result);
                self.post(&message.room, &agent.system_sender, &text);
            }
            Ok(result) => {
                self.post(&message.room, &agent.name, &format::tool_output(&result));
            }
            Err(e) => {
                let error = ClientError::tool(agent.process_tool.as_str(), e.to_string());
                warn!(room = %message.room, error = %error, "Remote agent request failed");
                let text = format!("Remote agent unavailable: {}", error);
                self.post(&message.room, &agent.system_sender, &text);
            }
        }
    }
}

fn usage(command: AdminCommand) -> String {
    ADMIN_COMMANDS
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| format!("Usage: {}", spec.usage))
        .unwrap_or_default()
}

fn context_len(payload: &serde_json::Value) -> usize {
    payload["context"].as_array().map_or(0, Vec::len)
}
