//! Integration bridge between a chat system and an MCP server
//!
//! The bridge is a single task reading two typed streams: [`ChatEvent`]s
//! from the chat system and [`ProtocolEvent`]s from the engine. It keeps a
//! recent-message window per room, resolves chat commands through a
//! [`CommandTable`] rebuilt from every tool snapshot, and forwards
//! agent-addressed messages to the remote agent. Remote calls run on spawned
//! tasks so a slow server never stalls chat processing.

mod handlers;
mod notifications;

#[cfg(test)]
mod tests;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parley_client::{EngineHandle, LocalCapabilities, ProtocolEvent, ToolRegistry, ToolSet};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, warn};

use crate::chat::{ChatEvent, ChatMessage, ChatSink, RoomId};
use crate::commands::{split_command, AdminCommand, CommandTable, CommandTarget};
use crate::config::ConfigHandle;
use crate::context::RoomWindows;
use crate::format;

use handlers::BridgeContext;
use notifications::NotificationHandler;

/// Chat-side integration task
pub struct IntegrationBridge {
    ctx: BridgeContext,
    windows: RoomWindows,
    /// Rooms where the remote agent has been used; they receive server alerts
    active_rooms: HashSet<RoomId>,
    commands: CommandTable,
    bindings: watch::Sender<Vec<String>>,
    notifications: HashMap<&'static str, NotificationHandler>,
    protocol_events: broadcast::Receiver<ProtocolEvent>,
    tool_updates: watch::Receiver<ToolSet>,
}

impl IntegrationBridge {
    /// Create a bridge for `engine`, posting through `sink`.
    ///
    /// Subscribes to engine events immediately so nothing emitted before
    /// [`run`](Self::run) is missed.
    pub fn new(config: ConfigHandle, engine: EngineHandle, sink: Arc<dyn ChatSink>) -> Self {
        let snapshot = config.load();
        let windows = RoomWindows::new(snapshot.rooms.window_capacity);
        let active_rooms = snapshot.rooms.active.iter().cloned().map(RoomId::from).collect();

        let registry = ToolRegistry::new();
        let protocol_events = engine.subscribe();
        let mut tool_updates = registry.subscribe();
        tool_updates.mark_unchanged();

        let commands = CommandTable::new();
        engine.publish_capabilities(LocalCapabilities {
            tools: commands.descriptors(),
        });
        let (bindings, _) = watch::channel(Vec::new());

        Self {
            ctx: BridgeContext::new(config, engine, registry, sink),
            windows,
            active_rooms,
            commands,
            bindings,
            notifications: notifications::handler_table(),
            protocol_events,
            tool_updates,
        }
    }

    /// Watch the current `/mcp_<tool>` command names
    pub fn bindings(&self) -> watch::Receiver<Vec<String>> {
        self.bindings.subscribe()
    }

    pub fn tool_registry(&self) -> &ToolRegistry {
        &self.ctx.registry
    }

    /// Process events until the chat stream ends
    pub async fn run(mut self, mut chat_events: mpsc::Receiver<ChatEvent>) {
        info!("Integration bridge started");

        loop {
            tokio::select! {
                event = chat_events.recv() => match event {
                    Some(event) => self.handle_chat_event(event),
                    None => {
                        info!("Chat event stream ended");
                        break;
                    }
                },
                event = self.protocol_events.recv() => match event {
                    Ok(event) => self.handle_protocol_event(event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Bridge lagged behind protocol events, resyncing tools");
                        self.spawn_refresh();
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Protocol engine stopped");
                        break;
                    }
                },
                changed = self.tool_updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let tools = Arc::clone(&self.tool_updates.borrow_and_update());
                    self.rebuild_commands(&tools);
                }
            }
        }

        info!("Integration bridge stopped");
    }

    // ==================== Chat Events ====================

    fn handle_chat_event(&mut self, event: ChatEvent) {
        match event {
            ChatEvent::Message(message) => self.handle_message(message),
            ChatEvent::RoomClosed { room } => {
                debug!(%room, "Room closed");
                self.windows.remove(&room);
                self.active_rooms.remove(&room);
            }
        }
    }

    fn handle_message(&mut self, message: ChatMessage) {
        if !self.is_own_message(&message) {
            let command = split_command(&message.content).and_then(|(name, args)| {
                self.commands
                    .lookup(name)
                    .cloned()
                    .map(|target| (target, args.to_string()))
            });

            if let Some((target, args)) = command {
                self.dispatch_command(&message.room, target, args);
            } else if let Some(request) = self.addressed_text(&message.content) {
                let request = request.to_string();
                self.dispatch_agent(&message, request);
            }
        }

        // Observed after dispatch so an agent request's context excludes itself
        self.windows.observe(message);
    }

    fn is_own_message(&self, message: &ChatMessage) -> bool {
        let config = self.ctx.config.load();
        message.sender == config.agent.name || message.sender == config.agent.system_sender
    }

    /// Text after the agent mention or command prefix, if addressed
    fn addressed_text<'a>(&self, content: &'a str) -> Option<&'a str> {
        let config = self.ctx.config.load();
        let content = content.trim_start();
        let text = [&config.agent.mention, &config.agent.command_prefix]
            .into_iter()
            .find_map(|marker| strip_marker(content, marker));
        text
    }

    fn dispatch_command(&self, room: &RoomId, target: CommandTarget, args: String) {
        debug!(%room, ?target, "Chat command");
        match target {
            CommandTarget::Admin(AdminCommand::Help) => {
                self.ctx.post_system(room, &format::help(self.commands.binding_names()));
            }
            CommandTarget::Admin(command) => {
                let ctx = self.ctx.clone();
                let room = room.clone();
                tokio::spawn(async move { ctx.run_admin(&room, command, &args).await });
            }
            CommandTarget::Tool(binding) => {
                let ctx = self.ctx.clone();
                let room = room.clone();
                tokio::spawn(async move { ctx.run_binding(&room, &binding, &args).await });
            }
        }
    }

    fn dispatch_agent(&mut self, message: &ChatMessage, request: String) {
        let count = self.ctx.config.load().agent.context_messages;
        let context = self.windows.context(&message.room, count);

        if self.active_rooms.insert(message.room.clone()) {
            info!(room = %message.room, "Remote agent active in room");
        }

        let ctx = self.ctx.clone();
        let message = message.clone();
        tokio::spawn(async move { ctx.ask_agent(&message, &request, context).await });
    }

    // ==================== Protocol Events ====================

    fn handle_protocol_event(&mut self, event: ProtocolEvent) {
        match event {
            ProtocolEvent::Connected(server) => {
                info!(server = %server.implementation.name, "MCP server connected, loading tools");
                self.spawn_refresh();
            }
            ProtocolEvent::Disconnected => {
                info!("MCP server disconnected");
            }
            ProtocolEvent::Reconnecting { attempt, delay } => {
                debug!(attempt, delay_ms = delay.as_millis() as u64, "Reconnect scheduled");
            }
            ProtocolEvent::ReconnectFailed { attempts } => {
                warn!(attempts, "MCP reconnection abandoned");
                self.ctx.registry.clear();
                let text = format!(
                    "Remote agent is offline after {} reconnect attempts. Use /mcp-connect to retry.",
                    attempts
                );
                self.broadcast(&text);
            }
            ProtocolEvent::Notification(notification) => {
                match self.notifications.get(notification.method.as_str()).copied() {
                    Some(handler) => handler(self, notification.params),
                    None => debug!(method = %notification.method, "Unhandled notification"),
                }
            }
            ProtocolEvent::Error(error) => {
                warn!(error = %error, "MCP client error");
                self.broadcast(&format::client_error("MCP connection", &error));
            }
        }
    }

    fn spawn_refresh(&self) {
        let ctx = self.ctx.clone();
        tokio::spawn(async move {
            // Failures are logged by the registry; the previous set stays.
            let _ = ctx.registry.refresh(&ctx.engine).await;
        });
    }

    fn rebuild_commands(&mut self, tools: &ToolSet) {
        self.commands = CommandTable::with_bindings(tools);
        self.ctx.engine.publish_capabilities(LocalCapabilities {
            tools: self.commands.descriptors(),
        });
        info!(bindings = self.commands.binding_count(), "Tool commands rebuilt");
        self.bindings
            .send_replace(self.commands.binding_names().to_vec());
    }

    /// Post a system message into every active room
    fn broadcast(&self, text: &str) {
        let mut rooms: Vec<_> = self.active_rooms.iter().collect();
        rooms.sort();
        for room in rooms {
            self.ctx.post_system(room, text);
        }
    }

    fn handle_log_message(&mut self, params: Option<Value>) {
        let params: parley_protocol::LogMessageParams =
            match serde_json::from_value(params.unwrap_or(Value::Null)) {
                Ok(params) => params,
                Err(e) => {
                    warn!(error = %e, "Ignoring malformed log notification");
                    return;
                }
            };

        if !params.level.is_user_visible() {
            debug!(level = params.level.as_str(), data = %params.data_text(), "Server log");
            return;
        }

        warn!(level = params.level.as_str(), data = %params.data_text(), "Server log");
        self.broadcast(&format::server_log(&params));
    }
}

/// Strip `marker` from the start of `content` (ASCII case-insensitive).
///
/// The marker must be followed by whitespace, punctuation or the end of the
/// message so `@agentsmith` does not address `@agent`.
fn strip_marker<'a>(content: &'a str, marker: &str) -> Option<&'a str> {
    let head = content.get(..marker.len())?;
    if marker.is_empty() || !head.eq_ignore_ascii_case(marker) {
        return None;
    }

    let rest = &content[marker.len()..];
    match rest.chars().next() {
        None => Some(""),
        Some(c) if c.is_whitespace() || matches!(c, ':' | ',') => {
            Some(rest.trim_start_matches([':', ',']).trim())
        }
        Some(_) => None,
    }
}
