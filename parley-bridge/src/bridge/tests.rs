use super::*;
use crate::chat::{ChannelSink, OutboundMessage};
use crate::config::{new_config_handle, BridgeConfig};
use parley_client::transport::{MemoryConnector, MemoryListener, MemoryPeer};
use parley_client::ProtocolEngine;
use serde_json::json;
use std::future::Future;
use std::time::Duration;

const URL: &str = "memory://mcp";
const WAIT: Duration = Duration::from_secs(5);

struct Harness {
    engine: EngineHandle,
    listener: Option<MemoryListener>,
    chat: mpsc::Sender<ChatEvent>,
    outbound: mpsc::UnboundedReceiver<OutboundMessage>,
    bindings: watch::Receiver<Vec<String>>,
    events: broadcast::Receiver<ProtocolEvent>,
}

fn harness(config: BridgeConfig) -> Harness {
    let (connector, listener) = MemoryConnector::new();
    let engine = ProtocolEngine::spawn(config.engine_config(), connector);
    let events = engine.subscribe();

    let (sink, outbound) = ChannelSink::new();
    let bridge = IntegrationBridge::new(new_config_handle(config), engine.clone(), Arc::new(sink));
    let bindings = bridge.bindings();

    let (chat, chat_rx) = mpsc::channel(64);
    tokio::spawn(bridge.run(chat_rx));

    Harness {
        engine,
        listener: Some(listener),
        chat,
        outbound,
        bindings,
        events,
    }
}

async fn within<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(WAIT, future).await.expect("timed out")
}

fn tool(name: &str) -> Value {
    json!({
        "name": name,
        "description": format!("{} tool", name),
        "inputSchema": {"type": "object"}
    })
}

/// Next client frame carrying an id (request or response), skipping
/// notifications
async fn next_with_id(peer: &mut MemoryPeer) -> Value {
    loop {
        let frame = within(peer.recv_json()).await.expect("client frame");
        if frame.get("id").is_some() {
            return frame;
        }
    }
}

async fn serve_initialize(peer: &mut MemoryPeer) {
    let init = next_with_id(peer).await;
    assert_eq!(init["method"], "initialize");
    peer.respond(
        &init,
        json!({
            "protocolVersion": "2024-11-05",
            "capabilities": {"tools": {"listChanged": true}},
            "serverInfo": {"name": "test-server", "version": "1.0.0"}
        }),
    );
}

async fn serve_tools(peer: &mut MemoryPeer, tools: Vec<Value>) {
    let list = next_with_id(peer).await;
    assert_eq!(list["method"], "tools/list");
    peer.respond(&list, json!({ "tools": tools }));
}

impl Harness {
    async fn accept(&mut self) -> MemoryPeer {
        let listener = self.listener.as_mut().expect("listener");
        within(listener.accept()).await.expect("connection")
    }

    /// Connect the engine directly and answer the handshake and first
    /// `tools/list`
    async fn connect_with_tools(&mut self, tools: Vec<Value>) -> MemoryPeer {
        let engine = self.engine.clone();
        let connecting = tokio::spawn(async move { engine.connect(URL).await });

        let mut peer = self.accept().await;
        serve_initialize(&mut peer).await;
        within(connecting).await.unwrap().expect("connect");
        serve_tools(&mut peer, tools).await;
        peer
    }

    async fn say(&self, room: &str, sender: &str, content: &str) {
        self.chat
            .send(ChatEvent::Message(ChatMessage::new(room, sender, content)))
            .await
            .expect("bridge running");
    }

    async fn next_outbound(&mut self) -> OutboundMessage {
        within(self.outbound.recv()).await.expect("outbound message")
    }

    async fn wait_bindings(&mut self, expected: &[&str]) {
        let expected: Vec<String> = expected.iter().map(|s| s.to_string()).collect();
        within(self.bindings.wait_for(|names| *names == expected))
            .await
            .expect("bindings channel open");
    }
}

// ==================== Tool Bindings ====================

#[tokio::test]
async fn test_one_binding_per_listed_tool() {
    let mut h = harness(BridgeConfig::default());
    let _peer = h
        .connect_with_tools(vec![tool("search"), tool("fetch"), tool("echo")])
        .await;

    h.wait_bindings(&["/mcp_search", "/mcp_fetch", "/mcp_echo"]).await;
}

#[tokio::test]
async fn test_list_changed_replaces_all_bindings() {
    let mut h = harness(BridgeConfig::default());
    let mut peer = h.connect_with_tools(vec![tool("a"), tool("b"), tool("c")]).await;
    h.wait_bindings(&["/mcp_a", "/mcp_b", "/mcp_c"]).await;

    peer.send_json(&json!({"jsonrpc": "2.0", "method": "tools/list_changed"}));
    serve_tools(&mut peer, vec![tool("d"), tool("e")]).await;
    h.wait_bindings(&["/mcp_d", "/mcp_e"]).await;

    // A removed binding is no longer a command
    h.say("room", "alice", "/mcp_a").await;
    h.say("room", "alice", "/mcp_d go").await;
    let call = next_with_id(&mut peer).await;
    assert_eq!(call["method"], "tools/call");
    assert_eq!(call["params"]["name"], "d");
}

#[tokio::test]
async fn test_standard_list_changed_spelling() {
    let mut h = harness(BridgeConfig::default());
    let mut peer = h.connect_with_tools(vec![tool("a")]).await;
    h.wait_bindings(&["/mcp_a"]).await;

    peer.send_json(&json!({"jsonrpc": "2.0", "method": "notifications/tools/list_changed"}));
    serve_tools(&mut peer, vec![tool("z")]).await;
    h.wait_bindings(&["/mcp_z"]).await;
}

#[tokio::test]
async fn test_empty_tool_list_still_connects() {
    let mut h = harness(BridgeConfig::default());
    h.bindings.mark_unchanged();

    let _peer = h.connect_with_tools(vec![]).await;

    let event = within(h.events.recv()).await.unwrap();
    assert!(matches!(event, ProtocolEvent::Connected(_)));

    within(h.bindings.changed()).await.unwrap();
    assert!(h.bindings.borrow().is_empty());
    assert_eq!(h.engine.state(), parley_client::ConnectionState::Ready);
}

#[tokio::test]
async fn test_binding_success_posts_tool_output() {
    let mut h = harness(BridgeConfig::default());
    let mut peer = h.connect_with_tools(vec![tool("echo")]).await;
    h.wait_bindings(&["/mcp_echo"]).await;

    h.say("room", "alice", "/mcp_echo hello there").await;
    let call = next_with_id(&mut peer).await;
    assert_eq!(call["params"]["arguments"], json!({"input": "hello there"}));
    peer.respond(&call, json!({"content": [{"type": "text", "text": "hello there"}]}));

    let reply = h.next_outbound().await;
    assert_eq!(reply.room, RoomId::from("room"));
    assert_eq!(reply.sender, "mcp-bridge");
    assert_eq!(reply.content, "hello there");
}

#[tokio::test]
async fn test_binding_error_becomes_visible_message() {
    let mut h = harness(BridgeConfig::default());
    let mut peer = h.connect_with_tools(vec![tool("search")]).await;
    h.wait_bindings(&["/mcp_search"]).await;

    h.say("room", "alice", r#"/mcp_search {"limit": "many"}"#).await;
    let call = next_with_id(&mut peer).await;
    assert_eq!(call["params"]["name"], "search");
    assert_eq!(call["params"]["arguments"], json!({"limit": "many"}));
    peer.respond_error(&call, -32602, "Invalid params: limit");

    let reply = h.next_outbound().await;
    assert_eq!(reply.sender, "mcp-bridge");
    assert!(reply.content.starts_with("Tool search failed"), "{}", reply.content);
    assert!(reply.content.contains("Invalid params: limit"));

    // The bridge keeps serving commands
    h.say("room", "alice", "/mcp-status").await;
    let status = h.next_outbound().await;
    assert!(status.content.contains("ready"), "{}", status.content);
}

#[tokio::test]
async fn test_binding_in_band_error() {
    let mut h = harness(BridgeConfig::default());
    let mut peer = h.connect_with_tools(vec![tool("search")]).await;
    h.wait_bindings(&["/mcp_search"]).await;

    h.say("room", "alice", "/mcp_search rust").await;
    let call = next_with_id(&mut peer).await;
    peer.respond(
        &call,
        json!({"content": [{"type": "text", "text": "index offline"}], "isError": true}),
    );

    let reply = h.next_outbound().await;
    assert_eq!(reply.content, "Tool search failed: index offline");
}

// ==================== Agent Messages ====================

#[tokio::test]
async fn test_agent_request_carries_prior_context() {
    let mut h = harness(BridgeConfig::default());
    let mut peer = h.connect_with_tools(vec![tool("process_message")]).await;

    h.say("R", "alice", "first").await;
    h.say("elsewhere", "carol", "not in R").await;
    h.say("R", "bob", "second").await;
    h.say("R", "alice", "third").await;
    h.say("R", "alice", "@agent summarize").await;

    let call = next_with_id(&mut peer).await;
    assert_eq!(call["method"], "tools/call");
    assert_eq!(call["params"]["name"], "process_message");

    let args = &call["params"]["arguments"];
    assert_eq!(args["message"], "summarize");
    assert_eq!(args["sender"], "alice");
    assert_eq!(args["room"], "R");
    let context: Vec<_> = args["context"]
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["content"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(context, vec!["first", "second", "third"]);
    assert_eq!(args["context"][1]["sender"], "bob");

    peer.respond(&call, json!({"content": [{"type": "text", "text": "Three messages."}]}));

    let reply = h.next_outbound().await;
    assert_eq!(reply.room, RoomId::from("R"));
    assert_eq!(reply.sender, "mcp-agent");
    assert_eq!(reply.content, "Three messages.");
}

#[tokio::test]
async fn test_agent_context_is_limited() {
    let mut h = harness(BridgeConfig::default());
    let mut peer = h.connect_with_tools(vec![]).await;

    for i in 0..15 {
        h.say("R", "alice", &format!("m{}", i)).await;
    }
    h.say("R", "alice", "/ask what happened?").await;

    let call = next_with_id(&mut peer).await;
    let args = &call["params"]["arguments"];
    assert_eq!(args["message"], "what happened?");
    let context = args["context"].as_array().unwrap();
    assert_eq!(context.len(), 10);
    assert_eq!(context[0]["content"], "m5");
    assert_eq!(context[9]["content"], "m14");
}

#[tokio::test]
async fn test_agent_failure_is_visible() {
    let mut h = harness(BridgeConfig::default());
    let mut peer = h.connect_with_tools(vec![]).await;

    h.say("R", "alice", "@Agent: status report").await;
    let call = next_with_id(&mut peer).await;
    assert_eq!(call["params"]["arguments"]["message"], "status report");
    peer.respond_error(&call, -32000, "agent crashed");

    let reply = h.next_outbound().await;
    assert_eq!(reply.sender, "mcp-bridge");
    assert!(reply.content.starts_with("Remote agent unavailable"), "{}", reply.content);
    assert!(reply.content.contains("agent crashed"));
}

#[tokio::test]
async fn test_agent_while_disconnected() {
    let mut h = harness(BridgeConfig::default());

    h.say("R", "alice", "@agent hello").await;
    let reply = h.next_outbound().await;
    assert_eq!(reply.sender, "mcp-bridge");
    assert!(reply.content.contains("Not connected"), "{}", reply.content);
}

#[tokio::test]
async fn test_own_messages_are_not_handled() {
    let mut h = harness(BridgeConfig::default());
    let mut peer = h.connect_with_tools(vec![]).await;

    h.say("R", "mcp-agent", "@agent I am the agent").await;
    h.say("R", "alice", "@agent hi").await;

    let call = next_with_id(&mut peer).await;
    let args = &call["params"]["arguments"];
    assert_eq!(args["sender"], "alice");
    // Still observed as context
    assert_eq!(args["context"][0]["sender"], "mcp-agent");
}

// ==================== Server Notifications ====================

#[tokio::test]
async fn test_log_message_broadcast_to_active_rooms() {
    let mut config = BridgeConfig::default();
    config.rooms.active = vec!["ops".to_string()];
    let mut h = harness(config);
    let peer = h.connect_with_tools(vec![]).await;

    peer.send_json(&json!({
        "jsonrpc": "2.0",
        "method": "log/message",
        "params": {"level": "info", "data": "routine"}
    }));
    peer.send_json(&json!({
        "jsonrpc": "2.0",
        "method": "log/message",
        "params": {"level": "error", "data": "disk full"}
    }));
    peer.send_json(&json!({
        "jsonrpc": "2.0",
        "method": "notifications/message",
        "params": {"level": "warning", "logger": "db", "data": {"lag": 3}}
    }));

    let first = h.next_outbound().await;
    assert_eq!(first.room, RoomId::from("ops"));
    assert_eq!(first.sender, "mcp-bridge");
    assert_eq!(first.content, "[MCP ERROR] disk full");

    let second = h.next_outbound().await;
    assert_eq!(second.content, r#"[MCP WARNING] db: {"lag":3}"#);
}

#[tokio::test]
async fn test_server_error_without_id_reaches_active_rooms() {
    let mut config = BridgeConfig::default();
    config.rooms.active = vec!["ops".to_string()];
    let mut h = harness(config);
    let peer = h.connect_with_tools(vec![]).await;

    peer.send_json(&json!({
        "jsonrpc": "2.0",
        "id": null,
        "error": {"code": -32700, "message": "Parse error"}
    }));

    let alert = h.next_outbound().await;
    assert_eq!(alert.room, RoomId::from("ops"));
    assert_eq!(alert.sender, "mcp-bridge");
    assert_eq!(alert.content, "MCP connection failed: Server error -32700: Parse error");
}

#[tokio::test]
async fn test_transport_error_reaches_active_rooms() {
    let mut config = BridgeConfig::default();
    config.rooms.active = vec!["ops".to_string()];
    let mut h = harness(config);
    let mut peer = h.connect_with_tools(vec![]).await;

    peer.fail("socket reset");

    let alert = h.next_outbound().await;
    assert_eq!(alert.room, RoomId::from("ops"));
    assert_eq!(alert.content, "MCP connection failed: Transport error: socket reset");
}

#[tokio::test]
async fn test_agent_use_marks_room_active() {
    let mut h = harness(BridgeConfig::default());
    let mut peer = h.connect_with_tools(vec![]).await;

    h.say("R", "alice", "@agent hi").await;
    let call = next_with_id(&mut peer).await;
    peer.respond(&call, json!({"content": [{"type": "text", "text": "hello"}]}));
    assert_eq!(h.next_outbound().await.content, "hello");

    peer.send_json(&json!({
        "jsonrpc": "2.0",
        "method": "log/message",
        "params": {"level": "critical", "data": "shutting down"}
    }));
    let alert = h.next_outbound().await;
    assert_eq!(alert.room, RoomId::from("R"));
    assert_eq!(alert.content, "[MCP CRITICAL] shutting down");
}

#[tokio::test]
async fn test_closed_room_stops_receiving_alerts() {
    let mut config = BridgeConfig::default();
    config.rooms.active = vec!["ops".to_string(), "R".to_string()];
    let mut h = harness(config);
    let peer = h.connect_with_tools(vec![]).await;

    h.chat
        .send(ChatEvent::RoomClosed { room: RoomId::from("R") })
        .await
        .unwrap();
    h.say("ops", "alice", "/mcp-status").await;
    let status = h.next_outbound().await;
    assert!(status.content.starts_with("MCP status"), "{}", status.content);

    peer.send_json(&json!({
        "jsonrpc": "2.0",
        "method": "log/message",
        "params": {"level": "error", "data": "oops"}
    }));
    let alert = h.next_outbound().await;
    assert_eq!(alert.room, RoomId::from("ops"));

    // Only one alert was posted
    h.say("ops", "alice", "/mcp-status").await;
    let next = h.next_outbound().await;
    assert!(next.content.starts_with("MCP status"), "{}", next.content);
}

#[tokio::test]
async fn test_reconnect_failure_reported_to_active_rooms() {
    let mut config = BridgeConfig::default();
    config.rooms.active = vec!["ops".to_string()];
    config.reconnect.max_attempts = 1;
    config.reconnect.base_delay_ms = 10;
    let mut h = harness(config);

    let mut peer = h.connect_with_tools(vec![tool("a")]).await;
    h.wait_bindings(&["/mcp_a"]).await;

    // Refuse further connections, then drop the link
    drop(h.listener.take());
    peer.close();

    let notice = h.next_outbound().await;
    assert_eq!(notice.room, RoomId::from("ops"));
    assert!(notice.content.contains("offline"), "{}", notice.content);
    assert!(notice.content.contains("/mcp-connect"));
    h.wait_bindings(&[]).await;
}

// ==================== Server Requests ====================

#[tokio::test]
async fn test_server_tools_list_reflects_chat_commands() {
    let mut h = harness(BridgeConfig::default());
    let mut peer = h.connect_with_tools(vec![tool("search")]).await;
    h.wait_bindings(&["/mcp_search"]).await;

    peer.send_json(&json!({"jsonrpc": "2.0", "id": "srv-1", "method": "tools/list"}));
    let reply = next_with_id(&mut peer).await;
    assert_eq!(reply["id"], "srv-1");

    let names: Vec<_> = reply["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap().to_string())
        .collect();
    assert!(names.contains(&"/mcp-connect".to_string()));
    assert!(names.contains(&"/mcp-call".to_string()));
    assert!(names.contains(&"/mcp_search".to_string()));
}

#[tokio::test]
async fn test_server_completion_matches_command_prefix() {
    let mut h = harness(BridgeConfig::default());
    let mut peer = h.connect_with_tools(vec![tool("search"), tool("summarize")]).await;
    h.wait_bindings(&["/mcp_search", "/mcp_summarize"]).await;

    peer.send_json(&json!({
        "jsonrpc": "2.0",
        "id": 7,
        "method": "completion/complete",
        "params": {
            "ref": {"type": "ref/prompt", "name": "chat"},
            "argument": {"name": "command", "value": "/mcp_s"}
        }
    }));
    let reply = next_with_id(&mut peer).await;
    assert_eq!(reply["id"], 7);
    assert_eq!(
        reply["result"]["completion"]["values"],
        json!(["/mcp_search", "/mcp_summarize"])
    );
}

// ==================== Admin Commands ====================

#[tokio::test]
async fn test_connect_command_uses_given_url() {
    let mut h = harness(BridgeConfig::default());

    h.say("R", "alice", "/mcp-connect memory://other").await;
    let mut peer = h.accept().await;
    assert_eq!(peer.url(), "memory://other");
    serve_initialize(&mut peer).await;

    let reply = h.next_outbound().await;
    assert_eq!(reply.room, RoomId::from("R"));
    assert_eq!(reply.content, "Connected to test-server 1.0.0 (protocol 2024-11-05)");
    assert_eq!(h.engine.server_url().as_deref(), Some("memory://other"));
}

#[tokio::test]
async fn test_connect_command_defaults_to_configured_url() {
    let mut config = BridgeConfig::default();
    config.server.url = "memory://configured".to_string();
    let mut h = harness(config);

    h.say("R", "alice", "/mcp-connect").await;
    let peer = h.accept().await;
    assert_eq!(peer.url(), "memory://configured");
}

#[tokio::test]
async fn test_connect_command_reports_failure() {
    let mut h = harness(BridgeConfig::default());
    drop(h.listener.take());

    h.say("R", "alice", "/mcp-connect memory://gone").await;
    let reply = h.next_outbound().await;
    assert!(
        reply.content.starts_with("Connecting to memory://gone failed"),
        "{}",
        reply.content
    );
}

#[tokio::test]
async fn test_connect_command_reports_rejected_credentials() {
    let mut config = BridgeConfig::default();
    config.server.auth = Some(crate::config::AuthConfig {
        username: "invalid".to_string(),
        password: "wrong".to_string(),
    });
    let mut h = harness(config);

    h.say("R", "alice", "/mcp-connect memory://secure").await;
    let mut peer = h.accept().await;
    serve_initialize(&mut peer).await;
    let auth = next_with_id(&mut peer).await;
    assert_eq!(auth["method"], "authenticate");
    assert_eq!(auth["params"]["credentials"]["username"], "invalid");
    peer.respond(&auth, json!({"authenticated": false, "message": "invalid credentials"}));

    let reply = h.next_outbound().await;
    assert_eq!(reply.sender, "mcp-bridge");
    assert_eq!(
        reply.content,
        "Connecting to memory://secure failed: Authentication failed: invalid credentials"
    );
    assert_eq!(h.engine.state(), parley_client::ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_status_while_disconnected() {
    let mut h = harness(BridgeConfig::default());
    h.say("R", "alice", "/mcp-status").await;

    let reply = h.next_outbound().await;
    assert_eq!(reply.content, "MCP status: disconnected\nTools: 0");
}

#[tokio::test]
async fn test_tools_command_lists_and_refreshes() {
    let mut h = harness(BridgeConfig::default());
    let mut peer = h.connect_with_tools(vec![tool("a")]).await;
    h.wait_bindings(&["/mcp_a"]).await;

    h.say("R", "alice", "/mcp-tools").await;
    serve_tools(&mut peer, vec![tool("a"), tool("b")]).await;

    let reply = h.next_outbound().await;
    assert!(reply.content.starts_with("Available tools (2):"), "{}", reply.content);
    assert!(reply.content.contains("/mcp_b - b tool"));
    h.wait_bindings(&["/mcp_a", "/mcp_b"]).await;
}

#[tokio::test]
async fn test_tools_command_while_disconnected() {
    let mut h = harness(BridgeConfig::default());
    h.say("R", "alice", "/mcp-tools").await;

    let reply = h.next_outbound().await;
    assert_eq!(reply.content, "Listing tools failed: Not connected to an MCP server");
}

#[tokio::test]
async fn test_resources_and_read_commands() {
    let mut h = harness(BridgeConfig::default());
    let mut peer = h.connect_with_tools(vec![]).await;

    h.say("R", "alice", "/mcp-resources").await;
    let list = next_with_id(&mut peer).await;
    assert_eq!(list["method"], "resources/list");
    peer.respond(
        &list,
        json!({"resources": [{"uri": "file:///notes.md", "name": "notes"}]}),
    );
    assert_eq!(
        h.next_outbound().await.content,
        "Available resources (1):\n  notes (file:///notes.md)"
    );

    h.say("R", "alice", "/mcp-read file:///notes.md").await;
    let read = next_with_id(&mut peer).await;
    assert_eq!(read["method"], "resources/read");
    assert_eq!(read["params"]["uri"], "file:///notes.md");
    peer.respond(
        &read,
        json!({"contents": [{"uri": "file:///notes.md", "text": "remember the milk"}]}),
    );
    assert_eq!(h.next_outbound().await.content, "remember the milk");
}

#[tokio::test]
async fn test_call_command() {
    let mut h = harness(BridgeConfig::default());
    let mut peer = h.connect_with_tools(vec![]).await;

    h.say("R", "alice", r#"/mcp-call add {"a": 1, "b": 2}"#).await;
    let call = next_with_id(&mut peer).await;
    assert_eq!(call["params"]["name"], "add");
    assert_eq!(call["params"]["arguments"], json!({"a": 1, "b": 2}));
    peer.respond(&call, json!({"content": [{"type": "text", "text": "3"}]}));

    assert_eq!(h.next_outbound().await.content, "3");
}

#[tokio::test]
async fn test_call_command_usage_errors() {
    let mut h = harness(BridgeConfig::default());

    h.say("R", "alice", "/mcp-call").await;
    assert_eq!(
        h.next_outbound().await.content,
        "Usage: /mcp-call <tool> <jsonArgs> (missing tool name)"
    );

    h.say("R", "alice", "/mcp-call add [1, 2]").await;
    assert_eq!(
        h.next_outbound().await.content,
        "Usage: /mcp-call <tool> <jsonArgs> (arguments must be a JSON object)"
    );
}

#[tokio::test]
async fn test_disconnect_command_clears_bindings() {
    let mut h = harness(BridgeConfig::default());
    let _peer = h.connect_with_tools(vec![tool("a")]).await;
    h.wait_bindings(&["/mcp_a"]).await;

    h.say("R", "alice", "/mcp-disconnect").await;
    assert_eq!(h.next_outbound().await.content, "Disconnected from MCP server");
    h.wait_bindings(&[]).await;
    assert_eq!(h.engine.state(), parley_client::ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_help_lists_admin_and_tool_commands() {
    let mut h = harness(BridgeConfig::default());
    let _peer = h.connect_with_tools(vec![tool("search")]).await;
    h.wait_bindings(&["/mcp_search"]).await;

    h.say("R", "alice", "/mcp-help").await;
    let reply = h.next_outbound().await;
    assert!(reply.content.contains("/mcp-connect [serverUrl]"));
    assert!(reply.content.contains("/mcp-read <uri>"));
    assert!(reply.content.contains("/mcp_search [args]"));
}

// ==================== Addressing ====================

#[test]
fn test_strip_marker() {
    assert_eq!(strip_marker("@agent summarize", "@agent"), Some("summarize"));
    assert_eq!(strip_marker("@AGENT, hi", "@agent"), Some("hi"));
    assert_eq!(strip_marker("@agent: hi", "@agent"), Some("hi"));
    assert_eq!(strip_marker("@agent", "@agent"), Some(""));
    assert_eq!(strip_marker("@agentsmith hi", "@agent"), None);
    assert_eq!(strip_marker("hello @agent", "@agent"), None);
    assert_eq!(strip_marker("/ask why", "/ask"), Some("why"));
    assert_eq!(strip_marker("/asking", "/ask"), None);
    assert_eq!(strip_marker("anything", ""), None);
}
