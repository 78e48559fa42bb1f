//! Remote tool registry
//!
//! Holds the descriptor set from the most recent successful `tools/list`.
//! The set is replaced wholesale and published on a `watch` channel so
//! consumers re-derive their state from each new snapshot.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parley_protocol::Tool;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::engine::EngineHandle;
use crate::error::Result;

/// Immutable descriptor set
pub type ToolSet = Arc<[Tool]>;

/// Current remote tools
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    tools: Arc<watch::Sender<ToolSet>>,
    /// Ticket handed to the most recently started refresh or clear
    issued: Arc<AtomicU64>,
    /// Ticket of the update currently published
    published: Arc<AtomicU64>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        let (tools, _) = watch::channel(ToolSet::from(Vec::new()));
        Self {
            tools: Arc::new(tools),
            issued: Arc::new(AtomicU64::new(0)),
            published: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Fetch `tools/list` (following `nextCursor`) and replace the set.
    ///
    /// On failure the previous set is kept. Refreshes may overlap; a result
    /// is only published if no later refresh or clear has published first.
    pub async fn refresh(&self, engine: &EngineHandle) -> Result<ToolSet> {
        let ticket = self.next_ticket();
        let tools = match fetch_all(engine).await {
            Ok(tools) => tools,
            Err(e) => {
                warn!(error = %e, "Tool refresh failed, keeping previous tool set");
                return Err(e);
            }
        };

        let set = ToolSet::from(tools);
        if self.publish(ticket, Arc::clone(&set)) {
            info!(count = set.len(), "Tool registry refreshed");
            Ok(set)
        } else {
            debug!(ticket, "Discarding superseded tool listing");
            Ok(self.snapshot())
        }
    }

    /// Empty the set
    pub fn clear(&self) {
        let ticket = self.next_ticket();
        self.publish(ticket, ToolSet::from(Vec::new()));
    }

    fn next_ticket(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    // Runs under the watch lock, so ticket checks and replacement are atomic.
    fn publish(&self, ticket: u64, set: ToolSet) -> bool {
        let published = &self.published;
        self.tools.send_if_modified(|current| {
            if ticket <= published.load(Ordering::SeqCst) {
                return false;
            }
            published.store(ticket, Ordering::SeqCst);
            *current = set;
            true
        })
    }

    pub fn snapshot(&self) -> ToolSet {
        Arc::clone(&self.tools.borrow())
    }

    pub fn get(&self, name: &str) -> Option<Tool> {
        self.tools.borrow().iter().find(|tool| tool.name == name).cloned()
    }

    pub fn len(&self) -> usize {
        self.tools.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.borrow().is_empty()
    }

    /// Receive every replacement of the set
    pub fn subscribe(&self) -> watch::Receiver<ToolSet> {
        self.tools.subscribe()
    }
}

async fn fetch_all(engine: &EngineHandle) -> Result<Vec<Tool>> {
    let mut tools: Vec<Tool> = Vec::new();
    let mut seen = HashSet::new();
    let mut cursor = None;

    loop {
        let page = engine.list_tools(cursor.take()).await?;
        for tool in page.tools {
            if !seen.insert(tool.name.clone()) {
                debug!(tool = %tool.name, "Skipping duplicate tool name");
                continue;
            }
            tools.push(tool);
        }

        match page.next_cursor {
            Some(next) if !next.is_empty() => cursor = Some(next),
            _ => return Ok(tools),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::ProtocolEngine;
    use crate::transport::{MemoryConnector, MemoryListener, MemoryPeer};
    use serde_json::{json, Value};

    async fn connected() -> (EngineHandle, MemoryListener, MemoryPeer) {
        let (connector, mut listener) = MemoryConnector::new();
        let handle = ProtocolEngine::spawn(EngineConfig::default(), connector);
        let connecting = tokio::spawn({
            let handle = handle.clone();
            async move { handle.connect("memory://tools").await }
        });
        let mut peer = listener.accept().await.unwrap();
        let init = peer.recv_json().await.unwrap();
        peer.respond(
            &init,
            json!({"protocolVersion": "2024-11-05", "serverInfo": {"name": "s", "version": "1"}}),
        );
        peer.recv_json().await.unwrap();
        connecting.await.unwrap().unwrap();
        (handle, listener, peer)
    }

    fn tools(names: &[&str]) -> Value {
        Value::Array(
            names
                .iter()
                .map(|name| json!({"name": name, "description": format!("{} tool", name)}))
                .collect(),
        )
    }

    fn names(set: &ToolSet) -> Vec<&str> {
        set.iter().map(|tool| tool.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_refresh_replaces_set() {
        let (handle, _listener, mut peer) = connected().await;
        let registry = ToolRegistry::new();
        let mut updates = registry.subscribe();

        let refresh = tokio::spawn({
            let (registry, handle) = (registry.clone(), handle.clone());
            async move { registry.refresh(&handle).await }
        });
        let request = peer.recv_json().await.unwrap();
        assert_eq!(request["method"], "tools/list");
        peer.respond(&request, json!({"tools": tools(&["search", "fetch"])}));
        refresh.await.unwrap().unwrap();

        assert!(updates.has_changed().unwrap());
        assert_eq!(names(&updates.borrow_and_update()), vec!["search", "fetch"]);
        assert_eq!(registry.get("fetch").unwrap().description.as_deref(), Some("fetch tool"));

        let refresh = tokio::spawn({
            let (registry, handle) = (registry.clone(), handle.clone());
            async move { registry.refresh(&handle).await }
        });
        let request = peer.recv_json().await.unwrap();
        peer.respond(&request, json!({"tools": tools(&["summarize"])}));
        refresh.await.unwrap().unwrap();

        assert_eq!(names(&registry.snapshot()), vec!["summarize"]);
        assert!(registry.get("search").is_none());
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_set() {
        let (handle, _listener, mut peer) = connected().await;
        let registry = ToolRegistry::new();

        let refresh = tokio::spawn({
            let (registry, handle) = (registry.clone(), handle.clone());
            async move { registry.refresh(&handle).await }
        });
        let request = peer.recv_json().await.unwrap();
        peer.respond(&request, json!({"tools": tools(&["search"])}));
        refresh.await.unwrap().unwrap();

        let refresh = tokio::spawn({
            let (registry, handle) = (registry.clone(), handle.clone());
            async move { registry.refresh(&handle).await }
        });
        let request = peer.recv_json().await.unwrap();
        peer.respond_error(&request, -32603, "registry unavailable");
        assert!(refresh.await.unwrap().is_err());

        assert_eq!(names(&registry.snapshot()), vec!["search"]);
    }

    #[tokio::test]
    async fn test_refresh_follows_cursor_and_keeps_every_tool() {
        let (handle, _listener, mut peer) = connected().await;
        let registry = ToolRegistry::new();

        let refresh = tokio::spawn({
            let (registry, handle) = (registry.clone(), handle.clone());
            async move { registry.refresh(&handle).await }
        });

        let first_page: Vec<String> = (0..60).map(|i| format!("tool_{}", i)).collect();
        let second_page: Vec<String> = (60..130).map(|i| format!("tool_{}", i)).collect();
        let first_refs: Vec<&str> = first_page.iter().map(String::as_str).collect();
        let second_refs: Vec<&str> = second_page.iter().map(String::as_str).collect();

        let request = peer.recv_json().await.unwrap();
        assert!(request["params"].get("cursor").is_none());
        peer.respond(&request, json!({"tools": tools(&first_refs), "nextCursor": "p2"}));

        let request = peer.recv_json().await.unwrap();
        assert_eq!(request["params"]["cursor"], "p2");
        peer.respond(&request, json!({"tools": tools(&second_refs)}));

        let set = refresh.await.unwrap().unwrap();
        assert_eq!(set.len(), 130);
        assert_eq!(set[129].name, "tool_129");
        assert_eq!(registry.len(), 130);
    }

    #[tokio::test]
    async fn test_large_single_page_is_not_truncated() {
        let (handle, _listener, mut peer) = connected().await;
        let registry = ToolRegistry::new();

        let refresh = tokio::spawn({
            let (registry, handle) = (registry.clone(), handle.clone());
            async move { registry.refresh(&handle).await }
        });
        let listed: Vec<String> = (0..101).map(|i| format!("tool_{}", i)).collect();
        let refs: Vec<&str> = listed.iter().map(String::as_str).collect();
        let request = peer.recv_json().await.unwrap();
        peer.respond(&request, json!({"tools": tools(&refs)}));

        refresh.await.unwrap().unwrap();
        assert_eq!(registry.len(), 101);
    }

    #[tokio::test]
    async fn test_stale_refresh_does_not_replace_newer_set() {
        let (handle, _listener, mut peer) = connected().await;
        let registry = ToolRegistry::new();

        let older = tokio::spawn({
            let (registry, handle) = (registry.clone(), handle.clone());
            async move { registry.refresh(&handle).await }
        });
        let older_request = peer.recv_json().await.unwrap();

        let newer = tokio::spawn({
            let (registry, handle) = (registry.clone(), handle.clone());
            async move { registry.refresh(&handle).await }
        });
        let newer_request = peer.recv_json().await.unwrap();

        peer.respond(&newer_request, json!({"tools": tools(&["new"])}));
        let published = newer.await.unwrap().unwrap();
        assert_eq!(names(&published), vec!["new"]);

        peer.respond(&older_request, json!({"tools": tools(&["old"])}));
        let returned = older.await.unwrap().unwrap();
        assert_eq!(names(&returned), vec!["new"]);
        assert_eq!(names(&registry.snapshot()), vec!["new"]);
    }

    #[tokio::test]
    async fn test_older_refresh_publishes_when_newer_fails() {
        let (handle, _listener, mut peer) = connected().await;
        let registry = ToolRegistry::new();

        let older = tokio::spawn({
            let (registry, handle) = (registry.clone(), handle.clone());
            async move { registry.refresh(&handle).await }
        });
        let older_request = peer.recv_json().await.unwrap();
        let newer = tokio::spawn({
            let (registry, handle) = (registry.clone(), handle.clone());
            async move { registry.refresh(&handle).await }
        });
        let newer_request = peer.recv_json().await.unwrap();

        peer.respond(&older_request, json!({"tools": tools(&["search"])}));
        older.await.unwrap().unwrap();
        peer.respond_error(&newer_request, -32603, "busy");
        assert!(newer.await.unwrap().is_err());

        assert_eq!(names(&registry.snapshot()), vec!["search"]);
    }

    #[tokio::test]
    async fn test_clear_wins_over_refresh_in_flight() {
        let (handle, _listener, mut peer) = connected().await;
        let registry = ToolRegistry::new();

        let refresh = tokio::spawn({
            let (registry, handle) = (registry.clone(), handle.clone());
            async move { registry.refresh(&handle).await }
        });
        let request = peer.recv_json().await.unwrap();
        registry.clear();
        peer.respond(&request, json!({"tools": tools(&["search"])}));
        refresh.await.unwrap().unwrap();

        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_names_collapse() {
        let (handle, _listener, mut peer) = connected().await;
        let registry = ToolRegistry::new();

        let refresh = tokio::spawn({
            let (registry, handle) = (registry.clone(), handle.clone());
            async move { registry.refresh(&handle).await }
        });
        let request = peer.recv_json().await.unwrap();
        peer.respond(&request, json!({"tools": tools(&["search", "search", "fetch"])}));
        refresh.await.unwrap().unwrap();

        assert_eq!(names(&registry.snapshot()), vec!["search", "fetch"]);
    }

    #[test]
    fn test_clear() {
        let registry = ToolRegistry::new();
        assert!(registry.is_empty());
        registry.clear();
        assert_eq!(registry.len(), 0);
    }
}
