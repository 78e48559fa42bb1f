//! Protocol engine
//!
//! One task owns the connection, the pending-request table and the reconnect
//! timer. [`EngineHandle`] is the cloneable front door: commands go in over a
//! channel, state is published on a `watch` channel and everything else the
//! engine observes is broadcast as a [`ProtocolEvent`].

mod actor;
mod handlers;


pub use handlers::{LocalCapabilities, LocalHandler, LocalHandlers};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use parley_protocol::{
    methods, CallToolParams, CallToolResult, Implementation, InitializeResult,
    ListResourcesResult, ListToolsResult, PaginatedParams, ReadResourceParams,
    ReadResourceResult,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot, watch};

use crate::config::EngineConfig;
use crate::error::{ClientError, Result};
use crate::transport::Connector;

use actor::Actor;

/// Connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    /// Transport open, `initialize` in flight
    Initializing,
    Ready,
    /// Waiting out the backoff before attempt `attempt`
    Reconnecting { attempt: u32 },
    /// Reconnect attempts exhausted
    Failed,
}

impl ConnectionState {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Initializing => write!(f, "initializing"),
            Self::Ready => write!(f, "ready"),
            Self::Reconnecting { attempt } => write!(f, "reconnecting (attempt {})", attempt),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Authenticated session granted by the server
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub id: Option<String>,
    pub permissions: Vec<String>,
}

impl Session {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }
}

/// What the server told us during the handshake
#[derive(Debug, Clone, PartialEq)]
pub struct ServerInfo {
    pub protocol_version: String,
    pub implementation: Implementation,
    pub instructions: Option<String>,
    /// Present when the connection authenticated with credentials
    pub session: Option<Session>,
}

impl From<InitializeResult> for ServerInfo {
    fn from(result: InitializeResult) -> Self {
        Self {
            protocol_version: result.protocol_version,
            implementation: result.server_info,
            instructions: result.instructions,
            session: None,
        }
    }
}

/// Published engine status
#[derive(Debug, Clone, PartialEq)]
pub struct EngineStatus {
    pub state: ConnectionState,
    /// Last URL passed to `connect`
    pub url: Option<String>,
    /// Present while Ready
    pub server: Option<ServerInfo>,
}

impl Default for EngineStatus {
    fn default() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            url: None,
            server: None,
        }
    }
}

/// A notification received from the server
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationEvent {
    pub method: String,
    pub params: Option<Value>,
}

/// Events broadcast by the engine
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolEvent {
    /// Handshake finished; requests may be sent
    Connected(ServerInfo),
    /// A Ready link went away
    Disconnected,
    /// A reconnect attempt was scheduled
    Reconnecting { attempt: u32, delay: Duration },
    /// Every reconnect attempt failed; emitted once
    ReconnectFailed { attempts: u32 },
    Notification(NotificationEvent),
    /// Failure with no caller to report to
    Error(ClientError),
}

pub(crate) enum Command {
    Connect {
        url: String,
        reply: oneshot::Sender<Result<ServerInfo>>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
    Request {
        method: String,
        params: Option<Value>,
        timeout: Option<Duration>,
        reply: oneshot::Sender<Result<Value>>,
    },
    Notify {
        method: String,
        params: Option<Value>,
        reply: oneshot::Sender<Result<()>>,
    },
    Shutdown,
}

/// Spawns protocol engines
pub struct ProtocolEngine;

impl ProtocolEngine {
    /// Start an engine with the built-in server-request handlers
    pub fn spawn<C: Connector>(config: EngineConfig, connector: C) -> EngineHandle {
        let capabilities = Arc::new(ArcSwap::from_pointee(LocalCapabilities::default()));
        let handlers = LocalHandlers::builtin(Arc::clone(&capabilities));
        Self::spawn_with_handlers(config, connector, handlers, capabilities)
    }

    /// Start an engine with a custom handler table
    pub fn spawn_with_handlers<C: Connector>(
        config: EngineConfig,
        connector: C,
        handlers: LocalHandlers,
        capabilities: Arc<ArcSwap<LocalCapabilities>>,
    ) -> EngineHandle {
        let (commands_tx, commands_rx) = mpsc::channel(64);
        let (events_tx, _) = broadcast::channel(config.event_capacity);
        let (status_tx, status_rx) = watch::channel(EngineStatus::default());

        let actor = Actor::new(
            config,
            Arc::new(connector),
            handlers,
            commands_rx,
            events_tx.clone(),
            status_tx,
        );
        tokio::spawn(actor.run());

        EngineHandle {
            commands: commands_tx,
            events: events_tx,
            status: status_rx,
            capabilities,
        }
    }
}

/// Cloneable handle to a running engine
#[derive(Clone)]
pub struct EngineHandle {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<ProtocolEvent>,
    status: watch::Receiver<EngineStatus>,
    capabilities: Arc<ArcSwap<LocalCapabilities>>,
}

impl fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineHandle")
            .field("status", &*self.status.borrow())
            .finish()
    }
}

impl EngineHandle {
    /// Connect (or switch) to `url` and run the handshake
    pub async fn connect(&self, url: impl Into<String>) -> Result<ServerInfo> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Connect {
            url: url.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| ClientError::EngineStopped)?
    }

    /// Close the link without reconnecting
    pub async fn disconnect(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Disconnect { reply }).await?;
        rx.await.map_err(|_| ClientError::EngineStopped)
    }

    /// Send a request with the configured default deadline
    pub async fn request(&self, method: impl Into<String>, params: Option<Value>) -> Result<Value> {
        self.dispatch(method.into(), params, None).await
    }

    /// Send a request with its own deadline
    pub async fn request_with_timeout(
        &self,
        method: impl Into<String>,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<Value> {
        self.dispatch(method.into(), params, Some(timeout)).await
    }

    /// Send a notification; nothing is tracked
    pub async fn notify(&self, method: impl Into<String>, params: Option<Value>) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Notify {
            method: method.into(),
            params,
            reply,
        })
        .await?;
        rx.await.map_err(|_| ClientError::EngineStopped)?
    }

    pub async fn list_tools(&self, cursor: Option<String>) -> Result<ListToolsResult> {
        self.typed_request(methods::TOOLS_LIST, &PaginatedParams { cursor })
            .await
    }

    /// Invoke a remote tool. Transport and protocol failures are reported as
    /// errors; a result with `isError` is returned as-is.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult> {
        let params = CallToolParams {
            name: name.to_string(),
            arguments,
        };
        self.typed_request(methods::TOOLS_CALL, &params).await
    }

    pub async fn list_resources(&self, cursor: Option<String>) -> Result<ListResourcesResult> {
        self.typed_request(methods::RESOURCES_LIST, &PaginatedParams { cursor })
            .await
    }

    pub async fn read_resource(&self, uri: &str) -> Result<ReadResourceResult> {
        let params = ReadResourceParams {
            uri: uri.to_string(),
        };
        self.typed_request(methods::RESOURCES_READ, &params).await
    }

    /// Replace what the built-in handlers report back to the server
    pub fn publish_capabilities(&self, capabilities: LocalCapabilities) {
        self.capabilities.store(Arc::new(capabilities));
    }

    pub fn state(&self) -> ConnectionState {
        self.status.borrow().state
    }

    pub fn status(&self) -> EngineStatus {
        self.status.borrow().clone()
    }

    /// Last URL passed to `connect`
    pub fn server_url(&self) -> Option<String> {
        self.status.borrow().url.clone()
    }

    /// Watch status changes
    pub fn watch_status(&self) -> watch::Receiver<EngineStatus> {
        self.status.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProtocolEvent> {
        self.events.subscribe()
    }

    /// Stop the engine task; pending callers get `EngineStopped`
    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown).await;
    }

    async fn typed_request<P, R>(&self, method: &str, params: &P) -> Result<R>
    where
        P: serde::Serialize,
        R: DeserializeOwned,
    {
        let params = serde_json::to_value(params)?;
        let value = self.request(method, Some(params)).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn dispatch(
        &self,
        method: String,
        params: Option<Value>,
        timeout: Option<Duration>,
    ) -> Result<Value> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Request {
            method,
            params,
            timeout,
            reply,
        })
        .await?;
        rx.await.map_err(|_| ClientError::EngineStopped)?
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ClientError::EngineStopped)
    }
}
