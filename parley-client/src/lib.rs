//! parley-client: bidirectional MCP client over a persistent socket
//!
//! This crate provides:
//! - Socket transports ([`transport`]): WebSocket, newline-delimited TCP and
//!   an in-memory pair
//! - Request correlation with per-request deadlines ([`RequestCorrelator`])
//! - The protocol engine task and its handle ([`ProtocolEngine`],
//!   [`EngineHandle`]): handshake, dispatch, reconnection with backoff
//! - The remote tool registry ([`ToolRegistry`])

pub mod config;
pub mod correlator;
pub mod engine;
pub mod error;
pub mod registry;
pub mod transport;

pub use config::{EngineConfig, ReconnectPolicy};
pub use correlator::{PendingRequest, RequestCorrelator};
pub use engine::{
    ConnectionState, EngineHandle, EngineStatus, LocalCapabilities, LocalHandler, LocalHandlers,
    NotificationEvent, ProtocolEngine, ProtocolEvent, ServerInfo, Session,
};
pub use error::{ClientError, Result};
pub use registry::{ToolRegistry, ToolSet};
pub use transport::{Connector, SchemeConnector, Transport, TransportEvent};
