//! parley-bridge: exposes a remote MCP server inside a chat system
//!
//! This crate provides:
//! - The integration task ([`IntegrationBridge`]) translating chat commands
//!   and agent-addressed messages into protocol calls, and server
//!   notifications into chat messages
//! - Chat collaborator interfaces ([`ChatSink`], [`ChatEvent`])
//! - Per-room context windows ([`RoomContextWindow`])
//! - The chat command table ([`CommandTable`])
//! - TOML configuration ([`config`])

pub mod bridge;
pub mod chat;
pub mod commands;
pub mod config;
pub mod context;
pub mod format;

pub use bridge::IntegrationBridge;
pub use chat::{ChannelSink, ChatEvent, ChatMessage, ChatSink, OutboundMessage, RoomId};
pub use commands::{CommandTable, CommandTarget, ToolBinding};
pub use config::{BridgeConfig, ConfigHandle, ConfigLoader};
pub use context::{ContextEntry, RoomContextWindow, RoomWindows};
