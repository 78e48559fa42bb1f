//! Chat system collaborators
//!
//! The bridge never talks to a concrete chat backend. It consumes a stream of
//! [`ChatEvent`]s and writes through a [`ChatSink`].

use std::fmt;

use chrono::{DateTime, Utc};
use parley_utils::{ParleyError, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Identifier of a chat room
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for RoomId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A message observed in a room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub room: RoomId,
    pub sender: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// New message stamped with the current time
    pub fn new(room: impl Into<RoomId>, sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            room: room.into(),
            sender: sender.into(),
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Inbound events from the chat system
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    /// A message or command posted in a room
    Message(ChatMessage),
    /// The room is gone; its window and agent state are dropped
    RoomClosed { room: RoomId },
}

/// Outbound side of the chat system
pub trait ChatSink: Send + Sync + 'static {
    /// Post `content` into `room` attributed to `sender`
    fn send_message(&self, room: &RoomId, sender: &str, content: &str) -> Result<()>;
}

/// A message written through a [`ChannelSink`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub room: RoomId,
    pub sender: String,
    pub content: String,
}

/// Sink that forwards every message onto a channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<OutboundMessage>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ChatSink for ChannelSink {
    fn send_message(&self, room: &RoomId, sender: &str, content: &str) -> Result<()> {
        self.tx
            .send(OutboundMessage {
                room: room.clone(),
                sender: sender.to_string(),
                content: content.to_string(),
            })
            .map_err(|_| ParleyError::chat(format!("room {} is unreachable", room)))
    }
}
