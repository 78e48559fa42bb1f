//! Per-room recent message windows
//!
//! Each room keeps the last `capacity` observed messages, oldest evicted
//! first. Windows only feed context payloads for agent calls; they are not
//! chat history.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::chat::{ChatMessage, RoomId};

/// Default messages kept per room
pub const DEFAULT_WINDOW_CAPACITY: usize = 100;

/// Bounded, insertion-ordered message buffer for one room
#[derive(Debug, Clone)]
pub struct RoomContextWindow {
    capacity: usize,
    entries: VecDeque<ChatMessage>,
}

impl RoomContextWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a message, returning the evicted oldest one when full
    pub fn push(&mut self, message: ChatMessage) -> Option<ChatMessage> {
        let evicted = if self.entries.len() == self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(message);
        evicted
    }

    /// Up to the last `n` messages, oldest first
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &ChatMessage> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChatMessage> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// One context entry as sent to the agent
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextEntry {
    pub sender: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl From<&ChatMessage> for ContextEntry {
    fn from(message: &ChatMessage) -> Self {
        Self {
            sender: message.sender.clone(),
            content: message.content.clone(),
            timestamp: message.timestamp,
        }
    }
}

/// Windows for every room seen so far
#[derive(Debug)]
pub struct RoomWindows {
    capacity: usize,
    rooms: HashMap<RoomId, RoomContextWindow>,
}

impl Default for RoomWindows {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_CAPACITY)
    }
}

impl RoomWindows {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            rooms: HashMap::new(),
        }
    }

    /// Record a message in its room's window
    pub fn observe(&mut self, message: ChatMessage) {
        let capacity = self.capacity;
        self.rooms
            .entry(message.room.clone())
            .or_insert_with(|| RoomContextWindow::new(capacity))
            .push(message);
    }

    /// Up to the last `n` messages of `room` as context entries, oldest first
    pub fn context(&self, room: &RoomId, n: usize) -> Vec<ContextEntry> {
        self.rooms
            .get(room)
            .map(|window| window.recent(n).map(ContextEntry::from).collect())
            .unwrap_or_default()
    }

    pub fn window(&self, room: &RoomId) -> Option<&RoomContextWindow> {
        self.rooms.get(room)
    }

    /// Forget a room
    pub fn remove(&mut self, room: &RoomId) -> Option<RoomContextWindow> {
        self.rooms.remove(room)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
