//! In-process transport
//!
//! [`MemoryConnector`] hands the far end of every connection to a
//! [`MemoryListener`] as a [`MemoryPeer`], which plays the server. Used by
//! tests and by the console demo's scripted server.

use futures::future::BoxFuture;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

use super::{Connector, Transport, TransportIo};
use crate::error::ClientError;

/// Connector whose connections terminate in this process
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    accept_tx: mpsc::UnboundedSender<MemoryPeer>,
}

/// Receives the server end of each connection
#[derive(Debug)]
pub struct MemoryListener {
    accept_rx: mpsc::UnboundedReceiver<MemoryPeer>,
}

impl MemoryConnector {
    /// Create a connector and the listener that accepts its connections.
    ///
    /// Connection attempts fail once the listener is dropped.
    pub fn new() -> (Self, MemoryListener) {
        let (accept_tx, accept_rx) = mpsc::unbounded_channel();
        (Self { accept_tx }, MemoryListener { accept_rx })
    }
}

impl Connector for MemoryConnector {
    fn connect(&self, url: &str) -> BoxFuture<'static, Result<Transport, ClientError>> {
        let (transport, io) = Transport::channel();
        let peer = MemoryPeer {
            url: url.to_string(),
            io: Some(io),
        };
        let result = self
            .accept_tx
            .send(peer)
            .map(|()| transport)
            .map_err(|_| ClientError::transport(format!("connection refused: {}", url)));
        Box::pin(async move { result })
    }
}

impl MemoryListener {
    /// Wait for the next connection
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.accept_rx.recv().await
    }
}

/// Server end of an in-memory connection
#[derive(Debug)]
pub struct MemoryPeer {
    url: String,
    io: Option<TransportIo>,
}

impl MemoryPeer {
    /// URL the client dialed
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Next frame sent by the client; `None` once the client closed
    pub async fn recv(&mut self) -> Option<String> {
        match self.io.as_mut() {
            Some(io) => io.outgoing.recv().await,
            None => None,
        }
    }

    /// Next frame sent by the client, parsed as JSON
    pub async fn recv_json(&mut self) -> Option<Value> {
        let frame = self.recv().await?;
        serde_json::from_str(&frame).ok()
    }

    /// Send a raw text frame to the client
    pub fn send(&self, frame: impl Into<String>) {
        let delivered = self.io.as_ref().is_some_and(|io| io.deliver(frame.into()));
        if !delivered {
            debug!(url = %self.url, "Client end gone, dropping frame");
        }
    }

    /// Send a JSON value to the client
    pub fn send_json(&self, value: &Value) {
        self.send(value.to_string());
    }

    /// Reply to a request frame with a result
    pub fn respond(&self, request: &Value, result: Value) {
        self.send_json(&serde_json::json!({
            "jsonrpc": "2.0",
            "id": request["id"].clone(),
            "result": result,
        }));
    }

    /// Reply to a request frame with a JSON-RPC error
    pub fn respond_error(&self, request: &Value, code: i32, message: &str) {
        self.send_json(&serde_json::json!({
            "jsonrpc": "2.0",
            "id": request["id"].clone(),
            "error": { "code": code, "message": message },
        }));
    }

    /// Close the connection from the server side. Safe to call more than once.
    pub fn close(&mut self) {
        if let Some(io) = self.io.take() {
            io.finish(None);
        }
    }

    /// Close the connection reporting an I/O failure first
    pub fn fail(&mut self, error: impl Into<String>) {
        if let Some(io) = self.io.take() {
            io.finish(Some(error.into()));
        }
    }
}

impl Drop for MemoryPeer {
    fn drop(&mut self) {
        self.close();
    }
}
