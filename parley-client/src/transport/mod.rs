//! Socket transports
//!
//! A [`Transport`] is one opened link to a server. Frames go out through
//! [`Transport::send`] and come back as [`TransportEvent`]s; the event stream
//! ends with exactly one [`TransportEvent::Closed`]. A closed transport is
//! never reused, reconnection builds a new one through a [`Connector`].

mod memory;
mod tcp;
mod websocket;

pub use memory::{MemoryConnector, MemoryListener, MemoryPeer};

use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tracing::debug;
use url::Url;

use crate::error::ClientError;

/// Something that happened on an open transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A text frame from the server
    Message(String),
    /// Read or write failure; always followed by `Closed`
    Error(String),
    /// The link is gone
    Closed,
}

/// One opened link to a server
#[derive(Debug)]
pub struct Transport {
    outgoing: Option<mpsc::UnboundedSender<String>>,
    events: mpsc::UnboundedReceiver<TransportEvent>,
}

impl Transport {
    /// Create a transport and the I/O half that drives it
    pub(crate) fn channel() -> (Self, TransportIo) {
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let transport = Self {
            outgoing: Some(outgoing_tx),
            events: events_rx,
        };
        let io = TransportIo {
            outgoing: outgoing_rx,
            events: events_tx,
        };
        (transport, io)
    }

    /// Queue a frame for the server (fire and forget)
    ///
    /// Frames sent after the link closed are dropped.
    pub fn send(&self, frame: String) {
        let delivered = self
            .outgoing
            .as_ref()
            .is_some_and(|tx| tx.send(frame).is_ok());
        if !delivered {
            debug!("Dropping frame on closed transport");
        }
    }

    /// Close the link. Safe to call more than once.
    pub fn close(&mut self) {
        if self.outgoing.take().is_some() {
            debug!("Transport closed locally");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.outgoing.as_ref().map_or(true, |tx| tx.is_closed())
    }

    /// Next event; `None` once the I/O side is gone
    pub async fn recv(&mut self) -> Option<TransportEvent> {
        self.events.recv().await
    }
}

/// The I/O half of a [`Transport`], owned by whatever drives the socket
#[derive(Debug)]
pub(crate) struct TransportIo {
    /// Frames queued by the client; `None` once the client closed the link
    pub outgoing: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl TransportIo {
    /// Deliver an inbound frame. Returns false once the client side is gone.
    pub fn deliver(&self, frame: String) -> bool {
        self.events.send(TransportEvent::Message(frame)).is_ok()
    }

    /// Emit the terminal events and drop the I/O half
    pub fn finish(self, error: Option<String>) {
        if let Some(error) = error {
            let _ = self.events.send(TransportEvent::Error(error));
        }
        let _ = self.events.send(TransportEvent::Closed);
    }
}

/// Opens transports to a server URL
pub trait Connector: Send + Sync + 'static {
    /// Begin a connection attempt. Resolves to exactly one of an opened
    /// transport or an error.
    fn connect(&self, url: &str) -> BoxFuture<'static, Result<Transport, ClientError>>;
}

/// Picks a transport from the URL scheme: `ws`/`wss` for WebSocket, `tcp`
/// for newline-delimited JSON over a plain socket
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemeConnector;

impl Connector for SchemeConnector {
    fn connect(&self, url: &str) -> BoxFuture<'static, Result<Transport, ClientError>> {
        let raw = url.to_string();
        Box::pin(async move {
            let parsed = parse_server_url(&raw)?;
            match parsed.scheme() {
                "ws" | "wss" => websocket::connect(&raw).await,
                "tcp" => tcp::connect(&parsed).await,
                other => Err(ClientError::InvalidUrl(format!(
                    "unsupported scheme '{}' in {}",
                    other, raw
                ))),
            }
        })
    }
}

/// Parse a server URL, rejecting anything without a host
pub fn parse_server_url(raw: &str) -> Result<Url, ClientError> {
    let url = Url::parse(raw).map_err(|e| ClientError::InvalidUrl(format!("{}: {}", raw, e)))?;
    if url.host_str().is_none() {
        return Err(ClientError::InvalidUrl(format!("{}: missing host", raw)));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (mut transport, io) = Transport::channel();
        assert!(!transport.is_closed());
        transport.close();
        transport.close();
        assert!(transport.is_closed());
        drop(io);
    }

    #[tokio::test]
    async fn test_send_after_close_is_dropped() {
        let (mut transport, mut io) = Transport::channel();
        transport.send("one".into());
        transport.close();
        transport.send("two".into());

        assert_eq!(io.outgoing.recv().await.as_deref(), Some("one"));
        assert_eq!(io.outgoing.recv().await, None);
    }

    #[tokio::test]
    async fn test_finish_emits_error_then_closed() {
        let (mut transport, io) = Transport::channel();
        assert!(io.deliver("frame".into()));
        io.finish(Some("reset by peer".into()));

        assert_eq!(transport.recv().await, Some(TransportEvent::Message("frame".into())));
        assert_eq!(
            transport.recv().await,
            Some(TransportEvent::Error("reset by peer".into()))
        );
        assert_eq!(transport.recv().await, Some(TransportEvent::Closed));
        assert_eq!(transport.recv().await, None);
    }

    #[test]
    fn test_parse_server_url() {
        assert!(parse_server_url("ws://localhost:3001").is_ok());
        assert!(parse_server_url("tcp://127.0.0.1:9000").is_ok());
        assert!(matches!(
            parse_server_url("not a url"),
            Err(ClientError::InvalidUrl(_))
        ));
        assert!(matches!(
            parse_server_url("unix:/tmp/sock"),
            Err(ClientError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_scheme_connector_rejects_unknown_scheme() {
        let err = SchemeConnector.connect("http://localhost:1").await.unwrap_err();
        match err {
            ClientError::InvalidUrl(msg) => assert!(msg.contains("unsupported scheme 'http'")),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
