//! WebSocket transport (`ws://`, `wss://`)

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::{Transport, TransportIo};
use crate::error::ClientError;

pub(super) async fn connect(url: &str) -> Result<Transport, ClientError> {
    let (socket, _response) = connect_async(url)
        .await
        .map_err(|e| ClientError::transport(format!("WebSocket connect to {} failed: {}", url, e)))?;

    info!(url, "WebSocket connected");

    let (transport, io) = Transport::channel();
    tokio::spawn(run_io(socket, io));
    Ok(transport)
}

async fn run_io(socket: WebSocketStream<MaybeTlsStream<TcpStream>>, mut io: TransportIo) {
    let (mut sink, mut stream) = socket.split();

    let error = loop {
        tokio::select! {
            frame = io.outgoing.recv() => match frame {
                Some(frame) => {
                    if let Err(e) = sink.send(Message::Text(frame.into())).await {
                        break Some(format!("WebSocket send failed: {}", e));
                    }
                }
                None => {
                    debug!("Client closed WebSocket transport");
                    let _ = sink.send(Message::Close(None)).await;
                    break None;
                }
            },
            message = stream.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    if !io.deliver(text.as_str().to_owned()) {
                        break None;
                    }
                }
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => {
                        if !io.deliver(text) {
                            break None;
                        }
                    }
                    Err(_) => warn!("Dropping non-UTF-8 binary WebSocket frame"),
                },
                Some(Ok(Message::Close(frame))) => {
                    info!(?frame, "WebSocket closed by server");
                    break None;
                }
                // tungstenite answers pings itself
                Some(Ok(_)) => {}
                Some(Err(e)) => break Some(format!("WebSocket receive failed: {}", e)),
                None => {
                    info!("WebSocket stream ended");
                    break None;
                }
            },
        }
    };

    io.finish(error);
}
