//! Newline-delimited JSON over TCP (`tcp://host:port`)

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{debug, info};
use url::Url;

use super::{Transport, TransportIo};
use crate::error::ClientError;

/// Longest accepted line; larger frames close the link
const MAX_FRAME_LENGTH: usize = 16 * 1024 * 1024;

pub(super) async fn connect(url: &Url) -> Result<Transport, ClientError> {
    let host = url
        .host_str()
        .ok_or_else(|| ClientError::InvalidUrl(format!("{}: missing host", url)))?;
    let port = url
        .port()
        .ok_or_else(|| ClientError::InvalidUrl(format!("{}: missing port", url)))?;

    let stream = TcpStream::connect((host, port))
        .await
        .map_err(|e| ClientError::transport(format!("TCP connect to {}:{} failed: {}", host, port, e)))?;

    info!(host, port, "TCP connected");

    let framed = Framed::new(stream, LinesCodec::new_with_max_length(MAX_FRAME_LENGTH));
    let (transport, io) = Transport::channel();
    tokio::spawn(run_io(framed, io));
    Ok(transport)
}

async fn run_io(framed: Framed<TcpStream, LinesCodec>, mut io: TransportIo) {
    let (mut sink, mut stream) = framed.split();

    let error = loop {
        tokio::select! {
            frame = io.outgoing.recv() => match frame {
                Some(frame) => {
                    if let Err(e) = sink.send(frame).await {
                        break Some(format!("TCP send failed: {}", e));
                    }
                }
                None => {
                    debug!("Client closed TCP transport");
                    let _ = sink.close().await;
                    break None;
                }
            },
            line = stream.next() => match line {
                Some(Ok(line)) if line.trim().is_empty() => {}
                Some(Ok(line)) => {
                    if !io.deliver(line) {
                        break None;
                    }
                }
                Some(Err(e)) => break Some(format!("TCP receive failed: {}", e)),
                None => {
                    info!("TCP connection closed by server");
                    break None;
                }
            },
        }
    };

    io.finish(error);
}
