//! parley-bridge - console chat front end for a remote MCP server
//!
//! Each stdin line is posted into a single room; everything the bridge
//! posts is printed to stdout.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use parley_bridge::config::{new_config_handle, DEFAULT_CONFIG_TOML};
use parley_bridge::{ChannelSink, ChatEvent, ChatMessage, ConfigLoader, IntegrationBridge};
use parley_client::{ProtocolEngine, SchemeConnector};
use parley_utils::{init_logging_with_config, LogConfig, LogOutput, Result};

mod cli;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Args::parse_args();

    if args.print_config {
        print!("{}", DEFAULT_CONFIG_TOML.trim_start());
        return Ok(());
    }

    let log_config = if args.log_stderr {
        LogConfig::bridge().with_output(LogOutput::Stderr)
    } else {
        LogConfig::bridge()
    };
    init_logging_with_config(log_config)?;

    let mut config = match &args.config {
        Some(path) => ConfigLoader::load_and_validate_path(path)?,
        None => ConfigLoader::load_and_validate()?,
    };
    if let Some(url) = &args.url {
        config.server.url = url.clone();
    }
    if !config.rooms.active.contains(&args.room) {
        config.rooms.active.push(args.room.clone());
    }
    let auto_connect = args.connect || config.server.auto_connect;

    info!(url = %config.server.url, room = %args.room, "Starting parley bridge");

    let engine = ProtocolEngine::spawn(config.engine_config(), SchemeConnector);
    let config = new_config_handle(config);

    let (sink, mut outbound) = ChannelSink::new();
    let bridge = IntegrationBridge::new(Arc::clone(&config), engine.clone(), Arc::new(sink));

    let printer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(message) = outbound.recv().await {
            let line = format!("[{}] {}: {}\n", message.room, message.sender, message.content);
            if let Err(e) = write_line(&mut stdout, &line).await {
                error!(error = %e, "Console output failed, stopping printer");
                break;
            }
        }
    });

    let (chat_tx, chat_rx) = mpsc::channel(64);
    let bridge_task = tokio::spawn(bridge.run(chat_rx));

    if auto_connect {
        let url = config.load().server.url.clone();
        let room = args.room.clone();
        let user = args.user.clone();
        let chat_tx = chat_tx.clone();
        tokio::spawn(async move {
            let event = ChatEvent::Message(ChatMessage::new(room, user, format!("/mcp-connect {}", url)));
            if chat_tx.send(event).await.is_err() {
                warn!("Bridge stopped before auto-connect");
            }
        });
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let message = ChatMessage::new(args.room.as_str(), args.user.as_str(), line);
                    if chat_tx.send(ChatEvent::Message(message)).await.is_err() {
                        error!("Bridge stopped unexpectedly");
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    error!(error = %e, "Failed to read console input");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    drop(chat_tx);
    let _ = bridge_task.await;
    engine.shutdown().await;
    let _ = printer.await;

    info!("parley bridge stopped");
    Ok(())
}

async fn write_line(stdout: &mut tokio::io::Stdout, line: &str) -> std::io::Result<()> {
    stdout.write_all(line.as_bytes()).await?;
    stdout.flush().await
}
