//! The engine task

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use parley_protocol::{
    methods, AuthenticateParams, AuthenticateResult, ClientCapabilities, IncomingMessage,
    InitializeParams, InitializeResult, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    RequestId,
};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::Sleep;
use tracing::{debug, error, info, warn};

use super::{
    Command, ConnectionState, EngineStatus, LocalHandlers, NotificationEvent, ProtocolEvent,
    ServerInfo, Session,
};
use crate::config::EngineConfig;
use crate::correlator::{PendingRequest, RequestCorrelator};
use crate::error::{ClientError, Result};
use crate::transport::{Connector, Transport, TransportEvent};

/// Who settles a pending request
#[derive(Debug)]
pub(crate) enum Completion {
    Caller(oneshot::Sender<Result<Value>>),
    /// The `initialize` request of connection attempt `generation`
    Handshake { generation: u64 },
    /// The `authenticate` request that follows a successful `initialize`
    Authenticate { generation: u64, server: ServerInfo },
}

/// Outcome of a spawned connect attempt
struct ConnectAttempt {
    generation: u64,
    result: Result<Transport>,
}

struct Link {
    generation: u64,
    transport: Transport,
}

struct ReconnectTimer {
    generation: u64,
    sleep: Pin<Box<Sleep>>,
}

pub(crate) struct Actor {
    config: EngineConfig,
    connector: Arc<dyn Connector>,
    handlers: LocalHandlers,
    commands: mpsc::Receiver<Command>,
    attempts_tx: mpsc::UnboundedSender<ConnectAttempt>,
    attempts_rx: mpsc::UnboundedReceiver<ConnectAttempt>,
    events: broadcast::Sender<ProtocolEvent>,
    status: watch::Sender<EngineStatus>,
    correlator: RequestCorrelator<Completion>,
    link: Option<Link>,
    /// Bumped whenever an attempt, link or timer is superseded
    generation: u64,
    url: Option<String>,
    server: Option<ServerInfo>,
    reconnect_attempt: u32,
    reconnect_timer: Option<ReconnectTimer>,
    connect_waiter: Option<oneshot::Sender<Result<ServerInfo>>>,
}

impl Actor {
    pub(crate) fn new(
        config: EngineConfig,
        connector: Arc<dyn Connector>,
        handlers: LocalHandlers,
        commands: mpsc::Receiver<Command>,
        events: broadcast::Sender<ProtocolEvent>,
        status: watch::Sender<EngineStatus>,
    ) -> Self {
        let (attempts_tx, attempts_rx) = mpsc::unbounded_channel();
        Self {
            config,
            connector,
            handlers,
            commands,
            attempts_tx,
            attempts_rx,
            events,
            status,
            correlator: RequestCorrelator::new(),
            link: None,
            generation: 0,
            url: None,
            server: None,
            reconnect_attempt: 0,
            reconnect_timer: None,
            connect_waiter: None,
        }
    }

    pub(crate) async fn run(mut self) {
        debug!("Protocol engine started");
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(attempt) = self.attempts_rx.recv() => self.handle_attempt(attempt),
                (generation, event) = next_link_event(&mut self.link) => {
                    self.handle_transport_event(generation, event)
                }
                Some(expired) = self.correlator.next_expired(), if !self.correlator.is_empty() => {
                    self.handle_timeout(expired)
                }
                generation = reconnect_due(&mut self.reconnect_timer) => {
                    self.handle_reconnect_due(generation)
                }
            }
        }

        self.drop_link();
        self.cancel_reconnect();
        if let Some(waiter) = self.connect_waiter.take() {
            let _ = waiter.send(Err(ClientError::EngineStopped));
        }
        self.set_state(ConnectionState::Disconnected);
        debug!("Protocol engine stopped");
    }

    // ==================== Commands ====================

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect { url, reply } => self.start_connect(url, reply),
            Command::Disconnect { reply } => {
                info!("Disconnecting from MCP server");
                self.shutdown_link();
                self.fail_waiter(ClientError::transport("connection attempt cancelled"));
                self.set_state(ConnectionState::Disconnected);
                let _ = reply.send(());
            }
            Command::Request {
                method,
                params,
                timeout,
                reply,
            } => {
                if !self.state().is_ready() {
                    let _ = reply.send(Err(ClientError::NotConnected));
                    return;
                }
                let timeout = timeout.unwrap_or(self.config.request_timeout);
                self.send_request(method, params, timeout, Completion::Caller(reply));
            }
            Command::Notify {
                method,
                params,
                reply,
            } => {
                let result = if self.state().is_ready() {
                    self.send_frame(&JsonRpcNotification::new(method, params))
                } else {
                    Err(ClientError::NotConnected)
                };
                let _ = reply.send(result);
            }
            Command::Shutdown => {}
        }
    }

    fn start_connect(&mut self, url: String, reply: oneshot::Sender<Result<ServerInfo>>) {
        info!(%url, "Connecting to MCP server");
        self.shutdown_link();
        self.fail_waiter(ClientError::transport("superseded by a newer connect"));

        self.reconnect_attempt = 0;
        self.url = Some(url);
        self.connect_waiter = Some(reply);
        self.begin_attempt();
    }

    // ==================== Connection Attempts ====================

    fn begin_attempt(&mut self) {
        let Some(url) = self.url.clone() else {
            warn!("No server URL to connect to");
            self.set_state(ConnectionState::Disconnected);
            return;
        };

        self.generation += 1;
        let generation = self.generation;
        self.set_state(ConnectionState::Connecting);

        let attempt = self.connector.connect(&url);
        let attempts_tx = self.attempts_tx.clone();
        tokio::spawn(async move {
            let result = attempt.await;
            let _ = attempts_tx.send(ConnectAttempt { generation, result });
        });
    }

    fn handle_attempt(&mut self, attempt: ConnectAttempt) {
        if attempt.generation != self.generation {
            debug!(generation = attempt.generation, "Discarding stale connect attempt");
            if let Ok(mut transport) = attempt.result {
                transport.close();
            }
            return;
        }

        match attempt.result {
            Ok(transport) => {
                debug!("Transport open, sending initialize");
                self.link = Some(Link {
                    generation: attempt.generation,
                    transport,
                });
                self.set_state(ConnectionState::Initializing);

                let params = InitializeParams {
                    protocol_version: self.config.protocol_version.clone(),
                    capabilities: ClientCapabilities::with_local_handlers(),
                    client_info: self.config.client_info.clone(),
                };
                match serde_json::to_value(params) {
                    Ok(params) => self.send_request(
                        methods::INITIALIZE.to_string(),
                        Some(params),
                        self.config.request_timeout,
                        Completion::Handshake {
                            generation: attempt.generation,
                        },
                    ),
                    Err(e) => self.attempt_failed(e.into()),
                }
            }
            Err(e) => self.attempt_failed(e),
        }
    }

    fn finish_handshake(&mut self, generation: u64, result: Result<Value>) {
        if generation != self.generation || self.state() != ConnectionState::Initializing {
            debug!(generation, "Ignoring stale initialize outcome");
            return;
        }

        let init = result.and_then(|value| {
            serde_json::from_value::<InitializeResult>(value).map_err(ClientError::from)
        });
        let server = match init {
            Ok(init) => ServerInfo::from(init),
            Err(e) => {
                warn!(error = %e, "MCP handshake failed");
                self.attempt_failed(e);
                return;
            }
        };

        let Some(credentials) = self.config.credentials.clone() else {
            self.complete_handshake(server);
            return;
        };

        debug!(username = %credentials.username, "Authenticating");
        match serde_json::to_value(AuthenticateParams { credentials }) {
            Ok(params) => self.send_request(
                methods::AUTHENTICATE.to_string(),
                Some(params),
                self.config.request_timeout,
                Completion::Authenticate { generation, server },
            ),
            Err(e) => self.attempt_failed(e.into()),
        }
    }

    fn finish_authentication(
        &mut self,
        generation: u64,
        mut server: ServerInfo,
        result: Result<Value>,
    ) {
        if generation != self.generation || self.state() != ConnectionState::Initializing {
            debug!(generation, "Ignoring stale authenticate outcome");
            return;
        }

        let outcome = match result {
            Ok(value) => serde_json::from_value::<AuthenticateResult>(value)
                .map_err(ClientError::from)
                .and_then(|auth| {
                    if auth.authenticated {
                        Ok(auth)
                    } else {
                        let reason = auth.message.unwrap_or_else(|| "credentials rejected".into());
                        Err(ClientError::AuthenticationFailed(reason))
                    }
                }),
            Err(ClientError::Protocol { message, .. }) => {
                Err(ClientError::AuthenticationFailed(message))
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(auth) => {
                info!(
                    session = auth.session_id.as_deref().unwrap_or("-"),
                    permissions = auth.permissions.len(),
                    "Authenticated with MCP server"
                );
                server.session = Some(Session {
                    id: auth.session_id,
                    permissions: auth.permissions,
                });
                self.complete_handshake(server);
            }
            Err(e) => {
                warn!(error = %e, "MCP authentication failed");
                self.attempt_failed(e);
            }
        }
    }

    fn complete_handshake(&mut self, server: ServerInfo) {
        info!(
            server = %server.implementation.name,
            version = %server.implementation.version,
            protocol = %server.protocol_version,
            "MCP handshake complete"
        );
        if let Err(e) = self.send_frame(&JsonRpcNotification::new(methods::INITIALIZED, None)) {
            warn!(error = %e, "Failed to send initialized notification");
        }

        self.reconnect_attempt = 0;
        self.server = Some(server.clone());
        self.set_state(ConnectionState::Ready);
        self.emit(ProtocolEvent::Connected(server.clone()));
        if let Some(waiter) = self.connect_waiter.take() {
            let _ = waiter.send(Ok(server));
        }
    }

    /// A connect attempt or handshake failed
    fn attempt_failed(&mut self, err: ClientError) {
        self.drop_link();
        self.generation += 1;

        // rejected credentials will not improve on retry
        if self.reconnect_attempt > 0 && !err.is_auth_failure() {
            warn!(attempt = self.reconnect_attempt, error = %err, "Reconnection attempt failed");
            self.schedule_reconnect();
            return;
        }

        self.reconnect_attempt = 0;
        self.set_state(ConnectionState::Disconnected);
        match self.connect_waiter.take() {
            Some(waiter) => {
                let _ = waiter.send(Err(err));
            }
            None => self.emit(ProtocolEvent::Error(err)),
        }
    }

    // ==================== Reconnection ====================

    /// Arm the backoff timer for the next attempt, or give up.
    ///
    /// At most one timer exists; a second call while one is armed is a no-op.
    pub(crate) fn schedule_reconnect(&mut self) {
        if self.reconnect_timer.is_some() {
            debug!("Reconnect already scheduled");
            return;
        }

        let policy = &self.config.reconnect;
        let attempt = self.reconnect_attempt + 1;
        if attempt > policy.max_attempts {
            let attempts = policy.max_attempts;
            error!(attempts, "All reconnection attempts exhausted");
            self.reconnect_attempt = 0;
            self.set_state(ConnectionState::Failed);
            self.emit(ProtocolEvent::ReconnectFailed { attempts });
            return;
        }

        let delay = policy.delay_for(attempt);
        self.reconnect_attempt = attempt;
        self.generation += 1;
        info!(
            attempt,
            max_attempts = policy.max_attempts,
            delay_ms = delay.as_millis() as u64,
            "Scheduling reconnection"
        );

        self.reconnect_timer = Some(ReconnectTimer {
            generation: self.generation,
            sleep: Box::pin(tokio::time::sleep(delay)),
        });
        self.set_state(ConnectionState::Reconnecting { attempt });
        self.emit(ProtocolEvent::Reconnecting { attempt, delay });
    }

    fn handle_reconnect_due(&mut self, generation: u64) {
        self.reconnect_timer = None;
        if generation != self.generation {
            debug!(generation, "Ignoring stale reconnect timer");
            return;
        }
        info!(attempt = self.reconnect_attempt, "Attempting reconnection");
        self.begin_attempt();
    }

    fn cancel_reconnect(&mut self) {
        if self.reconnect_timer.take().is_some() {
            debug!("Cancelled pending reconnect");
        }
    }

    // ==================== Transport Events ====================

    fn handle_transport_event(&mut self, generation: u64, event: TransportEvent) {
        if self.link.as_ref().map(|link| link.generation) != Some(generation) {
            return;
        }

        match event {
            TransportEvent::Message(frame) => self.handle_frame(&frame),
            TransportEvent::Error(message) => {
                warn!(%message, "Transport error");
                self.emit(ProtocolEvent::Error(ClientError::Transport(message)));
            }
            TransportEvent::Closed => self.link_closed(),
        }
    }

    fn link_closed(&mut self) {
        self.link = None;
        match self.state() {
            ConnectionState::Ready => {
                info!("Connection to MCP server lost");
                self.server = None;
                self.emit(ProtocolEvent::Disconnected);
                if self.config.reconnect.enabled {
                    self.schedule_reconnect();
                } else {
                    self.set_state(ConnectionState::Disconnected);
                }
            }
            ConnectionState::Connecting | ConnectionState::Initializing => {
                self.attempt_failed(ClientError::transport("connection closed during handshake"));
            }
            _ => {}
        }
    }

    fn handle_frame(&mut self, frame: &str) {
        let message = match IncomingMessage::parse(frame) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "Dropping malformed frame");
                return;
            }
        };

        match message {
            IncomingMessage::Response(response) => self.handle_response(response),
            IncomingMessage::Notification(notification) => {
                debug!(method = %notification.method, "Notification received");
                self.emit(ProtocolEvent::Notification(NotificationEvent {
                    method: notification.method,
                    params: notification.params,
                }));
            }
            IncomingMessage::Request(request) => {
                debug!(method = %request.method, id = %request.id, "Server request received");
                let response = self.handlers.dispatch(&request);
                if let Err(e) = self.send_frame(&response) {
                    warn!(error = %e, "Failed to answer server request");
                }
            }
        }
    }

    fn handle_response(&mut self, response: JsonRpcResponse) {
        let Some(id) = response.id.clone() else {
            let err = response
                .into_result()
                .err()
                .map(ClientError::from)
                .unwrap_or_else(|| ClientError::MalformedFrame("response with null id".into()));
            warn!(error = %err, "Server reported an error without a request id");
            self.emit(ProtocolEvent::Error(err));
            return;
        };

        match self.correlator.resolve(&id) {
            Some(pending) => {
                debug!(
                    request_id = pending.id,
                    method = %pending.method,
                    elapsed_ms = pending.issued_at.elapsed().as_millis() as u64,
                    "Response received"
                );
                let result = response.into_result().map_err(ClientError::from);
                self.settle(pending, result);
            }
            None => debug!(request_id = %id, "Dropping late or unknown response"),
        }
    }

    fn handle_timeout(&mut self, pending: PendingRequest<Completion>) {
        warn!(
            request_id = pending.id,
            method = %pending.method,
            timeout_ms = pending.timeout.as_millis() as u64,
            "Request timed out"
        );
        let err = ClientError::Timeout {
            method: pending.method.clone(),
            timeout: pending.timeout,
        };
        self.settle(pending, Err(err));
    }

    fn settle(&mut self, pending: PendingRequest<Completion>, result: Result<Value>) {
        match pending.completion {
            Completion::Caller(reply) => {
                let _ = reply.send(result);
            }
            Completion::Handshake { generation } => self.finish_handshake(generation, result),
            Completion::Authenticate { generation, server } => {
                self.finish_authentication(generation, server, result)
            }
        }
    }

    // ==================== Outbound ====================

    fn send_request(
        &mut self,
        method: String,
        params: Option<Value>,
        timeout: Duration,
        completion: Completion,
    ) {
        let id = self.correlator.register(method.clone(), timeout, completion);
        debug!(request_id = id, %method, "Sending request");

        let request = JsonRpcRequest::new(RequestId::Number(id), method, params);
        if let Err(e) = self.send_frame(&request) {
            if let Some(pending) = self.correlator.resolve(&RequestId::Number(id)) {
                self.settle(pending, Err(e));
            }
        }
    }

    fn send_frame<T: Serialize>(&self, message: &T) -> Result<()> {
        let frame = serde_json::to_string(message)?;
        match &self.link {
            Some(link) => {
                link.transport.send(frame);
                Ok(())
            }
            None => Err(ClientError::NotConnected),
        }
    }

    // ==================== Helpers ====================

    /// Close the current link on our own initiative: no reconnect follows
    fn shutdown_link(&mut self) {
        let was_ready = self.state().is_ready();
        self.drop_link();
        self.cancel_reconnect();
        self.generation += 1;
        self.reconnect_attempt = 0;
        self.server = None;
        if was_ready {
            self.emit(ProtocolEvent::Disconnected);
        }
    }

    fn drop_link(&mut self) {
        if let Some(mut link) = self.link.take() {
            link.transport.close();
        }
    }

    fn fail_waiter(&mut self, err: ClientError) {
        if let Some(waiter) = self.connect_waiter.take() {
            let _ = waiter.send(Err(err));
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.status.borrow().state
    }

    fn set_state(&self, state: ConnectionState) {
        let status = EngineStatus {
            state,
            url: self.url.clone(),
            server: self.server.clone(),
        };
        self.status.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }

    fn emit(&self, event: ProtocolEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }
}

async fn next_link_event(link: &mut Option<Link>) -> (u64, TransportEvent) {
    match link {
        Some(link) => {
            let event = link.transport.recv().await.unwrap_or(TransportEvent::Closed);
            (link.generation, event)
        }
        None => std::future::pending().await,
    }
}

async fn reconnect_due(timer: &mut Option<ReconnectTimer>) -> u64 {
    match timer {
        Some(timer) => {
            timer.sleep.as_mut().await;
            timer.generation
        }
        None => std::future::pending().await,
    }
}
