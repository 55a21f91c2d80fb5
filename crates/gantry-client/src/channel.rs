//! Persistent control channel to the launch service
//!
//! A single I/O task owns the link. Callers talk to it through a cloneable
//! `ControlChannel` handle that sends commands over an mpsc queue and waits
//! on a oneshot reply, so the link itself is never shared.
//!
//! ```text
//! Disconnected --open--> Connecting --ok--> Authenticated --lost--> Degraded
//!                          ^    |                                      |
//!                          |    +-- failed attempt stays Connecting    |
//!                          +----------------- reconnect ---------------+
//! ```
//!
//! Every entry into `Degraded` invokes the registered handler's
//! `on_disconnect` once, on its own task. If the handler finishes while the
//! link is still down, the I/O task keeps reconnecting by itself with
//! backoff and calls `on_restored` once the link is back.

use crate::error::ChannelError;
use crate::protocol::{Request, RequestEnvelope, Response, ResponseEnvelope};
use crate::transport::{Link, Transport};
use async_trait::async_trait;
use gantry_core::retry::{calculate_delay, RetryPolicy};
use gantry_core::session::ConnectionState;
use gantry_core::{SessionCell, ShutdownToken};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinSet};
use tokio::time::Instant;
use url::Url;
use uuid::Uuid;

const COMMAND_QUEUE_DEPTH: usize = 32;

/// Reacts to the loss of an established link
#[async_trait]
pub trait DisconnectHandler: Send + Sync + 'static {
    /// Called once per link loss
    async fn on_disconnect(&self) -> anyhow::Result<()>;

    /// Called when the I/O task's own reconnect brought the link back
    /// after `on_disconnect` finished without doing so
    async fn on_restored(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Connection parameters for the control channel
#[derive(Debug, Clone)]
pub struct ChannelOptions {
    pub endpoint: Url,
    /// Also bounds each connect handshake
    pub request_timeout: Duration,
    /// Backoff for the I/O task's own reconnects. Attempt limits are
    /// ignored there: the task reconnects until shutdown.
    pub reconnect: RetryPolicy,
}

enum Command {
    Connect {
        respond_to: oneshot::Sender<Result<(), ChannelError>>,
    },
    Call {
        envelope: RequestEnvelope,
        respond_to: oneshot::Sender<Result<Response, ChannelError>>,
    },
    SetHandler {
        handler: Arc<dyn DisconnectHandler>,
        respond_to: oneshot::Sender<()>,
    },
    Close {
        respond_to: oneshot::Sender<()>,
    },
}

/// Handle to the control channel's I/O task
#[derive(Clone)]
pub struct ControlChannel {
    commands: mpsc::Sender<Command>,
    session: SessionCell,
    request_timeout: Duration,
}

impl ControlChannel {
    /// Start the I/O task. No connection is attempted until `open`.
    pub fn spawn(
        transport: Arc<dyn Transport>,
        options: ChannelOptions,
        session: SessionCell,
        shutdown: ShutdownToken,
    ) -> Self {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let request_timeout = options.request_timeout;
        let mut reconnect = options.reconnect.clone();
        reconnect.max_attempts = 0;

        let worker = Worker {
            transport,
            endpoint: options.endpoint,
            connect_timeout: request_timeout,
            reconnect,
            session: session.clone(),
            shutdown,
            commands: rx,
            link: None,
            pending: HashMap::new(),
            handler: None,
            handler_tasks: JoinSet::new(),
            reconnect_at: None,
            reconnect_attempt: 0,
            reauth_pending: false,
        };
        tokio::spawn(worker.run());

        Self {
            commands: tx,
            session,
            request_timeout,
        }
    }

    /// First connection attempt
    pub async fn open(&self) -> Result<(), ChannelError> {
        self.connect().await
    }

    /// Re-establish the link after a loss. Succeeds immediately when the
    /// link is already up.
    pub async fn reopen(&self) -> Result<(), ChannelError> {
        self.connect().await
    }

    async fn connect(&self) -> Result<(), ChannelError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Connect { respond_to: tx }).await?;
        rx.await.map_err(|_| ChannelError::Closed)?
    }

    /// Register the handler run on every link loss, replacing any earlier
    /// one. Returns once the I/O task has installed it.
    pub async fn on_disconnect(
        &self,
        handler: Arc<dyn DisconnectHandler>,
    ) -> Result<(), ChannelError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::SetHandler {
            handler,
            respond_to: tx,
        })
        .await?;
        rx.await.map_err(|_| ChannelError::Closed)
    }

    /// Send a request and wait for its correlated response
    pub async fn call(&self, request: Request) -> Result<Response, ChannelError> {
        let envelope = RequestEnvelope::new(request);
        let id = envelope.request_uuid;
        let kind = envelope.body.kind();
        let (tx, rx) = oneshot::channel();

        tracing::trace!(request = kind, %id, "sending request");
        self.send(Command::Call {
            envelope,
            respond_to: tx,
        })
        .await?;

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ChannelError::Closed),
            Err(_) => {
                tracing::warn!(request = kind, %id, "request timed out");
                Err(ChannelError::Timeout(self.request_timeout))
            }
        }
    }

    /// Close the link and stop the I/O task
    pub async fn close(&self) {
        let (tx, rx) = oneshot::channel();
        if self.send(Command::Close { respond_to: tx }).await.is_ok() {
            let _ = rx.await;
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.session.connection()
    }

    async fn send(&self, command: Command) -> Result<(), ChannelError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ChannelError::Closed)
    }
}

impl fmt::Debug for ControlChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlChannel")
            .field("state", &self.state())
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

struct Worker {
    transport: Arc<dyn Transport>,
    endpoint: Url,
    connect_timeout: Duration,
    reconnect: RetryPolicy,
    session: SessionCell,
    shutdown: ShutdownToken,
    commands: mpsc::Receiver<Command>,
    link: Option<Box<dyn Link>>,
    pending: HashMap<Uuid, oneshot::Sender<Result<Response, ChannelError>>>,
    handler: Option<Arc<dyn DisconnectHandler>>,
    handler_tasks: JoinSet<anyhow::Result<()>>,
    reconnect_at: Option<Instant>,
    reconnect_attempt: u32,
    /// Link came back without the handler having restored the session
    reauth_pending: bool,
}

impl Worker {
    async fn run(mut self) {
        tracing::debug!(endpoint = %self.endpoint, "control channel task started");
        loop {
            let reconnect_due = self
                .reconnect_at
                .filter(|_| self.link.is_none() && self.handler_tasks.is_empty());

            // Commands before frames: a handler registered before a hang-up
            // must see that hang-up
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    self.teardown().await;
                    break;
                }
                command = self.commands.recv() => match command {
                    Some(Command::Close { respond_to }) => {
                        self.teardown().await;
                        let _ = respond_to.send(());
                        break;
                    }
                    Some(command) => self.handle_command(command).await,
                    None => {
                        self.teardown().await;
                        break;
                    }
                },
                frame = recv_frame(&mut self.link) => self.handle_frame(frame),
                Some(joined) = self.handler_tasks.join_next(), if !self.handler_tasks.is_empty() => {
                    self.handler_finished(joined);
                }
                _ = tokio::time::sleep_until(reconnect_due.unwrap_or_else(Instant::now)), if reconnect_due.is_some() => {
                    self.reconnect_tick().await;
                }
            }
        }
        tracing::debug!("control channel task stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect { respond_to } => {
                let result = if self.link.is_some() {
                    Ok(())
                } else {
                    self.establish().await
                };
                let _ = respond_to.send(result);
            }
            Command::Call {
                envelope,
                respond_to,
            } => self.forward(envelope, respond_to).await,
            Command::SetHandler {
                handler,
                respond_to,
            } => {
                self.handler = Some(handler);
                let _ = respond_to.send(());
            }
            // Handled by the run loop
            Command::Close { respond_to } => {
                let _ = respond_to.send(());
            }
        }
    }

    async fn forward(
        &mut self,
        envelope: RequestEnvelope,
        respond_to: oneshot::Sender<Result<Response, ChannelError>>,
    ) {
        let Some(link) = self.link.as_mut() else {
            let _ = respond_to.send(Err(ChannelError::NotConnected));
            return;
        };
        let frame = match serde_json::to_string(&envelope) {
            Ok(frame) => frame,
            Err(e) => {
                let _ = respond_to.send(Err(e.into()));
                return;
            }
        };

        match link.send(frame).await {
            Ok(()) => {
                // Drop entries whose callers gave up waiting
                self.pending.retain(|_, tx| !tx.is_closed());
                self.pending.insert(envelope.request_uuid, respond_to);
            }
            Err(e) => {
                let _ = respond_to.send(Err(ChannelError::LinkLost));
                self.link_lost(&e);
            }
        }
    }

    fn handle_frame(&mut self, frame: Option<Result<String, ChannelError>>) {
        let text = match frame {
            Some(Ok(text)) => text,
            Some(Err(e)) => return self.link_lost(&e),
            None => return self.link_lost(&"closed by peer"),
        };

        let envelope: ResponseEnvelope = match serde_json::from_str(&text) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(error = %e, "discarding malformed frame");
                return;
            }
        };

        match envelope
            .request_uuid
            .and_then(|id| self.pending.remove(&id))
        {
            Some(tx) => {
                let _ = tx.send(Ok(envelope.body));
            }
            None => {
                tracing::debug!(kind = envelope.body.kind(), "ignoring unsolicited frame");
            }
        }
    }

    async fn establish(&mut self) -> Result<(), ChannelError> {
        self.session.set_connection(ConnectionState::Connecting);
        let handshake = tokio::time::timeout(
            self.connect_timeout,
            self.transport.connect(&self.endpoint),
        );
        let link = tokio::select! {
            _ = self.shutdown.cancelled() => return Err(ChannelError::Closed),
            outcome = handshake => match outcome {
                Ok(result) => result?,
                Err(_) => {
                    tracing::warn!(
                        endpoint = %self.endpoint,
                        timeout_ms = self.connect_timeout.as_millis() as u64,
                        "connect timed out"
                    );
                    return Err(ChannelError::Timeout(self.connect_timeout));
                }
            },
        };
        self.link = Some(link);
        self.reconnect_at = None;
        self.reconnect_attempt = 0;
        self.session.set_connection(ConnectionState::Authenticated);
        tracing::info!(endpoint = %self.endpoint, "control channel connected");
        Ok(())
    }

    fn link_lost(&mut self, reason: &dyn fmt::Display) {
        self.link = None;
        for (_, tx) in self.pending.drain() {
            let _ = tx.send(Err(ChannelError::LinkLost));
        }
        self.session.set_connection(ConnectionState::Degraded);
        tracing::warn!(reason = %reason, "control channel link lost");

        self.reauth_pending = false;
        match self.handler.clone() {
            Some(handler) => {
                self.handler_tasks
                    .spawn(async move { handler.on_disconnect().await });
            }
            None => self.schedule_reconnect(),
        }
    }

    fn handler_finished(&mut self, joined: Result<anyhow::Result<()>, JoinError>) {
        match joined {
            Ok(Ok(())) => tracing::debug!("disconnect handler finished"),
            Ok(Err(e)) => tracing::error!(error = %format!("{:#}", e), "disconnect handler failed"),
            Err(e) => tracing::error!(error = %e, "disconnect handler aborted"),
        }

        // Another handler task still running decides once it finishes
        if self.link.is_none()
            && self.handler_tasks.is_empty()
            && !self.shutdown.is_cancelled()
        {
            self.reauth_pending = self.handler.is_some();
            self.schedule_reconnect();
        }
    }

    fn schedule_reconnect(&mut self) {
        self.reconnect_attempt = self.reconnect_attempt.saturating_add(1);
        let delay = calculate_delay(&self.reconnect, self.reconnect_attempt);
        tracing::debug!(
            attempt = self.reconnect_attempt,
            delay_ms = delay.as_millis() as u64,
            "scheduling reconnect"
        );
        self.reconnect_at = Some(Instant::now() + delay);
    }

    async fn reconnect_tick(&mut self) {
        self.reconnect_at = None;
        match self.establish().await {
            Ok(()) => {
                if std::mem::take(&mut self.reauth_pending) {
                    if let Some(handler) = self.handler.clone() {
                        self.handler_tasks
                            .spawn(async move { handler.on_restored().await });
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, attempt = self.reconnect_attempt, "reconnect failed");
                self.schedule_reconnect();
            }
        }
    }

    async fn teardown(&mut self) {
        if let Some(mut link) = self.link.take() {
            if let Err(e) = link.close().await {
                tracing::debug!(error = %e, "error closing link");
            }
        }
        for (_, tx) in self.pending.drain() {
            let _ = tx.send(Err(ChannelError::Closed));
        }
        self.handler_tasks.abort_all();
        self.session.set_connection(ConnectionState::Disconnected);
    }
}

async fn recv_frame(link: &mut Option<Box<dyn Link>>) -> Option<Result<String, ChannelError>> {
    match link {
        Some(link) => link.recv().await,
        None => std::future::pending().await,
    }
}
