//! Shared test fixtures: an in-process launch service behind a mock transport
#![allow(dead_code)]

use async_trait::async_trait;
use gantry_client::protocol::{Request, RequestEnvelope, Response, ResponseEnvelope};
use gantry_client::{ChannelError, ChannelOptions, ControlChannel, Link, Transport};
use gantry_core::retry::RetryPolicy;
use gantry_core::types::{Credentials, Permissions, ProfileDescriptor};
use gantry_core::{SessionCell, ShutdownToken};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use url::Url;

enum Frame {
    Text(String),
    Hangup,
}

/// Scriptable launch service
#[derive(Default)]
pub struct MockServer {
    profiles: Mutex<Vec<ProfileDescriptor>>,
    reject_auth: AtomicBool,
    silent: AtomicBool,
    blackholed: AtomicBool,
    refuse_connects: AtomicU32,
    pub connects: AtomicU32,
    pub connect_attempts: AtomicU32,
    pub auth_requests: AtomicU32,
    pub profile_requests: AtomicU32,
    current: Mutex<Option<mpsc::UnboundedSender<Frame>>>,
}

impl MockServer {
    pub fn with_profiles(titles: &[&str]) -> Arc<Self> {
        let server = Self::default();
        *server.profiles.lock().unwrap() = titles.iter().map(|t| ProfileDescriptor::new(*t)).collect();
        Arc::new(server)
    }

    /// Refuse the next `n` connection attempts
    pub fn refuse_next_connects(&self, n: u32) {
        self.refuse_connects.store(n, Ordering::SeqCst);
    }

    pub fn reject_auth(&self, reject: bool) {
        self.reject_auth.store(reject, Ordering::SeqCst);
    }

    /// Accept requests but never answer them
    pub fn go_silent(&self, silent: bool) {
        self.silent.store(silent, Ordering::SeqCst);
    }

    /// Let connection attempts hang without ever completing the handshake
    pub fn blackhole(&self, on: bool) {
        self.blackholed.store(on, Ordering::SeqCst);
    }

    /// Drop the current link from the server side
    pub fn hang_up(&self) {
        if let Some(tx) = self.current.lock().unwrap().take() {
            let _ = tx.send(Frame::Hangup);
        }
    }

    /// Push a frame the client did not ask for
    pub fn push_unsolicited(&self, body: Response) {
        if let Some(tx) = self.current.lock().unwrap().as_ref() {
            let frame = serde_json::to_string(&ResponseEnvelope {
                request_uuid: None,
                body,
            })
            .unwrap();
            let _ = tx.send(Frame::Text(frame));
        }
    }

    pub fn auth_count(&self) -> u32 {
        self.auth_requests.load(Ordering::SeqCst)
    }

    pub fn connect_count(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }

    fn answer(&self, frame: &str) -> Option<String> {
        let envelope: RequestEnvelope = serde_json::from_str(frame).unwrap();
        let body = match envelope.body {
            Request::Auth { .. } => {
                self.auth_requests.fetch_add(1, Ordering::SeqCst);
                if self.reject_auth.load(Ordering::SeqCst) {
                    Response::Error {
                        error: "bad credentials".to_string(),
                    }
                } else {
                    Response::Auth {
                        permissions: Permissions::new(["launch"]),
                    }
                }
            }
            Request::Profiles => {
                self.profile_requests.fetch_add(1, Ordering::SeqCst);
                Response::Profiles {
                    profiles: self.profiles.lock().unwrap().clone(),
                }
            }
        };
        if self.silent.load(Ordering::SeqCst) {
            return None;
        }
        Some(serde_json::to_string(&ResponseEnvelope::reply(envelope.request_uuid, body)).unwrap())
    }
}

pub struct MockTransport {
    pub server: Arc<MockServer>,
}

impl MockTransport {
    pub fn new(server: Arc<MockServer>) -> Arc<Self> {
        Arc::new(Self { server })
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, endpoint: &Url) -> Result<Box<dyn Link>, ChannelError> {
        self.server.connect_attempts.fetch_add(1, Ordering::SeqCst);
        if self.server.blackholed.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let refused = self
            .server
            .refuse_connects
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(ChannelError::connect(endpoint, "connection refused"));
        }

        self.server.connects.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();
        *self.server.current.lock().unwrap() = Some(tx.clone());
        Ok(Box::new(MockLink {
            server: self.server.clone(),
            tx,
            rx,
        }))
    }
}

struct MockLink {
    server: Arc<MockServer>,
    tx: mpsc::UnboundedSender<Frame>,
    rx: mpsc::UnboundedReceiver<Frame>,
}

#[async_trait]
impl Link for MockLink {
    async fn send(&mut self, frame: String) -> Result<(), ChannelError> {
        if let Some(reply) = self.server.answer(&frame) {
            let _ = self.tx.send(Frame::Text(reply));
        }
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, ChannelError>> {
        match self.rx.recv().await {
            Some(Frame::Text(text)) => Some(Ok(text)),
            Some(Frame::Hangup) | None => None,
        }
    }

    async fn close(&mut self) -> Result<(), ChannelError> {
        Ok(())
    }
}

pub fn endpoint() -> Url {
    Url::parse("ws://launch.test/api").unwrap()
}

pub fn session() -> SessionCell {
    SessionCell::new(Credentials::new("srv", "pw", "std"))
}

pub fn options(interval_ms: u64) -> ChannelOptions {
    ChannelOptions {
        endpoint: endpoint(),
        request_timeout: Duration::from_millis(500),
        reconnect: RetryPolicy::fixed(3, Duration::from_millis(interval_ms)),
    }
}

pub fn channel(server: &Arc<MockServer>, session: &SessionCell) -> ControlChannel {
    ControlChannel::spawn(
        MockTransport::new(server.clone()),
        options(10),
        session.clone(),
        ShutdownToken::new(),
    )
}

/// Poll `check` until it holds or `limit` elapses
pub async fn eventually<F: Fn() -> bool>(limit: Duration, check: F) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}
