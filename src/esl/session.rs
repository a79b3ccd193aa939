//! Event-socket session
//!
//! Drives connect → authenticate → subscribe → listen against one switch,
//! with capped exponential backoff on failure. Authentication rejections are
//! counted separately from transport failures: repeated rejections stop the
//! session task instead of hammering the switch with bad credentials forever.
//!
//! Every read is bounded by a timeout; a timed-out read is a protocol error
//! and tears the connection down for a clean reconnect.

use futures::{SinkExt, StreamExt};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tracing::{error, info, warn};

use crate::config::FreeSwitchServer;
use crate::error::BillingError;
use crate::esl::codec::{Command, EslCodec};
use crate::esl::event::{EslEvent, LIFECYCLE_EVENTS};
use crate::esl::handler::{EngineServices, EventHandler};

/// Initial reconnection delay
pub const INITIAL_RECONNECT_DELAY_MS: u64 = 1_000;

/// Ceiling for the reconnection delay
pub const MAX_RECONNECT_DELAY_MS: u64 = 60_000;

/// Consecutive credential rejections before the session task gives up
pub const MAX_AUTH_FAILURES: u32 = 5;

/// Timeout for each handshake read
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for listen-phase reads; the switch heartbeats well inside this
const LISTEN_TIMEOUT: Duration = Duration::from_secs(120);

/// Connection lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    AwaitingChallenge,
    Authenticating,
    Subscribing,
    Listening,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::AwaitingChallenge => "awaiting_challenge",
            SessionState::Authenticating => "authenticating",
            SessionState::Subscribing => "subscribing",
            SessionState::Listening => "listening",
        };
        write!(f, "{}", s)
    }
}

/// Capped exponential reconnect backoff
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    current_ms: u64,
}

impl BackoffPolicy {
    pub fn new() -> Self {
        Self {
            current_ms: INITIAL_RECONNECT_DELAY_MS,
        }
    }

    /// Delay to sleep before the next attempt, doubling up to the cap
    pub fn next_delay(&mut self) -> Duration {
        let delay = Duration::from_millis(self.current_ms);
        self.current_ms = (self.current_ms * 2).min(MAX_RECONNECT_DELAY_MS);
        delay
    }

    pub fn reset(&mut self) {
        self.current_ms = INITIAL_RECONNECT_DELAY_MS;
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// An authenticated, subscribed session in the `Listening` state
pub struct EslSession {
    framed: Framed<TcpStream, EslCodec>,
    server_id: String,
    state: SessionState,
}

impl EslSession {
    /// Connect and walk the handshake through to `Listening`
    pub async fn connect(server: &FreeSwitchServer) -> Result<Self, BillingError> {
        let server_id = server.server_id();

        let stream = TcpStream::connect((server.host.as_str(), server.port)).await?;
        let mut session = Self {
            framed: Framed::new(stream, EslCodec),
            server_id,
            state: SessionState::AwaitingChallenge,
        };

        let greeting = session.read_frame(HANDSHAKE_TIMEOUT).await?;
        if !greeting.is_auth_request() {
            return Err(BillingError::Protocol(format!(
                "expected auth/request greeting, got {:?}",
                greeting.content_type()
            )));
        }

        session.state = SessionState::Authenticating;
        session.send(Command::Auth(server.password.clone())).await?;

        let reply = session.read_frame(HANDSHAKE_TIMEOUT).await?;
        if !reply.is_ok() {
            return Err(BillingError::Authentication(
                reply.reply_text().unwrap_or("no reply text").to_string(),
            ));
        }

        session.state = SessionState::Subscribing;
        let mut kinds: Vec<String> = LIFECYCLE_EVENTS.iter().map(|s| s.to_string()).collect();
        // heartbeats keep the listen-phase read timeout from firing on idle links
        kinds.push("HEARTBEAT".to_string());
        session.send(Command::Events(kinds)).await?;

        let reply = session.read_frame(HANDSHAKE_TIMEOUT).await?;
        if !reply.is_ok() {
            return Err(BillingError::Protocol(format!(
                "event subscription rejected: {:?}",
                reply.reply_text()
            )));
        }

        session.state = SessionState::Listening;
        info!("Session {} now {}", session.server_id, session.state);
        Ok(session)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    pub async fn send(&mut self, cmd: Command) -> Result<(), BillingError> {
        self.framed.send(cmd).await
    }

    /// Next frame during the listen phase
    pub async fn next_event(&mut self) -> Result<EslEvent, BillingError> {
        self.read_frame(LISTEN_TIMEOUT).await
    }

    async fn read_frame(&mut self, timeout: Duration) -> Result<EslEvent, BillingError> {
        match tokio::time::timeout(timeout, self.framed.next()).await {
            Ok(Some(Ok(frame))) => Ok(EslEvent::new(frame)),
            Ok(Some(Err(e))) => Err(e),
            Ok(None) => Err(BillingError::Protocol("connection closed".to_string())),
            Err(_) => Err(BillingError::Protocol(format!(
                "read timed out after {:?}",
                timeout
            ))),
        }
    }
}

/// One reconnecting session task per configured switch
pub struct EslCluster {
    servers: Vec<FreeSwitchServer>,
    services: EngineServices,
}

impl EslCluster {
    pub fn new(servers: Vec<FreeSwitchServer>, services: EngineServices) -> Self {
        Self { servers, services }
    }

    /// Spawn a session task per server. Reconnects do not reset the call
    /// registry; live calls survive a brief reconnect.
    pub fn start(&self) {
        for server in &self.servers {
            let server = server.clone();
            let services = self.services.clone();
            tokio::spawn(async move {
                run_session_loop(server, services).await;
            });
        }
    }
}

async fn run_session_loop(server: FreeSwitchServer, services: EngineServices) {
    let server_id = server.server_id();
    let mut backoff = BackoffPolicy::new();
    let mut auth_failures: u32 = 0;

    loop {
        info!("Connecting to event socket: {}", server_id);

        match EslSession::connect(&server).await {
            Ok(session) => {
                backoff.reset();
                auth_failures = 0;

                let (cmd_tx, cmd_rx) = mpsc::channel::<Command>(64);
                let handler = Arc::new(EventHandler::new(
                    server_id.clone(),
                    services.clone(),
                    Some(cmd_tx),
                ));

                if let Err(e) = listen(session, &handler, cmd_rx).await {
                    error!("Session {} failed: {}", server_id, e);
                }
            }
            Err(BillingError::Authentication(reason)) => {
                auth_failures += 1;
                error!(
                    "Authentication rejected by {} ({}/{}): {}",
                    server_id, auth_failures, MAX_AUTH_FAILURES, reason
                );
                if auth_failures >= MAX_AUTH_FAILURES {
                    error!(
                        "Giving up on {} after {} credential rejections",
                        server_id, auth_failures
                    );
                    return;
                }
            }
            Err(e) => {
                error!("Connection to {} failed: {}", server_id, e);
            }
        }

        let delay = backoff.next_delay();
        warn!("Reconnecting to {} in {:?}", server_id, delay);
        tokio::time::sleep(delay).await;
    }
}

/// Dispatch inbound events in arrival order while draining outbound commands
async fn listen(
    mut session: EslSession,
    handler: &Arc<EventHandler>,
    mut cmd_rx: mpsc::Receiver<Command>,
) -> Result<(), BillingError> {
    loop {
        tokio::select! {
            maybe_cmd = cmd_rx.recv() => {
                if let Some(cmd) = maybe_cmd {
                    session.send(cmd).await?;
                }
            }
            event = session.next_event() => {
                let event = event?;
                if event.is_event() {
                    handler.handle_event(&event).await;
                }
            }
        }
    }
}
