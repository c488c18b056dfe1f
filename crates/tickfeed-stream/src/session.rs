//! Realtime session controller.
//!
//! The controller is one tokio task that owns the [`Connection`], the
//! [`Multiplexer`] and the [`ReconnectPolicy`]. Everything reaches it as an
//! event on a `select!` loop: commands from [`SessionHandle`], connection
//! events, the in-flight connect, the retry timer and the health check. State
//! changes are published on a watch channel as [`ConnectionStatus`].

use crate::connection::{Connection, ConnectionEvent};
use crate::multiplexer::{Multiplexer, PriceCallback};
use crate::reconnect::ReconnectPolicy;
use futures::future::{BoxFuture, FutureExt, OptionFuture};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tickfeed_core::error::{ConnectError, FeedError, FeedResult};
use tickfeed_core::traits::{TickSink, Transport};
use tickfeed_core::types::{
    AuthToken, ConnectionStatus, InboundMessage, OutboundMessage, SessionState, Tick,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior, Sleep};
use tracing::{debug, error, info, warn};

/// Public Deriv websocket endpoint.
pub const DEFAULT_ENDPOINT: &str = "wss://ws.derivws.com/websockets/v3";

/// Public application id for unauthenticated streaming.
pub const DEFAULT_APP_ID: u32 = 1089;

/// Session controller configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub endpoint: String,
    pub app_id: u32,
    /// Automatic retries after a failure before giving up
    pub max_reconnect_attempts: u32,
    /// The n-th retry waits `n * base_reconnect_delay`
    pub base_reconnect_delay: Duration,
    /// Pause between close and connect on a manual reconnect
    pub manual_reconnect_delay: Duration,
    /// Period of the state reconciliation check
    pub health_check_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            app_id: DEFAULT_APP_ID,
            max_reconnect_attempts: 5,
            base_reconnect_delay: Duration::from_millis(1000),
            manual_reconnect_delay: Duration::from_millis(100),
            health_check_interval: Duration::from_secs(1),
        }
    }
}

impl SessionConfig {
    /// Endpoint URL with the application id attached.
    pub fn url(&self) -> String {
        let separator = if self.endpoint.contains('?') { '&' } else { '?' };
        format!("{}{}app_id={}", self.endpoint, separator, self.app_id)
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::new(self.max_reconnect_attempts, self.base_reconnect_delay)
    }
}

#[derive(Debug)]
enum Command {
    SetSymbol(String),
    SetAuthorization(String),
    Reconnect,
    Shutdown,
}

/// Builder for a realtime session.
pub struct SessionController {
    config: SessionConfig,
    transport: Arc<dyn Transport>,
    sink: Arc<dyn TickSink>,
    symbol: Option<String>,
    authorization: Option<String>,
}

impl SessionController {
    /// Create a controller that will stream through `transport` into `sink`.
    pub fn new(config: SessionConfig, transport: Arc<dyn Transport>, sink: Arc<dyn TickSink>) -> Self {
        Self {
            config,
            transport,
            sink,
            symbol: None,
            authorization: None,
        }
    }

    /// Symbol to subscribe once connected.
    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    /// Token to authorize with once connected.
    pub fn with_authorization(mut self, token: impl Into<String>) -> Self {
        self.authorization = Some(token.into());
        self
    }

    /// Spawn the session task and start connecting.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(self) -> SessionHandle {
        let (connection, events) = Connection::new(self.transport, self.config.url());
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::default());
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();

        let mut task = SessionTask::new(self.config, connection, self.sink, status_tx);
        if let Some(symbol) = self.symbol {
            task.set_symbol(symbol);
        }
        if let Some(token) = self.authorization {
            task.set_authorization(&token);
        }

        SessionHandle {
            commands: commands_tx,
            status: status_rx,
            task: tokio::spawn(task.run(commands_rx, events)),
        }
    }
}

/// Handle held by the application to steer a running session.
///
/// Dropping every handle stops the session.
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<ConnectionStatus>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    fn command(&self, command: Command) -> FeedResult<()> {
        self.commands
            .send(command)
            .map_err(|_| FeedError::SessionStopped)
    }

    /// The externally selected trading symbol changed.
    pub fn set_desired_symbol(&self, symbol: impl Into<String>) -> FeedResult<()> {
        self.command(Command::SetSymbol(symbol.into()))
    }

    /// The user's credential changed. Placeholder values clear it.
    pub fn set_authorization(&self, token: impl Into<String>) -> FeedResult<()> {
        self.command(Command::SetAuthorization(token.into()))
    }

    /// Close the link and connect again with a fresh retry budget.
    pub fn request_reconnect(&self) -> FeedResult<()> {
        self.command(Command::Reconnect)
    }

    /// Latest connectivity snapshot.
    pub fn connection_status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.status.borrow().is_connected
    }

    pub fn last_error(&self) -> Option<String> {
        self.status.borrow().error.clone()
    }

    /// Receiver notified on every status change.
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// Stop the session and wait for the task to finish.
    pub async fn shutdown(self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Err(e) = self.task.await {
            warn!(error = %e, "Session task ended abnormally");
        }
    }
}

struct SessionTask {
    config: SessionConfig,
    connection: Connection,
    multiplexer: Multiplexer,
    policy: ReconnectPolicy,
    sink: Arc<dyn TickSink>,
    desired_symbol: Option<String>,
    authorization: Option<AuthToken>,
    state: SessionState,
    last_error: Option<String>,
    status: watch::Sender<ConnectionStatus>,
    pending_connect: Option<BoxFuture<'static, Result<(), ConnectError>>>,
    retry: Option<Pin<Box<Sleep>>>,
}

impl SessionTask {
    fn new(
        config: SessionConfig,
        connection: Connection,
        sink: Arc<dyn TickSink>,
        status: watch::Sender<ConnectionStatus>,
    ) -> Self {
        Self {
            policy: config.reconnect_policy(),
            config,
            connection,
            multiplexer: Multiplexer::new(),
            sink,
            desired_symbol: None,
            authorization: None,
            state: SessionState::Idle,
            last_error: None,
            status,
            pending_connect: None,
            retry: None,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut events: mpsc::UnboundedReceiver<ConnectionEvent>,
    ) {
        info!(url = %self.connection.url(), "Realtime session starting");
        self.begin_connect();

        let period = self.config.health_check_interval.max(Duration::from_millis(1));
        let mut health = time::interval(period);
        health.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                command = commands.recv() => {
                    let Some(command) = command else { break };
                    if !self.handle_command(command) {
                        break;
                    }
                }
                Some(event) = events.recv() => self.handle_event(event),
                Some(result) = OptionFuture::from(self.pending_connect.as_mut()) => {
                    self.pending_connect = None;
                    self.on_connect_result(result);
                }
                Some(()) = OptionFuture::from(self.retry.as_mut()) => {
                    self.retry = None;
                    self.begin_connect();
                }
                _ = health.tick() => self.reconcile(),
            }
        }

        drop(health);
        self.teardown();
    }

    /// Returns `false` when the session should stop.
    fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::SetSymbol(symbol) => self.set_symbol(symbol),
            Command::SetAuthorization(token) => self.set_authorization(&token),
            Command::Reconnect => self.manual_reconnect(),
            Command::Shutdown => return false,
        }
        true
    }

    fn handle_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Message(message) => {
                match &message {
                    InboundMessage::Error { msg_type, error } => {
                        warn!(msg_type = %msg_type, code = %error.code, "Server error: {}", error.message);
                    }
                    InboundMessage::Authorized { login_id } => {
                        info!(login_id = login_id.as_deref().unwrap_or("unknown"), "Authorized");
                    }
                    _ => {}
                }
                self.multiplexer.route_inbound(&message);
            }
            ConnectionEvent::AbnormalClose(close) => {
                if self.state != SessionState::Connected {
                    debug!(state = %self.state, "Ignoring close event");
                    return;
                }
                self.last_error = Some(format!("Connection lost: {}", close));
                self.on_link_lost();
            }
        }
    }

    fn begin_connect(&mut self) {
        if self.pending_connect.is_some() {
            debug!("Connect already in flight");
            return;
        }
        self.state = SessionState::Connecting;
        let connection = self.connection.clone();
        self.pending_connect = Some(async move { connection.connect().await }.boxed());
        self.publish();
    }

    fn on_connect_result(&mut self, result: Result<(), ConnectError>) {
        match result {
            Ok(()) => self.on_open(),
            Err(ConnectError::Cancelled) => debug!("Connect attempt cancelled"),
            Err(e) => {
                warn!(error = %e, "Failed to connect to live data feed");
                self.last_error = Some(format!("Failed to connect to live data feed: {}", e));
                self.schedule_retry();
            }
        }
    }

    fn on_open(&mut self) {
        // The close event may have been consumed while still Connecting.
        if !self.connection.is_open() {
            warn!("Link closed before the session could use it");
            self.last_error = Some("Connection lost during connect".to_string());
            self.on_link_lost();
            return;
        }
        info!("Live data feed connected");
        self.state = SessionState::Connected;
        self.policy.reset();
        self.last_error = None;

        // New server session: nothing is subscribed yet.
        self.multiplexer.reset();
        self.authorize();
        self.apply_subscription();
        self.publish();
    }

    fn on_link_lost(&mut self) {
        self.multiplexer.reset();
        self.schedule_retry();
    }

    fn schedule_retry(&mut self) {
        match self.policy.next_delay() {
            Some(delay) => {
                info!(
                    attempt = self.policy.attempt,
                    max_attempts = self.policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Scheduling reconnect"
                );
                self.state = SessionState::Reconnecting;
                self.retry = Some(Box::pin(time::sleep(delay)));
            }
            None => {
                error!(attempts = self.policy.attempt, "Reconnect attempts exhausted");
                self.state = SessionState::Closed;
                self.retry = None;
                self.last_error = Some(format!(
                    "Connection lost after {} reconnect attempts; manual reconnect required",
                    self.policy.attempt
                ));
            }
        }
        self.publish();
    }

    fn manual_reconnect(&mut self) {
        info!("Manual reconnect requested");
        self.retry = None;
        self.pending_connect = None;
        self.connection.close();
        self.multiplexer.reset();
        self.policy.reset();
        self.last_error = None;
        self.state = SessionState::Reconnecting;
        self.retry = Some(Box::pin(time::sleep(self.config.manual_reconnect_delay)));
        self.publish();
    }

    fn set_symbol(&mut self, symbol: String) {
        let symbol = symbol.trim().to_string();
        if symbol.is_empty() {
            warn!("Ignoring empty symbol");
            return;
        }
        if self.desired_symbol.as_deref() != Some(symbol.as_str()) {
            info!(symbol = %symbol, "Desired symbol changed");
        }
        self.desired_symbol = Some(symbol);

        if self.state == SessionState::Connected {
            self.apply_subscription();
            self.publish();
        } else {
            debug!(state = %self.state, "Subscription deferred until connected");
        }
    }

    fn set_authorization(&mut self, raw: &str) {
        match AuthToken::parse(raw) {
            Some(token) => {
                self.authorization = Some(token);
                if self.state == SessionState::Connected {
                    self.authorize();
                }
            }
            None => {
                warn!("Ignoring empty or placeholder authorization token");
                self.authorization = None;
            }
        }
    }

    fn authorize(&self) {
        let Some(token) = &self.authorization else {
            return;
        };
        debug!("Sending authorization");
        if let Err(e) = self.connection.send(&OutboundMessage::authorize(token.as_str())) {
            warn!(error = %e, "Failed to send authorization");
        }
    }

    fn apply_subscription(&mut self) {
        let Some(symbol) = self.desired_symbol.clone() else {
            return;
        };
        let sink = Arc::clone(&self.sink);
        let tick_symbol = symbol.clone();
        let on_price: PriceCallback =
            Box::new(move |price| sink.on_tick(Tick::now(tick_symbol.as_str(), price)));
        self.multiplexer.subscribe(&self.connection, &symbol, on_price);
    }

    /// Catch a link that died without telling us.
    fn reconcile(&mut self) {
        if self.state == SessionState::Connected && !self.connection.is_open() {
            warn!("Health check found the link down without a close event");
            self.last_error = Some("Connection lost".to_string());
            self.on_link_lost();
            return;
        }
        self.publish();
    }

    fn publish(&self) {
        let status = ConnectionStatus {
            is_connected: self.state == SessionState::Connected && self.connection.is_open(),
            error: self.last_error.clone(),
            state: self.state,
            symbol: self.multiplexer.active_symbol().map(str::to_string),
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

    fn teardown(&mut self) {
        self.retry = None;
        self.pending_connect = None;
        self.connection.close();
        self.multiplexer.reset();
        self.state = SessionState::Closed;
        self.last_error = None;
        self.publish();
        info!("Realtime session stopped");
    }
}
