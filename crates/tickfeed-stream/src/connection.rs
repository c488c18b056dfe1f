//! The single logical link to the quote server.
//!
//! A `Connection` opens links through an injected [`Transport`], tracks the
//! link's [`ConnectionState`], and turns everything the link reports into
//! [`ConnectionEvent`]s on one channel handed out at construction. Retrying is
//! not its job; it only reports.

use crate::multiplexer::MessageSink;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tickfeed_core::error::{ConnectError, SendError};
use tickfeed_core::traits::{Transport, TransportEvent};
use tickfeed_core::types::{CloseInfo, ConnectionState, InboundMessage, OutboundMessage};
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// What the connection reports to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// A parsed inbound frame, in arrival order
    Message(InboundMessage),
    /// The link went away without a local `close()`
    AbnormalClose(CloseInfo),
}

type ConnectAttempt = Shared<BoxFuture<'static, Result<(), ConnectError>>>;

#[derive(Default)]
struct LinkState {
    state: ConnectionState,
    /// Bumped by every new attempt and every `close()`; tasks holding an older
    /// value must not touch the state.
    generation: u64,
    writer: Option<mpsc::UnboundedSender<String>>,
    attempt: Option<ConnectAttempt>,
    attempt_task: Option<AbortHandle>,
    pump: Option<JoinHandle<()>>,
    link_id: Option<Uuid>,
}

struct ConnectionCore {
    transport: Arc<dyn Transport>,
    url: String,
    link: Mutex<LinkState>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
}

impl ConnectionCore {
    fn lock(&self) -> MutexGuard<'_, LinkState> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn open_link(self: Arc<Self>, generation: u64) -> Result<(), ConnectError> {
        debug!(url = %self.url, transport = self.transport.name(), "Opening transport");
        let result = self.transport.open(&self.url).await;

        let mut link = self.lock();
        if link.generation != generation {
            debug!("Connect attempt superseded by close");
            return Err(ConnectError::Cancelled);
        }
        link.attempt = None;
        link.attempt_task = None;

        match result {
            Ok(opened) => {
                let link_id = Uuid::new_v4();
                link.state = ConnectionState::Open;
                link.writer = Some(opened.writer);
                link.link_id = Some(link_id);
                link.pump = Some(tokio::spawn(pump(
                    Arc::clone(&self),
                    generation,
                    link_id,
                    opened.reader,
                )));
                info!(%link_id, "Connection open");
                Ok(())
            }
            Err(e) => {
                link.state = ConnectionState::Disconnected;
                warn!(error = %e, "Connect failed");
                Err(e)
            }
        }
    }

    /// Clean up after an attempt task that died before settling.
    fn abandon_attempt(&self, generation: u64, error: ConnectError) -> Result<(), ConnectError> {
        let mut link = self.lock();
        if link.generation != generation {
            return Err(ConnectError::Cancelled);
        }
        link.state = ConnectionState::Disconnected;
        link.attempt = None;
        link.attempt_task = None;
        warn!(error = %error, "Connect attempt aborted");
        Err(error)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.lock().generation == generation
    }

    fn on_remote_close(&self, generation: u64, link_id: Uuid, close: CloseInfo) {
        let mut link = self.lock();
        if link.generation != generation || link.state != ConnectionState::Open {
            trace!(%link_id, "Ignoring close of a released link");
            return;
        }
        link.state = ConnectionState::Disconnected;
        link.writer = None;
        link.link_id = None;
        // Detach our own handle; this task is about to finish.
        link.pump = None;
        drop(link);

        warn!(%link_id, close = %close, "Connection closed abnormally");
        let _ = self.events.send(ConnectionEvent::AbnormalClose(close));
    }
}

/// Forward inbound frames from one link until it closes.
async fn pump(
    core: Arc<ConnectionCore>,
    generation: u64,
    link_id: Uuid,
    mut reader: mpsc::UnboundedReceiver<TransportEvent>,
) {
    let close = loop {
        match reader.recv().await {
            Some(TransportEvent::Text(text)) => match InboundMessage::parse(&text) {
                Ok(message) => {
                    if !core.is_current(generation) {
                        return;
                    }
                    let _ = core.events.send(ConnectionEvent::Message(message));
                }
                Err(e) => warn!(%link_id, error = %e, "Dropping malformed frame"),
            },
            Some(TransportEvent::Closed(close)) => break close,
            None => break CloseInfo::new(None, "transport dropped"),
        }
    };
    core.on_remote_close(generation, link_id, close);
}

/// Handle to the link. Cheap to clone; clones share one link.
#[derive(Clone)]
pub struct Connection {
    core: Arc<ConnectionCore>,
}

impl Connection {
    /// Create a disconnected connection to `url`.
    ///
    /// # Returns
    /// The connection and the receiver for its events. There is exactly one
    /// receiver; whoever holds it is the inbound router.
    pub fn new(
        transport: Arc<dyn Transport>,
        url: impl Into<String>,
    ) -> (Self, mpsc::UnboundedReceiver<ConnectionEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let core = ConnectionCore {
            transport,
            url: url.into(),
            link: Mutex::new(LinkState::default()),
            events,
        };
        (
            Self {
                core: Arc::new(core),
            },
            receiver,
        )
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.core.lock().state
    }

    pub fn is_open(&self) -> bool {
        self.state().is_open()
    }

    pub fn url(&self) -> &str {
        &self.core.url
    }

    /// Open the link.
    ///
    /// Resolves immediately when already open. While an attempt is in flight,
    /// every caller waits on that same attempt; only one transport is opened.
    pub async fn connect(&self) -> Result<(), ConnectError> {
        let attempt = {
            let mut link = self.core.lock();
            let state = link.state;
            match state {
                ConnectionState::Open => return Ok(()),
                ConnectionState::Connecting => match &link.attempt {
                    Some(attempt) => attempt.clone(),
                    None => return Err(ConnectError::Cancelled),
                },
                ConnectionState::Disconnected | ConnectionState::Closing => {
                    self.begin_attempt(&mut link)
                }
            }
        };
        attempt.await
    }

    fn begin_attempt(&self, link: &mut LinkState) -> ConnectAttempt {
        link.generation += 1;
        link.state = ConnectionState::Connecting;

        let task = tokio::spawn(Arc::clone(&self.core).open_link(link.generation));
        link.attempt_task = Some(task.abort_handle());

        let core = Arc::clone(&self.core);
        let generation = link.generation;
        let attempt = task
            .map(move |joined| match joined {
                Ok(result) => result,
                Err(e) if e.is_cancelled() => Err(ConnectError::Cancelled),
                Err(e) => core.abandon_attempt(
                    generation,
                    ConnectError::Transport(format!("connect task failed: {}", e)),
                ),
            })
            .boxed()
            .shared();
        link.attempt = Some(attempt.clone());
        attempt
    }

    /// Serialize and transmit `message` if the link is open.
    ///
    /// Anything else is dropped, not queued.
    pub fn send(&self, message: &OutboundMessage) -> Result<(), SendError> {
        let link = self.core.lock();
        let writer = match (&link.state, &link.writer) {
            (ConnectionState::Open, Some(writer)) => writer,
            _ => {
                warn!(state = %link.state, kind = message.kind(), "Dropping message, connection not open");
                return Err(SendError::NotOpen(link.state));
            }
        };

        let text = serde_json::to_string(message).map_err(|e| SendError::Encode(e.to_string()))?;
        debug!(kind = message.kind(), "Sending {}", text);
        writer
            .send(text)
            .map_err(|_| SendError::NotOpen(ConnectionState::Closing))
    }

    /// Release the link deliberately.
    ///
    /// No `AbnormalClose` is reported for this link afterwards, and an
    /// in-flight connect attempt is cancelled.
    pub fn close(&self) {
        let mut link = self.core.lock();
        if link.state == ConnectionState::Disconnected && link.writer.is_none() {
            return;
        }

        link.state = ConnectionState::Closing;
        link.generation += 1;
        if let Some(task) = link.attempt_task.take() {
            task.abort();
        }
        link.attempt = None;
        if let Some(pump) = link.pump.take() {
            pump.abort();
        }
        // Dropping the writer closes the transport.
        link.writer = None;
        let link_id = link.link_id.take();
        link.state = ConnectionState::Disconnected;

        match link_id {
            Some(link_id) => info!(%link_id, "Connection closed"),
            None => debug!("Connect attempt abandoned"),
        }
    }
}

impl MessageSink for Connection {
    fn send(&self, message: &OutboundMessage) -> Result<(), SendError> {
        Connection::send(self, message)
    }
}
