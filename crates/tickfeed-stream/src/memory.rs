//! In-process transport.
//!
//! `MemoryTransport` plays the server side of every link it opens: frames the
//! client writes are captured, and the test (or an offline driver) pushes
//! inbound frames and close events. Opens can be held back or made to fail.

use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tickfeed_core::error::ConnectError;
use tickfeed_core::traits::{Transport, TransportEvent, TransportLink};
use tickfeed_core::types::CloseInfo;
use tokio::sync::{mpsc, watch};

struct ServerEnd {
    from_client: mpsc::UnboundedReceiver<String>,
    to_client: Option<mpsc::UnboundedSender<TransportEvent>>,
}

#[derive(Default)]
struct MemoryState {
    opens: usize,
    fail_next: usize,
    fail_all: bool,
    panic_next: usize,
    links: Vec<ServerEnd>,
    sent: Vec<String>,
}

impl MemoryState {
    fn drain(&mut self) {
        for link in &mut self.links {
            while let Ok(text) = link.from_client.try_recv() {
                self.sent.push(text);
            }
        }
    }
}

/// Transport whose server side lives in the same process.
#[derive(Clone)]
pub struct MemoryTransport {
    state: Arc<Mutex<MemoryState>>,
    gate: Arc<watch::Sender<bool>>,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    /// Create a transport that accepts every open immediately.
    pub fn new() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            gate: Arc::new(gate),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Keep subsequent opens pending until [`release_opens`](Self::release_opens).
    pub fn hold_opens(&self) {
        self.gate.send_replace(false);
    }

    /// Let pending and future opens proceed.
    pub fn release_opens(&self) {
        self.gate.send_replace(true);
    }

    /// Make the next `count` opens fail.
    pub fn fail_next_opens(&self, count: usize) {
        self.lock().fail_next = count;
    }

    /// Make the next `count` opens panic, as a buggy transport would.
    pub fn panic_next_opens(&self, count: usize) {
        self.lock().panic_next = count;
    }

    /// Make every open fail until switched off.
    pub fn fail_all_opens(&self, fail: bool) {
        self.lock().fail_all = fail;
    }

    /// Number of times `open` was called.
    pub fn open_count(&self) -> usize {
        self.lock().opens
    }

    /// Number of links opened successfully.
    pub fn link_count(&self) -> usize {
        self.lock().links.len()
    }

    /// Every frame written by clients so far, oldest first.
    pub fn sent(&self) -> Vec<String> {
        let mut state = self.lock();
        state.drain();
        state.sent.clone()
    }

    /// [`sent`](Self::sent), decoded as JSON. Undecodable frames are skipped.
    pub fn sent_json(&self) -> Vec<serde_json::Value> {
        self.sent()
            .iter()
            .filter_map(|text| serde_json::from_str(text).ok())
            .collect()
    }

    /// Forget captured frames.
    pub fn clear_sent(&self) {
        let mut state = self.lock();
        state.drain();
        state.sent.clear();
    }

    /// Deliver a text frame on the most recent link.
    pub fn push_frame(&self, frame: impl Into<String>) -> bool {
        let state = self.lock();
        match state.links.last().and_then(|l| l.to_client.as_ref()) {
            Some(tx) => tx.send(TransportEvent::Text(frame.into())).is_ok(),
            None => false,
        }
    }

    /// Deliver a JSON frame on the most recent link.
    pub fn push_json(&self, value: serde_json::Value) -> bool {
        self.push_frame(value.to_string())
    }

    /// Close the most recent link from the server side.
    pub fn drop_link(&self, code: Option<u16>, reason: &str) -> bool {
        let mut state = self.lock();
        match state.links.last_mut().and_then(|l| l.to_client.take()) {
            Some(tx) => tx
                .send(TransportEvent::Closed(CloseInfo::new(code, reason)))
                .is_ok(),
            None => false,
        }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn open(&self, _url: &str) -> Result<TransportLink, ConnectError> {
        self.lock().opens += 1;

        let mut gate = self.gate.subscribe();
        let released = gate.wait_for(|released| *released).await.map(|_| ());
        if released.is_err() {
            return Err(ConnectError::Cancelled);
        }

        let mut state = self.lock();
        if state.panic_next > 0 {
            state.panic_next -= 1;
            drop(state);
            panic!("memory transport: injected open panic");
        }
        if state.fail_all || state.fail_next > 0 {
            state.fail_next = state.fail_next.saturating_sub(1);
            return Err(ConnectError::Transport("connection refused".to_string()));
        }

        let (writer, from_client) = mpsc::unbounded_channel();
        let (to_client, reader) = mpsc::unbounded_channel();
        state.links.push(ServerEnd {
            from_client,
            to_client: Some(to_client),
        });

        Ok(TransportLink { writer, reader })
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_and_exchange() {
        let transport = MemoryTransport::new();
        let mut link = transport.open("mem://feed").await.unwrap();

        link.writer.send("hello".to_string()).unwrap();
        assert_eq!(transport.sent(), vec!["hello".to_string()]);

        assert!(transport.push_frame("world"));
        assert_eq!(
            link.reader.recv().await,
            Some(TransportEvent::Text("world".to_string()))
        );

        assert!(transport.drop_link(Some(1006), "gone"));
        assert_eq!(
            link.reader.recv().await,
            Some(TransportEvent::Closed(CloseInfo::new(Some(1006), "gone")))
        );
        assert_eq!(link.reader.recv().await, None);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let transport = MemoryTransport::new();
        transport.fail_next_opens(1);

        assert!(transport.open("mem://feed").await.is_err());
        assert!(transport.open("mem://feed").await.is_ok());
        assert_eq!(transport.open_count(), 2);
        assert_eq!(transport.link_count(), 1);
    }
}
