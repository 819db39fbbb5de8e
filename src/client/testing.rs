//! Scripted transport for exercising the session task without a socket.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;

use crate::config::Endpoint;
use crate::error::TransportError;

use super::transport::{CloseCode, Connector, Transport, TransportEvent};

#[derive(Debug, Default)]
struct Wire {
    sent: Vec<String>,
    closes: Vec<CloseCode>,
}

/// The server side of one scripted connection.
#[derive(Clone)]
pub(crate) struct Remote {
    inbound: mpsc::UnboundedSender<TransportEvent>,
    wire: Arc<Mutex<Wire>>,
}

impl Remote {
    pub(crate) fn push(&self, frame: Value) {
        self.push_text(&frame.to_string());
    }

    pub(crate) fn push_text(&self, text: &str) {
        let _ = self.inbound.send(TransportEvent::Message(text.to_string()));
    }

    pub(crate) fn fail(&self) {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        let _ = self
            .inbound
            .send(TransportEvent::Error(tungstenite::Error::Io(io).into()));
    }

    pub(crate) fn close(&self, code: CloseCode) {
        let _ = self.inbound.send(TransportEvent::Closed(code));
    }

    /// Every frame the client sent, parsed.
    pub(crate) fn sent(&self) -> Vec<Value> {
        self.wire
            .lock()
            .unwrap()
            .sent
            .iter()
            .map(|text| serde_json::from_str(text).unwrap())
            .collect()
    }

    pub(crate) fn sent_of(&self, kind: &str) -> Vec<Value> {
        self.sent()
            .into_iter()
            .filter(|frame| frame["type"] == kind)
            .collect()
    }

    pub(crate) fn count(&self, kind: &str) -> usize {
        self.sent_of(kind).len()
    }

    pub(crate) fn closes(&self) -> Vec<CloseCode> {
        self.wire.lock().unwrap().closes.clone()
    }
}

pub(crate) struct ScriptedTransport {
    inbound: mpsc::UnboundedReceiver<TransportEvent>,
    wire: Arc<Mutex<Wire>>,
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.wire.lock().unwrap().sent.push(text);
        Ok(())
    }

    async fn recv(&mut self) -> TransportEvent {
        match self.inbound.recv().await {
            Some(event) => event,
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self, code: CloseCode) -> Result<(), TransportError> {
        self.wire.lock().unwrap().closes.push(code);
        Ok(())
    }
}

#[derive(Default)]
struct Opened {
    remotes: Mutex<Vec<Remote>>,
    endpoints: Mutex<Vec<String>>,
    opens: AtomicUsize,
    refuse_next: AtomicBool,
    stall_next: AtomicBool,
}

/// Connector handing out scripted transports. Clones share their history.
#[derive(Clone, Default)]
pub(crate) struct ScriptedConnector {
    opened: Arc<Opened>,
}

impl ScriptedConnector {
    pub(crate) fn opens(&self) -> usize {
        self.opened.opens.load(Ordering::SeqCst)
    }

    pub(crate) fn refuse_next(&self) {
        self.opened.refuse_next.store(true, Ordering::SeqCst);
    }

    /// The next `open` never completes.
    pub(crate) fn stall_next(&self) {
        self.opened.stall_next.store(true, Ordering::SeqCst);
    }

    pub(crate) fn endpoints(&self) -> Vec<String> {
        self.opened.endpoints.lock().unwrap().clone()
    }

    /// The most recently opened connection.
    pub(crate) fn remote(&self) -> Remote {
        self.opened.remotes.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    type Transport = ScriptedTransport;

    async fn open(&self, endpoint: &Endpoint) -> Result<ScriptedTransport, TransportError> {
        self.opened
            .endpoints
            .lock()
            .unwrap()
            .push(endpoint.as_str().to_string());

        if self.opened.stall_next.swap(false, Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.opened.refuse_next.swap(false, Ordering::SeqCst) {
            let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
            return Err(tungstenite::Error::Io(io).into());
        }

        self.opened.opens.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();
        let wire = Arc::new(Mutex::new(Wire::default()));
        self.opened.remotes.lock().unwrap().push(Remote {
            inbound: tx,
            wire: Arc::clone(&wire),
        });
        Ok(ScriptedTransport { inbound: rx, wire })
    }
}
