use crate::signaling::SignalingOutput;
use async_trait::async_trait;
use axum::extract::ws::Message;
use dashmap::DashMap;
use std::sync::Arc;
use tandem_core::{ConnectionId, SignalMessage};
use tokio::sync::mpsc;
use tracing::{error, warn};

struct SignalingInner {
    connections: DashMap<ConnectionId, mpsc::UnboundedSender<Message>>,
}

/// Registry of live signaling sockets, keyed by the id the relay assigned.
#[derive(Clone)]
pub struct SignalingService {
    inner: Arc<SignalingInner>,
}

impl SignalingService {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SignalingInner {
                connections: DashMap::new(),
            }),
        }
    }

    pub fn add_connection(&self, connection_id: ConnectionId, tx: mpsc::UnboundedSender<Message>) {
        self.inner.connections.insert(connection_id, tx);
    }

    pub fn remove_connection(&self, connection_id: &ConnectionId) {
        self.inner.connections.remove(connection_id);
    }

    pub fn connection_count(&self) -> usize {
        self.inner.connections.len()
    }

    fn send_text(&self, connection_id: ConnectionId, text: String) {
        if let Some(connection) = self.inner.connections.get(&connection_id) {
            if let Err(e) = connection.send(Message::Text(text.into())) {
                error!("Failed to send WS message to {}: {:?}", connection_id, e);
            }
        } else {
            warn!(
                "Attempted to send signal to disconnected connection {}",
                connection_id
            );
        }
    }
}

impl Default for SignalingService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SignalingOutput for SignalingService {
    async fn send_signal(&self, connection_id: ConnectionId, msg: SignalMessage) {
        match serde_json::to_string(&msg) {
            Ok(json) => self.send_text(connection_id, json),
            Err(e) => error!("Failed to serialize signal message: {}", e),
        }
    }

    async fn forward(&self, connection_id: ConnectionId, frame: String) {
        self.send_text(connection_id, frame);
    }
}
