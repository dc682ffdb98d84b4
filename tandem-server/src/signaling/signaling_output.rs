use async_trait::async_trait;
use tandem_core::{ConnectionId, SignalMessage};

/// Outbound side of the relay, implemented by the WebSocket layer so the room
/// manager can reach connections without knowing how they are transported.
#[async_trait]
pub trait SignalingOutput: Send + Sync {
    /// Send a message the relay itself originates (`joined`, `peer-joined`, ...).
    async fn send_signal(&self, connection_id: ConnectionId, msg: SignalMessage);

    /// Forward a client's frame exactly as it was received.
    async fn forward(&self, connection_id: ConnectionId, frame: String);
}
