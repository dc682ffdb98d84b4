use crate::app::AppState;
use crate::room::RoomManager;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tandem_core::{ConnectionId, Envelope, SignalEvent};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection_id = ConnectionId::new();
    info!("New WebSocket connection: {}", connection_id);

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    state.signaling.add_connection(connection_id, tx);

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn({
        let rooms = state.rooms.clone();

        async move {
            while let Some(Ok(msg)) = receiver.next().await {
                match msg {
                    Message::Text(text) => handle_frame(&rooms, connection_id, text.as_str()).await,
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => {
            // The reader may be mid-join; it must stop before the room is left.
            recv_task.abort();
            let _ = recv_task.await;
        }
        _ = (&mut recv_task) => send_task.abort(),
    };

    state.rooms.leave(connection_id).await;
    state.signaling.remove_connection(&connection_id);
    info!("WebSocket disconnected: {}", connection_id);
}

/// Routes one text frame. Frames are handled one at a time per connection,
/// which is what keeps a sender's offer, answer and candidates in order.
pub(crate) async fn handle_frame(rooms: &RoomManager, connection_id: ConnectionId, text: &str) {
    let envelope = match Envelope::parse(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!("Invalid signaling frame from {}: {}", connection_id, e);
            return;
        }
    };

    match envelope.event {
        SignalEvent::Join => match envelope.room_id() {
            Some(room_id) => {
                rooms.join(connection_id, room_id).await;
            }
            None => warn!("Join without a room id from {}", connection_id),
        },
        event if event.is_relayed() => match envelope.room_id() {
            Some(room_id) => {
                let delivered = rooms.relay(connection_id, room_id, event, text).await;
                if delivered == 0 {
                    debug!("{:?} from {} reached nobody", event, connection_id);
                }
            }
            None => warn!("{:?} without roomId from {}", event, connection_id),
        },
        event => warn!(
            "Connection {} sent relay-only event {:?}, ignoring",
            connection_id, event
        ),
    }
}
