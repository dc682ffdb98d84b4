use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tandem_core::SignalMessage;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, info, warn};

const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Cloneable handle that queues frames for the writer task.
#[derive(Clone)]
pub struct SignalingSender {
    outbound: mpsc::UnboundedSender<Message>,
}

impl SignalingSender {
    /// Queues a message. Returns false once the socket is gone.
    pub fn send(&self, msg: &SignalMessage) -> bool {
        match serde_json::to_string(msg) {
            Ok(text) => self.outbound.send(Message::Text(text.into())).is_ok(),
            Err(e) => {
                warn!("Failed to encode {:?}: {}", msg.event(), e);
                false
            }
        }
    }

    fn close(&self) {
        let _ = self.outbound.send(Message::Close(None));
    }
}

/// WebSocket connection to the relay, split into a writer and a reader task.
pub struct SignalingClient {
    sender: SignalingSender,
    writer: JoinHandle<()>,
    reader: JoinHandle<()>,
}

impl SignalingClient {
    /// Connects and returns the client plus the stream of decoded inbound
    /// messages. The stream ends when the relay goes away.
    pub async fn connect(
        url: &str,
    ) -> Result<(Self, mpsc::UnboundedReceiver<SignalMessage>), tungstenite::Error> {
        let (ws, _) = connect_async(url).await?;
        info!("Connected to signaling relay at {}", url);

        let (mut sink, mut stream) = ws.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        let writer = tokio::spawn(async move {
            while let Some(msg) = outbound_rx.recv().await {
                let closing = matches!(msg, Message::Close(_));
                if let Err(e) = sink.send(msg).await {
                    debug!("Signaling write failed: {}", e);
                    break;
                }
                if closing {
                    break;
                }
            }
        });

        let reader = tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                let text = match frame {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        warn!("Signaling read failed: {}", e);
                        break;
                    }
                };

                match serde_json::from_str::<SignalMessage>(text.as_str()) {
                    Ok(msg) => {
                        if inbound_tx.send(msg).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("Ignoring malformed signaling frame: {}", e),
                }
            }
            debug!("Signaling reader finished");
        });

        let client = Self {
            sender: SignalingSender {
                outbound: outbound_tx,
            },
            writer,
            reader,
        };
        Ok((client, inbound_rx))
    }

    pub fn sender(&self) -> SignalingSender {
        self.sender.clone()
    }

    pub fn send(&self, msg: &SignalMessage) -> bool {
        self.sender.send(msg)
    }

    /// Sends a close frame, gives the writer a moment to flush it, then stops
    /// both tasks.
    pub async fn close(self) {
        self.sender.close();
        let mut writer = self.writer;
        if tokio::time::timeout(CLOSE_GRACE, &mut writer).await.is_err() {
            writer.abort();
        }
        self.reader.abort();
    }
}
