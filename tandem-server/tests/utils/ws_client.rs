use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use tandem_core::SignalMessage;
use tandem_server::RelayConfig;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

/// Timeout for a single expected frame (ms).
pub const FRAME_TIMEOUT_MS: u64 = 2000;

/// Starts a relay on an ephemeral localhost port.
pub async fn spawn_relay(config: RelayConfig) -> Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(e) = tandem_server::serve(listener, &config).await {
            tracing::error!("[TestRelay] stopped: {}", e);
        }
    });

    Ok(addr)
}

/// Raw WebSocket client speaking the signaling protocol.
pub struct WsTestClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsTestClient {
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        let (ws, _) = connect_async(format!("ws://{}/ws", addr))
            .await
            .context("Failed to connect to relay")?;
        Ok(Self { ws })
    }

    pub async fn send(&mut self, msg: &SignalMessage) -> Result<()> {
        self.send_raw(serde_json::to_string(msg)?).await
    }

    pub async fn send_raw(&mut self, text: String) -> Result<()> {
        self.ws.send(Message::Text(text.into())).await?;
        Ok(())
    }

    /// Next text frame, or an error after `FRAME_TIMEOUT_MS`.
    pub async fn recv_raw(&mut self) -> Result<String> {
        let timeout = Duration::from_millis(FRAME_TIMEOUT_MS);
        loop {
            let msg = tokio::time::timeout(timeout, self.ws.next())
                .await
                .context("Timeout waiting for frame")?
                .context("Socket closed")??;
            if let Message::Text(text) = msg {
                return Ok(text.as_str().to_owned());
            }
        }
    }

    pub async fn recv(&mut self) -> Result<SignalMessage> {
        let text = self.recv_raw().await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Asserts nothing arrives for `wait_ms`.
    pub async fn expect_silence(&mut self, wait_ms: u64) -> Result<()> {
        match tokio::time::timeout(Duration::from_millis(wait_ms), self.ws.next()).await {
            Err(_) => Ok(()),
            Ok(Some(Ok(msg))) => anyhow::bail!("Unexpected frame: {:?}", msg),
            Ok(_) => anyhow::bail!("Socket closed while waiting"),
        }
    }

    pub async fn close(mut self) -> Result<()> {
        self.ws.close(None).await?;
        Ok(())
    }
}
