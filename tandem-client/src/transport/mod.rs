mod rtc_transport;
mod transport_config;
mod transport_event;

pub use rtc_transport::*;
pub use transport_config::*;
pub use transport_event::*;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use tandem_core::{IceCandidate, SessionDescription};
use tokio::sync::mpsc;

/// One peer connection, as the coordinator sees it.
///
/// Implementations report what happens on the connection through the event
/// channel handed to [`TransportFactory::create`].
#[async_trait]
pub trait PeerTransport: Send + Sync + 'static {
    type LocalTrack: Clone + Send + Sync + 'static;
    type RemoteTrack: Send + 'static;

    async fn add_track(&self, track: Self::LocalTrack) -> Result<()>;

    /// Caller side: creates the outbound data channel.
    async fn open_data_channel(&self, label: &str) -> Result<()>;

    /// Callee side: adopts the data channel the remote peer opens.
    async fn accept_data_channel(&self) -> Result<()>;

    /// Creates an offer and applies it as the local description.
    async fn create_offer(&self) -> Result<SessionDescription>;

    /// Creates an answer and applies it as the local description.
    async fn create_answer(&self) -> Result<SessionDescription>;

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()>;

    async fn send(&self, data: Bytes) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

#[async_trait]
pub trait TransportFactory: Send + Sync + 'static {
    type Transport: PeerTransport;

    async fn create(
        &self,
        events: mpsc::UnboundedSender<TransportEvent<<Self::Transport as PeerTransport>::RemoteTrack>>,
    ) -> Result<Self::Transport>;
}

pub type LocalTrackOf<F> = <<F as TransportFactory>::Transport as PeerTransport>::LocalTrack;
pub type RemoteTrackOf<F> = <<F as TransportFactory>::Transport as PeerTransport>::RemoteTrack;
