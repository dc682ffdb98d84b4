use crate::transport::{
    PeerTransport, TransportConfig, TransportEvent, TransportFactory, TransportState,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tandem_core::{IceCandidate, SdpType, SessionDescription};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_remote::TrackRemote;

type EventSender = mpsc::UnboundedSender<TransportEvent<Arc<TrackRemote>>>;

/// webrtc-rs peer connection behind the [`PeerTransport`] seam.
pub struct RtcTransport {
    peer_connection: Arc<RTCPeerConnection>,
    data_channel: Arc<Mutex<Option<Arc<RTCDataChannel>>>>,
    events: EventSender,
}

impl RtcTransport {
    pub async fn new(config: TransportConfig, events: EventSender) -> Result<Self> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;

        let registry = register_default_interceptors(Registry::new(), &mut media_engine)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let ice_servers = if config.ice_servers.is_empty() {
            vec![]
        } else {
            vec![RTCIceServer {
                urls: config.ice_servers,
                ..Default::default()
            }]
        };

        let rtc_config = RTCConfiguration {
            ice_servers,
            ..Default::default()
        };

        let peer_connection = Arc::new(api.new_peer_connection(rtc_config).await?);

        let state_tx = events.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let tx = state_tx.clone();
                Box::pin(async move {
                    info!("Peer connection state changed: {:?}", s);
                    let _ = tx.send(TransportEvent::StateChanged(transport_state(s)));
                })
            },
        ));

        let ice_tx = events.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();
            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                let _ = tx.send(TransportEvent::CandidateGenerated(IceCandidate {
                    candidate: init.candidate,
                    sdp_mid: init.sdp_mid,
                    sdp_m_line_index: init.sdp_mline_index,
                    username_fragment: init.username_fragment,
                }));
            })
        }));

        let track_tx = events.clone();
        peer_connection.on_track(Box::new(move |track: Arc<TrackRemote>, _, _| {
            let tx = track_tx.clone();
            Box::pin(async move {
                info!("Remote media track arrived");
                let _ = tx.send(TransportEvent::RemoteTrack(track));
            })
        }));

        Ok(Self {
            peer_connection,
            data_channel: Arc::new(Mutex::new(None)),
            events,
        })
    }

    async fn adopt_data_channel(
        slot: &Mutex<Option<Arc<RTCDataChannel>>>,
        dc: Arc<RTCDataChannel>,
        events: EventSender,
    ) {
        let open_tx = events.clone();
        let label = dc.label().to_owned();
        dc.on_open(Box::new(move || {
            Box::pin(async move {
                info!("DataChannel '{}' open", label);
                let _ = open_tx.send(TransportEvent::DataChannelReady);
            })
        }));

        dc.on_message(Box::new(move |msg: DataChannelMessage| {
            let tx = events.clone();
            Box::pin(async move {
                debug!("DataChannel message: {} bytes", msg.data.len());
                let _ = tx.send(TransportEvent::Message(msg.data));
            })
        }));

        *slot.lock().await = Some(dc);
    }
}

fn transport_state(state: RTCPeerConnectionState) -> TransportState {
    match state {
        RTCPeerConnectionState::Unspecified | RTCPeerConnectionState::New => TransportState::New,
        RTCPeerConnectionState::Connecting => TransportState::Connecting,
        RTCPeerConnectionState::Connected => TransportState::Connected,
        RTCPeerConnectionState::Disconnected => TransportState::Disconnected,
        RTCPeerConnectionState::Failed => TransportState::Failed,
        RTCPeerConnectionState::Closed => TransportState::Closed,
    }
}

#[async_trait]
impl PeerTransport for RtcTransport {
    type LocalTrack = Arc<TrackLocalStaticSample>;
    type RemoteTrack = Arc<TrackRemote>;

    async fn add_track(&self, track: Self::LocalTrack) -> Result<()> {
        self.peer_connection
            .add_track(track as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .context("Failed to add local track")?;
        Ok(())
    }

    async fn open_data_channel(&self, label: &str) -> Result<()> {
        let dc = self
            .peer_connection
            .create_data_channel(label, None)
            .await
            .context("Failed to create data channel")?;

        Self::adopt_data_channel(&self.data_channel, dc, self.events.clone()).await;
        Ok(())
    }

    async fn accept_data_channel(&self) -> Result<()> {
        let slot = Arc::clone(&self.data_channel);
        let events = self.events.clone();
        self.peer_connection
            .on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
                let slot = Arc::clone(&slot);
                let events = events.clone();
                Box::pin(async move {
                    debug!("Remote opened DataChannel '{}'", dc.label());
                    Self::adopt_data_channel(&slot, dc, events).await;
                })
            }));
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription> {
        let offer = self
            .peer_connection
            .create_offer(None)
            .await
            .context("Failed to create offer")?;

        self.peer_connection
            .set_local_description(offer.clone())
            .await
            .context("Failed to set local description")?;

        Ok(SessionDescription::offer(offer.sdp))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        let answer = self
            .peer_connection
            .create_answer(None)
            .await
            .context("Failed to create answer")?;

        self.peer_connection
            .set_local_description(answer.clone())
            .await
            .context("Failed to set local description")?;

        Ok(SessionDescription::answer(answer.sdp))
    }

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()> {
        let desc = match description.sdp_type {
            SdpType::Offer => RTCSessionDescription::offer(description.sdp)?,
            SdpType::Answer => RTCSessionDescription::answer(description.sdp)?,
        };
        self.peer_connection
            .set_remote_description(desc)
            .await
            .context("Failed to set remote description")?;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_m_line_index,
            username_fragment: candidate.username_fragment,
        };
        self.peer_connection
            .add_ice_candidate(init)
            .await
            .context("Failed to add ICE candidate")?;
        Ok(())
    }

    async fn send(&self, data: Bytes) -> Result<()> {
        let dc = self
            .data_channel
            .lock()
            .await
            .clone()
            .context("Data channel not available")?;

        dc.send(&data).await.context("Failed to send message")?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.data_channel.lock().await.take();
        self.peer_connection
            .close()
            .await
            .context("Failed to close peer connection")?;
        Ok(())
    }
}

/// Builds one [`RtcTransport`] per call attempt.
#[derive(Debug, Clone, Default)]
pub struct RtcTransportFactory {
    pub config: TransportConfig,
}

impl RtcTransportFactory {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl TransportFactory for RtcTransportFactory {
    type Transport = RtcTransport;

    async fn create(&self, events: EventSender) -> Result<RtcTransport> {
        RtcTransport::new(self.config.clone(), events).await
    }
}
