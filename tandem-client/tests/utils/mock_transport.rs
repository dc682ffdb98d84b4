use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tandem_client::{PeerTransport, TransportEvent, TransportFactory};
use tandem_core::{IceCandidate, SdpType, SessionDescription};
use tokio::sync::{Mutex, Notify, mpsc};

/// What the coordinator asked a mock transport to do, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    AddTrack(String),
    OpenDataChannel(String),
    AcceptDataChannel,
    CreateOffer,
    CreateAnswer,
    SetRemote(SdpType),
    AddIce(String),
    Send(Bytes),
    Close,
}

/// Test-side view of one created transport.
#[derive(Clone)]
pub struct MockHandle {
    calls: Arc<Mutex<Vec<TransportCall>>>,
    events: mpsc::UnboundedSender<TransportEvent<String>>,
}

impl MockHandle {
    pub async fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().await.clone()
    }

    pub async fn applied_candidates(&self) -> Vec<String> {
        self.calls()
            .await
            .into_iter()
            .filter_map(|c| match c {
                TransportCall::AddIce(candidate) => Some(candidate),
                _ => None,
            })
            .collect()
    }

    pub async fn is_closed(&self) -> bool {
        self.calls.lock().await.contains(&TransportCall::Close)
    }

    /// Pushes an event as if the underlying connection produced it.
    pub fn emit(&self, event: TransportEvent<String>) {
        let _ = self.events.send(event);
    }
}

#[derive(Default)]
struct FactoryShared {
    created: Mutex<Vec<MockHandle>>,
    offer_gate: Mutex<Option<Arc<Notify>>>,
    remote_gate: Mutex<Option<Arc<Notify>>>,
    fail_remote: Mutex<bool>,
}

/// Scripted transport factory. Every transport records its calls; offers and
/// remote descriptions can be held until a test releases them.
#[derive(Clone, Default)]
pub struct MockFactory {
    shared: Arc<FactoryShared>,
}

impl MockFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn created_count(&self) -> usize {
        self.shared.created.lock().await.len()
    }

    pub async fn handle(&self, index: usize) -> Option<MockHandle> {
        self.shared.created.lock().await.get(index).cloned()
    }

    /// `create_offer` blocks until the returned gate is notified.
    pub async fn gate_offers(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.shared.offer_gate.lock().await = Some(Arc::clone(&gate));
        gate
    }

    /// `set_remote_description` blocks until the returned gate is notified.
    pub async fn gate_remote_descriptions(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.shared.remote_gate.lock().await = Some(Arc::clone(&gate));
        gate
    }

    pub async fn fail_remote_descriptions(&self) {
        *self.shared.fail_remote.lock().await = true;
    }
}

pub struct MockTransport {
    id: usize,
    calls: Arc<Mutex<Vec<TransportCall>>>,
    shared: Arc<FactoryShared>,
}

impl MockTransport {
    async fn record(&self, call: TransportCall) {
        self.calls.lock().await.push(call);
    }
}

#[async_trait]
impl TransportFactory for MockFactory {
    type Transport = MockTransport;

    async fn create(
        &self,
        events: mpsc::UnboundedSender<TransportEvent<String>>,
    ) -> Result<MockTransport> {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut created = self.shared.created.lock().await;
        created.push(MockHandle {
            calls: Arc::clone(&calls),
            events,
        });
        tracing::debug!("[MockFactory] created transport #{}", created.len());

        Ok(MockTransport {
            id: created.len(),
            calls,
            shared: Arc::clone(&self.shared),
        })
    }
}

#[async_trait]
impl PeerTransport for MockTransport {
    type LocalTrack = String;
    type RemoteTrack = String;

    async fn add_track(&self, track: String) -> Result<()> {
        self.record(TransportCall::AddTrack(track)).await;
        Ok(())
    }

    async fn open_data_channel(&self, label: &str) -> Result<()> {
        self.record(TransportCall::OpenDataChannel(label.to_owned())).await;
        Ok(())
    }

    async fn accept_data_channel(&self) -> Result<()> {
        self.record(TransportCall::AcceptDataChannel).await;
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription> {
        let gate = self.shared.offer_gate.lock().await.clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.record(TransportCall::CreateOffer).await;
        Ok(SessionDescription::offer(format!("mock-offer-{}", self.id)))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        self.record(TransportCall::CreateAnswer).await;
        Ok(SessionDescription::answer(format!("mock-answer-{}", self.id)))
    }

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()> {
        let gate = self.shared.remote_gate.lock().await.clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if *self.shared.fail_remote.lock().await {
            anyhow::bail!("Rejected remote description");
        }
        self.record(TransportCall::SetRemote(description.sdp_type)).await;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        self.record(TransportCall::AddIce(candidate.candidate)).await;
        Ok(())
    }

    async fn send(&self, data: Bytes) -> Result<()> {
        self.record(TransportCall::Send(data)).await;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.record(TransportCall::Close).await;
        Ok(())
    }
}
