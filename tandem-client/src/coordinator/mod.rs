mod error;
mod event;
mod state;

pub use error::*;
pub use event::*;
pub use state::CallState;

use crate::media::LocalMediaSource;
use crate::transport::{
    LocalTrackOf, PeerTransport, RemoteTrackOf, TransportEvent, TransportFactory, TransportState,
};
use bytes::Bytes;
use state::{RemoteDescription, Role};
use std::sync::{Arc, Weak};
use tandem_core::utils::DATA_CHANNEL_LABEL;
use tandem_core::{IceCandidate, SessionDescription};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub type CoordinatorEvents<F> = mpsc::UnboundedReceiver<CoordinatorEvent<RemoteTrackOf<F>>>;

/// Drives one participant's side of the offer/answer exchange.
///
/// Every call attempt owns exactly one transport. State lives behind a single
/// mutex that is never held across a transport call; results of asynchronous
/// steps are committed only if their attempt is still the current one, so
/// `hangup` may run at any point of an exchange.
pub struct Coordinator<F: TransportFactory> {
    inner: Arc<CoordinatorInner<F>>,
}

impl<F: TransportFactory> Clone for Coordinator<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct CoordinatorInner<F: TransportFactory> {
    factory: F,
    media: Box<dyn LocalMediaSource<LocalTrackOf<F>>>,
    events: mpsc::UnboundedSender<CoordinatorEvent<RemoteTrackOf<F>>>,
    state: Mutex<CoordinatorState<F::Transport>>,
}

struct CoordinatorState<T: PeerTransport> {
    call_state: CallState,
    next_attempt: u64,
    session: Option<Session<T>>,
}

struct Session<T: PeerTransport> {
    attempt: u64,
    role: Role,
    transport: Option<Arc<T>>,
    pump: Option<JoinHandle<()>>,
    remote: RemoteDescription,
    /// Remote candidates that arrived before the remote description.
    pending_remote: Vec<IceCandidate>,
    local_emitted: bool,
    /// Local candidates gathered before the local description went out.
    pending_local: Vec<IceCandidate>,
}

impl<T: PeerTransport> CoordinatorState<T> {
    fn begin(&mut self, role: Role) -> u64 {
        self.next_attempt += 1;
        let attempt = self.next_attempt;
        self.session = Some(Session {
            attempt,
            role,
            transport: None,
            pump: None,
            remote: RemoteDescription::Absent,
            pending_remote: Vec::new(),
            local_emitted: false,
            pending_local: Vec::new(),
        });
        attempt
    }

    fn current(&mut self, attempt: u64) -> Option<&mut Session<T>> {
        self.session.as_mut().filter(|s| s.attempt == attempt)
    }

    fn take_current(&mut self, attempt: u64) -> Option<Session<T>> {
        if self.session.as_ref().is_some_and(|s| s.attempt == attempt) {
            self.session.take()
        } else {
            None
        }
    }
}

impl<F: TransportFactory> Coordinator<F> {
    pub fn new<M>(factory: F, media: M) -> (Self, CoordinatorEvents<F>)
    where
        M: LocalMediaSource<LocalTrackOf<F>> + 'static,
    {
        let (events, rx) = mpsc::unbounded_channel();
        let coordinator = Self {
            inner: Arc::new(CoordinatorInner {
                factory,
                media: Box::new(media),
                events,
                state: Mutex::new(CoordinatorState {
                    call_state: CallState::Idle,
                    next_attempt: 0,
                    session: None,
                }),
            }),
        };
        (coordinator, rx)
    }

    pub async fn call_state(&self) -> CallState {
        self.inner.state.lock().await.call_state
    }

    /// Whether a call attempt currently exists, in any state.
    pub async fn is_active(&self) -> bool {
        self.inner.state.lock().await.session.is_some()
    }

    /// Caller side: creates the transport, opens the data channel and emits
    /// `LocalOffer`.
    pub async fn start_call(&self) -> Result<(), CoordinatorError> {
        let attempt = {
            let mut state = self.inner.state.lock().await;
            if state.session.is_some() {
                debug!("start_call refused: attempt already in progress");
                return Err(CoordinatorError::CallInProgress);
            }
            state.begin(Role::Caller)
        };
        info!("Starting call attempt {}", attempt);

        let Some(transport) = self.create_transport(attempt).await? else {
            return Ok(());
        };

        let offer = match self.prepare_offer(&transport).await {
            Ok(offer) => offer,
            Err(e) => {
                self.fail_attempt(attempt, &e).await;
                return Err(e.into());
            }
        };

        let mut state = self.inner.state.lock().await;
        if !self.publish_local(&mut state, attempt, CoordinatorEvent::LocalOffer(offer)) {
            debug!("Discarding offer of stale attempt {}", attempt);
            return Ok(());
        }
        self.transition(&mut state, CallState::HaveLocalOffer);
        Ok(())
    }

    /// Callee side. Offers arriving while an attempt exists are ignored.
    pub async fn on_remote_offer(&self, offer: SessionDescription) {
        let attempt = {
            let mut state = self.inner.state.lock().await;
            if state.session.is_some() {
                debug!("Ignoring offer: attempt already in progress");
                return;
            }
            let attempt = state.begin(Role::Callee);
            if let Some(session) = state.current(attempt) {
                session.remote = RemoteDescription::Applying;
            }
            self.transition(&mut state, CallState::HaveRemoteOffer);
            attempt
        };
        info!("Answering incoming call, attempt {}", attempt);

        let transport = match self.create_transport(attempt).await {
            Ok(Some(transport)) => transport,
            Ok(None) => return,
            Err(e) => {
                warn!("Could not create transport for incoming call: {}", e);
                return;
            }
        };

        if let Err(e) = self.accept_offer(&transport, offer).await {
            self.fail_attempt(attempt, &e).await;
            return;
        }
        if !self.flush_remote_candidates(attempt, &transport).await {
            debug!("Offer applied to stale attempt {}", attempt);
            return;
        }

        let answer = match transport.create_answer().await {
            Ok(answer) => answer,
            Err(e) => {
                self.fail_attempt(attempt, &e).await;
                return;
            }
        };

        let mut state = self.inner.state.lock().await;
        if !self.publish_local(&mut state, attempt, CoordinatorEvent::LocalAnswer(answer)) {
            debug!("Discarding answer of stale attempt {}", attempt);
            return;
        }
        if state.call_state == CallState::HaveRemoteOffer {
            self.transition(&mut state, CallState::HaveLocalAnswer);
        }
    }

    /// Caller side. Anything but the first answer to our own pending offer is
    /// dropped.
    pub async fn on_remote_answer(&self, answer: SessionDescription) {
        let (attempt, transport) = {
            let mut state = self.inner.state.lock().await;
            let call_state = state.call_state;
            let Some(session) = state.session.as_mut() else {
                debug!("Ignoring answer: no call in progress");
                return;
            };
            if session.role != Role::Caller
                || call_state != CallState::HaveLocalOffer
                || session.remote != RemoteDescription::Absent
            {
                debug!("Ignoring answer in state {}", call_state);
                return;
            }
            let Some(transport) = session.transport.clone() else {
                return;
            };
            session.remote = RemoteDescription::Applying;
            (session.attempt, transport)
        };

        if let Err(e) = transport.set_remote_description(answer).await {
            warn!("Failed to apply remote answer: {}", e);
            let mut state = self.inner.state.lock().await;
            if let Some(session) = state.current(attempt) {
                session.remote = RemoteDescription::Absent;
            }
            return;
        }

        {
            let mut state = self.inner.state.lock().await;
            if state.current(attempt).is_none() {
                debug!("Answer applied to stale attempt {}", attempt);
                return;
            }
            if state.call_state == CallState::HaveLocalOffer {
                self.transition(&mut state, CallState::HaveRemoteAnswer);
            }
        }
        self.flush_remote_candidates(attempt, &transport).await;
    }

    /// Applies a trickled candidate, or parks it until the remote description
    /// is in place. Failures are logged and swallowed.
    pub async fn on_remote_ice_candidate(&self, candidate: IceCandidate) {
        let transport = {
            let mut state = self.inner.state.lock().await;
            let Some(session) = state.session.as_mut() else {
                debug!("Dropping remote candidate: no call in progress");
                return;
            };
            match (&session.transport, session.remote) {
                (Some(transport), RemoteDescription::Applied) => Arc::clone(transport),
                _ => {
                    debug!("Buffering remote candidate for attempt {}", session.attempt);
                    session.pending_remote.push(candidate);
                    return;
                }
            }
        };
        Self::apply_remote_candidate(&transport, candidate).await;
    }

    /// Ends the current attempt, if any. Safe to call from any state, any
    /// number of times.
    pub async fn hangup(&self) {
        let session = {
            let mut state = self.inner.state.lock().await;
            let session = state.session.take();
            self.transition(&mut state, CallState::Idle);
            session
        };

        if let Some(session) = session {
            info!("Hanging up attempt {}", session.attempt);
            Self::dispose(session).await;
        }
    }

    pub async fn send(&self, data: Bytes) -> Result<(), CoordinatorError> {
        let transport = {
            let state = self.inner.state.lock().await;
            state
                .session
                .as_ref()
                .and_then(|s| s.transport.clone())
                .ok_or(CoordinatorError::NoActiveCall)?
        };
        transport.send(data).await?;
        Ok(())
    }

    pub async fn send_text(&self, text: &str) -> Result<(), CoordinatorError> {
        self.send(Bytes::copy_from_slice(text.as_bytes())).await
    }

    async fn create_transport(
        &self,
        attempt: u64,
    ) -> Result<Option<Arc<F::Transport>>, CoordinatorError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = match self.inner.factory.create(tx).await {
            Ok(transport) => Arc::new(transport),
            Err(e) => {
                self.fail_attempt(attempt, &e).await;
                return Err(e.into());
            }
        };

        let committed = {
            let mut state = self.inner.state.lock().await;
            match state.current(attempt) {
                Some(session) => {
                    session.transport = Some(Arc::clone(&transport));
                    session.pump = Some(self.spawn_pump(attempt, rx));
                    true
                }
                None => false,
            }
        };

        if !committed {
            debug!("Attempt {} ended while its transport was created", attempt);
            if let Err(e) = transport.close().await {
                warn!("Failed to close orphaned transport: {}", e);
            }
            return Ok(None);
        }
        Ok(Some(transport))
    }

    async fn prepare_offer(&self, transport: &F::Transport) -> anyhow::Result<SessionDescription> {
        for track in self.inner.media.tracks() {
            transport.add_track(track).await?;
        }
        transport.open_data_channel(DATA_CHANNEL_LABEL).await?;
        transport.create_offer().await
    }

    async fn accept_offer(
        &self,
        transport: &F::Transport,
        offer: SessionDescription,
    ) -> anyhow::Result<()> {
        for track in self.inner.media.tracks() {
            transport.add_track(track).await?;
        }
        transport.accept_data_channel().await?;
        transport.set_remote_description(offer).await
    }

    /// Applies parked remote candidates in arrival order, then marks the remote
    /// description as applied. Returns false if the attempt ended meanwhile.
    async fn flush_remote_candidates(&self, attempt: u64, transport: &F::Transport) -> bool {
        loop {
            let batch = {
                let mut state = self.inner.state.lock().await;
                let Some(session) = state.current(attempt) else {
                    return false;
                };
                if session.pending_remote.is_empty() {
                    session.remote = RemoteDescription::Applied;
                    return true;
                }
                std::mem::take(&mut session.pending_remote)
            };

            debug!("Applying {} buffered remote candidate(s)", batch.len());
            for candidate in batch {
                Self::apply_remote_candidate(transport, candidate).await;
            }
        }
    }

    async fn apply_remote_candidate(transport: &F::Transport, candidate: IceCandidate) {
        if let Err(e) = transport.add_ice_candidate(candidate).await {
            warn!("Failed to apply remote ICE candidate: {}", e);
        }
    }

    /// Emits a local description followed by any candidates held back for it.
    fn publish_local(
        &self,
        state: &mut CoordinatorState<F::Transport>,
        attempt: u64,
        description: CoordinatorEvent<RemoteTrackOf<F>>,
    ) -> bool {
        let Some(session) = state.current(attempt) else {
            return false;
        };
        session.local_emitted = true;
        let held = std::mem::take(&mut session.pending_local);

        self.emit(description);
        for candidate in held {
            self.emit(CoordinatorEvent::LocalIceCandidate(candidate));
        }
        true
    }

    async fn fail_attempt(&self, attempt: u64, error: &anyhow::Error) {
        warn!("Call attempt {} failed: {}", attempt, error);
        let session = {
            let mut state = self.inner.state.lock().await;
            let session = state.take_current(attempt);
            if session.is_some() {
                self.transition(&mut state, CallState::Failed);
            }
            session
        };
        if let Some(session) = session {
            Self::dispose(session).await;
        }
    }

    fn spawn_pump(
        &self,
        attempt: u64,
        mut rx: mpsc::UnboundedReceiver<TransportEvent<RemoteTrackOf<F>>>,
    ) -> JoinHandle<()> {
        let weak: Weak<CoordinatorInner<F>> = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let Some(inner) = weak.upgrade() else { break };
                Coordinator { inner }
                    .handle_transport_event(attempt, event)
                    .await;
            }
        })
    }

    async fn handle_transport_event(
        &self,
        attempt: u64,
        event: TransportEvent<RemoteTrackOf<F>>,
    ) {
        let mut state = self.inner.state.lock().await;
        let Some(session) = state.current(attempt) else {
            debug!("Dropping transport event of stale attempt {}", attempt);
            return;
        };

        match event {
            TransportEvent::CandidateGenerated(candidate) => {
                if session.local_emitted {
                    self.emit(CoordinatorEvent::LocalIceCandidate(candidate));
                } else {
                    session.pending_local.push(candidate);
                }
            }
            TransportEvent::StateChanged(raw) => {
                self.emit(CoordinatorEvent::ConnectionStateChanged {
                    connected: raw == TransportState::Connected,
                    raw,
                });
                let end = match raw {
                    TransportState::Connected => {
                        self.transition(&mut state, CallState::Connected);
                        None
                    }
                    TransportState::Failed => Some(CallState::Failed),
                    TransportState::Closed => Some(CallState::Closed),
                    _ => None,
                };
                if let Some(end) = end {
                    // The attempt stays registered until its transport is closed,
                    // so no new transport can start alongside it.
                    let transport = state.current(attempt).and_then(|s| s.transport.take());
                    drop(state);
                    info!("Transport of attempt {} is {:?}, tearing down", attempt, raw);
                    if let Some(transport) = transport
                        && let Err(e) = transport.close().await
                    {
                        warn!("Failed to close transport of attempt {}: {}", attempt, e);
                    }

                    let session = {
                        let mut state = self.inner.state.lock().await;
                        let session = state.take_current(attempt);
                        if session.is_some() {
                            self.transition(&mut state, end);
                        }
                        session
                    };
                    if let Some(session) = session {
                        Self::dispose(session).await;
                    }
                }
            }
            TransportEvent::DataChannelReady => self.emit(CoordinatorEvent::DataChannelOpen),
            TransportEvent::Message(data) => self.emit(CoordinatorEvent::DataReceived(data)),
            TransportEvent::RemoteTrack(track) => self.emit(CoordinatorEvent::RemoteMedia(track)),
        }
    }

    fn transition(&self, state: &mut CoordinatorState<F::Transport>, next: CallState) {
        if state.call_state != next {
            debug!("Call state {} -> {}", state.call_state, next);
            state.call_state = next;
            self.emit(CoordinatorEvent::CallStateChanged(next));
        }
    }

    fn emit(&self, event: CoordinatorEvent<RemoteTrackOf<F>>) {
        let _ = self.inner.events.send(event);
    }

    async fn dispose(session: Session<F::Transport>) {
        if let Some(transport) = session.transport
            && let Err(e) = transport.close().await
        {
            warn!("Failed to close transport of attempt {}: {}", session.attempt, e);
        }
        if let Some(pump) = session.pump {
            pump.abort();
        }
    }
}
