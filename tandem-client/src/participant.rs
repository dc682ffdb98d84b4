use crate::coordinator::{Coordinator, CoordinatorError, CoordinatorEvent, CoordinatorEvents};
use crate::media::LocalMediaSource;
use crate::signaling::{SignalingClient, SignalingSender};
use crate::transport::{LocalTrackOf, RemoteTrackOf, TransportFactory};
use std::sync::Arc;
use std::time::Duration;
use tandem_core::SignalMessage;
use thiserror::Error;
use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite;
use tracing::{debug, info, warn};

/// How long `join` waits for the relay's `joined`.
pub const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection to the relay, independent of any peer connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalingState {
    Disconnected,
    Connected,
    Joined(String),
}

#[derive(Debug)]
pub enum ParticipantEvent<R> {
    Signaling(SignalingState),
    PeerJoined,
    PeerLeft,
    RoomFull,
    Call(CoordinatorEvent<R>),
}

#[derive(Debug, Error)]
pub enum ParticipantError {
    #[error("Failed to reach signaling relay: {0}")]
    Connect(#[from] tungstenite::Error),
    #[error("Room id must not be empty")]
    EmptyRoom,
    #[error("Relay did not acknowledge joining '{0}'")]
    JoinTimeout(String),
    #[error("Room '{0}' is full")]
    RoomFull(String),
    #[error("Join a room before calling")]
    NotJoined,
    #[error("Signaling connection closed")]
    Disconnected,
    #[error(transparent)]
    Call(#[from] CoordinatorError),
}

pub type ParticipantEvents<F> = mpsc::UnboundedReceiver<ParticipantEvent<RemoteTrackOf<F>>>;

type EventSender<F> = mpsc::UnboundedSender<ParticipantEvent<RemoteTrackOf<F>>>;

enum JoinReply {
    Joined,
    Full,
}

/// The most recent join request. Once its caller has timed out the reply is
/// gone, but a late `joined` still moves the participant into the room.
struct PendingJoin {
    room: String,
    reply: Option<oneshot::Sender<JoinReply>>,
}

struct Shared {
    state: watch::Sender<SignalingState>,
    pending_join: Mutex<Option<PendingJoin>>,
}

impl Shared {
    fn set_state<R>(&self, next: SignalingState, events: &mpsc::UnboundedSender<ParticipantEvent<R>>) {
        let changed = self.state.send_if_modified(|state| {
            if *state == next {
                false
            } else {
                *state = next.clone();
                true
            }
        });
        if changed {
            info!("Signaling state: {:?}", next);
            let _ = events.send(ParticipantEvent::Signaling(next));
        }
    }

    fn room(&self) -> Option<String> {
        match &*self.state.borrow() {
            SignalingState::Joined(room) => Some(room.clone()),
            _ => None,
        }
    }
}

/// One end of a call: a relay connection plus the coordinator that drives the
/// peer connection.
pub struct Participant<F: TransportFactory> {
    coordinator: Coordinator<F>,
    signaling: SignalingClient,
    shared: Arc<Shared>,
    events: EventSender<F>,
    tasks: Vec<JoinHandle<()>>,
}

impl<F: TransportFactory> Participant<F> {
    pub async fn connect<M>(
        url: &str,
        factory: F,
        media: M,
    ) -> Result<(Self, ParticipantEvents<F>), ParticipantError>
    where
        M: LocalMediaSource<LocalTrackOf<F>> + 'static,
    {
        let (signaling, inbound) = SignalingClient::connect(url).await?;
        let (coordinator, call_events) = Coordinator::new(factory, media);
        let (events, events_rx) = mpsc::unbounded_channel();

        let shared = Arc::new(Shared {
            state: watch::Sender::new(SignalingState::Disconnected),
            pending_join: Mutex::new(None),
        });
        shared.set_state(SignalingState::Connected, &events);

        let inbound_task = tokio::spawn(Self::run_inbound(
            inbound,
            coordinator.clone(),
            Arc::clone(&shared),
            events.clone(),
        ));
        let outbound_task = tokio::spawn(Self::run_outbound(
            call_events,
            signaling.sender(),
            Arc::clone(&shared),
            events.clone(),
        ));

        let participant = Self {
            coordinator,
            signaling,
            shared,
            events,
            tasks: vec![inbound_task, outbound_task],
        };
        Ok((participant, events_rx))
    }

    pub fn signaling_state(&self) -> SignalingState {
        self.shared.state.borrow().clone()
    }

    pub fn watch_signaling(&self) -> watch::Receiver<SignalingState> {
        self.shared.state.subscribe()
    }

    pub fn coordinator(&self) -> &Coordinator<F> {
        &self.coordinator
    }

    /// Joins `room` and waits up to [`JOIN_TIMEOUT`] for the relay to
    /// acknowledge it.
    pub async fn join(&self, room: &str) -> Result<(), ParticipantError> {
        self.join_within(room, JOIN_TIMEOUT).await
    }

    pub async fn join_within(
        &self,
        room: &str,
        timeout: Duration,
    ) -> Result<(), ParticipantError> {
        if room.is_empty() {
            return Err(ParticipantError::EmptyRoom);
        }
        match self.signaling_state() {
            SignalingState::Disconnected => return Err(ParticipantError::Disconnected),
            SignalingState::Joined(current) if current != room => {
                info!("Leaving '{}' for '{}'", current, room);
                self.coordinator.hangup().await;
            }
            _ => {}
        }

        let (reply, ack) = oneshot::channel();
        *self.shared.pending_join.lock().await = Some(PendingJoin {
            room: room.to_owned(),
            reply: Some(reply),
        });

        if !self.signaling.send(&SignalMessage::Join(room.to_owned())) {
            self.shared.pending_join.lock().await.take();
            return Err(ParticipantError::Disconnected);
        }

        match tokio::time::timeout(timeout, ack).await {
            Ok(Ok(JoinReply::Joined)) => Ok(()),
            Ok(Ok(JoinReply::Full)) => Err(ParticipantError::RoomFull(room.to_owned())),
            Ok(Err(_)) => Err(ParticipantError::Disconnected),
            Err(_) => {
                let mut pending = self.shared.pending_join.lock().await;
                match pending.as_mut() {
                    Some(pending) if pending.room == room => pending.reply = None,
                    _ if self.shared.room().as_deref() == Some(room) => return Ok(()),
                    _ => {}
                }
                warn!("No acknowledgement for join of '{}' yet", room);
                Err(ParticipantError::JoinTimeout(room.to_owned()))
            }
        }
    }

    /// Starts a call to whoever else is in the room.
    pub async fn call(&self) -> Result<(), ParticipantError> {
        if self.shared.room().is_none() {
            return Err(ParticipantError::NotJoined);
        }
        self.coordinator.start_call().await?;
        Ok(())
    }

    pub async fn hangup(&self) {
        self.coordinator.hangup().await;
    }

    pub async fn send_text(&self, text: &str) -> Result<(), ParticipantError> {
        self.coordinator.send_text(text).await?;
        Ok(())
    }

    /// Hangs up and closes the relay connection.
    pub async fn close(self) {
        self.coordinator.hangup().await;
        self.signaling.close().await;
        for task in self.tasks {
            task.abort();
        }
        self.shared
            .set_state(SignalingState::Disconnected, &self.events);
    }

    async fn run_inbound(
        mut inbound: mpsc::UnboundedReceiver<SignalMessage>,
        coordinator: Coordinator<F>,
        shared: Arc<Shared>,
        events: EventSender<F>,
    ) {
        while let Some(msg) = inbound.recv().await {
            match msg {
                SignalMessage::Joined => match shared.pending_join.lock().await.take() {
                    Some(pending) => {
                        if pending.reply.is_none() {
                            info!("Late acknowledgement for '{}'", pending.room);
                        }
                        shared.set_state(SignalingState::Joined(pending.room), &events);
                        if let Some(reply) = pending.reply {
                            let _ = reply.send(JoinReply::Joined);
                        }
                    }
                    None => debug!("Repeated join acknowledgement"),
                },
                SignalMessage::RoomFull => {
                    if let Some(pending) = shared.pending_join.lock().await.take() {
                        warn!("Room '{}' is full", pending.room);
                        if let Some(reply) = pending.reply {
                            let _ = reply.send(JoinReply::Full);
                        }
                    }
                    let _ = events.send(ParticipantEvent::RoomFull);
                }
                SignalMessage::PeerJoined => {
                    info!("Peer joined the room");
                    let _ = events.send(ParticipantEvent::PeerJoined);
                }
                SignalMessage::PeerLeft => {
                    info!("Peer left the room, ending call");
                    let _ = events.send(ParticipantEvent::PeerLeft);
                    coordinator.hangup().await;
                }
                SignalMessage::Offer(payload) => coordinator.on_remote_offer(payload.sdp).await,
                SignalMessage::Answer(payload) => coordinator.on_remote_answer(payload.sdp).await,
                SignalMessage::Ice(payload) => {
                    coordinator.on_remote_ice_candidate(payload.candidate).await
                }
                SignalMessage::Join(room) => {
                    warn!("Relay sent a join for '{}', ignoring", room)
                }
            }
        }

        info!("Signaling connection lost");
        shared.pending_join.lock().await.take();
        shared.set_state(SignalingState::Disconnected, &events);
    }

    /// Wraps outbound coordinator messages with the current room id and
    /// forwards everything else to the application.
    async fn run_outbound(
        mut call_events: CoordinatorEvents<F>,
        sender: SignalingSender,
        shared: Arc<Shared>,
        events: EventSender<F>,
    ) {
        while let Some(event) = call_events.recv().await {
            let room = shared.room();
            let message = match event {
                CoordinatorEvent::LocalOffer(sdp) => room.map(|r| SignalMessage::offer(r, sdp)),
                CoordinatorEvent::LocalAnswer(sdp) => room.map(|r| SignalMessage::answer(r, sdp)),
                CoordinatorEvent::LocalIceCandidate(candidate) => {
                    room.map(|r| SignalMessage::ice(r, candidate))
                }
                other => {
                    let _ = events.send(ParticipantEvent::Call(other));
                    continue;
                }
            };

            match message {
                Some(message) => {
                    if !sender.send(&message) {
                        warn!("Signaling closed, dropping {:?}", message.event());
                    }
                }
                None => warn!("Not in a room, dropping outbound signaling message"),
            }
        }
    }
}
