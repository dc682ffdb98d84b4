use crate::model::session::{IceCandidate, SessionDescription};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Every frame on the signaling socket, in either direction.
///
/// Frames are JSON objects of the form `{"event": "...", "data": ...}`. Events
/// without a payload omit `data`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum SignalMessage {
    /// Client asks to join (or create) the room with the given token.
    Join(String),
    /// Relay acknowledges a join to the joiner.
    Joined,
    /// Relay tells existing members that someone joined.
    PeerJoined,
    /// Relay tells remaining members that someone disconnected.
    PeerLeft,
    /// Relay refused a join because the room reached its member cap.
    RoomFull,
    Offer(DescriptionPayload),
    Answer(DescriptionPayload),
    Ice(CandidatePayload),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DescriptionPayload {
    pub room_id: String,
    pub sdp: SessionDescription,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CandidatePayload {
    pub room_id: String,
    pub candidate: IceCandidate,
}

impl SignalMessage {
    pub fn offer(room_id: impl Into<String>, sdp: SessionDescription) -> Self {
        Self::Offer(DescriptionPayload {
            room_id: room_id.into(),
            sdp,
        })
    }

    pub fn answer(room_id: impl Into<String>, sdp: SessionDescription) -> Self {
        Self::Answer(DescriptionPayload {
            room_id: room_id.into(),
            sdp,
        })
    }

    pub fn ice(room_id: impl Into<String>, candidate: IceCandidate) -> Self {
        Self::Ice(CandidatePayload {
            room_id: room_id.into(),
            candidate,
        })
    }

    pub fn event(&self) -> SignalEvent {
        match self {
            SignalMessage::Join(_) => SignalEvent::Join,
            SignalMessage::Joined => SignalEvent::Joined,
            SignalMessage::PeerJoined => SignalEvent::PeerJoined,
            SignalMessage::PeerLeft => SignalEvent::PeerLeft,
            SignalMessage::RoomFull => SignalEvent::RoomFull,
            SignalMessage::Offer(_) => SignalEvent::Offer,
            SignalMessage::Answer(_) => SignalEvent::Answer,
            SignalMessage::Ice(_) => SignalEvent::Ice,
        }
    }
}

/// Event names without their payloads.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum SignalEvent {
    Join,
    Joined,
    PeerJoined,
    PeerLeft,
    RoomFull,
    Offer,
    Answer,
    Ice,
}

impl SignalEvent {
    /// Events a client sends for the relay to fan out to the rest of its room.
    pub fn is_relayed(self) -> bool {
        matches!(
            self,
            SignalEvent::Offer | SignalEvent::Answer | SignalEvent::Ice
        )
    }
}

/// The part of a frame the relay is allowed to look at.
///
/// The relay routes on `event` and the room id alone. Everything else in `data`
/// stays opaque, so a frame with a broken `sdp` or `candidate` is still
/// forwarded untouched.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    pub event: SignalEvent,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Room the frame refers to: the bare string of a `join`, or the `roomId`
    /// field of a relayed event.
    pub fn room_id(&self) -> Option<&str> {
        match self.event {
            SignalEvent::Join => self.data.as_str(),
            _ => self.data.get("roomId").and_then(Value::as_str),
        }
    }
}
