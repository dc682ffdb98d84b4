mod connection;
mod session;
mod signaling;

pub use connection::ConnectionId;
pub use session::{IceCandidate, SdpType, SessionDescription};
pub use signaling::{
    CandidatePayload, DescriptionPayload, Envelope, SignalEvent, SignalMessage,
};
