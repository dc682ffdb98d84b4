use crate::coordinator::CallState;
use crate::transport::TransportState;
use bytes::Bytes;
use tandem_core::{IceCandidate, SessionDescription};

/// Everything the coordinator reports outward. `R` is the transport's remote
/// track type.
#[derive(Debug)]
pub enum CoordinatorEvent<R> {
    /// Send to the peer as `offer`.
    LocalOffer(SessionDescription),
    /// Send to the peer as `answer`.
    LocalAnswer(SessionDescription),
    /// Send to the peer as `ice`.
    LocalIceCandidate(IceCandidate),
    CallStateChanged(CallState),
    ConnectionStateChanged {
        connected: bool,
        raw: TransportState,
    },
    DataChannelOpen,
    DataReceived(Bytes),
    RemoteMedia(R),
}
