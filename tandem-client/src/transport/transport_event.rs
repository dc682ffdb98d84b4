use bytes::Bytes;
use tandem_core::IceCandidate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// What a transport pushes to its coordinator.
#[derive(Debug)]
pub enum TransportEvent<R> {
    CandidateGenerated(IceCandidate),
    StateChanged(TransportState),
    DataChannelReady,
    Message(Bytes),
    RemoteTrack(R),
}
