use std::fmt;

/// Where the local side stands in the offer/answer exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallState {
    #[default]
    Idle,
    HaveLocalOffer,
    HaveRemoteOffer,
    HaveLocalAnswer,
    HaveRemoteAnswer,
    Connected,
    Failed,
    Closed,
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CallState::Idle => "idle",
            CallState::HaveLocalOffer => "have-local-offer",
            CallState::HaveRemoteOffer => "have-remote-offer",
            CallState::HaveLocalAnswer => "have-local-answer",
            CallState::HaveRemoteAnswer => "have-remote-answer",
            CallState::Connected => "connected",
            CallState::Failed => "failed",
            CallState::Closed => "closed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Role {
    Caller,
    Callee,
}

/// Progress of the remote description for the current attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RemoteDescription {
    Absent,
    Applying,
    Applied,
}
