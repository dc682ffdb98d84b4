/// Public STUN server used when nothing else is configured. No TURN relay is ever
/// configured by default.
pub const DEFAULT_STUN_ADDR: &str = "stun:stun.l.google.com:19302";

pub const DEFAULT_RELAY_PORT: u16 = 3001;

pub const DEFAULT_SIGNAL_URL: &str = "ws://localhost:3001/ws";

/// Label of the single bidirectional data channel the caller opens.
pub const DATA_CHANNEL_LABEL: &str = "chat";

/// Body of the relay's liveness endpoint.
pub const HEALTH_RESPONSE: &str = "WebRTC signaling OK";
