use tandem_core::utils::DEFAULT_STUN_ADDR;

/// ICE settings for new peer connections.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub ice_servers: Vec<String>,
}

impl TransportConfig {
    /// No ICE servers at all; host candidates only. Enough for loopback.
    pub fn local() -> Self {
        Self {
            ice_servers: Vec::new(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![DEFAULT_STUN_ADDR.to_owned()],
        }
    }
}
