use axum::http::HeaderValue;
use clap::Parser;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tandem_core::utils::DEFAULT_RELAY_PORT;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::warn;

/// Relay settings. Every flag falls back to an environment variable.
#[derive(Debug, Clone, Parser)]
#[command(name = "tandem-relay", about = "Room-based WebRTC signaling relay")]
pub struct RelayConfig {
    #[arg(long, env = "HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    #[arg(short, long, env = "PORT", default_value_t = DEFAULT_RELAY_PORT)]
    pub port: u16,

    /// Origins allowed to call the relay cross-origin; `*` allows any.
    #[arg(long, env = "ALLOWED_ORIGINS", value_delimiter = ',', default_value = "*")]
    pub allowed_origins: Vec<String>,

    /// Reject joins once a room has this many members. Unset means no cap.
    #[arg(long, env = "MAX_ROOM_MEMBERS")]
    pub max_room_members: Option<usize>,
}

impl RelayConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn cors_layer(&self) -> CorsLayer {
        let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);

        if self.allowed_origins.iter().any(|origin| origin.trim() == "*") {
            return cors.allow_origin(Any);
        }

        let origins: Vec<HeaderValue> = self
            .allowed_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin.trim()) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!("Ignoring invalid allowed origin '{}'", origin);
                    None
                }
            })
            .collect();

        cors.allow_origin(AllowOrigin::list(origins))
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_RELAY_PORT,
            allowed_origins: vec!["*".to_owned()],
            max_room_members: None,
        }
    }
}
