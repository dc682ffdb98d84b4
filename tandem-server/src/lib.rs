pub mod app;
pub mod config;
mod room;
mod signaling;

pub use app::{AppState, health, router, serve};
pub use config::RelayConfig;
pub use room::*;
pub use signaling::*;
