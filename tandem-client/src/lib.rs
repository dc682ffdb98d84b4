pub mod coordinator;
pub mod media;
pub mod participant;
pub mod signaling;
pub mod transport;

pub use coordinator::*;
pub use media::*;
pub use participant::*;
pub use transport::*;
