// Client-side adapters: the reconnecting transport and the typed socket on top of it.

pub mod socket;
pub mod transport;

pub use socket::ProtocolSocket;
pub use transport::{Transport, TransportConfig, TransportEvent, TransportState};
