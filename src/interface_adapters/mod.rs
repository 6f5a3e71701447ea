// Interface adapters: wire protocol, server sockets, client connection and HTTP status.

pub mod clients;
pub mod http;
pub mod net;
pub mod protocol;
pub mod state;
pub mod utils;
