//! TCP server speaking the PostgreSQL wire protocol.

pub mod connection;
pub mod handshake;
pub mod listener;

pub use connection::{Connection, ConnectionError};
pub use handshake::{Handshake, HandshakeResult};
pub use listener::Server;
