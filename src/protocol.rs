//! PostgreSQL v3 wire protocol messages and codecs.
//!
//! Only the simple-query subset is implemented: startup negotiation,
//! `Query`, `Terminate`, and the backend responses they need. Message
//! integers are big-endian per the protocol.

pub mod backend;
pub mod codec;
pub mod error;
pub mod frontend;
pub mod types;

pub use backend::{
    BackendMessage, DataValue, ErrorField, ErrorInfo, FieldDescription, TransactionStatus,
};
pub use codec::{PostgresCodec, StartupCodec};
pub use error::ProtocolError;
pub use frontend::{FrontendMessage, StartupMessage, StartupParameters};
pub use types::{ErrorFieldCode, FormatCode, sql_state, type_oid};

/// The sole protocol version this server accepts.
pub const PROTOCOL_VERSION: i32 = 0x0003_0000;
