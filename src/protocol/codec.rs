//! Framing codecs for the two protocol phases.
//!
//! Startup messages are untyped (`int32 length || payload`) while query-phase
//! messages are typed (`byte type || int32 length || payload`), so each phase
//! gets its own [`Decoder`]. [`StartupCodec::ready`] transitions a framed
//! stream into the query phase after a successful handshake.

use bytes::{Buf, BufMut, BytesMut};

use super::error::ProtocolError;

/// Maximum accepted frame size in bytes (16 MB).
/// PostgreSQL accepts up to 1 GB; this is plenty for a teaching server.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Reads a null-terminated string from the front of a buffer.
pub fn get_cstring(src: &mut BytesMut) -> Result<String, ProtocolError> {
    let Some(null_pos) = src.iter().position(|&b| b == 0) else {
        return Err(ProtocolError::InvalidMessage);
    };
    let bytes = src.split_to(null_pos);
    src.advance(1);
    Ok(String::from_utf8(bytes.to_vec())?)
}

/// Writes a null-terminated string.
pub fn put_cstring(dst: &mut BytesMut, s: &str) {
    dst.put_slice(s.as_bytes());
    dst.put_u8(0);
}

/// Codec for the startup phase.
///
/// Decodes [`StartupMessage`](super::frontend::StartupMessage)s and encodes
/// [`BackendMessage`](super::backend::BackendMessage)s.
pub struct StartupCodec {
    pub(crate) max_message_size: usize,
}

impl StartupCodec {
    /// Creates a startup codec with the default frame size limit.
    pub fn new() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }

    /// Transitions to the query-phase codec after a successful startup.
    pub fn ready(self) -> PostgresCodec {
        PostgresCodec {
            max_message_size: self.max_message_size,
        }
    }
}

impl Default for StartupCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// Codec for the query phase.
///
/// Decodes [`FrontendMessage`](super::frontend::FrontendMessage)s and encodes
/// [`BackendMessage`](super::backend::BackendMessage)s.
pub struct PostgresCodec {
    pub(crate) max_message_size: usize,
}

impl PostgresCodec {
    /// Creates a query-phase codec with the default frame size limit.
    pub fn new() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

impl Default for PostgresCodec {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_cstring() {
        let mut buf = BytesMut::from(&b"hello\0world"[..]);
        assert_eq!(get_cstring(&mut buf).unwrap(), "hello");
        assert_eq!(buf, b"world"[..]);
    }

    #[test]
    fn test_get_cstring_missing_terminator() {
        let mut buf = BytesMut::from(&b"hello"[..]);
        assert!(matches!(
            get_cstring(&mut buf),
            Err(ProtocolError::InvalidMessage)
        ));
    }

    #[test]
    fn test_get_cstring_invalid_utf8() {
        let mut buf = BytesMut::from(&[0xFF, 0xFE, 0x00][..]);
        assert!(matches!(
            get_cstring(&mut buf),
            Err(ProtocolError::InvalidUtf8(_))
        ));
    }

    #[test]
    fn test_put_cstring() {
        let mut buf = BytesMut::new();
        put_cstring(&mut buf, "test");
        assert_eq!(buf, b"test\0"[..]);
    }
}
