//! Messages sent by the frontend (client), with their frame decoders.

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;

use super::PROTOCOL_VERSION;
use super::codec::{PostgresCodec, StartupCodec, get_cstring};
use super::error::ProtocolError;

/// SSLRequest magic number.
pub const SSL_REQUEST_CODE: i32 = (1234 << 16) | 5679; // 80877103

/// GSSENCRequest magic number.
pub const GSSENC_REQUEST_CODE: i32 = (1234 << 16) | 5680; // 80877104

/// CancelRequest magic number.
pub const CANCEL_REQUEST_CODE: i32 = (1234 << 16) | 5678; // 80877102

/// Messages received during the startup phase.
#[derive(Debug)]
pub enum StartupMessage {
    /// Client asks to negotiate SSL; answered with 'N'.
    SslRequest,
    /// Client asks for GSSAPI encryption; answered with 'N'.
    GssEncRequest,
    /// Client asks to cancel a running query on another connection.
    CancelRequest { process_id: i32, secret_key: i32 },
    /// Normal connection startup.
    Startup {
        protocol_version: i32,
        parameters: StartupParameters,
    },
}

/// Key/value pairs from the startup packet. Both `user` and `database` are
/// optional: this server trusts every client.
#[derive(Debug, Clone, Default)]
pub struct StartupParameters {
    pub user: Option<String>,
    pub database: Option<String>,
}

impl Decoder for StartupCodec {
    type Item = StartupMessage;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<StartupMessage>, ProtocolError> {
        if src.len() < 4 {
            return Ok(None);
        }

        let len = i32::from_be_bytes(src[0..4].try_into().unwrap());
        if len < 8 || len as usize > self.max_message_size {
            return Err(ProtocolError::InvalidMessage);
        }
        if src.len() < len as usize {
            src.reserve(len as usize - src.len());
            return Ok(None);
        }

        let mut frame = src.split_to(len as usize);
        frame.advance(4); // length prefix
        let code = frame.get_i32();
        let remaining = frame.len();

        match code {
            SSL_REQUEST_CODE if remaining == 0 => Ok(Some(StartupMessage::SslRequest)),
            GSSENC_REQUEST_CODE if remaining == 0 => Ok(Some(StartupMessage::GssEncRequest)),
            CANCEL_REQUEST_CODE if remaining == 8 => {
                let process_id = frame.get_i32();
                let secret_key = frame.get_i32();
                Ok(Some(StartupMessage::CancelRequest {
                    process_id,
                    secret_key,
                }))
            }
            SSL_REQUEST_CODE | GSSENC_REQUEST_CODE | CANCEL_REQUEST_CODE => {
                Err(ProtocolError::InvalidMessage)
            }
            PROTOCOL_VERSION => {
                let parameters = parse_startup_parameters(&mut frame)?;
                Ok(Some(StartupMessage::Startup {
                    protocol_version: code,
                    parameters,
                }))
            }
            other => Err(ProtocolError::UnsupportedProtocolVersion(other)),
        }
    }
}

/// Parses the null-terminated key/value pairs of a startup packet.
fn parse_startup_parameters(frame: &mut BytesMut) -> Result<StartupParameters, ProtocolError> {
    let mut params = StartupParameters::default();
    loop {
        if frame.is_empty() {
            break;
        }
        let name = get_cstring(frame)?;
        // Empty name is the pair-list terminator.
        if name.is_empty() {
            break;
        }
        let value = get_cstring(frame)?;
        match name.as_str() {
            "user" => params.user = Some(value),
            "database" => params.database = Some(value),
            // Other parameters (application_name, options, ...) are ignored.
            _ => {}
        }
    }
    Ok(params)
}

/// Messages received during the query phase.
#[derive(Debug, PartialEq, Eq)]
pub enum FrontendMessage {
    /// 'Q' - simple query, trailing NUL stripped.
    Query(String),
    /// 'X' - terminate.
    Terminate,
    /// Any other typed frame; the payload is discarded.
    Unsupported(u8),
}

impl Decoder for PostgresCodec {
    type Item = FrontendMessage;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<FrontendMessage>, ProtocolError> {
        if src.len() < 5 {
            return Ok(None);
        }

        let msg_type = src[0];
        let len = i32::from_be_bytes(src[1..5].try_into().unwrap());
        if len < 4 || len as usize > self.max_message_size {
            return Err(ProtocolError::InvalidMessage);
        }

        let total = 1 + len as usize;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        let mut frame = src.split_to(total);
        frame.advance(5); // type byte + length prefix

        match msg_type {
            b'Q' => {
                let sql = get_cstring(&mut frame)?;
                Ok(Some(FrontendMessage::Query(sql)))
            }
            b'X' => Ok(Some(FrontendMessage::Terminate)),
            other => Ok(Some(FrontendMessage::Unsupported(other))),
        }
    }
}
