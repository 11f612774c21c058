//! Connection startup handshake.
//!
//! Reads startup-phase frames until a `StartupMessage` arrives, rejecting
//! SSL and GSSAPI negotiation with `N`. Authentication is trust-accept: any
//! `user`/`database` pair is admitted. A protocol version other than 3.0 is
//! answered with a FATAL `08P01` error; a malformed length or a read timeout
//! closes the socket without a reply.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::Framed;

use crate::protocol::{
    BackendMessage, ErrorInfo, PostgresCodec, ProtocolError, StartupCodec, StartupMessage,
    TransactionStatus, sql_state,
};

use super::connection::ConnectionError;

/// Parameter status pairs sent to every accepted client.
const SERVER_PARAMETERS: [(&str, &str); 7] = [
    ("server_version", "16.0"),
    ("server_encoding", "UTF8"),
    ("client_encoding", "UTF8"),
    ("DateStyle", "ISO, MDY"),
    ("TimeZone", "UTC"),
    ("integer_datetimes", "on"),
    ("standard_conforming_strings", "on"),
];

/// Outcome of a completed handshake.
pub enum HandshakeResult {
    /// Startup accepted; the stream is ready for the query phase.
    Success {
        framed: Framed<TcpStream, PostgresCodec>,
        secret_key: i32,
    },
    /// The client sent a CancelRequest instead of a startup.
    CancelRequested { pid: i32, secret_key: i32 },
}

/// Startup-phase driver for one connection.
pub struct Handshake {
    framed: Framed<TcpStream, StartupCodec>,
    pid: i32,
    frame_timeout: Duration,
}

impl Handshake {
    /// Wraps a fresh socket for the startup phase.
    pub fn new(socket: TcpStream, pid: i32, frame_timeout: Duration) -> Self {
        Self {
            framed: Framed::new(socket, StartupCodec::new()),
            pid,
            frame_timeout,
        }
    }

    /// Runs the handshake to completion.
    pub async fn run(mut self) -> Result<HandshakeResult, ConnectionError> {
        loop {
            let next = timeout(self.frame_timeout, self.framed.next())
                .await
                .map_err(|_| ConnectionError::Timeout)?;

            let message = match next {
                Some(Ok(message)) => message,
                Some(Err(ProtocolError::UnsupportedProtocolVersion(version))) => {
                    // The one startup failure that gets a reply.
                    let info = ErrorInfo::fatal(
                        sql_state::PROTOCOL_VIOLATION,
                        ProtocolError::UnsupportedProtocolVersion(version).to_string(),
                    );
                    self.framed.send(info.into()).await?;
                    return Err(ConnectionError::Protocol(
                        ProtocolError::UnsupportedProtocolVersion(version),
                    ));
                }
                Some(Err(e)) => return Err(e.into()),
                None => {
                    return Err(ConnectionError::Io(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "connection closed during handshake",
                    )));
                }
            };

            match message {
                StartupMessage::SslRequest | StartupMessage::GssEncRequest => {
                    // Reject encryption negotiation with a bare 'N'.
                    self.framed.get_mut().write_all(b"N").await?;
                    self.framed.get_mut().flush().await?;
                }
                StartupMessage::Startup { parameters, .. } => {
                    println!(
                        "(pid={}) startup: user={:?} database={:?}",
                        self.pid, parameters.user, parameters.database
                    );
                    let secret_key = rand::random::<i32>();
                    self.send_startup_info(secret_key).await?;

                    let framed = self.framed.map_codec(|c| c.ready());
                    return Ok(HandshakeResult::Success { framed, secret_key });
                }
                StartupMessage::CancelRequest {
                    process_id,
                    secret_key,
                } => {
                    return Ok(HandshakeResult::CancelRequested {
                        pid: process_id,
                        secret_key,
                    });
                }
            }
        }
    }

    /// Emits the acceptance sequence: AuthenticationOk, parameter statuses,
    /// BackendKeyData, ReadyForQuery.
    async fn send_startup_info(&mut self, secret_key: i32) -> Result<(), ConnectionError> {
        self.framed.feed(BackendMessage::AuthenticationOk).await?;

        for (name, value) in SERVER_PARAMETERS {
            self.framed
                .feed(BackendMessage::ParameterStatus {
                    name: name.to_string(),
                    value: value.to_string(),
                })
                .await?;
        }

        self.framed
            .feed(BackendMessage::BackendKeyData {
                process_id: self.pid,
                secret_key,
            })
            .await?;

        self.framed
            .feed(BackendMessage::ReadyForQuery {
                status: TransactionStatus::Idle,
            })
            .await?;

        self.framed.flush().await?;
        Ok(())
    }
}
