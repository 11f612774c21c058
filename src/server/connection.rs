//! Query-phase session loop.
//!
//! One `Connection` serves one client socket, strictly sequentially: read a
//! frame, parse, execute, stream the response, repeat. A read timeout while
//! idle is benign (the loop just waits again); after any non-fatal error the
//! session emits `ReadyForQuery` and continues; a FATAL error or a malformed
//! frame closes the connection.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::Framed;

use crate::executor::{Executor, ExecutorError, OutputColumn, QueryOutcome};
use crate::heap::TableStore;
use crate::protocol::{
    BackendMessage, DataValue, ErrorInfo, FieldDescription, FormatCode, FrontendMessage,
    PostgresCodec, ProtocolError, TransactionStatus, sql_state, types,
};
use crate::storage::Value;

/// Errors that terminate a connection.
#[derive(Debug)]
pub enum ConnectionError {
    /// Wire protocol error.
    Protocol(ProtocolError),
    /// Socket I/O error.
    Io(std::io::Error),
    /// A startup-phase read deadline elapsed.
    Timeout,
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionError::Protocol(e) => write!(f, "protocol error: {}", e),
            ConnectionError::Io(e) => write!(f, "I/O error: {}", e),
            ConnectionError::Timeout => write!(f, "read timed out"),
        }
    }
}

impl std::error::Error for ConnectionError {}

impl From<ProtocolError> for ConnectionError {
    fn from(e: ProtocolError) -> Self {
        match e {
            ProtocolError::Io(io) => ConnectionError::Io(io),
            other => ConnectionError::Protocol(other),
        }
    }
}

impl From<std::io::Error> for ConnectionError {
    fn from(e: std::io::Error) -> Self {
        ConnectionError::Io(e)
    }
}

/// One client session in the query phase.
pub struct Connection<S> {
    framed: Framed<TcpStream, PostgresCodec>,
    pid: i32,
    executor: Arc<Executor<S>>,
    query_timeout: Duration,
}

impl<S: TableStore> Connection<S> {
    /// Wraps a post-handshake stream.
    pub fn new(
        framed: Framed<TcpStream, PostgresCodec>,
        pid: i32,
        executor: Arc<Executor<S>>,
        query_timeout: Duration,
    ) -> Self {
        Self {
            framed,
            pid,
            executor,
            query_timeout,
        }
    }

    /// Runs the session until the client terminates or a fatal error occurs.
    pub async fn run(&mut self) -> Result<(), ConnectionError> {
        loop {
            let next = match timeout(self.query_timeout, self.framed.next()).await {
                // Idle timeout is not an error; wait for the next query.
                Err(_elapsed) => continue,
                Ok(next) => next,
            };

            let message = match next {
                Some(Ok(message)) => message,
                Some(Err(e)) => {
                    // Malformed frame: emit the FATAL error, then close.
                    let info = ErrorInfo::fatal(sql_state::PROTOCOL_VIOLATION, e.to_string());
                    let _ = self.framed.send(BackendMessage::from(info)).await;
                    return Err(e.into());
                }
                None => return Ok(()), // client disconnected
            };

            match message {
                FrontendMessage::Terminate => return Ok(()),
                FrontendMessage::Unsupported(ty) => {
                    let info = ErrorInfo::new(
                        sql_state::FEATURE_NOT_SUPPORTED,
                        format!("message type '{}' is not supported", ty as char),
                    );
                    self.framed.feed(BackendMessage::from(info)).await?;
                    self.ready_for_query().await?;
                }
                FrontendMessage::Query(sql) => {
                    self.handle_query(&sql).await?;
                }
            }
        }
    }

    async fn handle_query(&mut self, sql: &str) -> Result<(), ConnectionError> {
        match self.executor.execute(sql).await {
            Ok(QueryOutcome::Rows { columns, rows }) => {
                self.send_row_description(&columns).await?;
                let count = rows.len();
                for row in rows {
                    self.send_data_row(row).await?;
                }
                self.framed
                    .feed(BackendMessage::CommandComplete {
                        tag: format!("SELECT {}", count),
                    })
                    .await?;
            }
            Ok(QueryOutcome::Command { tag }) => {
                self.framed
                    .feed(BackendMessage::CommandComplete { tag })
                    .await?;
            }
            Err(e) => {
                eprintln!("(pid={}) query error: {}", self.pid, e);
                self.framed
                    .feed(BackendMessage::from(error_info(&e)))
                    .await?;
            }
        }
        self.ready_for_query().await
    }

    async fn send_row_description(
        &mut self,
        columns: &[OutputColumn],
    ) -> Result<(), ConnectionError> {
        let fields = columns
            .iter()
            .map(|c| FieldDescription {
                name: c.name.clone(),
                table_oid: 0,
                column_id: 0,
                type_oid: types::column_type_oid(c.ty),
                type_size: types::column_type_size(c.ty),
                type_modifier: -1,
                format_code: FormatCode::Text,
            })
            .collect();
        self.framed
            .feed(BackendMessage::RowDescription { fields })
            .await?;
        Ok(())
    }

    async fn send_data_row(&mut self, row: Vec<Value>) -> Result<(), ConnectionError> {
        let values = row
            .iter()
            .map(|v| DataValue::from_text(v.render_text()))
            .collect();
        self.framed.feed(BackendMessage::DataRow { values }).await?;
        Ok(())
    }

    async fn ready_for_query(&mut self) -> Result<(), ConnectionError> {
        self.framed
            .feed(BackendMessage::ReadyForQuery {
                status: TransactionStatus::Idle,
            })
            .await?;
        self.framed.flush().await?;
        Ok(())
    }
}

/// Maps executor errors to their wire representation.
///
/// This is the one place error kinds meet SQLSTATE codes; everything below
/// the session keeps its own typed enums.
pub fn error_info(error: &ExecutorError) -> ErrorInfo {
    match error {
        ExecutorError::TableNotFound(table) => {
            ErrorInfo::new(sql_state::UNDEFINED_TABLE, error.to_string()).with_table(table.clone())
        }
        ExecutorError::TableAlreadyExists(table) => {
            ErrorInfo::new(sql_state::DUPLICATE_TABLE, error.to_string()).with_table(table.clone())
        }
        ExecutorError::Syntax(e) => {
            ErrorInfo::new(sql_state::SYNTAX_ERROR, e.to_string()).with_position(e.position())
        }
        ExecutorError::UnsupportedFeature(_) => {
            ErrorInfo::new(sql_state::FEATURE_NOT_SUPPORTED, error.to_string())
        }
        ExecutorError::TypeMismatch { column, .. } => {
            ErrorInfo::new(sql_state::INVALID_TEXT_REPRESENTATION, error.to_string())
                .with_column(column.clone())
        }
        ExecutorError::ColumnCountMismatch { .. } => {
            ErrorInfo::new(sql_state::STRING_DATA_LENGTH_MISMATCH, error.to_string())
        }
        ExecutorError::ValueTooLong { column, .. } => {
            ErrorInfo::new(sql_state::STRING_DATA_LENGTH_MISMATCH, error.to_string())
                .with_column(column.clone())
        }
        ExecutorError::Internal(_) => ErrorInfo::new(sql_state::INTERNAL_ERROR, error.to_string()),
    }
}
