//! Messages sent by the backend (server) to the client.

use std::io;

use bytes::{BufMut, BytesMut};
use tokio_util::codec::Encoder;

use super::codec::{PostgresCodec, StartupCodec, put_cstring};
use super::types::{ErrorFieldCode, FormatCode};

/// Backend messages for the simple-query flow.
#[derive(Debug)]
pub enum BackendMessage {
    /// 'R' - AuthenticationOk
    AuthenticationOk,
    /// 'K' - Backend key data for cancel requests
    BackendKeyData { process_id: i32, secret_key: i32 },
    /// 'S' - Parameter status notification
    ParameterStatus { name: String, value: String },
    /// 'Z' - Ready for query
    ReadyForQuery { status: TransactionStatus },
    /// 'E' - Error response
    ErrorResponse { fields: Vec<ErrorField> },
    /// 'T' - Row description (column metadata)
    RowDescription { fields: Vec<FieldDescription> },
    /// 'D' - Data row
    DataRow { values: Vec<DataValue> },
    /// 'C' - Command complete
    CommandComplete { tag: String },
}

impl BackendMessage {
    /// Returns the message type byte.
    fn ty(&self) -> u8 {
        match self {
            BackendMessage::AuthenticationOk => b'R',
            BackendMessage::BackendKeyData { .. } => b'K',
            BackendMessage::ParameterStatus { .. } => b'S',
            BackendMessage::ReadyForQuery { .. } => b'Z',
            BackendMessage::ErrorResponse { .. } => b'E',
            BackendMessage::RowDescription { .. } => b'T',
            BackendMessage::DataRow { .. } => b'D',
            BackendMessage::CommandComplete { .. } => b'C',
        }
    }

    /// Encodes this message, back-patching the length prefix.
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.put_u8(self.ty());

        let len_pos = dst.len();
        dst.put_i32(0); // placeholder

        self.encode_body(dst);

        let total_len = (dst.len() - len_pos) as i32;
        dst[len_pos..][..4].copy_from_slice(&total_len.to_be_bytes());
    }

    fn encode_body(&self, dst: &mut BytesMut) {
        match self {
            BackendMessage::AuthenticationOk => {
                dst.put_i32(0); // auth type 0 = Ok
            }
            BackendMessage::BackendKeyData {
                process_id,
                secret_key,
            } => {
                dst.put_i32(*process_id);
                dst.put_i32(*secret_key);
            }
            BackendMessage::ParameterStatus { name, value } => {
                put_cstring(dst, name);
                put_cstring(dst, value);
            }
            BackendMessage::ReadyForQuery { status } => {
                dst.put_u8(status.as_byte());
            }
            BackendMessage::ErrorResponse { fields } => {
                for field in fields {
                    field.encode(dst);
                }
                dst.put_u8(0); // terminator
            }
            BackendMessage::RowDescription { fields } => {
                dst.put_i16(fields.len() as i16);
                for field in fields {
                    field.encode(dst);
                }
            }
            BackendMessage::DataRow { values } => {
                dst.put_i16(values.len() as i16);
                for value in values {
                    value.encode(dst);
                }
            }
            BackendMessage::CommandComplete { tag } => {
                put_cstring(dst, tag);
            }
        }
    }
}

impl Encoder<BackendMessage> for StartupCodec {
    type Error = io::Error;

    fn encode(&mut self, msg: BackendMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        msg.encode(dst);
        Ok(())
    }
}

impl Encoder<BackendMessage> for PostgresCodec {
    type Error = io::Error;

    fn encode(&mut self, msg: BackendMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        msg.encode(dst);
        Ok(())
    }
}

/// Transaction status indicator for ReadyForQuery.
///
/// This engine has no transactions, so sessions always report `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    /// 'I' - idle (not in a transaction block)
    Idle,
}

impl TransactionStatus {
    fn as_byte(self) -> u8 {
        match self {
            TransactionStatus::Idle => b'I',
        }
    }
}

/// One field of an ErrorResponse.
#[derive(Debug)]
pub struct ErrorField {
    pub code: ErrorFieldCode,
    pub value: String,
}

impl ErrorField {
    /// Creates a new error field.
    pub fn new(code: ErrorFieldCode, value: impl Into<String>) -> Self {
        Self {
            code,
            value: value.into(),
        }
    }

    fn encode(&self, dst: &mut BytesMut) {
        dst.put_u8(self.code.as_u8());
        put_cstring(dst, &self.value);
    }
}

/// Structured error information, converted to an ErrorResponse at the wire.
#[derive(Debug, Clone)]
pub struct ErrorInfo {
    /// Severity level (ERROR or FATAL here).
    pub severity: &'static str,
    /// SQLSTATE code.
    pub code: &'static str,
    /// Primary human-readable message.
    pub message: String,
    /// Optional detail line.
    pub detail: Option<String>,
    /// Optional hint line.
    pub hint: Option<String>,
    /// Offending table, if known.
    pub table: Option<String>,
    /// Offending column, if known.
    pub column: Option<String>,
    /// Error cursor position in the query string (1-based).
    pub position: Option<usize>,
}

impl ErrorInfo {
    /// Creates an error with severity `ERROR`.
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: "ERROR",
            code,
            message: message.into(),
            detail: None,
            hint: None,
            table: None,
            column: None,
            position: None,
        }
    }

    /// Creates an error with severity `FATAL`.
    pub fn fatal(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: "FATAL",
            ..Self::new(code, message)
        }
    }

    /// Returns true if the session must close after sending this error.
    pub fn is_fatal(&self) -> bool {
        self.severity == "FATAL"
    }

    /// Attaches the offending table name.
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Attaches the offending column name.
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    /// Attaches a cursor position (1-based).
    pub fn with_position(mut self, position: usize) -> Self {
        self.position = Some(position);
        self
    }
}

impl From<ErrorInfo> for BackendMessage {
    fn from(info: ErrorInfo) -> Self {
        let mut fields = vec![
            ErrorField::new(ErrorFieldCode::Severity, info.severity),
            ErrorField::new(ErrorFieldCode::SeverityNonLocalized, info.severity),
            ErrorField::new(ErrorFieldCode::SqlState, info.code),
            ErrorField::new(ErrorFieldCode::Message, info.message),
        ];
        if let Some(detail) = info.detail {
            fields.push(ErrorField::new(ErrorFieldCode::Detail, detail));
        }
        if let Some(hint) = info.hint {
            fields.push(ErrorField::new(ErrorFieldCode::Hint, hint));
        }
        if let Some(table) = info.table {
            fields.push(ErrorField::new(ErrorFieldCode::Table, table));
        }
        if let Some(column) = info.column {
            fields.push(ErrorField::new(ErrorFieldCode::Column, column));
        }
        if let Some(position) = info.position {
            fields.push(ErrorField::new(ErrorFieldCode::Position, position.to_string()));
        }
        BackendMessage::ErrorResponse { fields }
    }
}

/// One column value of a DataRow, already rendered to its text form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataValue {
    /// SQL NULL, encoded as length -1.
    Null,
    /// Non-NULL value bytes.
    Data(Vec<u8>),
}

impl DataValue {
    /// Builds a data value from rendered text (`None` = NULL).
    pub fn from_text(text: Option<String>) -> Self {
        match text {
            Some(s) => DataValue::Data(s.into_bytes()),
            None => DataValue::Null,
        }
    }

    fn encode(&self, dst: &mut BytesMut) {
        match self {
            DataValue::Null => dst.put_i32(-1),
            DataValue::Data(bytes) => {
                dst.put_i32(bytes.len() as i32);
                dst.put_slice(bytes);
            }
        }
    }
}

/// Field description inside RowDescription.
#[derive(Debug, Clone)]
pub struct FieldDescription {
    /// Column name.
    pub name: String,
    /// Table OID (0: not derived from a catalog table).
    pub table_oid: i32,
    /// Column attribute number (0: not derived from a catalog table).
    pub column_id: i16,
    /// Data type OID.
    pub type_oid: i32,
    /// Data type size (-1 for variable length).
    pub type_size: i16,
    /// Type modifier (-1 if not applicable).
    pub type_modifier: i32,
    /// Format code (always text here).
    pub format_code: FormatCode,
}

impl FieldDescription {
    fn encode(&self, dst: &mut BytesMut) {
        put_cstring(dst, &self.name);
        dst.put_i32(self.table_oid);
        dst.put_i16(self.column_id);
        dst.put_i32(self.type_oid);
        dst.put_i16(self.type_size);
        dst.put_i32(self.type_modifier);
        dst.put_i16(self.format_code.as_i16());
    }
}
