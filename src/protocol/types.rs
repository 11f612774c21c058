//! Protocol-level constants: SQLSTATE codes, type OIDs, field codes.

use crate::catalog::ColumnType;

/// SQLSTATE codes used in error responses.
///
/// Reference: <https://www.postgresql.org/docs/current/errcodes-appendix.html>
pub mod sql_state {
    /// 42601 - syntax error
    pub const SYNTAX_ERROR: &str = "42601";
    /// 42P01 - undefined table
    pub const UNDEFINED_TABLE: &str = "42P01";
    /// 42P07 - duplicate table
    pub const DUPLICATE_TABLE: &str = "42P07";
    /// 0A000 - feature not supported
    pub const FEATURE_NOT_SUPPORTED: &str = "0A000";
    /// 22P02 - invalid text representation
    pub const INVALID_TEXT_REPRESENTATION: &str = "22P02";
    /// 22026 - string data length mismatch
    pub const STRING_DATA_LENGTH_MISMATCH: &str = "22026";
    /// 08P01 - protocol violation
    pub const PROTOCOL_VIOLATION: &str = "08P01";
    /// XX000 - internal error
    pub const INTERNAL_ERROR: &str = "XX000";
}

/// PostgreSQL type OIDs for the supported column types.
pub mod type_oid {
    /// BOOLEAN
    pub const BOOL: i32 = 16;
    /// INTEGER
    pub const INT4: i32 = 23;
    /// TEXT
    pub const TEXT: i32 = 25;
    /// VARCHAR
    pub const VARCHAR: i32 = 1043;
}

/// Returns the wire type OID for a column type.
pub fn column_type_oid(ty: ColumnType) -> i32 {
    match ty {
        ColumnType::Integer => type_oid::INT4,
        ColumnType::Text => type_oid::TEXT,
        ColumnType::Varchar => type_oid::VARCHAR,
        ColumnType::Boolean => type_oid::BOOL,
    }
}

/// Returns the wire type size for a column type (-1 = variable length).
pub fn column_type_size(ty: ColumnType) -> i16 {
    match ty {
        ColumnType::Integer => 4,
        ColumnType::Text | ColumnType::Varchar => -1,
        ColumnType::Boolean => 1,
    }
}

/// Field format codes in RowDescription and DataRow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatCode {
    Text,
    Binary,
}

impl FormatCode {
    /// Wire representation.
    pub fn as_i16(self) -> i16 {
        match self {
            FormatCode::Text => 0,
            FormatCode::Binary => 1,
        }
    }
}

/// Field type codes inside ErrorResponse messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorFieldCode {
    /// 'S' - localized severity
    Severity,
    /// 'V' - non-localized severity
    SeverityNonLocalized,
    /// 'C' - SQLSTATE code
    SqlState,
    /// 'M' - primary message
    Message,
    /// 'D' - detail
    Detail,
    /// 'H' - hint
    Hint,
    /// 'P' - cursor position (1-based)
    Position,
    /// 't' - table name
    Table,
    /// 'c' - column name
    Column,
}

impl ErrorFieldCode {
    /// Wire representation.
    pub fn as_u8(self) -> u8 {
        match self {
            ErrorFieldCode::Severity => b'S',
            ErrorFieldCode::SeverityNonLocalized => b'V',
            ErrorFieldCode::SqlState => b'C',
            ErrorFieldCode::Message => b'M',
            ErrorFieldCode::Detail => b'D',
            ErrorFieldCode::Hint => b'H',
            ErrorFieldCode::Position => b'P',
            ErrorFieldCode::Table => b't',
            ErrorFieldCode::Column => b'c',
        }
    }
}
