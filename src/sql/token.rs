//! SQL token types.

use super::error::Span;
use crate::storage::Value;

/// A SQL token with its span in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// The token kind.
    pub kind: TokenKind,
    /// The span of this token in the source.
    pub span: Span,
}

impl Token {
    /// Creates a new token.
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Returns true if this is an end-of-input token.
    pub fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }
}

/// The kind of a SQL token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Integer literal, decoded as signed 64-bit.
    Integer(i64),
    /// Single-quoted string literal.
    String(String),
    /// Boolean literal (`TRUE`/`FALSE`, case-insensitive).
    Boolean(bool),
    /// Unquoted identifier, case-preserved.
    Identifier(String),
    /// Keyword, normalized to uppercase.
    Keyword(Keyword),

    // Operators
    /// =
    Eq,
    /// !=
    Neq,
    /// <
    Lt,
    /// <=
    LtEq,
    /// >
    Gt,
    /// >=
    GtEq,
    /// *
    Asterisk,

    // Punctuation
    /// ,
    Comma,
    /// (
    LParen,
    /// )
    RParen,
    /// ;
    Semicolon,

    /// End of input.
    Eof,
}

impl TokenKind {
    /// Returns the display name for error messages.
    pub fn display_name(&self) -> String {
        match self {
            TokenKind::Integer(n) => format!("integer '{n}'"),
            TokenKind::String(s) => format!("string '{s}'"),
            TokenKind::Boolean(b) => format!("boolean '{b}'"),
            TokenKind::Identifier(s) => format!("identifier '{s}'"),
            TokenKind::Keyword(kw) => format!("keyword '{}'", kw.as_str()),
            TokenKind::Eq => "'='".to_string(),
            TokenKind::Neq => "'!='".to_string(),
            TokenKind::Lt => "'<'".to_string(),
            TokenKind::LtEq => "'<='".to_string(),
            TokenKind::Gt => "'>'".to_string(),
            TokenKind::GtEq => "'>='".to_string(),
            TokenKind::Asterisk => "'*'".to_string(),
            TokenKind::Comma => "','".to_string(),
            TokenKind::LParen => "'('".to_string(),
            TokenKind::RParen => "')'".to_string(),
            TokenKind::Semicolon => "';'".to_string(),
            TokenKind::Eof => "end of input".to_string(),
        }
    }

    /// Converts a literal token to its runtime value, if it is one.
    pub fn literal_value(&self) -> Option<Value> {
        match self {
            TokenKind::Integer(n) => Some(Value::Int64(*n)),
            TokenKind::String(s) => Some(Value::Text(s.clone())),
            TokenKind::Boolean(b) => Some(Value::Bool(*b)),
            _ => None,
        }
    }
}

/// SQL keywords, matched case-insensitively and normalized to uppercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Select,
    From,
    Where,
    And,
    Or,
    Insert,
    Into,
    Values,
    Create,
    Table,
    Update,
    Set,
    Integer,
    Varchar,
    Text,
    Boolean,
}

impl Keyword {
    /// Returns the uppercase string form of this keyword.
    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::Select => "SELECT",
            Keyword::From => "FROM",
            Keyword::Where => "WHERE",
            Keyword::And => "AND",
            Keyword::Or => "OR",
            Keyword::Insert => "INSERT",
            Keyword::Into => "INTO",
            Keyword::Values => "VALUES",
            Keyword::Create => "CREATE",
            Keyword::Table => "TABLE",
            Keyword::Update => "UPDATE",
            Keyword::Set => "SET",
            Keyword::Integer => "INTEGER",
            Keyword::Varchar => "VARCHAR",
            Keyword::Text => "TEXT",
            Keyword::Boolean => "BOOLEAN",
        }
    }

    /// Attempts to parse a keyword from a string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "SELECT" => Some(Keyword::Select),
            "FROM" => Some(Keyword::From),
            "WHERE" => Some(Keyword::Where),
            "AND" => Some(Keyword::And),
            "OR" => Some(Keyword::Or),
            "INSERT" => Some(Keyword::Insert),
            "INTO" => Some(Keyword::Into),
            "VALUES" => Some(Keyword::Values),
            "CREATE" => Some(Keyword::Create),
            "TABLE" => Some(Keyword::Table),
            "UPDATE" => Some(Keyword::Update),
            "SET" => Some(Keyword::Set),
            "INTEGER" => Some(Keyword::Integer),
            "VARCHAR" => Some(Keyword::Varchar),
            "TEXT" => Some(Keyword::Text),
            "BOOLEAN" => Some(Keyword::Boolean),
            _ => None,
        }
    }
}
