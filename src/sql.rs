//! SQL front end: tokenizer, AST, and recursive-descent parser.

pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod token;

pub use ast::{BinaryOp, Expr, SelectItem, Statement};
pub use error::{Span, SyntaxError};
pub use lexer::Lexer;
pub use parser::Parser;
pub use token::{Keyword, Token, TokenKind};

/// Parses a single SQL statement.
///
/// This is the front door for the executor and the wire session. Parsing is
/// a pure function of the input string.
pub fn parse(input: &str) -> Result<Statement, SyntaxError> {
    Parser::new(input)?.parse()
}
