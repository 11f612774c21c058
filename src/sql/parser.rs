//! Recursive-descent SQL parser.
//!
//! Statements are dispatched on their leading keyword; WHERE expressions are
//! parsed by precedence climbing with `OR` binding loosest, then `AND`, then
//! the comparison operators. Comparisons do not chain: `a = b = c` is a
//! parse error rather than a boolean cascade.

use crate::catalog::{ColumnDef, ColumnType, DEFAULT_VARCHAR_SIZE};
use crate::storage::Value;

use super::ast::{BinaryOp, Expr, SelectItem, Statement};
use super::error::{Span, SyntaxError};
use super::lexer::Lexer;
use super::token::{Keyword, Token, TokenKind};

/// SQL parser over a pre-tokenized statement.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    /// Tokenizes the input and prepares a parser.
    ///
    /// # Errors
    ///
    /// Returns the lexer's error for invalid characters or unterminated
    /// strings.
    pub fn new(input: &str) -> Result<Self, SyntaxError> {
        let tokens = Lexer::new(input).tokenize()?;
        Ok(Self { tokens, pos: 0 })
    }

    /// Parses one statement.
    ///
    /// A trailing semicolon is tolerated; anything after it is an error
    /// scoped to the production that just ended.
    pub fn parse(&mut self) -> Result<Statement, SyntaxError> {
        while self.consume(&TokenKind::Semicolon) {}
        if self.is_eof() {
            return Err(SyntaxError::new("Empty query", Span::at(0)));
        }

        match self.current().kind.clone() {
            TokenKind::Keyword(Keyword::Select) => {
                self.advance();
                self.parse_select()
            }
            TokenKind::Keyword(Keyword::Insert) => {
                self.advance();
                self.parse_insert()
            }
            TokenKind::Keyword(Keyword::Create) => {
                self.advance();
                self.parse_create_table()
            }
            TokenKind::Keyword(Keyword::Update) => {
                self.advance();
                self.parse_update()
            }
            other => Err(self.error_here(format!(
                "Expected statement keyword, found {}",
                other.display_name()
            ))),
        }
    }

    // === Statements ===

    fn parse_select(&mut self) -> Result<Statement, SyntaxError> {
        let columns = self.parse_select_list()?;

        if !self.consume_keyword(Keyword::From) {
            self.expect_end("after SELECT list")?;
            return Ok(Statement::Select {
                columns,
                from: None,
                where_clause: None,
            });
        }

        let from = self.parse_table_name("FROM")?;

        let where_clause = if self.consume_keyword(Keyword::Where) {
            let expr = self.parse_expr()?;
            self.expect_end("after WHERE clause")?;
            Some(expr)
        } else {
            self.expect_end("after table name")?;
            None
        };

        Ok(Statement::Select {
            columns,
            from: Some(from),
            where_clause,
        })
    }

    fn parse_select_list(&mut self) -> Result<Vec<SelectItem>, SyntaxError> {
        let mut items = vec![self.parse_select_item()?];
        while self.consume(&TokenKind::Comma) {
            items.push(self.parse_select_item()?);
        }
        Ok(items)
    }

    fn parse_select_item(&mut self) -> Result<SelectItem, SyntaxError> {
        let token = self.current().clone();
        if let Some(value) = token.kind.literal_value() {
            self.advance();
            return Ok(SelectItem::Literal(value));
        }
        match token.kind {
            TokenKind::Asterisk => {
                self.advance();
                Ok(SelectItem::Wildcard)
            }
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(SelectItem::Column(name))
            }
            other => Err(self.error_here(format!(
                "Expected column, literal, or * in SELECT list, found {}",
                other.display_name()
            ))),
        }
    }

    fn parse_insert(&mut self) -> Result<Statement, SyntaxError> {
        self.expect_keyword(Keyword::Into, "Expected INTO after INSERT")?;
        let table = self.parse_table_name("INTO")?;
        self.expect_keyword(Keyword::Values, "Expected VALUES after table name")?;
        self.expect(&TokenKind::LParen, "Expected ( after VALUES")?;

        if self.check(&TokenKind::RParen) {
            return Err(self.error_here("Expected at least one value in VALUES list"));
        }

        let mut values = vec![self.parse_literal("in VALUES list")?];
        while self.consume(&TokenKind::Comma) {
            values.push(self.parse_literal("in VALUES list")?);
        }
        self.expect(&TokenKind::RParen, "Expected ) after VALUES list")?;
        self.expect_end("after VALUES list")?;

        Ok(Statement::Insert { table, values })
    }

    fn parse_create_table(&mut self) -> Result<Statement, SyntaxError> {
        self.expect_keyword(Keyword::Table, "Expected TABLE after CREATE")?;
        let table = self.parse_table_name("CREATE TABLE")?;

        let columns = if self.consume(&TokenKind::LParen) {
            let mut columns = vec![self.parse_column_def()?];
            while self.consume(&TokenKind::Comma) {
                columns.push(self.parse_column_def()?);
            }
            self.expect(&TokenKind::RParen, "Expected ) after column definitions")?;
            self.expect_end("after column definitions")?;
            columns
        } else {
            self.expect_end("after table name")?;
            Vec::new()
        };

        Ok(Statement::CreateTable { table, columns })
    }

    fn parse_column_def(&mut self) -> Result<ColumnDef, SyntaxError> {
        let name = match self.current().kind.clone() {
            TokenKind::Identifier(name) => {
                self.advance();
                name
            }
            other => {
                return Err(self.error_here(format!(
                    "Expected column name, found {}",
                    other.display_name()
                )));
            }
        };

        let ty = match self.current().kind.clone() {
            TokenKind::Keyword(Keyword::Integer) => {
                self.advance();
                ColumnType::Integer
            }
            TokenKind::Keyword(Keyword::Text) => {
                self.advance();
                ColumnType::Text
            }
            TokenKind::Keyword(Keyword::Boolean) => {
                self.advance();
                ColumnType::Boolean
            }
            TokenKind::Keyword(Keyword::Varchar) => {
                self.advance();
                ColumnType::Varchar
            }
            other => {
                return Err(self.error_here(format!(
                    "Expected column type for \"{}\", found {}",
                    name,
                    other.display_name()
                )));
            }
        };

        let size = if ty == ColumnType::Varchar && self.consume(&TokenKind::LParen) {
            let size = match self.current().kind {
                TokenKind::Integer(n) if n > 0 && n <= u32::MAX as i64 => {
                    self.advance();
                    n as u32
                }
                _ => return Err(self.error_here("Expected length in VARCHAR(n)")),
            };
            self.expect(&TokenKind::RParen, "Expected ) after VARCHAR length")?;
            Some(size)
        } else if ty == ColumnType::Varchar {
            Some(DEFAULT_VARCHAR_SIZE)
        } else {
            None
        };

        Ok(ColumnDef::new(name, ty, size))
    }

    fn parse_update(&mut self) -> Result<Statement, SyntaxError> {
        let table = self.parse_table_name("UPDATE")?;
        self.expect_keyword(Keyword::Set, "Expected SET after table name")?;

        let column = match self.current().kind.clone() {
            TokenKind::Identifier(name) => {
                self.advance();
                name
            }
            other => {
                return Err(self.error_here(format!(
                    "Expected column name after SET, found {}",
                    other.display_name()
                )));
            }
        };
        self.expect(&TokenKind::Eq, "Expected = after column name")?;
        let value = self.parse_literal("in SET clause")?;

        let where_clause = if self.consume_keyword(Keyword::Where) {
            let expr = self.parse_expr()?;
            self.expect_end("after WHERE clause")?;
            Some(expr)
        } else {
            self.expect_end("after SET clause")?;
            None
        };

        Ok(Statement::Update {
            table,
            column,
            value,
            where_clause,
        })
    }

    // === Expressions ===

    fn parse_expr(&mut self) -> Result<Expr, SyntaxError> {
        self.parse_binary(1)
    }

    /// Precedence climbing over the binary operators.
    fn parse_binary(&mut self, min_prec: u8) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_primary()?;

        loop {
            let Some(op) = self.peek_binary_op() else {
                break;
            };
            if op.precedence() < min_prec {
                break;
            }
            self.advance();

            let right = self.parse_binary(op.precedence() + 1)?;

            if op.is_comparison()
                && let Some(next) = self.peek_binary_op()
                && next.is_comparison()
            {
                return Err(self.error_here("Comparison operators cannot be chained"));
            }

            left = Expr::BinaryOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_primary(&mut self) -> Result<Expr, SyntaxError> {
        let token = self.current().clone();
        if let Some(value) = token.kind.literal_value() {
            self.advance();
            return Ok(Expr::Literal(value));
        }
        match token.kind {
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(Expr::Column(name))
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(&TokenKind::RParen, "Expected ) after expression")?;
                Ok(expr)
            }
            other => Err(self.error_here(format!(
                "Expected expression, found {}",
                other.display_name()
            ))),
        }
    }

    fn peek_binary_op(&self) -> Option<BinaryOp> {
        match self.current().kind {
            TokenKind::Keyword(Keyword::Or) => Some(BinaryOp::Or),
            TokenKind::Keyword(Keyword::And) => Some(BinaryOp::And),
            TokenKind::Eq => Some(BinaryOp::Eq),
            TokenKind::Neq => Some(BinaryOp::Neq),
            TokenKind::Lt => Some(BinaryOp::Lt),
            TokenKind::Gt => Some(BinaryOp::Gt),
            TokenKind::LtEq => Some(BinaryOp::LtEq),
            TokenKind::GtEq => Some(BinaryOp::GtEq),
            _ => None,
        }
    }

    // === Helpers ===

    fn parse_table_name(&mut self, context: &str) -> Result<String, SyntaxError> {
        match self.current().kind.clone() {
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            TokenKind::Integer(_) => Err(self.error_here("Table name cannot be a number")),
            TokenKind::String(_) => Err(self.error_here("Table name cannot be a string literal")),
            other => Err(self.error_here(format!(
                "Expected table name after {}, found {}",
                context,
                other.display_name()
            ))),
        }
    }

    fn parse_literal(&mut self, context: &str) -> Result<Value, SyntaxError> {
        let token = self.current().clone();
        match token.kind.literal_value() {
            Some(value) => {
                self.advance();
                Ok(value)
            }
            None => Err(self.error_here(format!(
                "Expected literal value {}, found {}",
                context,
                token.kind.display_name()
            ))),
        }
    }

    /// Consumes optional trailing semicolons, then requires end of input.
    fn expect_end(&mut self, scope: &str) -> Result<(), SyntaxError> {
        while self.consume(&TokenKind::Semicolon) {}
        if self.is_eof() {
            Ok(())
        } else {
            Err(self.error_here(format!(
                "Unexpected token {} {}",
                self.current().kind.display_name(),
                scope
            )))
        }
    }

    fn current(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn is_eof(&self) -> bool {
        self.current().is_eof()
    }

    fn advance(&mut self) {
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.current().kind == kind
    }

    fn consume(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume_keyword(&mut self, keyword: Keyword) -> bool {
        self.consume(&TokenKind::Keyword(keyword))
    }

    fn expect(&mut self, kind: &TokenKind, message: &str) -> Result<(), SyntaxError> {
        if self.consume(kind) {
            Ok(())
        } else {
            Err(self.error_here(format!(
                "{}, found {}",
                message,
                self.current().kind.display_name()
            )))
        }
    }

    fn expect_keyword(&mut self, keyword: Keyword, message: &str) -> Result<(), SyntaxError> {
        self.expect(&TokenKind::Keyword(keyword), message)
    }

    fn error_here(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(message, self.current().span)
    }
}
