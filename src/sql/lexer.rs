//! SQL tokenizer.
//!
//! The [`Lexer`] converts a SQL string into a stream of [`Token`]s. Unlike
//! the parser it fails fast: the first invalid character or unterminated
//! string aborts tokenization.

use super::error::{Span, SyntaxError};
use super::token::{Keyword, Token, TokenKind};

/// SQL tokenizer over a borrowed input string.
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given input string.
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    /// Tokenizes the entire input.
    ///
    /// The returned vector always ends with an EOF token.
    pub fn tokenize(mut self) -> Result<Vec<Token>, SyntaxError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let is_eof = token.is_eof();
            tokens.push(token);
            if is_eof {
                return Ok(tokens);
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, SyntaxError> {
        self.skip_whitespace();

        let start = self.pos;
        let Some(ch) = self.current_char() else {
            return Ok(Token::new(TokenKind::Eof, Span::at(start)));
        };

        if ch == '\'' {
            return self.scan_string_literal();
        }
        if ch.is_ascii_digit() {
            return self.scan_number();
        }
        if is_ident_start(ch) {
            return Ok(self.scan_identifier_or_keyword());
        }
        self.scan_operator_or_punctuation()
    }

    fn current_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance(&mut self) {
        if let Some(ch) = self.current_char() {
            self.pos += ch.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char() {
            if matches!(ch, ' ' | '\t' | '\n' | '\r') {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn scan_string_literal(&mut self) -> Result<Token, SyntaxError> {
        let start = self.pos;
        self.advance(); // consume opening quote

        let mut value = String::new();
        loop {
            match self.current_char() {
                None => {
                    return Err(SyntaxError::new(
                        "Unterminated string literal",
                        Span::new(start, self.pos),
                    ));
                }
                Some('\'') => {
                    self.advance();
                    return Ok(Token::new(
                        TokenKind::String(value),
                        Span::new(start, self.pos),
                    ));
                }
                Some(ch) => {
                    value.push(ch);
                    self.advance();
                }
            }
        }
    }

    fn scan_number(&mut self) -> Result<Token, SyntaxError> {
        let start = self.pos;
        while let Some(ch) = self.current_char() {
            if ch.is_ascii_digit() {
                self.advance();
            } else {
                break;
            }
        }

        let span = Span::new(start, self.pos);
        let text = &self.input[start..self.pos];
        match text.parse::<i64>() {
            Ok(n) => Ok(Token::new(TokenKind::Integer(n), span)),
            Err(_) => Err(SyntaxError::new(
                format!("Integer literal out of range: {}", text),
                span,
            )),
        }
    }

    fn scan_identifier_or_keyword(&mut self) -> Token {
        let start = self.pos;
        while let Some(ch) = self.current_char() {
            if is_ident_continue(ch) {
                self.advance();
            } else {
                break;
            }
        }

        let text = &self.input[start..self.pos];
        let span = Span::new(start, self.pos);

        // Boolean literals before keyword lookup: TRUE/FALSE are values, not
        // keywords.
        if text.eq_ignore_ascii_case("true") {
            return Token::new(TokenKind::Boolean(true), span);
        }
        if text.eq_ignore_ascii_case("false") {
            return Token::new(TokenKind::Boolean(false), span);
        }

        match Keyword::parse(text) {
            Some(keyword) => Token::new(TokenKind::Keyword(keyword), span),
            None => Token::new(TokenKind::Identifier(text.to_string()), span),
        }
    }

    fn scan_operator_or_punctuation(&mut self) -> Result<Token, SyntaxError> {
        let start = self.pos;

        if self.input.len() >= self.pos + 2 && self.input.is_char_boundary(self.pos + 2) {
            let two = &self.input[self.pos..self.pos + 2];
            let kind = match two {
                "!=" => Some(TokenKind::Neq),
                "<=" => Some(TokenKind::LtEq),
                ">=" => Some(TokenKind::GtEq),
                _ => None,
            };
            if let Some(kind) = kind {
                self.pos += 2;
                return Ok(Token::new(kind, Span::new(start, self.pos)));
            }
        }

        let ch = self.current_char().unwrap();
        self.advance();
        let kind = match ch {
            '=' => TokenKind::Eq,
            '<' => TokenKind::Lt,
            '>' => TokenKind::Gt,
            '*' => TokenKind::Asterisk,
            ',' => TokenKind::Comma,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            ';' => TokenKind::Semicolon,
            other => {
                return Err(SyntaxError::new(
                    format!("Invalid character: {}", other),
                    Span::new(start, self.pos),
                ));
            }
        };
        Ok(Token::new(kind, Span::new(start, self.pos)))
    }
}

/// Returns true if the character can start an identifier.
fn is_ident_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}

/// Returns true if the character can continue an identifier.
fn is_ident_continue(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(input: &str) -> Vec<TokenKind> {
        Lexer::new(input)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn tokenize_err(input: &str) -> SyntaxError {
        Lexer::new(input).tokenize().unwrap_err()
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(tokenize(""), vec![TokenKind::Eof]);
        assert_eq!(tokenize("  \t\r\n "), vec![TokenKind::Eof]);
    }

    #[test]
    fn test_keywords_case_insensitive() {
        assert_eq!(
            tokenize("select FROM Where"),
            vec![
                TokenKind::Keyword(Keyword::Select),
                TokenKind::Keyword(Keyword::From),
                TokenKind::Keyword(Keyword::Where),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_identifiers_case_preserved() {
        assert_eq!(
            tokenize("Users _tmp a1"),
            vec![
                TokenKind::Identifier("Users".to_string()),
                TokenKind::Identifier("_tmp".to_string()),
                TokenKind::Identifier("a1".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_integers() {
        assert_eq!(
            tokenize("0 42 12345"),
            vec![
                TokenKind::Integer(0),
                TokenKind::Integer(42),
                TokenKind::Integer(12345),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_integer_overflow() {
        let err = tokenize_err("99999999999999999999999");
        assert!(err.message.contains("out of range"));
    }

    #[test]
    fn test_string_literals() {
        assert_eq!(
            tokenize("'hello' ''"),
            vec![
                TokenKind::String("hello".to_string()),
                TokenKind::String("".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize_err("'oops");
        assert_eq!(err.message, "Unterminated string literal");
    }

    #[test]
    fn test_booleans() {
        assert_eq!(
            tokenize("true FALSE True"),
            vec![
                TokenKind::Boolean(true),
                TokenKind::Boolean(false),
                TokenKind::Boolean(true),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            tokenize("= != < <= > >= *"),
            vec![
                TokenKind::Eq,
                TokenKind::Neq,
                TokenKind::Lt,
                TokenKind::LtEq,
                TokenKind::Gt,
                TokenKind::GtEq,
                TokenKind::Asterisk,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_punctuation() {
        assert_eq!(
            tokenize(", ( ) ;"),
            vec![
                TokenKind::Comma,
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_invalid_character() {
        let err = tokenize_err("SELECT @");
        assert_eq!(err.message, "Invalid character: @");
        assert_eq!(err.span.start, 7);
    }

    #[test]
    fn test_full_query() {
        assert_eq!(
            tokenize("SELECT id, name FROM users WHERE age >= 18 AND active = true"),
            vec![
                TokenKind::Keyword(Keyword::Select),
                TokenKind::Identifier("id".to_string()),
                TokenKind::Comma,
                TokenKind::Identifier("name".to_string()),
                TokenKind::Keyword(Keyword::From),
                TokenKind::Identifier("users".to_string()),
                TokenKind::Keyword(Keyword::Where),
                TokenKind::Identifier("age".to_string()),
                TokenKind::GtEq,
                TokenKind::Integer(18),
                TokenKind::Keyword(Keyword::And),
                TokenKind::Identifier("active".to_string()),
                TokenKind::Eq,
                TokenKind::Boolean(true),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_no_whitespace_needed_around_punctuation() {
        assert_eq!(
            tokenize("VALUES(1,'a')"),
            vec![
                TokenKind::Keyword(Keyword::Values),
                TokenKind::LParen,
                TokenKind::Integer(1),
                TokenKind::Comma,
                TokenKind::String("a".to_string()),
                TokenKind::RParen,
                TokenKind::Eof,
            ]
        );
    }
}
