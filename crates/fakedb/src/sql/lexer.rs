//! Tokenizer for the fake SQL dialect.

use fakedb_core::error::{Error, QueryError, QueryErrorKind, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Bare identifier or keyword; keywords are matched case-insensitively.
    Ident(String),
    /// Backtick-quoted identifier, never a keyword.
    QuotedIdent(String),
    Integer(i64),
    Float(f64),
    /// `'...'` or `"..."` literal.
    Str(String),
    /// `X'..'` literal.
    Blob(Vec<u8>),
    /// Unbound `?` placeholder.
    Param,
    Comma,
    Dot,
    LParen,
    RParen,
    Semicolon,
    Star,
    Plus,
    Minus,
    Slash,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset of the token start.
    pub offset: usize,
}

impl Token {
    /// Is this a bare identifier equal to `keyword` (ASCII case-insensitive)?
    pub fn is_keyword(&self, keyword: &str) -> bool {
        matches!(&self.kind, TokenKind::Ident(s) if s.eq_ignore_ascii_case(keyword))
    }
}

pub struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
        }
    }

    /// Tokenize the whole input. The last token is always `Eof`.
    pub fn tokenize(src: &str) -> Result<Vec<Token>> {
        let mut lexer = Lexer::new(src);
        let mut tokens = Vec::new();
        loop {
            let tok = lexer.next_token()?;
            let done = tok.kind == TokenKind::Eof;
            tokens.push(tok);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn error(&self, offset: usize, message: impl Into<String>) -> Error {
        Error::Query(QueryError {
            kind: QueryErrorKind::Syntax,
            sql: Some(self.src.to_string()),
            message: message.into(),
            position: Some(offset),
        })
    }

    fn peek(&self, ahead: usize) -> Option<u8> {
        self.bytes.get(self.pos + ahead).copied()
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek(0) {
                Some(b) if b.is_ascii_whitespace() => self.pos += 1,
                Some(b'-') if self.peek(1) == Some(b'-') => {
                    while let Some(b) = self.peek(0) {
                        self.pos += 1;
                        if b == b'\n' {
                            break;
                        }
                    }
                }
                _ => return,
            }
        }
    }

    pub fn next_token(&mut self) -> Result<Token> {
        self.skip_whitespace_and_comments();
        let start = self.pos;
        let Some(ch) = self.peek(0) else {
            return Ok(Token {
                kind: TokenKind::Eof,
                offset: start,
            });
        };

        let kind = match ch {
            b'\'' | b'"' => TokenKind::Str(self.lex_quoted(ch)?),
            b'`' => TokenKind::QuotedIdent(self.lex_quoted(b'`')?),
            b'X' | b'x' if self.peek(1) == Some(b'\'') => {
                self.pos += 1;
                let hex = self.lex_quoted(b'\'')?;
                TokenKind::Blob(decode_hex(&hex).ok_or_else(|| {
                    self.error(start, format!("malformed blob literal X'{}'", hex))
                })?)
            }
            b'0'..=b'9' => self.lex_number()?,
            b'.' if self.peek(1).is_some_and(|b| b.is_ascii_digit()) => self.lex_number()?,
            b if b.is_ascii_alphabetic() || b == b'_' => {
                while self
                    .peek(0)
                    .is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'$')
                {
                    self.pos += 1;
                }
                TokenKind::Ident(self.src[start..self.pos].to_string())
            }
            _ => {
                self.pos += 1;
                match ch {
                    b'?' => TokenKind::Param,
                    b',' => TokenKind::Comma,
                    b'.' => TokenKind::Dot,
                    b'(' => TokenKind::LParen,
                    b')' => TokenKind::RParen,
                    b';' => TokenKind::Semicolon,
                    b'*' => TokenKind::Star,
                    b'+' => TokenKind::Plus,
                    b'-' => TokenKind::Minus,
                    b'/' => TokenKind::Slash,
                    b'=' => {
                        if self.peek(0) == Some(b'=') {
                            self.pos += 1;
                        }
                        TokenKind::Eq
                    }
                    b'!' if self.peek(0) == Some(b'=') => {
                        self.pos += 1;
                        TokenKind::NotEq
                    }
                    b'<' => match self.peek(0) {
                        Some(b'=') => {
                            self.pos += 1;
                            TokenKind::LtEq
                        }
                        Some(b'>') => {
                            self.pos += 1;
                            TokenKind::NotEq
                        }
                        _ => TokenKind::Lt,
                    },
                    b'>' => {
                        if self.peek(0) == Some(b'=') {
                            self.pos += 1;
                            TokenKind::GtEq
                        } else {
                            TokenKind::Gt
                        }
                    }
                    _ => {
                        let shown = self.src[start..].chars().next().unwrap_or('?');
                        return Err(self.error(start, format!("unexpected character '{}'", shown)));
                    }
                }
            }
        };

        Ok(Token {
            kind,
            offset: start,
        })
    }

    /// Read a literal delimited by `quote`; a doubled quote is an escaped quote.
    fn lex_quoted(&mut self, quote: u8) -> Result<String> {
        let start = self.pos;
        self.pos += 1;
        let mut out = String::new();
        let mut chunk_start = self.pos;
        loop {
            match self.peek(0) {
                None => return Err(self.error(start, "unterminated quoted literal")),
                Some(b) if b == quote => {
                    out.push_str(&self.src[chunk_start..self.pos]);
                    self.pos += 1;
                    if self.peek(0) == Some(quote) {
                        out.push(quote as char);
                        self.pos += 1;
                        chunk_start = self.pos;
                    } else {
                        return Ok(out);
                    }
                }
                Some(_) => self.pos += 1,
            }
        }
    }

    fn lex_number(&mut self) -> Result<TokenKind> {
        let start = self.pos;
        let mut is_float = false;
        while let Some(b) = self.peek(0) {
            if b.is_ascii_digit() {
                self.pos += 1;
            } else if b == b'.' && !is_float {
                is_float = true;
                self.pos += 1;
            } else if (b == b'e' || b == b'E')
                && self
                    .peek(1)
                    .is_some_and(|n| n.is_ascii_digit() || n == b'-' || n == b'+')
            {
                is_float = true;
                self.pos += 2;
            } else {
                break;
            }
        }
        let text = &self.src[start..self.pos];
        if is_float {
            text.parse::<f64>()
                .map(TokenKind::Float)
                .map_err(|_| self.error(start, format!("malformed number '{}'", text)))
        } else {
            match text.parse::<i64>() {
                Ok(v) => Ok(TokenKind::Integer(v)),
                // Too large for i64; keep it as a float like SQLite does.
                Err(_) => text
                    .parse::<f64>()
                    .map(TokenKind::Float)
                    .map_err(|_| self.error(start, format!("malformed number '{}'", text))),
            }
        }
    }
}

fn decode_hex(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok())
        .collect()
}
