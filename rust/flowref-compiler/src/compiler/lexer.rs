//! Lexer for contract annotation text.

use crate::compiler::tokens::{Token, TokenKind};
use flowref_core::Span;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LexError {
    #[error("unexpected character '{ch}' at line {line}, col {col}")]
    UnexpectedChar { ch: char, line: usize, col: usize },
    #[error("malformed name at line {line}, col {col}")]
    MalformedName { line: usize, col: usize },
}

pub struct Lexer {
    source: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
    byte_offset: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
            byte_offset: 0,
        }
    }

    /// Lex `source` as if it started at `origin` inside a larger text, so
    /// token spans point into that text.
    pub fn at(source: &str, origin: Span) -> Self {
        Self {
            source: source.chars().collect(),
            pos: 0,
            line: origin.line.max(1),
            col: origin.col.max(1),
            byte_offset: origin.start,
        }
    }

    fn current(&self) -> Option<char> {
        self.source.get(self.pos).copied()
    }

    fn peek(&self) -> Option<char> {
        self.source.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.source.get(self.pos).copied()?;
        self.pos += 1;
        self.byte_offset += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    fn span_from(&self, so: usize, sl: usize, sc: usize) -> Span {
        Span::new(so, self.byte_offset, sl, sc)
    }

    fn skip_trivia(&mut self) {
        loop {
            match (self.current(), self.peek()) {
                (Some(c), _) if c.is_whitespace() => {
                    self.advance();
                }
                (Some('-'), Some('-')) => {
                    while !matches!(self.current(), None | Some('\n')) {
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn read_name(&mut self) -> Result<Token, LexError> {
        let (so, sl, sc) = (self.byte_offset, self.line, self.col);
        let mut s = String::new();
        loop {
            while let Some(c) = self.current() {
                if c.is_alphanumeric() || c == '_' {
                    s.push(c);
                    self.advance();
                } else {
                    break;
                }
            }
            // A selector continues the name: `Pkg.State`.
            if self.current() == Some('.') {
                match self.peek() {
                    Some(c) if c.is_alphabetic() => {
                        s.push('.');
                        self.advance();
                    }
                    _ => {
                        return Err(LexError::MalformedName {
                            line: self.line,
                            col: self.col,
                        })
                    }
                }
            } else {
                break;
            }
        }
        if s.ends_with('_') || s.contains("__") {
            return Err(LexError::MalformedName { line: sl, col: sc });
        }
        let span = self.span_from(so, sl, sc);
        let kind = if s.contains('.') {
            TokenKind::Ident(s)
        } else {
            TokenKind::keyword(&s).unwrap_or(TokenKind::Ident(s))
        };
        Ok(Token::new(kind, span))
    }

    fn single(&mut self, kind: TokenKind) -> Token {
        let (so, sl, sc) = (self.byte_offset, self.line, self.col);
        self.advance();
        Token::new(kind, self.span_from(so, sl, sc))
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia();
            let ch = match self.current() {
                Some(c) => c,
                None => break,
            };
            let tok = match ch {
                '(' => self.single(TokenKind::LParen),
                ')' => self.single(TokenKind::RParen),
                ',' => self.single(TokenKind::Comma),
                '+' => self.single(TokenKind::Plus),
                '\'' => self.single(TokenKind::Tick),
                '=' if self.peek() == Some('>') => {
                    let (so, sl, sc) = (self.byte_offset, self.line, self.col);
                    self.advance();
                    self.advance();
                    Token::new(TokenKind::Arrow, self.span_from(so, sl, sc))
                }
                c if c.is_alphabetic() => self.read_name()?,
                c => {
                    return Err(LexError::UnexpectedChar {
                        ch: c,
                        line: self.line,
                        col: self.col,
                    })
                }
            };
            tokens.push(tok);
        }
        let end = Span::new(self.byte_offset, self.byte_offset, self.line, self.col);
        tokens.push(Token::new(TokenKind::Eof, end));
        Ok(tokens)
    }
}
