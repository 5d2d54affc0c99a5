use flowref_core::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Token types of the contract annotation language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenKind {
    /// A (possibly selected) name: `X`, `Pkg.State`.
    Ident(String),

    // Keywords
    Null,
    Input,
    Output,
    InOut,
    ProofIn,

    // Punctuation
    Arrow,
    Plus,
    LParen,
    RParen,
    Comma,
    Tick,

    Eof,
}

impl TokenKind {
    /// Map a word to its keyword, if it is one. Keywords are case-insensitive.
    pub fn keyword(word: &str) -> Option<TokenKind> {
        match word.to_ascii_lowercase().as_str() {
            "null" => Some(TokenKind::Null),
            "input" => Some(TokenKind::Input),
            "output" => Some(TokenKind::Output),
            "in_out" => Some(TokenKind::InOut),
            "proof_in" => Some(TokenKind::ProofIn),
            _ => None,
        }
    }

    pub fn is_mode(&self) -> bool {
        matches!(
            self,
            TokenKind::Input | TokenKind::Output | TokenKind::InOut | TokenKind::ProofIn
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Ident(s) => write!(f, "identifier '{}'", s),
            TokenKind::Null => write!(f, "'null'"),
            TokenKind::Input => write!(f, "'Input'"),
            TokenKind::Output => write!(f, "'Output'"),
            TokenKind::InOut => write!(f, "'In_Out'"),
            TokenKind::ProofIn => write!(f, "'Proof_In'"),
            TokenKind::Arrow => write!(f, "'=>'"),
            TokenKind::Plus => write!(f, "'+'"),
            TokenKind::LParen => write!(f, "'('"),
            TokenKind::RParen => write!(f, "')'"),
            TokenKind::Comma => write!(f, "','"),
            TokenKind::Tick => write!(f, "'''"),
            TokenKind::Eof => write!(f, "end of input"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}
