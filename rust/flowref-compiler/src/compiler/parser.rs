//! Recursive descent parser for `Depends`, `Global` and `Refined_State`
//! annotation text.
//!
//! A parenthesised group is ambiguous until its closing parenthesis: in
//! `(A, B) => X` it is an output aggregate, in `(A => X, B => Y)` it is the
//! clause list. The parser reads the group as a list of elements, each either
//! a plain operand or an association, and decides once it sees what follows.

use crate::compiler::ast::*;
use crate::compiler::contract::GlobalMode;
use crate::compiler::lexer::{LexError, Lexer};
use crate::compiler::tokens::{Token, TokenKind};
use flowref_core::Span;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("lex error: {0}")]
    Lex(#[from] LexError),
    #[error("unexpected {found} at line {line}, col {col}; expected {expected}")]
    Unexpected {
        found: String,
        expected: String,
        line: usize,
        col: usize,
    },
    #[error("unexpected end of annotation")]
    UnexpectedEof,
}

/// Element of a parenthesised group.
enum Element {
    Operand(Expr),
    Assoc {
        lhs: Expr,
        self_dependent: bool,
        rhs: Expr,
        span: Span,
    },
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn current(&self) -> &Token {
        // The lexer always terminates the stream with `Eof`.
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.pos.min(last)]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.current().kind
    }

    fn peek_kind_at(&self, offset: usize) -> &TokenKind {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[(self.pos + offset).min(last)].kind
    }

    fn advance(&mut self) -> Token {
        let tok = self.current().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let tok = self.current();
        if tok.kind == TokenKind::Eof {
            return ParseError::UnexpectedEof;
        }
        ParseError::Unexpected {
            found: format!("{}", tok.kind),
            expected: expected.to_string(),
            line: tok.span.line,
            col: tok.span.col,
        }
    }

    fn expect(&mut self, kind: &TokenKind, expected: &str) -> Result<Token, ParseError> {
        if std::mem::discriminant(self.peek_kind()) == std::mem::discriminant(kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn expect_end(&mut self) -> Result<(), ParseError> {
        if matches!(self.peek_kind(), TokenKind::Eof) {
            Ok(())
        } else {
            Err(self.unexpected("end of annotation"))
        }
    }

    // ── Operands ──

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        match self.peek_kind().clone() {
            TokenKind::Null => Ok(Expr::Null(self.advance().span)),
            TokenKind::Ident(name) => {
                let tok = self.advance();
                if matches!(self.peek_kind(), TokenKind::Tick) {
                    self.advance();
                    let attr = self.expect(&TokenKind::Ident(String::new()), "'Result")?;
                    match &attr.kind {
                        TokenKind::Ident(a) if a.eq_ignore_ascii_case("result") => {
                            Ok(Expr::Result(name, tok.span.merge(attr.span)))
                        }
                        _ => Err(ParseError::Unexpected {
                            found: format!("{}", attr.kind),
                            expected: "'Result".into(),
                            line: attr.span.line,
                            col: attr.span.col,
                        }),
                    }
                } else {
                    Ok(Expr::Name(name, tok.span))
                }
            }
            TokenKind::LParen => {
                let open = self.advance().span;
                let mut elems = vec![self.parse_expr()?];
                while matches!(self.peek_kind(), TokenKind::Comma) {
                    self.advance();
                    elems.push(self.parse_expr()?);
                }
                let close = self.expect(&TokenKind::RParen, "')'")?.span;
                Ok(Expr::Aggregate(elems, open.merge(close)))
            }
            _ => Err(self.unexpected("'null', a name or '('")),
        }
    }

    fn parse_element(&mut self, allow_plus: bool) -> Result<Element, ParseError> {
        let lhs = self.parse_expr()?;
        if !matches!(self.peek_kind(), TokenKind::Arrow) {
            return Ok(Element::Operand(lhs));
        }
        self.advance();
        let self_dependent = if matches!(self.peek_kind(), TokenKind::Plus) {
            if !allow_plus {
                return Err(self.unexpected("a constituent list"));
            }
            self.advance();
            true
        } else {
            false
        };
        let rhs = self.parse_expr()?;
        let span = lhs.span().merge(rhs.span());
        Ok(Element::Assoc {
            lhs,
            self_dependent,
            rhs,
            span,
        })
    }

    /// Parse `( element {, element} )`, returning the elements and the span
    /// of the whole group.
    fn parse_group(&mut self, allow_plus: bool) -> Result<(Vec<Element>, Span), ParseError> {
        let open = self.expect(&TokenKind::LParen, "'('")?.span;
        let mut elems = vec![self.parse_element(allow_plus)?];
        while matches!(self.peek_kind(), TokenKind::Comma) {
            self.advance();
            elems.push(self.parse_element(allow_plus)?);
        }
        let close = self.expect(&TokenKind::RParen, "')'")?.span;
        Ok((elems, open.merge(close)))
    }

    fn group_to_aggregate(&self, elems: Vec<Element>, span: Span) -> Result<Expr, ParseError> {
        let mut out = Vec::with_capacity(elems.len());
        for e in elems {
            match e {
                Element::Operand(x) => out.push(x),
                Element::Assoc { span, .. } => {
                    return Err(ParseError::Unexpected {
                        found: "association".into(),
                        expected: "an operand".into(),
                        line: span.line,
                        col: span.col,
                    })
                }
            }
        }
        Ok(Expr::Aggregate(out, span))
    }

    // ── Depends ──

    fn clause_rest(&mut self, outputs: Expr) -> Result<DependsClause, ParseError> {
        self.expect(&TokenKind::Arrow, "'=>'")?;
        let self_dependent = if matches!(self.peek_kind(), TokenKind::Plus) {
            self.advance();
            true
        } else {
            false
        };
        let inputs = self.parse_expr()?;
        let span = outputs.span().merge(inputs.span());
        Ok(DependsClause {
            outputs,
            inputs,
            self_dependent,
            span,
        })
    }

    pub fn parse_depends(&mut self) -> Result<DependsAst, ParseError> {
        let ast = match self.peek_kind() {
            TokenKind::Null if matches!(self.peek_kind_at(1), TokenKind::Eof) => {
                DependsAst::Null(self.advance().span)
            }
            TokenKind::LParen => {
                let (elems, span) = self.parse_group(true)?;
                if matches!(self.peek_kind(), TokenKind::Arrow) {
                    // `(A, B) => ...`: the group was an output aggregate.
                    let outputs = self.group_to_aggregate(elems, span)?;
                    let clause = self.clause_rest(outputs)?;
                    let span = clause.span;
                    DependsAst::Clauses(vec![clause], span)
                } else {
                    let mut clauses = Vec::with_capacity(elems.len());
                    for e in elems {
                        match e {
                            Element::Assoc {
                                lhs,
                                self_dependent,
                                rhs,
                                span,
                            } => clauses.push(DependsClause {
                                outputs: lhs,
                                inputs: rhs,
                                self_dependent,
                                span,
                            }),
                            Element::Operand(x) => {
                                let s = x.span();
                                return Err(ParseError::Unexpected {
                                    found: "operand".into(),
                                    expected: "'Outputs => Inputs'".into(),
                                    line: s.line,
                                    col: s.col,
                                });
                            }
                        }
                    }
                    DependsAst::Clauses(clauses, span)
                }
            }
            _ => {
                let outputs = self.parse_expr()?;
                let clause = self.clause_rest(outputs)?;
                let span = clause.span;
                DependsAst::Clauses(vec![clause], span)
            }
        };
        self.expect_end()?;
        Ok(ast)
    }

    // ── Global ──

    fn parse_mode(&mut self) -> Result<(GlobalMode, Span), ParseError> {
        let mode = match self.peek_kind() {
            TokenKind::Input => GlobalMode::Input,
            TokenKind::Output => GlobalMode::Output,
            TokenKind::InOut => GlobalMode::InOut,
            TokenKind::ProofIn => GlobalMode::ProofIn,
            _ => return Err(self.unexpected("a global mode")),
        };
        Ok((mode, self.advance().span))
    }

    fn parse_global_list(&mut self) -> Result<GlobalAst, ParseError> {
        match self.peek_kind() {
            TokenKind::Null => Ok(GlobalAst::Null(self.advance().span)),
            TokenKind::LParen if self.peek_kind_at(1).is_mode() => {
                let open = self.advance().span;
                let mut lists = Vec::new();
                loop {
                    let (mode, mode_span) = self.parse_mode()?;
                    self.expect(&TokenKind::Arrow, "'=>'")?;
                    let items = self.parse_global_list()?;
                    lists.push(ModedGlobal {
                        mode,
                        mode_span,
                        items,
                    });
                    if matches!(self.peek_kind(), TokenKind::Comma) {
                        self.advance();
                    } else {
                        break;
                    }
                }
                let close = self.expect(&TokenKind::RParen, "')'")?.span;
                Ok(GlobalAst::Moded(lists, open.merge(close)))
            }
            _ => Ok(GlobalAst::Items(self.parse_expr()?)),
        }
    }

    pub fn parse_global(&mut self) -> Result<GlobalAst, ParseError> {
        let ast = self.parse_global_list()?;
        self.expect_end()?;
        Ok(ast)
    }

    // ── Refined_State ──

    pub fn parse_refined_state(&mut self) -> Result<RefinedStateAst, ParseError> {
        let ast = if matches!(self.peek_kind(), TokenKind::LParen) {
            let (elems, span) = self.parse_group(false)?;
            let mut clauses = Vec::with_capacity(elems.len());
            for e in elems {
                match e {
                    Element::Assoc { lhs, rhs, span, .. } => clauses.push(RefinedStateClause {
                        state: lhs,
                        constituents: rhs,
                        span,
                    }),
                    Element::Operand(x) => {
                        let s = x.span();
                        return Err(ParseError::Unexpected {
                            found: "operand".into(),
                            expected: "'State => Constituents'".into(),
                            line: s.line,
                            col: s.col,
                        });
                    }
                }
            }
            RefinedStateAst { clauses, span }
        } else {
            match self.parse_element(false)? {
                Element::Assoc { lhs, rhs, span, .. } => RefinedStateAst {
                    clauses: vec![RefinedStateClause {
                        state: lhs,
                        constituents: rhs,
                        span,
                    }],
                    span,
                },
                Element::Operand(_) => return Err(self.unexpected("'=>'")),
            }
        };
        self.expect_end()?;
        Ok(ast)
    }
}

fn tokens(src: &str, origin: Span) -> Result<Vec<Token>, ParseError> {
    Ok(Lexer::at(src, origin).tokenize()?)
}

fn start() -> Span {
    Span::new(0, 0, 1, 1)
}

/// Parse the text of a `Depends` or `Refined_Depends` annotation.
pub fn parse_depends(src: &str) -> Result<DependsAst, ParseError> {
    parse_depends_at(src, start())
}

/// Parse the text of a `Global` or `Refined_Global` annotation.
pub fn parse_global(src: &str) -> Result<GlobalAst, ParseError> {
    parse_global_at(src, start())
}

/// Parse the text of a `Refined_State` annotation.
pub fn parse_refined_state(src: &str) -> Result<RefinedStateAst, ParseError> {
    parse_refined_state_at(src, start())
}

/// Like [`parse_depends`], for text that starts at `origin` of a larger
/// source.
pub fn parse_depends_at(src: &str, origin: Span) -> Result<DependsAst, ParseError> {
    Parser::new(tokens(src, origin)?).parse_depends()
}

pub fn parse_global_at(src: &str, origin: Span) -> Result<GlobalAst, ParseError> {
    Parser::new(tokens(src, origin)?).parse_global()
}

pub fn parse_refined_state_at(src: &str, origin: Span) -> Result<RefinedStateAst, ParseError> {
    Parser::new(tokens(src, origin)?).parse_refined_state()
}
