//! Unresolved syntax trees for the three contract annotations.
//!
//! Names are kept as written; [`crate::compiler::resolve`] turns them into
//! item references.

use crate::compiler::contract::GlobalMode;
use flowref_core::Span;

/// An operand of a contract: `null`, a name, `F'Result`, or an aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Null(Span),
    Name(String, Span),
    /// `Prefix'Result`
    Result(String, Span),
    Aggregate(Vec<Expr>, Span),
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Null(s) | Expr::Name(_, s) | Expr::Result(_, s) | Expr::Aggregate(_, s) => *s,
        }
    }
}

/// `Outputs => [+] Inputs`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependsClause {
    pub outputs: Expr,
    pub inputs: Expr,
    pub self_dependent: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependsAst {
    Null(Span),
    Clauses(Vec<DependsClause>, Span),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GlobalAst {
    Null(Span),
    /// An unmoded item or aggregate of items.
    Items(Expr),
    Moded(Vec<ModedGlobal>, Span),
}

impl GlobalAst {
    pub fn span(&self) -> Span {
        match self {
            GlobalAst::Null(s) | GlobalAst::Moded(_, s) => *s,
            GlobalAst::Items(e) => e.span(),
        }
    }
}

/// `Mode => Items`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModedGlobal {
    pub mode: GlobalMode,
    pub mode_span: Span,
    pub items: GlobalAst,
}

/// `State => Constituents`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefinedStateClause {
    pub state: Expr,
    pub constituents: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefinedStateAst {
    pub clauses: Vec<RefinedStateClause>,
    pub span: Span,
}
