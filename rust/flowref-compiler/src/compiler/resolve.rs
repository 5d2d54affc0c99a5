//! Name resolution for contract annotations.
//!
//! Maps every name written in an annotation to an [`Item`]. Parameters of the
//! enclosing subprogram shadow package-level entities. `F'Result` is only
//! legal when `F` is the enclosing function.

use crate::compiler::ast::*;
use crate::compiler::contract::*;
use crate::diagnostics::suggest_similar_names;
use flowref_core::{Item, ItemId, ItemTable, Span};

use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("unresolved name '{name}' at line {}, col {}", .span.line, .span.col)]
    UnresolvedEntity {
        name: String,
        suggestions: Vec<String>,
        span: Span,
    },
    #[error("'{prefix}'Result' used outside of function '{prefix}' at line {}", .span.line)]
    ResultOutsideFunction { prefix: String, span: Span },
}

impl ResolveError {
    pub fn span(&self) -> Span {
        match self {
            ResolveError::UnresolvedEntity { span, .. }
            | ResolveError::ResultOutsideFunction { span, .. } => *span,
        }
    }
}

/// Names visible to one annotation.
#[derive(Debug, Clone)]
pub struct Scope<'a> {
    items: &'a ItemTable,
    params: HashMap<String, ItemId>,
    function: Option<String>,
}

impl<'a> Scope<'a> {
    /// Package-level scope (used for `Refined_State`).
    pub fn package(items: &'a ItemTable) -> Self {
        Self {
            items,
            params: HashMap::new(),
            function: None,
        }
    }

    /// Scope of a subprogram with the given formal parameters. `function` is
    /// the subprogram name when it is a function.
    pub fn subprogram(items: &'a ItemTable, params: &[ItemId], function: Option<&str>) -> Self {
        let params = params
            .iter()
            .map(|id| (items.name(*id).to_ascii_lowercase(), *id))
            .collect();
        Self {
            items,
            params,
            function: function.map(|f| f.to_string()),
        }
    }

    pub fn items(&self) -> &'a ItemTable {
        self.items
    }

    pub fn lookup(&self, name: &str) -> Option<ItemId> {
        self.params
            .get(&name.to_ascii_lowercase())
            .copied()
            .or_else(|| self.items.lookup(name))
    }

    fn candidates(&self) -> Vec<&str> {
        let mut out = self.items.visible_names();
        out.extend(self.params.values().map(|id| self.items.name(*id)));
        out
    }
}

struct Resolver<'s, 'a> {
    scope: &'s Scope<'a>,
    errors: Vec<ResolveError>,
}

impl<'s, 'a> Resolver<'s, 'a> {
    fn new(scope: &'s Scope<'a>) -> Self {
        Self {
            scope,
            errors: Vec::new(),
        }
    }

    fn name(&mut self, name: &str, span: Span) -> ContractExpr {
        match self.scope.lookup(name) {
            Some(id) => ContractExpr::Single(Item::Entity(id), span),
            None => {
                let candidates = self.scope.candidates();
                self.errors.push(ResolveError::UnresolvedEntity {
                    name: name.to_string(),
                    suggestions: suggest_similar_names(name, &candidates),
                    span,
                });
                // Placeholder so resolution can continue and report every
                // unresolved name of the annotation at once.
                ContractExpr::Null(span)
            }
        }
    }

    fn expr(&mut self, e: &Expr) -> ContractExpr {
        match e {
            Expr::Null(span) => ContractExpr::Null(*span),
            Expr::Name(name, span) => self.name(name, *span),
            Expr::Result(prefix, span) => {
                let is_enclosing = self
                    .scope
                    .function
                    .as_deref()
                    .is_some_and(|f| f.eq_ignore_ascii_case(prefix));
                if is_enclosing {
                    ContractExpr::Single(Item::FunctionResult, *span)
                } else {
                    self.errors.push(ResolveError::ResultOutsideFunction {
                        prefix: prefix.clone(),
                        span: *span,
                    });
                    ContractExpr::Null(*span)
                }
            }
            Expr::Aggregate(elems, span) => {
                ContractExpr::Aggregate(elems.iter().map(|x| self.expr(x)).collect(), *span)
            }
        }
    }

    fn global(&mut self, g: &GlobalAst) -> RawGlobal {
        match g {
            GlobalAst::Null(span) => RawGlobal::Null(*span),
            GlobalAst::Items(e) => RawGlobal::Items(self.expr(e)),
            GlobalAst::Moded(lists, span) => RawGlobal::Moded(
                lists
                    .iter()
                    .map(|l| ModedList {
                        mode: l.mode,
                        mode_span: l.mode_span,
                        items: self.global(&l.items),
                    })
                    .collect(),
                *span,
            ),
        }
    }

    fn finish<T>(self, value: T) -> Result<T, Vec<ResolveError>> {
        if self.errors.is_empty() {
            Ok(value)
        } else {
            Err(self.errors)
        }
    }
}

pub fn resolve_depends(
    ast: &DependsAst,
    scope: &Scope<'_>,
) -> Result<RawDependency, Vec<ResolveError>> {
    let mut r = Resolver::new(scope);
    let rel = match ast {
        DependsAst::Null(span) => RawDependency::Null(*span),
        DependsAst::Clauses(clauses, span) => RawDependency::Clauses(
            clauses
                .iter()
                .map(|c| RawClause {
                    outputs: r.expr(&c.outputs),
                    inputs: r.expr(&c.inputs),
                    self_dependent: c.self_dependent,
                    span: c.span,
                })
                .collect(),
            *span,
        ),
    };
    r.finish(rel)
}

pub fn resolve_global(
    ast: &GlobalAst,
    scope: &Scope<'_>,
) -> Result<RawGlobal, Vec<ResolveError>> {
    let mut r = Resolver::new(scope);
    let rel = r.global(ast);
    r.finish(rel)
}

pub fn resolve_refined_state(
    ast: &RefinedStateAst,
    scope: &Scope<'_>,
) -> Result<Vec<StateRefinementClause>, Vec<ResolveError>> {
    let mut r = Resolver::new(scope);
    let clauses = ast
        .clauses
        .iter()
        .map(|c| StateRefinementClause {
            state: r.expr(&c.state),
            constituents: r.expr(&c.constituents),
            span: c.span,
        })
        .collect();
    r.finish(clauses)
}
