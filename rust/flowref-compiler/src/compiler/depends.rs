//! Dependency refinement matching.
//!
//! Every abstract edge is checked against the pool of refined edges. An
//! abstract edge consumes every refined edge that justifies it, so a state
//! output is discharged by the edges of all its constituents at once.
//! Consumed edges leave the pool and cannot justify a later abstract edge;
//! when two abstract edges could claim the same refined edge, the one
//! declared first consumes it.
//!
//! Refined edges whose input is `null` only mark an explicit empty input
//! list. They may justify several abstract edges and are never reported as
//! extra.
//!
//! A state refined to `null` has nothing left to mention. An abstract edge
//! with such a state at one end is discharged once its other end appears on
//! the same side of any refined edge.

use crate::compiler::context::CheckContext;
use crate::compiler::errors::{Diagnostics, FlowError};
use crate::compiler::normalize::Edge;
use flowref_core::{Item, ItemId};

use std::collections::HashSet;
use tracing::trace;

/// Leftovers of a dependency match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyMatch {
    pub unmatched_abstract: Vec<Edge>,
    pub unconsumed_refined: Vec<Edge>,
}

impl DependencyMatch {
    pub fn is_complete(&self) -> bool {
        self.unmatched_abstract.is_empty() && self.unconsumed_refined.is_empty()
    }
}

pub struct DependencyMatcher<'c, 'a> {
    ctx: &'c CheckContext<'a>,
    global_outputs: Vec<ItemId>,
}

impl<'c, 'a> DependencyMatcher<'c, 'a> {
    pub fn new(ctx: &'c CheckContext<'a>) -> Self {
        Self {
            ctx,
            global_outputs: Vec::new(),
        }
    }

    /// States written according to the abstract global contract. Refined
    /// edges that only update constituents of such a state are accepted
    /// when the abstract flow contract does not name the state as an output.
    pub fn with_global_outputs(mut self, states: impl IntoIterator<Item = ItemId>) -> Self {
        self.global_outputs.extend(states);
        self
    }

    /// Does the abstract item `a` match the refined item `b`? `None` stands
    /// for "no refined item at all".
    fn matches(&self, a: Item, b: Option<Item>) -> bool {
        match a {
            Item::Null => matches!(b, None | Some(Item::Null)),
            Item::FunctionResult => b == Some(Item::FunctionResult),
            Item::Entity(id) => {
                if self.ctx.null_refined_state(a).is_some() {
                    matches!(b, None | Some(Item::Null))
                } else if self.ctx.non_null_refined_state(a).is_some() {
                    b.is_some_and(|b| self.ctx.is_constituent_of(b, id))
                } else {
                    b == Some(a)
                }
            }
        }
    }

    fn null_refined(&self, item: Item) -> bool {
        self.ctx.null_refined_state(item).is_some()
    }

    /// `(S, S)` for a state with a visible non-null refinement.
    fn self_dependent_state(&self, edge: &Edge) -> Option<ItemId> {
        if edge.output != edge.input {
            return None;
        }
        self.ctx.non_null_refined_state(edge.output)
    }

    fn justifies(&self, abs: &Edge, refined: &Edge) -> bool {
        if self.matches(abs.output, Some(refined.output))
            && self.matches(abs.input, Some(refined.input))
        {
            return true;
        }
        // The refinement of S may already account for its self-dependency.
        match self.self_dependent_state(abs) {
            Some(s) => {
                (self.ctx.is_constituent_of(refined.output, s) && refined.input.is_null())
                    || (refined.output.is_null() && self.ctx.is_constituent_of(refined.input, s))
            }
            None => false,
        }
    }

    fn covered_by_globals(&self, refined: &Edge, abstract_outputs: &HashSet<Item>) -> bool {
        self.global_outputs.iter().any(|s| {
            !abstract_outputs.contains(&Item::Entity(*s))
                && self.ctx.is_constituent_of(refined.output, *s)
        })
    }

    /// Match `abstract_edges` against `refined_edges`, reporting
    /// `MissingRefinement` and `ExtraOrUnmatchedRefinement` into `diags`.
    pub fn run(
        &self,
        abstract_edges: &[Edge],
        refined_edges: &[Edge],
        diags: &mut Diagnostics,
    ) -> DependencyMatch {
        let mut pool: Vec<Edge> = refined_edges.to_vec();
        let mut touched: HashSet<ItemId> = HashSet::new();
        let mut unmatched: Vec<(usize, Edge)> = Vec::new();
        let mut partial: Vec<(usize, Edge)> = Vec::new();
        let mut deferred: Vec<(usize, Edge)> = Vec::new();

        for (idx, abs) in abstract_edges.iter().enumerate() {
            let mut matched = false;
            let mut i = 0;
            while i < pool.len() {
                if !self.justifies(abs, &pool[i]) {
                    i += 1;
                    continue;
                }
                matched = true;
                if pool[i].input.is_null() {
                    i += 1;
                    continue;
                }
                let r = pool.remove(i);
                trace!(
                    abs_output = %self.ctx.name(abs.output),
                    abs_input = %self.ctx.name(abs.input),
                    ref_output = %self.ctx.name(r.output),
                    ref_input = %self.ctx.name(r.input),
                    "refined edge consumed"
                );
            }

            if matched {
                if let Some(s) = self.ctx.non_null_refined_state(abs.output) {
                    touched.insert(s);
                }
                continue;
            }
            if self.matches(abs.output, None) && self.matches(abs.input, None) {
                trace!(output = %self.ctx.name(abs.output), "matched by null refinement");
                continue;
            }
            if self.null_refined(abs.output) || self.null_refined(abs.input) {
                partial.push((idx, *abs));
                continue;
            }
            if self.self_dependent_state(abs).is_some() {
                deferred.push((idx, *abs));
                continue;
            }
            unmatched.push((idx, *abs));
        }

        // One end refines to nothing: the other end only has to show up on
        // the same side of some refined edge.
        for (idx, abs) in partial {
            let justified = if self.null_refined(abs.output) {
                refined_edges
                    .iter()
                    .any(|r| self.matches(abs.input, Some(r.input)))
            } else {
                refined_edges
                    .iter()
                    .any(|r| self.matches(abs.output, Some(r.output)))
            };
            if !justified {
                unmatched.push((idx, abs));
                continue;
            }
            trace!(
                output = %self.ctx.name(abs.output),
                input = %self.ctx.name(abs.input),
                "null-refined end discharged by absence"
            );
            if let Some(s) = self.ctx.non_null_refined_state(abs.output) {
                touched.insert(s);
            }
        }

        // An unmentioned constituent keeps its value, which is an implicit
        // self-dependency of its state.
        for (idx, abs) in deferred {
            let Some(s) = self.self_dependent_state(&abs) else {
                continue;
            };
            let keeps_value = self
                .ctx
                .items
                .visible_leaves(s)
                .into_iter()
                .any(|leaf| !refined_edges.iter().any(|r| r.output == Item::Entity(leaf)));
            if touched.contains(&s) && keeps_value {
                trace!(state = %self.ctx.entity_name(s), "self-dependency kept by untouched constituent");
            } else {
                unmatched.push((idx, abs));
            }
        }
        unmatched.sort_by_key(|(idx, _)| *idx);

        for (_, abs) in &unmatched {
            diags.report(FlowError::MissingRefinement {
                output: self.ctx.name(abs.output),
                input: self.ctx.name(abs.input),
                span: abs.span,
            });
        }

        let abstract_outputs: HashSet<Item> = abstract_edges.iter().map(|e| e.output).collect();
        let mut unconsumed = Vec::new();
        for r in pool {
            if r.input.is_null() || self.covered_by_globals(&r, &abstract_outputs) {
                continue;
            }
            diags.report(FlowError::ExtraOrUnmatchedRefinement {
                output: self.ctx.name(r.output),
                input: self.ctx.name(r.input),
                span: r.span,
            });
            unconsumed.push(r);
        }

        DependencyMatch {
            unmatched_abstract: unmatched.into_iter().map(|(_, e)| e).collect(),
            unconsumed_refined: unconsumed,
        }
    }
}
