//! `Refined_State` collection.
//!
//! Validates each `State => Constituents` clause of a package body and
//! records the refinement in the item table. Invalid constituents are
//! reported and left out; the rest of the clause still takes effect so that
//! later checks see the refinement the author meant.

use crate::compiler::contract::{ContractExpr, ContractKind, StateRefinementClause};
use crate::compiler::errors::{Diagnostics, FlowError};
use flowref_core::{Item, ItemId, ItemModelError, ItemTable, Refinement, Span};

use std::collections::HashMap;
use tracing::{debug, trace};

fn malformed(reason: &str, span: Span) -> FlowError {
    FlowError::MalformedRelation {
        contract: ContractKind::RefinedState,
        reason: reason.to_string(),
        span,
    }
}

fn model_error(e: ItemModelError, span: Span) -> FlowError {
    match e {
        ItemModelError::NotAState { name } => FlowError::NotAState { name, span },
        ItemModelError::AlreadyRefined { name } => {
            FlowError::DuplicateStateRefinement { state: name, span }
        }
        ItemModelError::ConstituentAlreadyOwned { constituent, owner } => {
            FlowError::ConstituentAlreadyClaimed {
                constituent,
                owner,
                span,
            }
        }
        ItemModelError::InvalidConstituent { name, reason } => FlowError::InvalidConstituent {
            constituent: name,
            reason,
            span,
        },
        other => malformed(&other.to_string(), span),
    }
}

struct Collector<'t> {
    items: &'t mut ItemTable,
    /// Constituent → the state that claimed it in this contract.
    claimed: HashMap<ItemId, ItemId>,
    refined: Vec<ItemId>,
}

impl Collector<'_> {
    fn target(&self, expr: &ContractExpr, diags: &mut Diagnostics) -> Option<ItemId> {
        let (id, span) = match expr {
            ContractExpr::Single(Item::Entity(id), span) => (*id, *span),
            other => {
                diags.report(malformed("expected the name of an abstract state", other.span()));
                return None;
            }
        };
        if !self.items.is_state(id) {
            diags.report(FlowError::NotAState {
                name: self.items.name(id).to_string(),
                span,
            });
            return None;
        }
        if self.refined.contains(&id) || *self.items.refinement(id) != Refinement::None {
            diags.report(FlowError::DuplicateStateRefinement {
                state: self.items.name(id).to_string(),
                span,
            });
            return None;
        }
        Some(id)
    }

    fn constituent_list(
        &self,
        expr: &ContractExpr,
        diags: &mut Diagnostics,
    ) -> Option<Vec<(Item, Span)>> {
        match expr {
            ContractExpr::Null(_) | ContractExpr::Single(Item::Null, _) => None,
            ContractExpr::Single(item, span) => Some(vec![(*item, *span)]),
            ContractExpr::Aggregate(elems, _) => {
                let mut out = Vec::with_capacity(elems.len());
                for e in elems {
                    match e {
                        ContractExpr::Single(Item::Null, span) | ContractExpr::Null(span) => {
                            diags.report(malformed(
                                "'null' cannot be mixed with constituents",
                                *span,
                            ));
                        }
                        ContractExpr::Single(item, span) => out.push((*item, *span)),
                        ContractExpr::Aggregate(_, span) => {
                            diags.report(malformed(
                                "nested constituent lists are not allowed",
                                *span,
                            ));
                        }
                    }
                }
                Some(out)
            }
        }
    }

    fn invalid(&self, id: ItemId, reason: String, span: Span) -> FlowError {
        FlowError::InvalidConstituent {
            constituent: self.items.name(id).to_string(),
            reason,
            span,
        }
    }

    /// Validate one constituent of `state`, returning it when it may be
    /// recorded.
    fn constituent(
        &mut self,
        state: ItemId,
        item: Item,
        span: Span,
        diags: &mut Diagnostics,
    ) -> Option<ItemId> {
        let c = match item {
            Item::Entity(id) => id,
            Item::FunctionResult => {
                diags.report(FlowError::InvalidConstituent {
                    constituent: "'Result".to_string(),
                    reason: "a function result cannot be a constituent".to_string(),
                    span,
                });
                return None;
            }
            Item::Null => return None,
        };
        let items = &*self.items;
        if items.entity(c).is_parameter() {
            diags.report(self.invalid(c, "parameters cannot be constituents".into(), span));
            return None;
        }
        if c == state || items.is_constituent_of(state, c) {
            let reason = format!("it encloses state '{}'", items.name(state));
            diags.report(self.invalid(c, reason, span));
            return None;
        }
        let owner = items
            .encapsulating_state(c)
            .or_else(|| self.claimed.get(&c).copied());
        if let Some(owner) = owner {
            diags.report(FlowError::ConstituentAlreadyClaimed {
                constituent: items.name(c).to_string(),
                owner: items.name(owner).to_string(),
                span,
            });
            return None;
        }

        if let Some(props) = items.external_props(c) {
            match items.external_props(state) {
                None => {
                    diags.report(FlowError::ExternalConstituentOfNonExternalState {
                        state: items.name(state).to_string(),
                        constituent: items.name(c).to_string(),
                        span,
                    });
                }
                Some(state_props) => {
                    for property in props.enabled().filter(|p| !state_props.get(*p)) {
                        diags.report(FlowError::ExternalPropertyMismatch {
                            state: items.name(state).to_string(),
                            constituent: items.name(c).to_string(),
                            property,
                            span,
                        });
                    }
                }
            }
        }

        self.claimed.insert(c, state);
        Some(c)
    }

    fn clause(&mut self, clause: &StateRefinementClause, diags: &mut Diagnostics) {
        let Some(state) = self.target(&clause.state, diags) else {
            return;
        };
        self.refined.push(state);

        let refinement = match self.constituent_list(&clause.constituents, diags) {
            None => Refinement::Null,
            Some(list) => {
                let mut constituents = Vec::with_capacity(list.len());
                for (item, span) in list {
                    if let Some(c) = self.constituent(state, item, span, diags) {
                        constituents.push(c);
                    }
                }
                if constituents.is_empty() {
                    return;
                }
                Refinement::NonNull(constituents)
            }
        };

        let count = match &refinement {
            Refinement::NonNull(cs) => cs.len(),
            _ => 0,
        };
        trace!(
            state = self.items.name(state),
            constituents = count,
            "recording state refinement"
        );
        if let Err(e) = self.items.set_refinement(state, refinement) {
            diags.report(model_error(e, clause.span));
        }
    }
}

/// Validate `clauses` and record every refinement they declare in `items`.
/// Returns the states that were refined.
pub fn collect_state_refinements(
    clauses: &[StateRefinementClause],
    items: &mut ItemTable,
    diags: &mut Diagnostics,
) -> Vec<ItemId> {
    let mut c = Collector {
        items,
        claimed: HashMap::new(),
        refined: Vec::new(),
    };
    for clause in clauses {
        c.clause(clause, diags);
    }
    debug!(states = c.refined.len(), "collected state refinements");
    c.refined
        .into_iter()
        .filter(|s| *c.items.refinement(*s) != Refinement::None)
        .collect()
}
