//! Clause normalization: `Outputs => [+] Inputs` clauses to one-to-one edges.
//!
//! A clause with `k` outputs and `n` inputs yields `k * n` edges. The `=>+`
//! shorthand adds the output itself to its inputs when it is not already
//! listed. `Y => null` yields the single edge `(Y, null)`, which records that
//! the clause had an explicit empty input list.
//!
//! Malformed clauses are reported and skipped; the remaining clauses are
//! still normalized.

use crate::compiler::context::CheckContext;
use crate::compiler::contract::{ContractExpr, ContractKind, RawDependency};
use crate::compiler::errors::{Diagnostics, FlowError};
use flowref_core::{Item, Span};

use std::collections::HashSet;

/// One `output => input` dependence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub output: Item,
    pub input: Item,
    /// Index of the clause this edge came from.
    pub clause: usize,
    pub span: Span,
}

impl Edge {
    pub fn new(output: Item, input: Item) -> Self {
        Self {
            output,
            input,
            clause: 0,
            span: Span::dummy(),
        }
    }

    pub fn key(&self) -> (Item, Item) {
        (self.output, self.input)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    Output,
    Input,
}

#[derive(Debug)]
enum Operand {
    Null,
    Items(Vec<(Item, Span)>),
}

fn malformed(contract: ContractKind, reason: &str, span: Span) -> FlowError {
    FlowError::MalformedRelation {
        contract,
        reason: reason.to_string(),
        span,
    }
}

fn element(
    item: Item,
    span: Span,
    position: Position,
    contract: ContractKind,
) -> Result<(Item, Span), FlowError> {
    if item == Item::FunctionResult && position == Position::Input {
        return Err(malformed(
            contract,
            "a function result cannot appear as an input",
            span,
        ));
    }
    Ok((item, span))
}

fn flatten(
    expr: &ContractExpr,
    position: Position,
    contract: ContractKind,
) -> Result<Operand, FlowError> {
    match expr {
        ContractExpr::Null(_) | ContractExpr::Single(Item::Null, _) => Ok(Operand::Null),
        ContractExpr::Single(item, span) => Ok(Operand::Items(vec![element(
            *item, *span, position, contract,
        )?])),
        ContractExpr::Aggregate(elems, span) => {
            if elems.is_empty() {
                return Err(malformed(contract, "empty aggregate", *span));
            }
            let mut out = Vec::with_capacity(elems.len());
            for e in elems {
                match e {
                    ContractExpr::Null(s) | ContractExpr::Single(Item::Null, s) => {
                        return Err(malformed(
                            contract,
                            "'null' cannot appear inside an aggregate",
                            *s,
                        ))
                    }
                    ContractExpr::Single(item, s) => {
                        out.push(element(*item, *s, position, contract)?)
                    }
                    ContractExpr::Aggregate(_, s) => {
                        return Err(malformed(contract, "nested aggregates are not allowed", *s))
                    }
                }
            }
            Ok(Operand::Items(out))
        }
    }
}

/// Normalize `relation` into edges, reporting shape errors into `diags`.
pub fn normalize(
    relation: &RawDependency,
    contract: ContractKind,
    ctx: &CheckContext<'_>,
    diags: &mut Diagnostics,
) -> Vec<Edge> {
    let clauses = match relation {
        RawDependency::Null(_) => return Vec::new(),
        RawDependency::Clauses(clauses, _) => clauses,
    };
    check_state_constituent_mix(&relation.mentions(), contract, ctx, diags);

    let mut edges = Vec::new();
    let mut emitted: HashSet<(Item, Item)> = HashSet::new();
    let mut seen_outputs: HashSet<Item> = HashSet::new();

    for (idx, clause) in clauses.iter().enumerate() {
        let is_last = idx + 1 == clauses.len();
        let operands = flatten(&clause.outputs, Position::Output, contract).and_then(|o| {
            flatten(&clause.inputs, Position::Input, contract).map(|i| (o, i))
        });
        let (outputs, inputs) = match operands {
            Ok(pair) => pair,
            Err(e) => {
                diags.report(e);
                continue;
            }
        };

        match (&outputs, &inputs) {
            (Operand::Null, _) | (_, Operand::Null) if clause.self_dependent => {
                diags.report(FlowError::UselessSelfDependency {
                    contract,
                    span: clause.span,
                });
                continue;
            }
            (Operand::Null, Operand::Null) => {
                diags.report(malformed(contract, "'null => null' is not allowed", clause.span));
                continue;
            }
            (Operand::Null, _) if !is_last => {
                diags.report(malformed(
                    contract,
                    "a clause with output 'null' must be the last clause",
                    clause.span,
                ));
                continue;
            }
            _ => {}
        }

        let outputs: Vec<(Item, Span)> = match outputs {
            Operand::Null => vec![(Item::Null, clause.outputs.span())],
            Operand::Items(items) => items,
        };
        let inputs: Vec<(Item, Span)> = match inputs {
            Operand::Null => vec![(Item::Null, clause.inputs.span())],
            Operand::Items(items) => items,
        };

        let mut repeated_inputs = Vec::new();
        let mut listed = HashSet::new();
        for (input, _) in &inputs {
            if !listed.insert(*input) {
                repeated_inputs.push(*input);
            }
        }

        for &(output, output_span) in &outputs {
            if !output.is_null() && !seen_outputs.insert(output) {
                diags.report(FlowError::DuplicateOutput {
                    item: ctx.name(output),
                    span: output_span,
                });
            }
            for input in &repeated_inputs {
                diags.report(FlowError::DuplicateInput {
                    output: ctx.name(output),
                    input: ctx.name(*input),
                    span: clause.span,
                });
            }

            let mut row: Vec<Item> = Vec::with_capacity(inputs.len() + 1);
            if clause.self_dependent && !listed.contains(&output) {
                row.push(output);
            }
            row.extend(inputs.iter().map(|(i, _)| *i));

            for input in row {
                if emitted.insert((output, input)) {
                    edges.push(Edge {
                        output,
                        input,
                        clause: idx,
                        span: clause.span,
                    });
                }
            }
        }
    }

    tracing::trace!(%contract, edges = edges.len(), "normalized dependency relation");
    edges
}

/// Report every state mentioned together with one of its own constituents.
pub fn check_state_constituent_mix(
    mentions: &[(Item, Span)],
    contract: ContractKind,
    ctx: &CheckContext<'_>,
    diags: &mut Diagnostics,
) {
    let states: Vec<_> = mentions
        .iter()
        .filter_map(|(item, _)| item.entity())
        .filter(|id| ctx.items.is_state(*id))
        .collect();
    if states.is_empty() {
        return;
    }
    for &(item, span) in mentions {
        for &state in &states {
            if ctx.is_constituent_of(item, state) {
                diags.report(FlowError::CannotMentionStateAndConstituentTogether {
                    contract,
                    state: ctx.entity_name(state),
                    constituent: ctx.name(item),
                    span,
                });
            }
        }
    }
}
