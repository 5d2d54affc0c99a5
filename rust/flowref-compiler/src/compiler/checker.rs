//! Refinement orchestration.
//!
//! [`RefinementChecker`] drives one subprogram through
//! `Unchecked → Normalizing → Matching → Accepted | Rejected`:
//! the normalizing phase validates and flattens both sides of every
//! refined contract, the matching phase runs the dependency and global
//! matchers. [`check_package`] validates a `Refined_State` contract and
//! records it in the item table.

use crate::compiler::context::CheckContext;
use crate::compiler::contract::{
    ContractKind, GlobalMode, RawDependency, RawGlobal, StateRefinementClause,
};
use crate::compiler::depends::DependencyMatcher;
use crate::compiler::errors::{Diagnostics, FlowError};
use crate::compiler::global_refinement::GlobalMatcher;
use crate::compiler::globals::{classify, ClassifiedGlobals, GlobalEntry};
use crate::compiler::normalize::{normalize, Edge};
use crate::compiler::resolve::ResolveError;
use crate::compiler::state_refinement::collect_state_refinements;
use crate::CheckOptions;
use flowref_core::{Item, ItemId, ItemTable, Span};

use serde::Serialize;
use strum_macros::Display;
use tracing::{debug, warn};

/// A contract after name resolution. Resolution failures are kept so the
/// checker can report them against the contract they belong to.
pub type Resolved<T> = Result<T, Vec<ResolveError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum CheckPhase {
    Unchecked,
    Normalizing,
    Matching,
    Accepted,
    Rejected,
}

impl CheckPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, CheckPhase::Accepted | CheckPhase::Rejected)
    }

    fn can_advance_to(self, next: CheckPhase) -> bool {
        matches!(
            (self, next),
            (CheckPhase::Unchecked, CheckPhase::Normalizing)
                | (CheckPhase::Normalizing, CheckPhase::Matching)
                | (CheckPhase::Matching, CheckPhase::Accepted)
                | (CheckPhase::Matching, CheckPhase::Rejected)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Accepted,
    Rejected,
}

/// Part of one side of a contract that the other side does not account for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Leftover {
    Dependence {
        output: String,
        input: String,
        span: Span,
    },
    GlobalItem {
        item: String,
        mode: GlobalMode,
        span: Span,
    },
}

impl std::fmt::Display for Leftover {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Leftover::Dependence { output, input, .. } => write!(f, "{} => {}", output, input),
            Leftover::GlobalItem { item, mode, .. } => write!(f, "{} => {}", mode, item),
        }
    }
}

/// Result of checking one subprogram or package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub subject: String,
    pub outcome: Outcome,
    pub unmatched_abstract: Vec<Leftover>,
    pub unconsumed_refined: Vec<Leftover>,
    pub coverage_violations: Vec<FlowError>,
    pub diagnostics: Vec<FlowError>,
}

impl Verdict {
    fn from_diagnostics(subject: &str, diagnostics: Diagnostics) -> Self {
        let diagnostics = diagnostics.into_vec();
        Verdict {
            subject: subject.to_string(),
            outcome: if diagnostics.is_empty() {
                Outcome::Accepted
            } else {
                Outcome::Rejected
            },
            unmatched_abstract: Vec::new(),
            unconsumed_refined: Vec::new(),
            coverage_violations: diagnostics
                .iter()
                .filter(|e| e.is_coverage_violation())
                .cloned()
                .collect(),
            diagnostics,
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.outcome == Outcome::Accepted
    }
}

/// The four flow contracts of one subprogram, resolved.
#[derive(Debug, Clone, Default)]
pub struct SubprogramContracts {
    pub name: String,
    pub span: Span,
    pub is_function: bool,
    pub depends: Option<Resolved<RawDependency>>,
    pub global: Option<Resolved<RawGlobal>>,
    pub refined_depends: Option<Resolved<RawDependency>>,
    pub refined_global: Option<Resolved<RawGlobal>>,
}

impl SubprogramContracts {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn function(mut self) -> Self {
        self.is_function = true;
        self
    }

    pub fn with_depends(mut self, rel: RawDependency) -> Self {
        self.depends = Some(Ok(rel));
        self
    }

    pub fn with_global(mut self, rel: RawGlobal) -> Self {
        self.global = Some(Ok(rel));
        self
    }

    pub fn with_refined_depends(mut self, rel: RawDependency) -> Self {
        self.refined_depends = Some(Ok(rel));
        self
    }

    pub fn with_refined_global(mut self, rel: RawGlobal) -> Self {
        self.refined_global = Some(Ok(rel));
        self
    }
}

/// The `Refined_State` contract of one package body, resolved.
#[derive(Debug, Clone)]
pub struct PackageRefinement {
    pub name: String,
    pub span: Span,
    pub refined_state: Resolved<Vec<StateRefinementClause>>,
}

struct PreparedDepends {
    abstract_edges: Vec<Edge>,
    refined_edges: Vec<Edge>,
    global_outputs: Vec<ItemId>,
}

struct PreparedGlobals {
    abstract_globals: ClassifiedGlobals,
    refined_globals: ClassifiedGlobals,
}

/// One pass over one subprogram.
struct Run<'r, 'a> {
    ctx: CheckContext<'a>,
    contracts: &'r SubprogramContracts,
    phase: CheckPhase,
    diags: Diagnostics,
}

impl<'r, 'a> Run<'r, 'a> {
    fn advance(&mut self, next: CheckPhase) {
        debug_assert!(
            self.phase.can_advance_to(next),
            "illegal phase transition {} -> {}",
            self.phase,
            next
        );
        debug!(subprogram = %self.contracts.name, from = %self.phase, to = %next, "phase transition");
        self.phase = next;
    }

    /// Unwrap a resolved contract, reporting its resolution failures.
    fn resolved<'c, T>(
        &mut self,
        contract: ContractKind,
        slot: &'c Option<Resolved<T>>,
    ) -> Option<&'c T> {
        match slot.as_ref()? {
            Ok(rel) => Some(rel),
            Err(errors) => {
                warn!(
                    subprogram = %self.contracts.name,
                    %contract,
                    count = errors.len(),
                    "unresolved names; contract not checked"
                );
                for e in errors {
                    self.diags.report(unresolved(contract, e));
                }
                None
            }
        }
    }

    /// A refinement needs a non-null abstract contract.
    fn useless(&mut self, contract: ContractKind, abstract_null: Option<bool>, span: Span) -> bool {
        let abstract_kind = contract.abstract_counterpart().unwrap_or(contract);
        let reason = match abstract_null {
            None => format!("subprogram has no {} contract", abstract_kind),
            Some(true) => format!("the {} contract is null", abstract_kind),
            Some(false) => return false,
        };
        self.diags.report(FlowError::UselessRefinement {
            contract,
            reason,
            span,
        });
        true
    }

    /// A refined contract must name the constituents of a visibly refined
    /// state, never the state itself.
    fn names_refined_states(&mut self, contract: ContractKind, mentions: &[(Item, Span)]) -> bool {
        let mut found = false;
        for &(item, span) in mentions {
            if let Some(state) = self.ctx.non_null_refined_state(item) {
                self.diags.report(FlowError::StateRequiresConstituents {
                    contract,
                    state: self.ctx.entity_name(state),
                    span,
                });
                found = true;
            }
        }
        found
    }

    /// States written according to the abstract global contract, classified
    /// without reporting.
    fn global_outputs(&self) -> Vec<ItemId> {
        let Some(Ok(global)) = &self.contracts.global else {
            return Vec::new();
        };
        let mut scratch = Diagnostics::new();
        let g = classify(
            global,
            GlobalMode::Input,
            ContractKind::Global,
            &self.ctx,
            &mut scratch,
        );
        g.non_null_refined_states()
            .iter()
            .copied()
            .filter(|s| {
                matches!(
                    g.mode_of(*s),
                    Some(GlobalMode::Output | GlobalMode::InOut)
                )
            })
            .collect()
    }

    fn prepare_depends(&mut self) -> Option<PreparedDepends> {
        let contracts = self.contracts;
        let refined = self.resolved(ContractKind::RefinedDepends, &contracts.refined_depends)?;
        let abstract_slot = &contracts.depends;
        let abstract_null = match abstract_slot {
            None => None,
            Some(Ok(rel)) => Some(rel.is_null()),
            Some(Err(_)) => Some(false),
        };
        if self.useless(ContractKind::RefinedDepends, abstract_null, refined.span()) {
            return None;
        }
        let abs = self.resolved(ContractKind::Depends, abstract_slot)?;
        if self.names_refined_states(ContractKind::RefinedDepends, &refined.mentions()) {
            return None;
        }
        let abstract_edges = normalize(abs, ContractKind::Depends, &self.ctx, &mut self.diags);
        let refined_edges = normalize(
            refined,
            ContractKind::RefinedDepends,
            &self.ctx,
            &mut self.diags,
        );
        debug!(
            subprogram = %contracts.name,
            abstract_edges = abstract_edges.len(),
            refined_edges = refined_edges.len(),
            "dependency relations normalized"
        );
        Some(PreparedDepends {
            abstract_edges,
            refined_edges,
            global_outputs: self.global_outputs(),
        })
    }

    fn prepare_globals(&mut self) -> Option<PreparedGlobals> {
        let contracts = self.contracts;
        let refined = self.resolved(ContractKind::RefinedGlobal, &contracts.refined_global)?;
        let abstract_slot = &contracts.global;
        let abstract_null = match abstract_slot {
            None => None,
            Some(Ok(rel)) => Some(rel.is_null()),
            Some(Err(_)) => Some(false),
        };
        if self.useless(ContractKind::RefinedGlobal, abstract_null, refined.span()) {
            return None;
        }
        let abs = self.resolved(ContractKind::Global, abstract_slot)?;
        if self.names_refined_states(ContractKind::RefinedGlobal, &refined.mentions()) {
            return None;
        }
        let abstract_globals = classify(
            abs,
            GlobalMode::Input,
            ContractKind::Global,
            &self.ctx,
            &mut self.diags,
        );
        let refined_globals = classify(
            refined,
            GlobalMode::Input,
            ContractKind::RefinedGlobal,
            &self.ctx,
            &mut self.diags,
        );
        debug!(
            subprogram = %contracts.name,
            abstract_items = abstract_globals.len(),
            refined_items = refined_globals.len(),
            "global lists classified"
        );
        Some(PreparedGlobals {
            abstract_globals,
            refined_globals,
        })
    }

    fn edge_leftover(&self, e: &Edge) -> Leftover {
        Leftover::Dependence {
            output: self.ctx.name(e.output),
            input: self.ctx.name(e.input),
            span: e.span,
        }
    }

    fn global_leftover(&self, (mode, entry): &(GlobalMode, GlobalEntry)) -> Leftover {
        Leftover::GlobalItem {
            item: self.ctx.entity_name(entry.item),
            mode: *mode,
            span: entry.span,
        }
    }
}

/// Checks the refined contracts of subprogram bodies against their
/// specifications.
pub struct RefinementChecker<'a> {
    items: &'a ItemTable,
    options: CheckOptions,
}

impl<'a> RefinementChecker<'a> {
    pub fn new(items: &'a ItemTable) -> Self {
        Self::with_options(items, CheckOptions::default())
    }

    pub fn with_options(items: &'a ItemTable, options: CheckOptions) -> Self {
        Self { items, options }
    }

    pub fn items(&self) -> &'a ItemTable {
        self.items
    }

    /// Check `contracts`. Only the item table is read, so repeated calls on
    /// the same contracts produce the same verdict.
    pub fn check_subprogram(&self, contracts: &SubprogramContracts) -> Verdict {
        let function = contracts.is_function.then_some(contracts.name.as_str());
        let mut run = Run {
            ctx: CheckContext::with_function(self.items, function),
            contracts,
            phase: CheckPhase::Unchecked,
            diags: Diagnostics::new(),
        };

        run.advance(CheckPhase::Normalizing);
        let depends = if self.options.check_depends {
            run.prepare_depends()
        } else {
            None
        };
        let globals = if self.options.check_globals {
            run.prepare_globals()
        } else {
            None
        };

        run.advance(CheckPhase::Matching);
        let mut unmatched_abstract = Vec::new();
        let mut unconsumed_refined = Vec::new();
        if let Some(p) = depends {
            let m = DependencyMatcher::new(&run.ctx)
                .with_global_outputs(p.global_outputs)
                .run(&p.abstract_edges, &p.refined_edges, &mut run.diags);
            unmatched_abstract.extend(m.unmatched_abstract.iter().map(|e| run.edge_leftover(e)));
            unconsumed_refined.extend(m.unconsumed_refined.iter().map(|e| run.edge_leftover(e)));
        }
        if let Some(p) = globals {
            let m = GlobalMatcher::new(&run.ctx).run(
                &p.abstract_globals,
                &p.refined_globals,
                &mut run.diags,
            );
            unmatched_abstract.extend(m.unmatched_abstract.iter().map(|e| run.global_leftover(e)));
            unconsumed_refined.extend(m.unconsumed_refined.iter().map(|e| run.global_leftover(e)));
        }

        let final_phase = if run.diags.is_empty() {
            CheckPhase::Accepted
        } else {
            CheckPhase::Rejected
        };
        run.advance(final_phase);

        let mut verdict = Verdict::from_diagnostics(&contracts.name, run.diags);
        verdict.unmatched_abstract = unmatched_abstract;
        verdict.unconsumed_refined = unconsumed_refined;
        debug!(
            subprogram = %contracts.name,
            outcome = %verdict.outcome,
            diagnostics = verdict.diagnostics.len(),
            "refinement checked"
        );
        verdict
    }

    /// Check `contracts` and merge its diagnostics into `sink`. A contract
    /// checked again (one generic instantiation after another) adds nothing
    /// new to `sink`.
    pub fn check_subprogram_into(
        &self,
        contracts: &SubprogramContracts,
        sink: &mut Diagnostics,
    ) -> Verdict {
        let verdict = self.check_subprogram(contracts);
        sink.extend(verdict.diagnostics.iter().cloned());
        verdict
    }
}

fn unresolved(contract: ContractKind, error: &ResolveError) -> FlowError {
    let (name, suggestions) = match error {
        ResolveError::UnresolvedEntity {
            name, suggestions, ..
        } => (name.clone(), suggestions.clone()),
        ResolveError::ResultOutsideFunction { prefix, .. } => {
            (format!("{}'Result", prefix), Vec::new())
        }
    };
    FlowError::UnresolvedEntity {
        contract,
        name,
        suggestions,
        span: error.span(),
    }
}

/// Validate the `Refined_State` contract of a package body and record its
/// refinements in `items`.
pub fn check_package(items: &mut ItemTable, package: &PackageRefinement) -> Verdict {
    let mut diags = Diagnostics::new();
    match &package.refined_state {
        Ok(clauses) => {
            let refined = collect_state_refinements(clauses, items, &mut diags);
            debug!(package = %package.name, states = refined.len(), "state refinement recorded");
        }
        Err(errors) => {
            warn!(package = %package.name, count = errors.len(), "unresolved names in Refined_State");
            for e in errors {
                diags.report(unresolved(ContractKind::RefinedState, e));
            }
        }
    }
    Verdict::from_diagnostics(&package.name, diags)
}
