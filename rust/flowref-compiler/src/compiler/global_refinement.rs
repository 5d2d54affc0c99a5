//! Global refinement matching.
//!
//! Abstract states with a visible non-null refinement are checked against
//! the modes their visible leaves receive in the refined global list; every
//! other abstract item must reappear in the refinement with the same mode.
//! Matched refined entries are taken out of the refined pools, and whatever
//! is left at the end refines nothing.

use crate::compiler::context::CheckContext;
use crate::compiler::contract::GlobalMode;
use crate::compiler::errors::{Diagnostics, FlowError};
use crate::compiler::globals::{ClassifiedGlobals, GlobalEntry};
use flowref_core::ItemId;

use tracing::trace;

/// States are processed in this order, plain items afterwards.
const STATE_ORDER: [GlobalMode; 4] = [
    GlobalMode::Input,
    GlobalMode::InOut,
    GlobalMode::Output,
    GlobalMode::ProofIn,
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalMatch {
    pub unmatched_abstract: Vec<(GlobalMode, GlobalEntry)>,
    pub unconsumed_refined: Vec<(GlobalMode, GlobalEntry)>,
    pub coverage_violations: Vec<FlowError>,
}

impl GlobalMatch {
    pub fn is_complete(&self) -> bool {
        self.unmatched_abstract.is_empty()
            && self.unconsumed_refined.is_empty()
            && self.coverage_violations.is_empty()
    }
}

pub struct GlobalMatcher<'c, 'a> {
    ctx: &'c CheckContext<'a>,
}

/// Where the visible leaves of one state ended up in the refinement.
struct Placement {
    found: Vec<(ItemId, GlobalMode, GlobalEntry)>,
    missing: Vec<ItemId>,
}

impl Placement {
    fn any_in(&self, mode: GlobalMode) -> bool {
        self.found.iter().any(|(_, m, _)| *m == mode)
    }
}

impl<'c, 'a> GlobalMatcher<'c, 'a> {
    pub fn new(ctx: &'c CheckContext<'a>) -> Self {
        Self { ctx }
    }

    fn place(&self, state: ItemId, pool: &mut ClassifiedGlobals) -> Placement {
        let mut found = Vec::new();
        let mut missing = Vec::new();
        for leaf in self.ctx.items.visible_leaves(state) {
            match pool.take_any(leaf) {
                Some((mode, entry)) => found.push((leaf, mode, entry)),
                None => missing.push(leaf),
            }
        }
        Placement { found, missing }
    }

    fn wrong_mode(
        &self,
        state: ItemId,
        constituent: ItemId,
        expected: GlobalMode,
        found: GlobalMode,
        entry: GlobalEntry,
    ) -> FlowError {
        FlowError::WrongConstituentMode {
            state: self.ctx.entity_name(state),
            constituent: self.ctx.entity_name(constituent),
            expected,
            found,
            span: entry.span,
        }
    }

    fn inconsistent(&self, state: ItemId, mode: GlobalMode, entry: GlobalEntry) -> FlowError {
        FlowError::InconsistentModeRefinement {
            state: self.ctx.entity_name(state),
            mode,
            span: entry.span,
        }
    }

    /// Apply the coverage rule of `mode` to `state`. Returns the violations.
    fn check_state(
        &self,
        state: ItemId,
        mode: GlobalMode,
        entry: GlobalEntry,
        pool: &mut ClassifiedGlobals,
    ) -> Vec<FlowError> {
        let placement = self.place(state, pool);
        let mut out = Vec::new();
        match mode {
            GlobalMode::Input | GlobalMode::ProofIn => {
                for (leaf, found, e) in &placement.found {
                    if *found != mode {
                        out.push(self.wrong_mode(state, *leaf, mode, *found, *e));
                    }
                }
                if !placement.any_in(mode) {
                    out.push(self.inconsistent(state, mode, entry));
                }
            }
            GlobalMode::Output => {
                for (leaf, found, e) in &placement.found {
                    if *found != GlobalMode::Output {
                        out.push(self.wrong_mode(state, *leaf, mode, *found, *e));
                    }
                }
                for leaf in &placement.missing {
                    out.push(FlowError::MissingConstituent {
                        state: self.ctx.entity_name(state),
                        constituent: self.ctx.entity_name(*leaf),
                        span: entry.span,
                    });
                }
            }
            GlobalMode::InOut => {
                for (leaf, found, e) in &placement.found {
                    if *found == GlobalMode::ProofIn {
                        out.push(self.wrong_mode(state, *leaf, mode, *found, *e));
                    }
                }
                let has_output = placement.any_in(GlobalMode::Output);
                let in_out = placement.any_in(GlobalMode::InOut);
                let split = placement.any_in(GlobalMode::Input) && has_output;
                let partial = !placement.missing.is_empty() && has_output;
                if !(in_out || split || partial) {
                    out.push(self.inconsistent(state, mode, entry));
                }
            }
        }
        trace!(
            state = %self.ctx.entity_name(state),
            %mode,
            found = placement.found.len(),
            missing = placement.missing.len(),
            violations = out.len(),
            "state coverage checked"
        );
        out
    }

    fn check_plain(
        &self,
        item: ItemId,
        mode: GlobalMode,
        entry: GlobalEntry,
        pool: &mut ClassifiedGlobals,
    ) -> Result<(), FlowError> {
        match pool.take_any(item) {
            Some((found, _)) if found == mode => Ok(()),
            Some((found, refined)) => Err(FlowError::InconsistentItemMode {
                item: self.ctx.entity_name(item),
                expected: mode,
                found,
                span: refined.span,
            }),
            None => Err(FlowError::MissingGlobalItem {
                item: self.ctx.entity_name(item),
                mode,
                span: entry.span,
            }),
        }
    }

    /// Match `abs` against `refined`, reporting into `diags`.
    pub fn run(
        &self,
        abs: &ClassifiedGlobals,
        refined: &ClassifiedGlobals,
        diags: &mut Diagnostics,
    ) -> GlobalMatch {
        let items = self.ctx.items;
        let mut pool = refined.clone();
        let mut result = GlobalMatch::default();
        let mut plain = Vec::new();

        for mode in STATE_ORDER {
            for entry in abs.entries(mode) {
                let id = entry.item;
                if items.is_state(id) && items.has_null_refinement(id) {
                    // Nothing left to mention; tolerate the state itself.
                    pool.take_any(id);
                    continue;
                }
                if !(items.is_state(id) && items.has_non_null_refinement(id)) {
                    plain.push((mode, *entry));
                    continue;
                }
                let violations = self.check_state(id, mode, *entry, &mut pool);
                if violations.iter().any(|v| {
                    matches!(
                        v,
                        FlowError::MissingConstituent { .. }
                            | FlowError::InconsistentModeRefinement { .. }
                    )
                }) {
                    result.unmatched_abstract.push((mode, *entry));
                }
                for v in violations {
                    diags.report(v.clone());
                    result.coverage_violations.push(v);
                }
            }
        }

        for (mode, entry) in plain {
            if let Err(e) = self.check_plain(entry.item, mode, entry, &mut pool) {
                if matches!(e, FlowError::MissingGlobalItem { .. }) {
                    result.unmatched_abstract.push((mode, entry));
                }
                diags.report(e);
            }
        }

        for (mode, entry) in pool.iter() {
            let error = match items.encapsulating_state(entry.item) {
                Some(owner) => FlowError::ExtraConstituent {
                    state: self.ctx.entity_name(owner),
                    constituent: self.ctx.entity_name(entry.item),
                    mode,
                    span: entry.span,
                },
                None => FlowError::ExtraGlobalItem {
                    item: self.ctx.entity_name(entry.item),
                    mode,
                    span: entry.span,
                },
            };
            if error.is_coverage_violation() {
                result.coverage_violations.push(error.clone());
            }
            diags.report(error);
            result.unconsumed_refined.push((mode, entry));
        }

        result
    }
}
