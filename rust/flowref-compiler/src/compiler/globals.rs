//! Global list classification.
//!
//! Partitions a (possibly moded) global list into the four mode sets and
//! records which abstract states among the items currently have a visible
//! null or non-null refinement.

use crate::compiler::context::CheckContext;
use crate::compiler::contract::{ContractExpr, ContractKind, GlobalMode, RawGlobal};
use crate::compiler::errors::{Diagnostics, FlowError};
use crate::compiler::normalize::check_state_constituent_mix;
use flowref_core::{Item, ItemId, Span};

/// One classified global item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalEntry {
    pub item: ItemId,
    pub span: Span,
}

/// The four mode sets of a global contract, each in textual order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifiedGlobals {
    sets: [Vec<GlobalEntry>; 4],
    null_refined: Vec<ItemId>,
    non_null_refined: Vec<ItemId>,
}

impl ClassifiedGlobals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self, mode: GlobalMode) -> &[GlobalEntry] {
        &self.sets[mode.index()]
    }

    pub fn mode_of(&self, item: ItemId) -> Option<GlobalMode> {
        GlobalMode::ALL
            .into_iter()
            .find(|m| self.entries(*m).iter().any(|e| e.item == item))
    }

    /// Every entry with its mode, mode by mode.
    pub fn iter(&self) -> impl Iterator<Item = (GlobalMode, GlobalEntry)> + '_ {
        GlobalMode::ALL
            .into_iter()
            .flat_map(move |m| self.entries(m).iter().map(move |e| (m, *e)))
    }

    pub fn len(&self) -> usize {
        self.sets.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn null_refined_states(&self) -> &[ItemId] {
        &self.null_refined
    }

    pub fn non_null_refined_states(&self) -> &[ItemId] {
        &self.non_null_refined
    }

    /// Remove `item` from the set of `mode`, returning its entry.
    pub fn take(&mut self, mode: GlobalMode, item: ItemId) -> Option<GlobalEntry> {
        let set = &mut self.sets[mode.index()];
        let pos = set.iter().position(|e| e.item == item)?;
        Some(set.remove(pos))
    }

    /// Remove `item` from whichever set holds it.
    pub fn take_any(&mut self, item: ItemId) -> Option<(GlobalMode, GlobalEntry)> {
        let mode = self.mode_of(item)?;
        self.take(mode, item).map(|e| (mode, e))
    }

    fn push(&mut self, mode: GlobalMode, entry: GlobalEntry) {
        self.sets[mode.index()].push(entry);
    }
}

struct Classifier<'c, 'a> {
    ctx: &'c CheckContext<'a>,
    contract: ContractKind,
    diags: &'c mut Diagnostics,
    out: ClassifiedGlobals,
}

impl Classifier<'_, '_> {
    fn malformed(&mut self, reason: &str, span: Span) {
        self.diags.report(FlowError::MalformedRelation {
            contract: self.contract,
            reason: reason.to_string(),
            span,
        });
    }

    fn add(&mut self, item: Item, span: Span, mode: GlobalMode) {
        let id = match item {
            Item::Entity(id) => id,
            Item::Null => {
                return self.malformed("'null' cannot appear inside a global list", span)
            }
            Item::FunctionResult => {
                return self.malformed("a function result cannot be a global item", span)
            }
        };
        let items = self.ctx.items;
        if self.out.mode_of(id).is_some() {
            self.diags.report(FlowError::DuplicateGlobalItem {
                item: self.ctx.entity_name(id),
                span,
            });
            return;
        }
        if items.is_constant(id) && matches!(mode, GlobalMode::Output | GlobalMode::InOut) {
            self.diags.report(FlowError::IllegalConstantMode {
                item: self.ctx.entity_name(id),
                mode,
                span,
            });
            return;
        }
        self.out.push(mode, GlobalEntry { item: id, span });
        if items.is_state(id) {
            if items.has_null_refinement(id) {
                self.out.null_refined.push(id);
            } else if items.has_non_null_refinement(id) {
                self.out.non_null_refined.push(id);
            }
        }
    }

    fn expr(&mut self, e: &ContractExpr, mode: GlobalMode) {
        match e {
            ContractExpr::Null(span) => self.add(Item::Null, *span, mode),
            ContractExpr::Single(item, span) => self.add(*item, *span, mode),
            ContractExpr::Aggregate(elems, span) => {
                if elems.is_empty() {
                    return self.malformed("empty item list", *span);
                }
                for x in elems {
                    match x {
                        ContractExpr::Aggregate(_, s) => {
                            self.malformed("nested item lists are not allowed", *s)
                        }
                        other => self.expr(other, mode),
                    }
                }
            }
        }
    }

    fn list(&mut self, g: &RawGlobal, mode: GlobalMode, nested: bool) {
        match g {
            RawGlobal::Null(_) => {}
            RawGlobal::Items(e) => self.expr(e, mode),
            RawGlobal::Moded(lists, span) => {
                if nested {
                    return self.malformed("a moded list cannot contain another moded list", *span);
                }
                let mut modes_seen = Vec::with_capacity(lists.len());
                for l in lists {
                    if modes_seen.contains(&l.mode) {
                        self.malformed(
                            &format!("mode {} is given more than once", l.mode),
                            l.mode_span,
                        );
                        continue;
                    }
                    modes_seen.push(l.mode);
                    self.list(&l.items, l.mode, true);
                }
            }
        }
    }
}

/// Classify `relation`. Unmoded items fall under `default_mode`.
pub fn classify(
    relation: &RawGlobal,
    default_mode: GlobalMode,
    contract: ContractKind,
    ctx: &CheckContext<'_>,
    diags: &mut Diagnostics,
) -> ClassifiedGlobals {
    check_state_constituent_mix(&relation.mentions(), contract, ctx, diags);
    let mut c = Classifier {
        ctx,
        contract,
        diags,
        out: ClassifiedGlobals::new(),
    };
    c.list(relation, default_mode, false);
    tracing::trace!(
        %contract,
        items = c.out.len(),
        null_refined = c.out.null_refined.len(),
        non_null_refined = c.out.non_null_refined.len(),
        "classified global list"
    );
    c.out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::errors::DiagnosticKind;
    use crate::compiler::parser::parse_global;
    use crate::compiler::resolve::{resolve_global, Scope};
    use flowref_core::{ItemTable, ObjectKind, Refinement};

    fn table() -> ItemTable {
        let mut t = ItemTable::new();
        for n in ["X", "Y", "C1", "C2"] {
            t.declare_object(n, ObjectKind::Variable, None, Span::dummy())
                .unwrap();
        }
        t.declare_object("K", ObjectKind::Constant, None, Span::dummy())
            .unwrap();
        let s = t.declare_state("S", None, Span::dummy()).unwrap();
        let n = t.declare_state("N", None, Span::dummy()).unwrap();
        let c1 = t.lookup("C1").unwrap();
        let c2 = t.lookup("C2").unwrap();
        t.set_refinement(s, Refinement::NonNull(vec![c1, c2])).unwrap();
        t.set_refinement(n, Refinement::Null).unwrap();
        t
    }

    fn run(t: &ItemTable, src: &str) -> (ClassifiedGlobals, Diagnostics) {
        let scope = Scope::package(t);
        let rel = resolve_global(&parse_global(src).unwrap(), &scope).unwrap();
        let ctx = CheckContext::new(t);
        let mut d = Diagnostics::new();
        let g = classify(&rel, GlobalMode::Input, ContractKind::Global, &ctx, &mut d);
        (g, d)
    }

    #[test]
    fn unmoded_list_defaults_to_input() {
        let t = table();
        let (g, d) = run(&t, "(X, Y)");
        assert!(d.is_empty());
        assert_eq!(g.entries(GlobalMode::Input).len(), 2);
        assert_eq!(g.mode_of(t.lookup("Y").unwrap()), Some(GlobalMode::Input));
    }

    #[test]
    fn moded_lists_and_refinement_records() {
        let t = table();
        let (g, d) = run(&t, "(Input => X, Output => (S, Y), In_Out => N, Proof_In => K)");
        assert!(d.is_empty(), "{:?}", d);
        assert_eq!(g.mode_of(t.lookup("S").unwrap()), Some(GlobalMode::Output));
        assert_eq!(g.mode_of(t.lookup("K").unwrap()), Some(GlobalMode::ProofIn));
        assert_eq!(g.non_null_refined_states(), &[t.lookup("S").unwrap()]);
        assert_eq!(g.null_refined_states(), &[t.lookup("N").unwrap()]);
        assert_eq!(g.len(), 5);
    }

    #[test]
    fn duplicates_across_modes() {
        let t = table();
        let (g, d) = run(&t, "(Input => X, Output => X)");
        assert_eq!(d.count(DiagnosticKind::DuplicateGlobalItem), 1);
        assert_eq!(g.mode_of(t.lookup("X").unwrap()), Some(GlobalMode::Input));
    }

    #[test]
    fn constant_cannot_be_written() {
        let t = table();
        let (_, d) = run(&t, "(Output => K)");
        assert_eq!(d.count(DiagnosticKind::IllegalConstantMode), 1);
        let (_, d) = run(&t, "(In_Out => K)");
        assert_eq!(d.count(DiagnosticKind::IllegalConstantMode), 1);
    }

    #[test]
    fn null_mode_list_is_empty() {
        let t = table();
        let (g, d) = run(&t, "(Input => null, Output => X)");
        assert!(d.is_empty());
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn nested_moded_list_is_malformed() {
        let t = table();
        let (_, d) = run(&t, "(Input => (Output => X))");
        assert_eq!(d.count(DiagnosticKind::MalformedRelation), 1);
    }

    #[test]
    fn state_with_own_constituent_is_rejected() {
        let t = table();
        let (_, d) = run(&t, "(Input => S, Output => C1)");
        assert_eq!(
            d.count(DiagnosticKind::CannotMentionStateAndConstituentTogether),
            1
        );
    }

    #[test]
    fn take_consumes_entries() {
        let t = table();
        let (mut g, _) = run(&t, "(Input => (X, Y))");
        let x = t.lookup("X").unwrap();
        assert!(g.take(GlobalMode::Input, x).is_some());
        assert!(g.take(GlobalMode::Input, x).is_none());
        assert_eq!(g.len(), 1);
    }
}
