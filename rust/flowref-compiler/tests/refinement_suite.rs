//! End-to-end refinement checks: annotation text in, verdict out.
//!
//! Every test declares the same small compilation unit:
//! objects `X`, `Y`, `A`, `B`, `C1`, `C2`, `K` (constant) and states
//! `S => (C1, C2)`, `T => (A, B)`, `N => null`, `U` (not refined).

use std::collections::HashSet;

use flowref_compiler::compiler::checker::RefinementChecker;
use flowref_compiler::compiler::context::CheckContext;
use flowref_compiler::compiler::contract::ContractKind;
use flowref_compiler::compiler::normalize::normalize;
use flowref_compiler::compiler::parser::parse_depends;
use flowref_compiler::compiler::resolve::{resolve_depends, Scope};
use flowref_compiler::{
    check_package_text, check_subprogram_text, resolve_subprogram, CheckOptions, DiagnosticKind,
    Diagnostics, FlowError, Outcome, SubprogramText,
};
use flowref_core::{Item, ItemTable, ObjectKind, Span};

fn unit() -> ItemTable {
    let mut t = ItemTable::new();
    for name in ["X", "Y", "A", "B", "C1", "C2"] {
        t.declare_object(name, ObjectKind::Variable, None, Span::dummy())
            .unwrap();
    }
    t.declare_object("K", ObjectKind::Constant, None, Span::dummy())
        .unwrap();
    for name in ["S", "T", "N", "U"] {
        t.declare_state(name, None, Span::dummy()).unwrap();
    }
    let v = check_package_text(&mut t, "P", "(S => (C1, C2), T => (A, B), N => null)").unwrap();
    assert!(v.is_accepted(), "package refinement rejected: {:?}", v.diagnostics);
    t
}

fn check(t: &ItemTable, sub: &SubprogramText) -> flowref_compiler::compiler::checker::Verdict {
    check_subprogram_text(t, sub, CheckOptions::default()).expect("annotations should parse")
}

fn kinds(errors: &[FlowError]) -> Vec<DiagnosticKind> {
    errors.iter().map(FlowError::kind).collect()
}

fn edges(t: &ItemTable, src: &str) -> (HashSet<(Item, Item)>, usize) {
    let rel = resolve_depends(&parse_depends(src).unwrap(), &Scope::package(t)).unwrap();
    let mut d = Diagnostics::new();
    let edges = normalize(&rel, ContractKind::Depends, &CheckContext::new(t), &mut d);
    assert!(d.is_empty(), "{:?}", d);
    let count = edges.len();
    (edges.iter().map(|e| e.key()).collect(), count)
}

// ============================================================================
// Normalization
// ============================================================================

#[test]
fn normalization_preserves_edge_count() {
    let t = unit();
    let (_, count) = edges(&t, "((X, Y) => (A, B, K))");
    assert_eq!(count, 6);
}

#[test]
fn self_dependency_shorthand_is_explicit_self_input() {
    let t = unit();
    let (plus, plus_count) = edges(&t, "(X =>+ Y)");
    let (explicit, explicit_count) = edges(&t, "(X => (X, Y))");
    assert_eq!(plus, explicit);
    assert_eq!(plus_count, 2);
    assert_eq!(explicit_count, 2);
}

// ============================================================================
// Dependency refinement
// ============================================================================

#[test]
fn end_to_end_scenario_is_accepted() {
    let t = unit();
    let sub = SubprogramText::new("Op")
        .with_depends("(Y => X)")
        .with_global("(Output => S, Input => X)")
        .with_refined_depends("(Y => X, C1 => X)")
        .with_refined_global("(Output => (C1, C2), Input => X)");
    let v = check(&t, &sub);
    assert_eq!(v.outcome, Outcome::Accepted, "{:?}", v.diagnostics);
    assert!(v.diagnostics.is_empty());
    assert!(v.unmatched_abstract.is_empty());
    assert!(v.unconsumed_refined.is_empty());
}

#[test]
fn state_output_discharged_by_its_constituents() {
    let t = unit();
    let sub = SubprogramText::new("Op")
        .with_depends("(S => X)")
        .with_refined_depends("((C1, C2) => X)");
    let v = check(&t, &sub);
    assert!(v.is_accepted(), "{:?}", v.diagnostics);
}

#[test]
fn null_refined_state_matches_null_refined_relation() {
    let t = unit();
    let sub = SubprogramText::new("Op")
        .with_depends("(N => N)")
        .with_refined_depends("null");
    let v = check(&t, &sub);
    assert!(v.is_accepted(), "{:?}", v.diagnostics);
}

#[test]
fn null_output_on_null_refined_state() {
    let t = unit();
    let sub = SubprogramText::new("Op")
        .with_depends("(X => Y, null => N)")
        .with_refined_depends("(X => Y)");
    let v = check(&t, &sub);
    assert!(v.is_accepted(), "{:?}", v.diagnostics);
}

#[test]
fn null_refined_input_is_dropped_from_the_refinement() {
    let t = unit();
    let sub = SubprogramText::new("Op")
        .with_depends("(Y => (X, N))")
        .with_refined_depends("(Y => X)");
    let v = check(&t, &sub);
    assert!(v.is_accepted(), "{:?}", v.diagnostics);
}

#[test]
fn null_refined_output_is_dropped_from_the_refinement() {
    let t = unit();
    let sub = SubprogramText::new("Op")
        .with_depends("(N => X, Y => X)")
        .with_refined_depends("(Y => X)");
    let v = check(&t, &sub);
    assert!(v.is_accepted(), "{:?}", v.diagnostics);
}

#[test]
fn null_refined_input_still_needs_its_output_written() {
    let t = unit();
    let sub = SubprogramText::new("Op")
        .with_depends("(Y => (X, N))")
        .with_refined_depends("null");
    let v = check(&t, &sub);
    assert_eq!(
        kinds(&v.diagnostics),
        vec![DiagnosticKind::MissingRefinement, DiagnosticKind::MissingRefinement]
    );
    let missing: Vec<String> = v.unmatched_abstract.iter().map(|l| l.to_string()).collect();
    assert_eq!(missing, vec!["Y => X".to_string(), "Y => N".to_string()]);
}

#[test]
fn missing_and_extra_refinement() {
    let t = unit();
    let sub = SubprogramText::new("Op")
        .with_depends("(X => Y)")
        .with_refined_depends("(X => A)");
    let v = check(&t, &sub);
    assert_eq!(
        kinds(&v.diagnostics),
        vec![
            DiagnosticKind::MissingRefinement,
            DiagnosticKind::ExtraOrUnmatchedRefinement
        ]
    );
    assert_eq!(v.unmatched_abstract.len(), 1);
    assert_eq!(v.unmatched_abstract[0].to_string(), "X => Y");
    assert_eq!(v.unconsumed_refined[0].to_string(), "X => A");
}

#[test]
fn explicit_empty_input_marker_is_never_extra() {
    let t = unit();
    let sub = SubprogramText::new("Op")
        .with_depends("(X => Y)")
        .with_refined_depends("(X => Y, A => null)");
    let v = check(&t, &sub);
    assert!(v.is_accepted(), "{:?}", v.diagnostics);
}

#[test]
fn self_dependency_of_state_kept_by_unmentioned_constituent() {
    let t = unit();
    let sub = SubprogramText::new("Op")
        .with_depends("(S =>+ X)")
        .with_refined_depends("(C1 => X)");
    let v = check(&t, &sub);
    assert!(v.is_accepted(), "{:?}", v.diagnostics);

    // Every constituent written: the self-dependency needs a refined edge.
    let sub = SubprogramText::new("Op")
        .with_depends("(S =>+ X)")
        .with_refined_depends("(C1 => X, C2 => X)");
    let v = check(&t, &sub);
    assert_eq!(kinds(&v.diagnostics), vec![DiagnosticKind::MissingRefinement]);
}

#[test]
fn repeated_check_is_idempotent() {
    let t = unit();
    let sub = SubprogramText::new("Op")
        .with_depends("(X => Y, Y => (A, B))")
        .with_refined_depends("(X => Y, Y => A, C1 => B)");
    let contracts = resolve_subprogram(&t, &sub).unwrap();
    let checker = RefinementChecker::new(&t);

    let first = checker.check_subprogram(&contracts);
    let second = checker.check_subprogram(&contracts);
    assert_eq!(first, second);

    let mut sink = Diagnostics::new();
    checker.check_subprogram_into(&contracts, &mut sink);
    let after_one = sink.len();
    checker.check_subprogram_into(&contracts, &mut sink);
    assert_eq!(sink.len(), after_one);
    assert_eq!(after_one, first.diagnostics.len());
}

// ============================================================================
// Global refinement
// ============================================================================

#[test]
fn output_state_needs_every_constituent() {
    let t = unit();
    let sub = SubprogramText::new("Op")
        .with_global("(Output => T)")
        .with_refined_global("(Output => A)");
    let v = check(&t, &sub);
    assert_eq!(kinds(&v.diagnostics), vec![DiagnosticKind::MissingConstituent]);
    match &v.diagnostics[0] {
        FlowError::MissingConstituent {
            state, constituent, ..
        } => {
            assert_eq!(state, "T");
            assert_eq!(constituent, "B");
        }
        other => panic!("expected a missing constituent, got {:?}", other),
    }
    assert_eq!(v.coverage_violations.len(), 1);
}

#[test]
fn in_out_state_split_into_input_and_output() {
    let t = unit();
    let sub = SubprogramText::new("Op")
        .with_global("(In_Out => T)")
        .with_refined_global("(Input => A, Output => B)");
    let v = check(&t, &sub);
    assert!(v.is_accepted(), "{:?}", v.diagnostics);
}

#[test]
fn in_out_state_partially_written() {
    let t = unit();
    let sub = SubprogramText::new("Op")
        .with_global("(In_Out => T)")
        .with_refined_global("(Output => A)");
    let v = check(&t, &sub);
    assert!(v.is_accepted(), "{:?}", v.diagnostics);

    let sub = SubprogramText::new("Op")
        .with_global("(In_Out => T)")
        .with_refined_global("(Input => (A, B))");
    let v = check(&t, &sub);
    assert_eq!(
        kinds(&v.diagnostics),
        vec![DiagnosticKind::InconsistentModeRefinement]
    );
}

#[test]
fn input_state_constituent_written() {
    let t = unit();
    let sub = SubprogramText::new("Op")
        .with_global("(Input => T)")
        .with_refined_global("(Input => A, Output => B)");
    let v = check(&t, &sub);
    assert_eq!(kinds(&v.diagnostics), vec![DiagnosticKind::WrongConstituentMode]);
}

#[test]
fn plain_item_mode_mismatch() {
    let t = unit();
    let sub = SubprogramText::new("Op")
        .with_global("(Input => X)")
        .with_refined_global("(Output => X)");
    let v = check(&t, &sub);
    assert_eq!(kinds(&v.diagnostics), vec![DiagnosticKind::InconsistentItemMode]);
    match &v.diagnostics[0] {
        FlowError::InconsistentItemMode { item, .. } => assert_eq!(item, "X"),
        other => panic!("expected a mode mismatch, got {:?}", other),
    }
}

#[test]
fn missing_and_extra_global_items() {
    let t = unit();
    let sub = SubprogramText::new("Op")
        .with_global("(Input => (X, Y))")
        .with_refined_global("(Input => (X, K, C1))");
    let v = check(&t, &sub);
    let found = kinds(&v.diagnostics);
    assert!(found.contains(&DiagnosticKind::MissingGlobalItem));
    assert!(found.contains(&DiagnosticKind::ExtraGlobalItem));
    assert!(found.contains(&DiagnosticKind::ExtraConstituent));
    assert_eq!(v.unconsumed_refined.len(), 2);
}

#[test]
fn null_refined_state_needs_no_mention() {
    let t = unit();
    let sub = SubprogramText::new("Op")
        .with_global("(In_Out => N, Input => X)")
        .with_refined_global("(Input => X)");
    let v = check(&t, &sub);
    assert!(v.is_accepted(), "{:?}", v.diagnostics);
}

#[test]
fn unrefined_state_is_a_plain_item() {
    let t = unit();
    let sub = SubprogramText::new("Op")
        .with_global("(Proof_In => U)")
        .with_refined_global("(Proof_In => U)");
    let v = check(&t, &sub);
    assert!(v.is_accepted(), "{:?}", v.diagnostics);
}

// ============================================================================
// Pre-checks and shape errors
// ============================================================================

#[test]
fn refinement_without_abstract_contract_is_useless() {
    let t = unit();
    let sub = SubprogramText::new("Op").with_refined_global("(Input => X)");
    let v = check(&t, &sub);
    assert_eq!(kinds(&v.diagnostics), vec![DiagnosticKind::UselessRefinement]);

    let sub = SubprogramText::new("Op")
        .with_depends("null")
        .with_refined_depends("(X => Y)");
    let v = check(&t, &sub);
    assert_eq!(kinds(&v.diagnostics), vec![DiagnosticKind::UselessRefinement]);
}

#[test]
fn refined_contract_must_name_constituents() {
    let t = unit();
    let sub = SubprogramText::new("Op")
        .with_global("(Output => S)")
        .with_refined_global("(Output => S)");
    let v = check(&t, &sub);
    assert_eq!(
        kinds(&v.diagnostics),
        vec![DiagnosticKind::StateRequiresConstituents]
    );
}

#[test]
fn state_and_constituent_together() {
    let t = unit();
    let sub = SubprogramText::new("Op")
        .with_depends("(X => (S, C1))")
        .with_refined_depends("(X => (C1, C2))");
    let v = check(&t, &sub);
    assert!(kinds(&v.diagnostics)
        .contains(&DiagnosticKind::CannotMentionStateAndConstituentTogether));
}

#[test]
fn malformed_clause_is_skipped_but_checking_continues() {
    let t = unit();
    let sub = SubprogramText::new("Op")
        .with_depends("(X => Y)")
        .with_refined_depends("(null => null, X => Y, A =>+ null)");
    let v = check(&t, &sub);
    assert_eq!(
        kinds(&v.diagnostics),
        vec![
            DiagnosticKind::MalformedRelation,
            DiagnosticKind::UselessSelfDependency
        ]
    );
}

#[test]
fn constant_cannot_be_written() {
    let t = unit();
    let sub = SubprogramText::new("Op")
        .with_global("(Output => K)")
        .with_refined_global("(Output => K)");
    let v = check(&t, &sub);
    assert!(kinds(&v.diagnostics).contains(&DiagnosticKind::IllegalConstantMode));
}

#[test]
fn options_select_the_checked_refinements() {
    let t = unit();
    let sub = SubprogramText::new("Op")
        .with_depends("(X => Y)")
        .with_refined_depends("(X => A)")
        .with_global("(Input => X)")
        .with_refined_global("(Output => X)");
    let only_globals = CheckOptions {
        check_depends: false,
        check_globals: true,
    };
    let v = check_subprogram_text(&t, &sub, only_globals).unwrap();
    assert_eq!(kinds(&v.diagnostics), vec![DiagnosticKind::InconsistentItemMode]);
}

// ============================================================================
// State refinement
// ============================================================================

#[test]
fn package_refinement_errors() {
    let mut t = unit();
    let v = check_package_text(&mut t, "P", "(S => A, X => B)").unwrap();
    let found = kinds(&v.diagnostics);
    // S is already refined by the unit, X is not a state.
    assert!(found.contains(&DiagnosticKind::DuplicateStateRefinement));
    assert!(found.contains(&DiagnosticKind::NotAState));
    assert_eq!(v.outcome, Outcome::Rejected);
}

#[test]
fn package_refinement_with_claimed_constituent() {
    let mut t = unit();
    let v = check_package_text(&mut t, "P", "(U => (A, Y))").unwrap();
    assert_eq!(
        kinds(&v.diagnostics),
        vec![DiagnosticKind::ConstituentAlreadyClaimed]
    );
    let u = t.lookup("U").unwrap();
    assert_eq!(t.constituents(u), &[t.lookup("Y").unwrap()]);
}
