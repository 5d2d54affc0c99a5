//! flowref Compiler
//!
//! Checks the refined information-flow contracts of subprogram bodies
//! (`Refined_Depends`, `Refined_Global`) against their specifications
//! (`Depends`, `Global`), and validates the `Refined_State` contracts of
//! package bodies.

pub mod compiler;
pub mod diagnostics;
pub mod sheet;

use compiler::checker::{
    check_package, PackageRefinement, RefinementChecker, Resolved, SubprogramContracts, Verdict,
};
use compiler::contract::ContractKind;
use compiler::parser::{parse_depends_at, parse_global_at, parse_refined_state_at, ParseError};
use compiler::resolve::{resolve_depends, resolve_global, resolve_refined_state, Scope};
use flowref_core::{ItemId, ItemTable, Span};
use sheet::ContractSheet;

use thiserror::Error;
use tracing::debug;

pub use compiler::checker::{Leftover, Outcome};
pub use compiler::errors::{DiagnosticKind, Diagnostics, FlowError};

// ── Check options ───────────────────────────────────────────────────

/// Options selecting which refinements are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckOptions {
    /// Check `Refined_Depends` against `Depends`. Default: `true`.
    pub check_depends: bool,
    /// Check `Refined_Global` against `Global`. Default: `true`.
    pub check_globals: bool,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            check_depends: true,
            check_globals: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum CheckError {
    #[error("parse errors: {0:?}")]
    Parse(Vec<ParseError>),
    #[error("contract errors: {0:?}")]
    Flow(Vec<FlowError>),
}

impl CheckError {
    /// The diagnostics of a rejected verdict as an error.
    pub fn from_verdict(verdict: &Verdict) -> Option<CheckError> {
        if verdict.is_accepted() {
            None
        } else {
            Some(CheckError::Flow(verdict.diagnostics.clone()))
        }
    }
}

impl From<ParseError> for CheckError {
    fn from(err: ParseError) -> Self {
        CheckError::Parse(vec![err])
    }
}

// ── Text-level entry points ─────────────────────────────────────────

/// The flow contracts of one subprogram as annotation text.
#[derive(Debug, Clone, Default)]
pub struct SubprogramText {
    pub name: String,
    pub is_function: bool,
    /// Formal parameters, declared in the item table beforehand
    pub params: Vec<ItemId>,
    pub depends: Option<String>,
    pub global: Option<String>,
    pub refined_depends: Option<String>,
    pub refined_global: Option<String>,
}

impl SubprogramText {
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

    pub fn with_params(mut self, params: impl IntoIterator<Item = ItemId>) -> Self {
        self.params.extend(params);
        self
    }

    pub fn with_depends(mut self, text: impl Into<String>) -> Self {
        self.depends = Some(text.into());
        self
    }

    pub fn with_global(mut self, text: impl Into<String>) -> Self {
        self.global = Some(text.into());
        self
    }

    pub fn with_refined_depends(mut self, text: impl Into<String>) -> Self {
        self.refined_depends = Some(text.into());
        self
    }

    pub fn with_refined_global(mut self, text: impl Into<String>) -> Self {
        self.refined_global = Some(text.into());
        self
    }

    /// Lay out the annotations that are present, in the order
    /// Depends, Global, Refined_Depends, Refined_Global. Diagnostic spans
    /// index the source of this sheet.
    pub fn sheet(&self) -> ContractSheet {
        let mut sheet = ContractSheet::new();
        let slots = [
            (ContractKind::Depends, &self.depends),
            (ContractKind::Global, &self.global),
            (ContractKind::RefinedDepends, &self.refined_depends),
            (ContractKind::RefinedGlobal, &self.refined_global),
        ];
        for (kind, text) in slots {
            if let Some(text) = text {
                sheet.push(kind, text);
            }
        }
        sheet
    }
}

/// Parse and resolve the annotations of `sub`. Syntax errors in any
/// annotation are fatal; resolution failures stay attached to the contract
/// they occur in.
pub fn resolve_subprogram(
    items: &ItemTable,
    sub: &SubprogramText,
) -> Result<SubprogramContracts, CheckError> {
    let sheet = sub.sheet();
    let function = sub.is_function.then_some(sub.name.as_str());
    let scope = Scope::subprogram(items, &sub.params, function);

    let mut contracts = SubprogramContracts::new(&sub.name);
    contracts.is_function = sub.is_function;
    let mut parse_errors = Vec::new();

    for ann in sheet.annotations() {
        match ann.kind {
            ContractKind::Depends | ContractKind::RefinedDepends => {
                let resolved: Resolved<_> = match parse_depends_at(&ann.text, ann.origin) {
                    Ok(ast) => resolve_depends(&ast, &scope),
                    Err(e) => {
                        parse_errors.push(e);
                        continue;
                    }
                };
                if ann.kind == ContractKind::Depends {
                    contracts.depends = Some(resolved);
                } else {
                    contracts.refined_depends = Some(resolved);
                }
            }
            ContractKind::Global | ContractKind::RefinedGlobal => {
                let resolved: Resolved<_> = match parse_global_at(&ann.text, ann.origin) {
                    Ok(ast) => resolve_global(&ast, &scope),
                    Err(e) => {
                        parse_errors.push(e);
                        continue;
                    }
                };
                if ann.kind == ContractKind::Global {
                    contracts.global = Some(resolved);
                } else {
                    contracts.refined_global = Some(resolved);
                }
            }
            ContractKind::RefinedState => {}
        }
    }
    contracts.span = sheet
        .annotations()
        .iter()
        .map(|a| a.origin)
        .fold(Span::dummy(), Span::merge);

    if !parse_errors.is_empty() {
        return Err(CheckError::Parse(parse_errors));
    }
    Ok(contracts)
}

/// Check the refinements of one subprogram given as annotation text.
pub fn check_subprogram_text(
    items: &ItemTable,
    sub: &SubprogramText,
    options: CheckOptions,
) -> Result<Verdict, CheckError> {
    let contracts = resolve_subprogram(items, sub)?;
    debug!(subprogram = %sub.name, "contracts resolved");
    Ok(RefinementChecker::with_options(items, options).check_subprogram(&contracts))
}

/// Lay out a `Refined_State` annotation on its own sheet.
pub fn package_sheet(refined_state: &str) -> ContractSheet {
    let mut sheet = ContractSheet::new();
    sheet.push(ContractKind::RefinedState, refined_state);
    sheet
}

/// Validate the `Refined_State` annotation of package `name` and record its
/// refinements in `items`. Spans index the source of [`package_sheet`].
pub fn check_package_text(
    items: &mut ItemTable,
    name: &str,
    refined_state: &str,
) -> Result<Verdict, CheckError> {
    let sheet = package_sheet(refined_state);
    let origin = sheet
        .annotation(ContractKind::RefinedState)
        .map_or(Span::new(0, 0, 1, 1), |a| a.origin);
    let ast = parse_refined_state_at(refined_state.trim_end(), origin)?;
    let clauses = resolve_refined_state(&ast, &Scope::package(items));
    let package = PackageRefinement {
        name: name.to_string(),
        span: origin,
        refined_state: clauses,
    };
    Ok(check_package(items, &package))
}

/// Format a check error with rich diagnostics (colors, source snippets, suggestions).
///
/// This is a convenience function that wraps `diagnostics::format_check_error`
/// and renders all diagnostics with ANSI colors for terminal display.
pub fn format_error(error: &CheckError, source: &str, filename: &str) -> String {
    diagnostics::format_check_error(error, source, filename)
        .iter()
        .map(|d| d.render_ansi())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowref_core::{ObjectKind, ParamRole};

    fn table() -> ItemTable {
        let mut t = ItemTable::new();
        for n in ["A", "B", "X"] {
            t.declare_object(n, ObjectKind::Variable, None, Span::dummy())
                .unwrap();
        }
        t.declare_state("S", None, Span::dummy()).unwrap();
        t
    }

    #[test]
    fn test_check_accepted() {
        let mut t = table();
        let v = check_package_text(&mut t, "P", "(S => (A, B))").unwrap();
        assert!(v.is_accepted(), "{:?}", v.diagnostics);

        let sub = SubprogramText::new("Update")
            .with_global("(In_Out => S)")
            .with_depends("(S => S)")
            .with_refined_global("(In_Out => (A, B))")
            .with_refined_depends("(A => A, B => B)");
        let v = check_subprogram_text(&t, &sub, CheckOptions::default()).unwrap();
        assert!(v.is_accepted(), "{:?}", v.diagnostics);
        assert!(CheckError::from_verdict(&v).is_none());
    }

    #[test]
    fn test_parse_errors_are_fatal() {
        let t = table();
        let sub = SubprogramText::new("P")
            .with_depends("(X => ")
            .with_refined_depends("(X => @)");
        match check_subprogram_text(&t, &sub, CheckOptions::default()) {
            Err(CheckError::Parse(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("expected parse errors, got {:?}", other),
        }
    }

    #[test]
    fn test_spans_point_into_the_sheet() {
        let t = table();
        let sub = SubprogramText::new("P")
            .with_depends("(X => A)")
            .with_refined_depends("(X => B)");
        let v = check_subprogram_text(&t, &sub, CheckOptions::default()).unwrap();
        assert!(!v.is_accepted());
        let source = sub.sheet().source().to_string();
        let extra = v
            .diagnostics
            .iter()
            .find(|e| e.kind() == DiagnosticKind::ExtraOrUnmatchedRefinement)
            .unwrap();
        assert_eq!(extra.span().line, 2);

        let err = CheckError::from_verdict(&v).unwrap();
        let rendered = diagnostics::format_check_error(&err, &source, "unit.toml");
        assert!(rendered
            .iter()
            .any(|d| d.source_line.as_deref() == Some("Refined_Depends => (X => B)")));
    }

    #[test]
    fn test_unresolved_name_is_contract_local() {
        let t = table();
        let sub = SubprogramText::new("P")
            .with_depends("(X => A)")
            .with_refined_depends("(X => Aa)")
            .with_global("(Input => A, Output => X)")
            .with_refined_global("(Input => A, Output => X)");
        let v = check_subprogram_text(&t, &sub, CheckOptions::default()).unwrap();
        assert_eq!(v.diagnostics.len(), 1);
        match &v.diagnostics[0] {
            FlowError::UnresolvedEntity {
                name, suggestions, ..
            } => {
                assert_eq!(name, "Aa");
                assert!(suggestions.contains(&"A".to_string()));
            }
            other => panic!("expected unresolved name, got {:?}", other),
        }
    }

    #[test]
    fn test_options_skip_depends() {
        let t = table();
        let sub = SubprogramText::new("P")
            .with_depends("(X => A)")
            .with_refined_depends("(X => B)");
        let options = CheckOptions {
            check_depends: false,
            ..CheckOptions::default()
        };
        let v = check_subprogram_text(&t, &sub, options).unwrap();
        assert!(v.is_accepted());
    }

    #[test]
    fn test_function_result() {
        let mut t = table();
        let p = t.declare_parameter("V", ParamRole::In, Span::dummy());
        let sub = SubprogramText::new("Get")
            .function()
            .with_params([p])
            .with_depends("(Get'Result => (V, X))")
            .with_refined_depends("(Get'Result => (V, X))");
        let v = check_subprogram_text(&t, &sub, CheckOptions::default()).unwrap();
        assert!(v.is_accepted(), "{:?}", v.diagnostics);
    }
}
