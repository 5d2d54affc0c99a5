//! Contract violations and the sink they are collected in.
//!
//! Every phase reports into an explicit [`Diagnostics`] value instead of
//! failing fast, so one body yields its full list of problems in one pass.
//! The sink drops exact duplicates, which keeps repeated checks of the same
//! contract (one per generic instantiation) from piling up messages.

use crate::compiler::contract::{ContractKind, GlobalMode};
use flowref_core::{ExternalProperty, Span};

use std::collections::HashSet;
use strum_macros::{EnumDiscriminants, EnumIter, IntoStaticStr};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Error, EnumDiscriminants)]
#[strum_discriminants(name(DiagnosticKind), derive(Hash, EnumIter, IntoStaticStr))]
pub enum FlowError {
    // ── Relation shape ──
    #[error("malformed {contract} relation: {reason}")]
    MalformedRelation {
        contract: ContractKind,
        reason: String,
        span: Span,
    },
    #[error("useless self-dependency in {contract}: 'null' cannot depend on itself")]
    UselessSelfDependency { contract: ContractKind, span: Span },
    #[error("'{item}' appears as output of more than one clause")]
    DuplicateOutput { item: String, span: Span },
    #[error("input '{input}' of output '{output}' is listed more than once")]
    DuplicateInput {
        output: String,
        input: String,
        span: Span,
    },
    #[error("global item '{item}' is listed more than once")]
    DuplicateGlobalItem { item: String, span: Span },
    #[error("constant '{item}' cannot have mode {mode}")]
    IllegalConstantMode {
        item: String,
        mode: GlobalMode,
        span: Span,
    },
    #[error("{contract} cannot mention both state '{state}' and its constituent '{constituent}'")]
    CannotMentionStateAndConstituentTogether {
        contract: ContractKind,
        state: String,
        constituent: String,
        span: Span,
    },

    // ── Dependency refinement ──
    #[error("dependence of '{output}' on '{input}' has no matching refinement")]
    MissingRefinement {
        output: String,
        input: String,
        span: Span,
    },
    #[error("refined dependence of '{output}' on '{input}' does not refine any dependence")]
    ExtraOrUnmatchedRefinement {
        output: String,
        input: String,
        span: Span,
    },

    // ── Global refinement ──
    #[error("constituent '{constituent}' of state '{state}' must have mode {expected}, found {found}")]
    WrongConstituentMode {
        state: String,
        constituent: String,
        expected: GlobalMode,
        found: GlobalMode,
        span: Span,
    },
    #[error("constituent '{constituent}' of state '{state}' is missing from the global refinement")]
    MissingConstituent {
        state: String,
        constituent: String,
        span: Span,
    },
    #[error("global refinement of state '{state}' does not establish mode {mode}")]
    InconsistentModeRefinement {
        state: String,
        mode: GlobalMode,
        span: Span,
    },
    #[error("global item '{item}' has mode {expected} but its refinement has mode {found}")]
    InconsistentItemMode {
        item: String,
        expected: GlobalMode,
        found: GlobalMode,
        span: Span,
    },
    #[error("global item '{item}' of mode {mode} is missing from the global refinement")]
    MissingGlobalItem {
        item: String,
        mode: GlobalMode,
        span: Span,
    },
    #[error("extra global item '{item}' of mode {mode} in global refinement")]
    ExtraGlobalItem {
        item: String,
        mode: GlobalMode,
        span: Span,
    },
    #[error("constituent '{constituent}' of state '{state}' refines no item of the global contract")]
    ExtraConstituent {
        state: String,
        constituent: String,
        mode: GlobalMode,
        span: Span,
    },

    // ── Orchestration ──
    #[error("useless {contract}: {reason}")]
    UselessRefinement {
        contract: ContractKind,
        reason: String,
        span: Span,
    },
    #[error("{contract} must mention the constituents of state '{state}', not the state itself")]
    StateRequiresConstituents {
        contract: ContractKind,
        state: String,
        span: Span,
    },
    #[error("unresolved name '{name}' in {contract}")]
    UnresolvedEntity {
        contract: ContractKind,
        name: String,
        suggestions: Vec<String>,
        span: Span,
    },

    // ── State refinement ──
    #[error("'{name}' is not an abstract state")]
    NotAState { name: String, span: Span },
    #[error("state '{state}' is refined more than once")]
    DuplicateStateRefinement { state: String, span: Span },
    #[error("'{constituent}' cannot be a constituent: {reason}")]
    InvalidConstituent {
        constituent: String,
        reason: String,
        span: Span,
    },
    #[error("'{constituent}' is already a constituent of state '{owner}'")]
    ConstituentAlreadyClaimed {
        constituent: String,
        owner: String,
        span: Span,
    },
    #[error("external constituent '{constituent}' requires state '{state}' to be external")]
    ExternalConstituentOfNonExternalState {
        state: String,
        constituent: String,
        span: Span,
    },
    #[error("external state '{state}' lacks property {property} enabled by constituent '{constituent}'")]
    ExternalPropertyMismatch {
        state: String,
        constituent: String,
        property: ExternalProperty,
        span: Span,
    },
}

impl FlowError {
    pub fn span(&self) -> Span {
        match self {
            FlowError::MalformedRelation { span, .. }
            | FlowError::UselessSelfDependency { span, .. }
            | FlowError::DuplicateOutput { span, .. }
            | FlowError::DuplicateInput { span, .. }
            | FlowError::DuplicateGlobalItem { span, .. }
            | FlowError::IllegalConstantMode { span, .. }
            | FlowError::CannotMentionStateAndConstituentTogether { span, .. }
            | FlowError::MissingRefinement { span, .. }
            | FlowError::ExtraOrUnmatchedRefinement { span, .. }
            | FlowError::WrongConstituentMode { span, .. }
            | FlowError::MissingConstituent { span, .. }
            | FlowError::InconsistentModeRefinement { span, .. }
            | FlowError::InconsistentItemMode { span, .. }
            | FlowError::MissingGlobalItem { span, .. }
            | FlowError::ExtraGlobalItem { span, .. }
            | FlowError::ExtraConstituent { span, .. }
            | FlowError::UselessRefinement { span, .. }
            | FlowError::StateRequiresConstituents { span, .. }
            | FlowError::UnresolvedEntity { span, .. }
            | FlowError::NotAState { span, .. }
            | FlowError::DuplicateStateRefinement { span, .. }
            | FlowError::InvalidConstituent { span, .. }
            | FlowError::ConstituentAlreadyClaimed { span, .. }
            | FlowError::ExternalConstituentOfNonExternalState { span, .. }
            | FlowError::ExternalPropertyMismatch { span, .. } => *span,
        }
    }

    pub fn kind(&self) -> DiagnosticKind {
        DiagnosticKind::from(self)
    }

    /// Coverage violations of a global refinement, as opposed to shape or
    /// matching errors.
    pub fn is_coverage_violation(&self) -> bool {
        matches!(
            self.kind(),
            DiagnosticKind::WrongConstituentMode
                | DiagnosticKind::MissingConstituent
                | DiagnosticKind::InconsistentModeRefinement
                | DiagnosticKind::ExtraConstituent
        )
    }
}

impl DiagnosticKind {
    pub fn name(self) -> &'static str {
        self.into()
    }
}

/// Collects [`FlowError`]s in report order, ignoring exact repeats.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    errors: Vec<FlowError>,
    seen: HashSet<FlowError>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `error`. Returns `false` if an identical error was already
    /// recorded.
    pub fn report(&mut self, error: FlowError) -> bool {
        if self.seen.contains(&error) {
            return false;
        }
        tracing::trace!(kind = error.kind().name(), "{}", error);
        self.seen.insert(error.clone());
        self.errors.push(error);
        true
    }

    pub fn extend(&mut self, errors: impl IntoIterator<Item = FlowError>) {
        for e in errors {
            self.report(e);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FlowError> {
        self.errors.iter()
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.errors.iter().filter(|e| e.kind() == kind).count()
    }

    /// Position to pass to [`Diagnostics::since`].
    pub fn checkpoint(&self) -> usize {
        self.errors.len()
    }

    pub fn since(&self, checkpoint: usize) -> &[FlowError] {
        &self.errors[checkpoint.min(self.errors.len())..]
    }

    pub fn into_vec(self) -> Vec<FlowError> {
        self.errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn missing(item: &str) -> FlowError {
        FlowError::MissingGlobalItem {
            item: item.into(),
            mode: GlobalMode::Input,
            span: Span::new(0, 1, 1, 1),
        }
    }

    #[test]
    fn sink_drops_exact_duplicates() {
        let mut d = Diagnostics::new();
        assert!(d.report(missing("X")));
        assert!(!d.report(missing("X")));
        assert!(d.report(missing("Y")));
        assert_eq!(d.len(), 2);
    }

    #[test]
    fn kind_and_count() {
        let mut d = Diagnostics::new();
        d.report(missing("X"));
        d.report(FlowError::DuplicateGlobalItem {
            item: "X".into(),
            span: Span::dummy(),
        });
        assert_eq!(d.count(DiagnosticKind::MissingGlobalItem), 1);
        assert_eq!(d.count(DiagnosticKind::DuplicateGlobalItem), 1);
        assert_eq!(DiagnosticKind::MissingGlobalItem.name(), "MissingGlobalItem");
    }

    #[test]
    fn checkpoint_slices_new_reports() {
        let mut d = Diagnostics::new();
        d.report(missing("X"));
        let cp = d.checkpoint();
        d.report(missing("Y"));
        assert_eq!(d.since(cp).len(), 1);
    }

    #[test]
    fn message_mentions_items() {
        let e = FlowError::WrongConstituentMode {
            state: "S".into(),
            constituent: "C1".into(),
            expected: GlobalMode::Input,
            found: GlobalMode::Output,
            span: Span::dummy(),
        };
        let msg = e.to_string();
        assert!(msg.contains("C1"), "got: {}", msg);
        assert!(msg.contains("Input"), "got: {}", msg);
        assert!(msg.contains("Output"), "got: {}", msg);
        assert!(e.is_coverage_violation());
    }
}
