//! Stable error codes for every checker error.
//!
//! Code ranges:
//!   F0001–F0019  Lex / Parse errors
//!   F0100–F0199  Relation shape
//!   F0200–F0299  Dependency refinement
//!   F0300–F0399  Global refinement
//!   F0400–F0499  Refinement pre-checks
//!   F0500–F0599  State refinement

use crate::compiler::errors::{DiagnosticKind, FlowError};
use crate::compiler::lexer::LexError;
use crate::compiler::parser::ParseError;

use strum::IntoEnumIterator;

const FRONT_END_CODES: [&str; 4] = ["F0001", "F0002", "F0010", "F0011"];

/// Return the stable error code for a single `LexError`.
pub fn lex_code(e: &LexError) -> &'static str {
    match e {
        LexError::UnexpectedChar { .. } => "F0001",
        LexError::MalformedName { .. } => "F0002",
    }
}

/// Return the stable error code for a single `ParseError`.
pub fn parse_code(e: &ParseError) -> &'static str {
    match e {
        ParseError::Lex(inner) => lex_code(inner),
        ParseError::Unexpected { .. } => "F0010",
        ParseError::UnexpectedEof => "F0011",
    }
}

pub fn kind_code(kind: DiagnosticKind) -> &'static str {
    match kind {
        DiagnosticKind::MalformedRelation => "F0100",
        DiagnosticKind::UselessSelfDependency => "F0101",
        DiagnosticKind::DuplicateOutput => "F0102",
        DiagnosticKind::DuplicateInput => "F0103",
        DiagnosticKind::DuplicateGlobalItem => "F0104",
        DiagnosticKind::IllegalConstantMode => "F0105",
        DiagnosticKind::CannotMentionStateAndConstituentTogether => "F0106",

        DiagnosticKind::MissingRefinement => "F0200",
        DiagnosticKind::ExtraOrUnmatchedRefinement => "F0201",

        DiagnosticKind::WrongConstituentMode => "F0300",
        DiagnosticKind::MissingConstituent => "F0301",
        DiagnosticKind::InconsistentModeRefinement => "F0302",
        DiagnosticKind::InconsistentItemMode => "F0303",
        DiagnosticKind::MissingGlobalItem => "F0304",
        DiagnosticKind::ExtraGlobalItem => "F0305",
        DiagnosticKind::ExtraConstituent => "F0306",

        DiagnosticKind::UselessRefinement => "F0400",
        DiagnosticKind::StateRequiresConstituents => "F0401",
        DiagnosticKind::UnresolvedEntity => "F0402",

        DiagnosticKind::NotAState => "F0500",
        DiagnosticKind::DuplicateStateRefinement => "F0501",
        DiagnosticKind::InvalidConstituent => "F0502",
        DiagnosticKind::ConstituentAlreadyClaimed => "F0503",
        DiagnosticKind::ExternalConstituentOfNonExternalState => "F0504",
        DiagnosticKind::ExternalPropertyMismatch => "F0505",
    }
}

pub fn flow_code(e: &FlowError) -> &'static str {
    kind_code(e.kind())
}

/// Return a short documentation string for the given error code.
pub fn error_doc(code: &str) -> &'static str {
    match code {
        // Lex / Parse
        "F0001" => "An unexpected character was found in the annotation. Contracts only contain names, 'null', mode keywords, '=>', '+', parentheses, commas and the 'Result attribute.",
        "F0002" => "A name ends with an underscore or contains two consecutive underscores. Rename it so underscores separate letters or digits.",
        "F0010" => "The annotation parser met a token it did not expect. Check the clause shape 'Outputs => Inputs' or 'Mode => Items'.",
        "F0011" => "The annotation ended before the contract was complete. Close every parenthesis and give every '=>' a right-hand side.",

        // Relation shape
        "F0100" => "The relation does not have a legal shape, for example 'null => null', a nested aggregate, or 'null' mixed with other items. The clause is skipped.",
        "F0101" => "The '+' self-dependency shorthand was combined with 'null'. 'null' has no value that could depend on itself.",
        "F0102" => "The same item is the output of more than one clause. Merge the clauses into one.",
        "F0103" => "The same input is listed more than once for one output. Remove the repetition.",
        "F0104" => "A global item is listed more than once, under the same or different modes. Each item has exactly one mode.",
        "F0105" => "A constant cannot be written. It may only have mode Input or Proof_In.",
        "F0106" => "A contract names both an abstract state and one of its own constituents. Use one level of abstraction throughout.",

        // Dependency refinement
        "F0200" => "A dependence of the abstract flow contract is not justified by the refined flow contract. Add a refined clause whose output and input refine it.",
        "F0201" => "A clause of the refined flow contract does not refine any dependence of the abstract flow contract. Remove it or extend the abstract contract.",

        // Global refinement
        "F0300" => "A constituent of a refined state appears with a mode that the mode of its state does not allow.",
        "F0301" => "A state of mode Output is refined, but not every one of its constituents appears as Output in the refined global contract.",
        "F0302" => "The constituents listed for a refined state do not establish its mode. Input and Proof_In need one constituent of that mode; In_Out needs In_Out, or Input and Output, or a partial Output.",
        "F0303" => "A global item has a different mode in the refined global contract than in the abstract one.",
        "F0304" => "A global item of the abstract contract is missing from the refined global contract.",
        "F0305" => "The refined global contract lists an item that the abstract global contract does not mention.",
        "F0306" => "The refined global contract lists a constituent whose state is not part of the abstract global contract.",

        // Pre-checks
        "F0400" => "A refined contract was given although the abstract contract is absent or null. There is nothing to refine.",
        "F0401" => "A refined contract names an abstract state whose refinement is visible. Name its constituents instead.",
        "F0402" => "A name in a contract could not be resolved. That contract is not checked further.",

        // State refinement
        "F0500" => "The target of a Refined_State clause is not an abstract state.",
        "F0501" => "An abstract state is refined more than once.",
        "F0502" => "The constituent cannot belong to the state: it is a parameter, a function result, or the state itself or one of its enclosing states.",
        "F0503" => "The constituent already belongs to another state, or is listed twice.",
        "F0504" => "A volatile or external constituent requires its state to be declared External.",
        "F0505" => "A constituent enables an external property that its External state does not.",

        _ => "Unknown error code.",
    }
}

/// Return all registered error codes with their short description.
pub fn all_error_codes() -> Vec<(&'static str, &'static str)> {
    FRONT_END_CODES
        .into_iter()
        .chain(DiagnosticKind::iter().map(kind_code))
        .map(|c| (c, error_doc(c)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::contract::GlobalMode;
    use flowref_core::Span;
    use std::collections::HashSet;

    #[test]
    fn test_front_end_codes() {
        assert_eq!(
            parse_code(&ParseError::Lex(LexError::UnexpectedChar {
                ch: '@',
                line: 1,
                col: 1
            })),
            "F0001"
        );
        assert_eq!(parse_code(&ParseError::UnexpectedEof), "F0011");
    }

    #[test]
    fn test_flow_codes() {
        let e = FlowError::MissingConstituent {
            state: "S".into(),
            constituent: "B".into(),
            span: Span::dummy(),
        };
        assert_eq!(flow_code(&e), "F0301");
        let e = FlowError::InconsistentItemMode {
            item: "X".into(),
            expected: GlobalMode::Input,
            found: GlobalMode::Output,
            span: Span::dummy(),
        };
        assert_eq!(flow_code(&e), "F0303");
    }

    #[test]
    fn test_every_kind_has_a_unique_code() {
        let codes: Vec<_> = DiagnosticKind::iter().map(kind_code).collect();
        let unique: HashSet<_> = codes.iter().collect();
        assert_eq!(codes.len(), unique.len());
    }

    #[test]
    fn test_all_error_codes_no_unknown_doc() {
        for (code, doc) in all_error_codes() {
            assert_ne!(
                doc, "Unknown error code.",
                "code {} has no documentation",
                code
            );
        }
    }

    #[test]
    fn test_unknown_code() {
        assert_eq!(error_doc("F9999"), "Unknown error code.");
    }
}
