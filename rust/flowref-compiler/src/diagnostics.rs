//! Rich error diagnostics with source snippets, colors, and suggestions.

use crate::compiler::error_codes;
use crate::compiler::errors::{DiagnosticKind, FlowError};
use crate::compiler::lexer::LexError;
use crate::compiler::parser::ParseError;
use crate::CheckError;
use flowref_core::Span;

use serde::Serialize;

/// Severity level for diagnostics. Contract violations are always errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
}

/// A rendered diagnostic with source context
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: Option<String>,
    pub message: String,
    pub file: Option<String>,
    pub line: Option<usize>,
    pub col: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_line: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub underline: Option<String>,
    pub suggestions: Vec<String>,
}

impl Diagnostic {
    /// Render with ANSI colors for terminal
    pub fn render_ansi(&self) -> String {
        self.render(Palette { ansi: true })
    }

    /// Render without colors (for pipes and tests)
    pub fn render_plain(&self) -> String {
        self.render(Palette { ansi: false })
    }

    fn render(&self, p: Palette) -> String {
        let mut out = String::new();

        let label = match self.severity {
            Severity::Error => p.red("error"),
        };
        match &self.code {
            Some(code) => out.push_str(&format!("{}[{}]: ", label, p.bold(code))),
            None => out.push_str(&format!("{}: ", label)),
        }
        out.push_str(&p.bold(&self.message));
        out.push('\n');

        let arrow = p.cyan("-->");
        match (&self.file, self.line, self.col) {
            (Some(file), Some(line), Some(col)) => {
                out.push_str(&format!("  {} {}:{}:{}\n", arrow, file, line, col))
            }
            (Some(file), _, _) => out.push_str(&format!("  {} {}\n", arrow, file)),
            _ => {}
        }

        let gutter = p.cyan("|");
        if let (Some(line), Some(text), Some(underline)) =
            (self.line, &self.source_line, &self.underline)
        {
            let number = format!("{:>3}", line);
            out.push_str(&format!("   {}\n", gutter));
            out.push_str(&format!("{} {} {}\n", p.cyan(&number), gutter, text));
            out.push_str(&format!("   {} {}\n", gutter, p.red(underline)));
        }

        if !self.suggestions.is_empty() {
            out.push_str(&format!("   {}\n", gutter));
            for s in &self.suggestions {
                out.push_str(&format!("   {} {}: {}\n", p.cyan("="), p.cyan("help"), s));
            }
        }

        out
    }
}

/// ANSI styling; a palette with `ansi: false` leaves text untouched.
#[derive(Debug, Clone, Copy)]
struct Palette {
    ansi: bool,
}

impl Palette {
    fn paint(self, sgr: &str, s: &str) -> String {
        if self.ansi {
            format!("\x1b[{}m{}\x1b[0m", sgr, s)
        } else {
            s.to_string()
        }
    }

    fn red(self, s: &str) -> String {
        self.paint("31", s)
    }

    fn cyan(self, s: &str) -> String {
        self.paint("36", s)
    }

    fn bold(self, s: &str) -> String {
        self.paint("1", s)
    }
}

fn get_source_line(source: &str, line: usize) -> Option<String> {
    if line == 0 {
        return None;
    }
    source.lines().nth(line - 1).map(|s| s.to_string())
}

fn make_underline(col: usize, len: usize) -> String {
    format!(
        "{}{}",
        " ".repeat(col.saturating_sub(1)),
        "^".repeat(len.max(1))
    )
}

/// Diagnostic positioned at `line`/`col`, with the source line attached when
/// it exists.
fn located(
    code: &str,
    message: String,
    source: &str,
    filename: &str,
    line: usize,
    col: usize,
    len: usize,
) -> Diagnostic {
    let source_line = get_source_line(source, line);
    let underline = source_line.as_ref().map(|l| {
        let rest = l.chars().count().saturating_sub(col.saturating_sub(1));
        make_underline(col, len.min(rest))
    });
    let known = line > 0;
    Diagnostic {
        severity: Severity::Error,
        code: Some(code.to_string()),
        message,
        file: Some(filename.to_string()),
        line: known.then_some(line),
        col: known.then_some(col),
        source_line,
        underline,
        suggestions: vec![],
    }
}

fn at_span(code: &str, message: String, source: &str, filename: &str, span: Span) -> Diagnostic {
    located(
        code,
        message,
        source,
        filename,
        span.line,
        span.col,
        span.len(),
    )
}

// Edit distance for suggestions
fn edit_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().flat_map(char::to_lowercase).collect();
    let b_chars: Vec<char> = b.chars().flat_map(char::to_lowercase).collect();
    let a_len = a_chars.len();
    let b_len = b_chars.len();

    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    let mut prev: Vec<usize> = (0..=b_len).collect();
    let mut cur = vec![0; b_len + 1];
    for i in 1..=a_len {
        cur[0] = i;
        for j in 1..=b_len {
            let cost = usize::from(a_chars[i - 1] != b_chars[j - 1]);
            cur[j] = (prev[j] + 1).min(cur[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b_len]
}

fn suggest_similar(name: &str, candidates: &[&str], max_distance: usize) -> Vec<String> {
    let mut matches: Vec<(usize, String)> = candidates
        .iter()
        .filter_map(|c| {
            let d = edit_distance(name, c);
            (d <= max_distance).then(|| (d, c.to_string()))
        })
        .collect();

    matches.sort_by(|(da, a), (db, b)| da.cmp(db).then_with(|| a.cmp(b)));
    matches.dedup_by(|(_, a), (_, b)| a == b);
    matches.into_iter().map(|(_, s)| s).take(3).collect()
}

/// Names among `candidates` close to `name` (case-insensitive edit
/// distance), best first, at most three.
pub fn suggest_similar_names(name: &str, candidates: &[&str]) -> Vec<String> {
    let max_distance = (name.chars().count() / 3).max(1);
    suggest_similar(name, candidates, max_distance)
}

fn help_for(kind: DiagnosticKind) -> Option<&'static str> {
    let help = match kind {
        DiagnosticKind::UselessSelfDependency => "remove the '+'",
        DiagnosticKind::DuplicateOutput => "merge the clauses that share this output",
        DiagnosticKind::DuplicateGlobalItem => "give each global item exactly one mode",
        DiagnosticKind::IllegalConstantMode => "constants may only be Input or Proof_In",
        DiagnosticKind::CannotMentionStateAndConstituentTogether => {
            "name either the state or its constituents, not both"
        }
        DiagnosticKind::MissingRefinement => {
            "add a refined clause whose output and input refine this dependence"
        }
        DiagnosticKind::MissingConstituent => {
            "every constituent of an Output state must be listed as Output"
        }
        DiagnosticKind::InconsistentModeRefinement => {
            "list constituents whose modes together establish the mode of the state"
        }
        DiagnosticKind::StateRequiresConstituents => {
            "the refinement of this state is visible here; name its constituents"
        }
        DiagnosticKind::ExternalConstituentOfNonExternalState => {
            "declare the state with the External aspect"
        }
        _ => return None,
    };
    Some(help)
}

/// Convert a `FlowError` into a diagnostic. Spans index `source`.
pub fn format_flow_error(error: &FlowError, source: &str, filename: &str) -> Diagnostic {
    let mut d = at_span(
        error_codes::flow_code(error),
        error.to_string(),
        source,
        filename,
        error.span(),
    );
    if let FlowError::UnresolvedEntity { suggestions, .. } = error {
        d.suggestions
            .extend(suggestions.iter().map(|s| format!("did you mean '{}'?", s)));
    }
    if let Some(help) = help_for(error.kind()) {
        d.suggestions.push(help.to_string());
    }
    d
}

fn format_lex_error(error: &LexError, source: &str, filename: &str) -> Diagnostic {
    let code = error_codes::lex_code(error);
    match error {
        LexError::UnexpectedChar { ch, line, col } => located(
            code,
            format!("unexpected character '{}'", ch),
            source,
            filename,
            *line,
            *col,
            1,
        ),
        LexError::MalformedName { line, col } => {
            let mut d = located(code, "malformed name".into(), source, filename, *line, *col, 1);
            d.suggestions
                .push("names cannot end with '_' or contain '__'".to_string());
            d
        }
    }
}

fn format_parse_error(error: &ParseError, source: &str, filename: &str) -> Diagnostic {
    match error {
        ParseError::Lex(e) => format_lex_error(e, source, filename),
        ParseError::Unexpected {
            found,
            expected,
            line,
            col,
        } => located(
            error_codes::parse_code(error),
            format!("unexpected {}, expected {}", found, expected),
            source,
            filename,
            *line,
            *col,
            found.chars().count(),
        ),
        ParseError::UnexpectedEof => Diagnostic {
            severity: Severity::Error,
            code: Some(error_codes::parse_code(error).to_string()),
            message: "unexpected end of annotation".to_string(),
            file: Some(filename.to_string()),
            line: None,
            col: None,
            source_line: None,
            underline: None,
            suggestions: vec!["check for a missing ')' or right-hand side".to_string()],
        },
    }
}

/// Convert a `CheckError` + source text into a list of Diagnostics
pub fn format_check_error(error: &CheckError, source: &str, filename: &str) -> Vec<Diagnostic> {
    match error {
        CheckError::Parse(errors) => errors
            .iter()
            .map(|e| format_parse_error(e, source, filename))
            .collect(),
        CheckError::Flow(errors) => errors
            .iter()
            .map(|e| format_flow_error(e, source, filename))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::contract::GlobalMode;

    #[test]
    fn test_get_source_line() {
        let src = "line one\nline two\nline three";
        assert_eq!(get_source_line(src, 2), Some("line two".to_string()));
        assert_eq!(get_source_line(src, 0), None);
        assert_eq!(get_source_line(src, 9), None);
    }

    #[test]
    fn test_make_underline() {
        assert_eq!(make_underline(3, 2), "  ^^");
        assert_eq!(make_underline(1, 0), "^");
    }

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance("kitten", "sitting"), 3);
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("State", "state"), 0);
    }

    #[test]
    fn test_suggest_similar_names() {
        let sug = suggest_similar_names("Sensr", &["Sensor", "Actuator", "Sense"]);
        assert_eq!(sug.first().map(String::as_str), Some("Sense"));
        assert!(sug.contains(&"Sensor".to_string()));
        assert!(suggest_similar_names("Zzz", &["Sensor"]).is_empty());
        assert_eq!(suggest_similar_names("Xx", &["X", "Y"]), vec!["X".to_string()]);
    }

    #[test]
    fn test_format_flow_error() {
        let src = "Refined_Global => (Input => X, Output => C1)";
        let err = FlowError::InconsistentItemMode {
            item: "X".into(),
            expected: GlobalMode::Output,
            found: GlobalMode::Input,
            span: Span::new(28, 29, 1, 29),
        };
        let d = format_flow_error(&err, src, "unit.toml");
        assert_eq!(d.code.as_deref(), Some("F0303"));
        assert_eq!(d.line, Some(1));
        assert_eq!(d.underline.as_deref(), Some(&format!("{}^", " ".repeat(28))[..]));
    }

    #[test]
    fn test_render_plain() {
        let d = Diagnostic {
            severity: Severity::Error,
            code: Some("F0301".to_string()),
            message: "constituent 'B' of state 'S' is missing from the global refinement"
                .to_string(),
            file: Some("unit.toml".to_string()),
            line: Some(2),
            col: Some(30),
            source_line: Some("Global => (Output => S)".to_string()),
            underline: Some("                     ^".to_string()),
            suggestions: vec!["list B as Output".to_string()],
        };
        let out = d.render_plain();
        assert!(out.starts_with("error[F0301]: constituent 'B'"));
        assert!(out.contains("  --> unit.toml:2:30"));
        assert!(out.contains("  2 | Global => (Output => S)"));
        assert!(out.contains("   = help: list B as Output"));
        assert!(!out.contains("\x1b["));
    }

    #[test]
    fn test_render_ansi() {
        let d = Diagnostic {
            severity: Severity::Error,
            code: Some("F0100".to_string()),
            message: "bad".to_string(),
            file: None,
            line: None,
            col: None,
            source_line: None,
            underline: None,
            suggestions: vec![],
        };
        let out = d.render_ansi();
        assert!(out.contains("\x1b[31merror\x1b[0m"));
        assert!(out.contains("F0100"));
    }

    #[test]
    fn test_serializes_to_json() {
        let d = format_flow_error(
            &FlowError::DuplicateGlobalItem {
                item: "X".into(),
                span: Span::dummy(),
            },
            "",
            "unit.toml",
        );
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["severity"], "error");
        assert_eq!(json["code"], "F0104");
        assert!(json.get("source_line").is_none());
    }
}
