//! Per-unit results and their rendering.

use crate::colors::{bold, gray, green, paint, red};
use crate::config::OutputFormat;
use flowref_compiler::compiler::checker::Verdict;
use flowref_compiler::diagnostics::{format_check_error, Diagnostic};
use flowref_compiler::{CheckError, Outcome};

use serde::Serialize;

/// Result of checking one package refinement or subprogram.
#[derive(Debug, Clone, Serialize)]
pub struct SubjectReport {
    pub subject: String,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unmatched_abstract: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unconsumed_refined: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

impl SubjectReport {
    /// Build a report from a check result. `source` is the contract sheet
    /// the spans of `result` index.
    pub fn from_result(
        subject: &str,
        source: &str,
        filename: &str,
        result: Result<Verdict, CheckError>,
    ) -> Self {
        match result {
            Ok(verdict) => {
                let diagnostics = CheckError::from_verdict(&verdict)
                    .map(|e| format_check_error(&e, source, filename))
                    .unwrap_or_default();
                SubjectReport {
                    subject: subject.to_string(),
                    outcome: verdict.outcome,
                    unmatched_abstract: verdict
                        .unmatched_abstract
                        .iter()
                        .map(|l| l.to_string())
                        .collect(),
                    unconsumed_refined: verdict
                        .unconsumed_refined
                        .iter()
                        .map(|l| l.to_string())
                        .collect(),
                    diagnostics,
                }
            }
            Err(e) => SubjectReport {
                subject: subject.to_string(),
                outcome: Outcome::Rejected,
                unmatched_abstract: Vec::new(),
                unconsumed_refined: Vec::new(),
                diagnostics: format_check_error(&e, source, filename),
            },
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.outcome == Outcome::Accepted
    }
}

/// Every subject checked in one unit file.
#[derive(Debug, Clone, Serialize)]
pub struct UnitReport {
    pub unit: String,
    pub subjects: Vec<SubjectReport>,
}

impl UnitReport {
    pub fn new(unit: &str) -> Self {
        Self {
            unit: unit.to_string(),
            subjects: Vec::new(),
        }
    }

    pub fn push(&mut self, subject: SubjectReport) {
        self.subjects.push(subject);
    }

    pub fn rejected(&self) -> usize {
        self.subjects.iter().filter(|s| !s.is_accepted()).count()
    }

    /// Render for a terminal or a pipe. At most `max_diagnostics` diagnostics
    /// are printed per subject.
    pub fn render(&self, format: OutputFormat, color: bool, max_diagnostics: Option<usize>) -> String {
        let ansi = color && format == OutputFormat::Human;
        let mut out = String::new();
        for s in &self.subjects {
            if s.is_accepted() {
                out.push_str(&format!(
                    "{} {} {}\n",
                    paint(ansi, green, "ok"),
                    paint(ansi, bold, &s.subject),
                    paint(ansi, gray, "refinement accepted")
                ));
                continue;
            }
            out.push_str(&format!(
                "{} {} ({} diagnostic{})\n",
                paint(ansi, red, "rejected"),
                paint(ansi, bold, &s.subject),
                s.diagnostics.len(),
                if s.diagnostics.len() == 1 { "" } else { "s" }
            ));
            let limit = max_diagnostics.unwrap_or(usize::MAX);
            for d in s.diagnostics.iter().take(limit) {
                if ansi {
                    out.push_str(&d.render_ansi());
                } else {
                    out.push_str(&d.render_plain());
                }
            }
            if s.diagnostics.len() > limit {
                out.push_str(&format!(
                    "... {} more diagnostic(s) not shown\n",
                    s.diagnostics.len() - limit
                ));
            }
        }
        out
    }
}

/// Serialize reports as one JSON document.
pub fn to_json(reports: &[UnitReport]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowref_compiler::{check_subprogram_text, CheckOptions, SubprogramText};
    use flowref_core::{ItemTable, ObjectKind, Span};

    fn rejected_report() -> UnitReport {
        let mut t = ItemTable::new();
        for n in ["X", "Y", "Z"] {
            t.declare_object(n, ObjectKind::Variable, None, Span::dummy())
                .unwrap();
        }
        let sub = SubprogramText::new("Op")
            .with_depends("(X => Y)")
            .with_refined_depends("(X => Z)");
        let result = check_subprogram_text(&t, &sub, CheckOptions::default());
        let mut report = UnitReport::new("op.toml");
        report.push(SubjectReport::from_result(
            "Op",
            sub.sheet().source(),
            "op.toml",
            result,
        ));
        report
    }

    #[test]
    fn rejected_subject_lists_leftovers() {
        let report = rejected_report();
        assert_eq!(report.rejected(), 1);
        let s = &report.subjects[0];
        assert_eq!(s.unmatched_abstract, vec!["X => Y".to_string()]);
        assert_eq!(s.unconsumed_refined, vec!["X => Z".to_string()]);
        assert_eq!(s.diagnostics.len(), 2);
    }

    #[test]
    fn plain_rendering_has_no_escapes() {
        let out = rejected_report().render(OutputFormat::Plain, true, None);
        assert!(out.starts_with("rejected Op (2 diagnostics)"));
        assert!(out.contains("error[F0200]"));
        assert!(!out.contains("\x1b["));
    }

    #[test]
    fn max_diagnostics_truncates() {
        let out = rejected_report().render(OutputFormat::Plain, false, Some(1));
        assert!(out.contains("error[F0200]"));
        assert!(!out.contains("error[F0201]"));
        assert!(out.contains("1 more diagnostic(s) not shown"));
    }

    #[test]
    fn json_output() {
        let json = to_json(&[rejected_report()]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["unit"], "op.toml");
        assert_eq!(value[0]["subjects"][0]["outcome"], "rejected");
        assert_eq!(value[0]["subjects"][0]["diagnostics"][0]["code"], "F0200");
    }
}
