//! Contract sheets with source location tracking.
//!
//! The annotations of one subprogram (or one package body) are laid out as a
//! single text, one `Kind => text` entry after another. Each annotation
//! remembers where its text starts so it can be lexed in place and every span
//! produced for it points into the sheet.

use crate::compiler::contract::ContractKind;
use flowref_core::Span;

/// One annotation placed on a sheet.
#[derive(Debug, Clone)]
pub struct Annotation {
    pub kind: ContractKind,
    /// The annotation text, without the `Kind =>` prefix
    pub text: String,
    /// Location of the first character of `text` in the sheet
    pub origin: Span,
}

#[derive(Debug, Clone)]
pub struct ContractSheet {
    source: String,
    annotations: Vec<Annotation>,
    next_line: usize,
}

impl Default for ContractSheet {
    fn default() -> Self {
        Self::new()
    }
}

impl ContractSheet {
    pub fn new() -> Self {
        Self {
            source: String::new(),
            annotations: Vec::new(),
            next_line: 1,
        }
    }

    /// Append an annotation and return the location of its text.
    pub fn push(&mut self, kind: ContractKind, text: &str) -> Span {
        // Normalize line endings (handle CRLF)
        let text = text.replace("\r\n", "\n");
        let text = text.trim_end();
        let prefix = format!("{} => ", kind);

        let start = self.source.len() + prefix.len();
        let origin = Span::new(
            start,
            start + text.len(),
            self.next_line,
            prefix.chars().count() + 1,
        );

        self.source.push_str(&prefix);
        self.source.push_str(text);
        self.source.push('\n');
        self.next_line += text.matches('\n').count() + 1;

        self.annotations.push(Annotation {
            kind,
            text: text.to_string(),
            origin,
        });
        origin
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn annotation(&self, kind: ContractKind) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.kind == kind)
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }
}
