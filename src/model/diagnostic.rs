//! Recoverable layout conditions reported alongside the document.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of recoverable condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// A table candidate could not be given column structure and was demoted.
    ColumnInferenceFailure,
    /// An inline marker has no matching footnote or reference body.
    UnmatchedFootnoteMarker,
    /// A footnote or reference body is never referenced.
    UnmatchedFootnoteBody,
    /// Tables on adjacent pages looked continuous but did not match.
    CrossPageContinuationMismatch,
    /// A page carried no tokens.
    EmptyPage,
    /// A token with unusable geometry was passed through unclassified.
    MalformedToken,
}

impl DiagnosticKind {
    /// Short stable name.
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::ColumnInferenceFailure => "column_inference_failure",
            DiagnosticKind::UnmatchedFootnoteMarker => "unmatched_footnote_marker",
            DiagnosticKind::UnmatchedFootnoteBody => "unmatched_footnote_body",
            DiagnosticKind::CrossPageContinuationMismatch => "cross_page_continuation_mismatch",
            DiagnosticKind::EmptyPage => "empty_page",
            DiagnosticKind::MalformedToken => "malformed_token",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recoverable condition with the page it was observed on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// What happened
    pub kind: DiagnosticKind,
    /// Page the condition was observed on, if page-specific
    pub page: Option<u32>,
    /// Human-readable detail
    pub message: String,
}

impl Diagnostic {
    /// Create a new diagnostic.
    pub fn new(kind: DiagnosticKind, page: Option<u32>, message: impl Into<String>) -> Self {
        Self {
            kind,
            page,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.page {
            Some(page) => write!(f, "[{}] page {}: {}", self.kind, page, self.message),
            None => write!(f, "[{}] {}", self.kind, self.message),
        }
    }
}
