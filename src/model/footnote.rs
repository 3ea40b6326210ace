//! Footnote markers, references and bodies.

use serde::{Deserialize, Serialize};

use super::{Paragraph, TokenId};

/// Scope in which a marker label is unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "scope", content = "page", rename_all = "snake_case")]
pub enum MarkerScope {
    /// Numerals are unique across the whole document
    Document,
    /// Symbols (`*`, `†`, ...) restart on every page
    Page(u32),
}

/// Key shared by a footnote reference and its body.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MarkerKey {
    /// Normalized marker label (`"1"`, `"*"`, `"†"`)
    pub label: String,
    /// Where the label is unique
    pub scope: MarkerScope,
}

impl MarkerKey {
    /// Create a document-scoped key.
    pub fn numeral(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            scope: MarkerScope::Document,
        }
    }

    /// Create a page-scoped key.
    pub fn symbol(label: impl Into<String>, page: u32) -> Self {
        Self {
            label: label.into(),
            scope: MarkerScope::Page(page),
        }
    }

    /// Label usable as a Markdown footnote id.
    pub fn anchor(&self) -> String {
        let label: String = self
            .label
            .chars()
            .map(|c| match c {
                '*' => "star".to_string(),
                '†' => "dagger".to_string(),
                '‡' => "ddagger".to_string(),
                '§' => "section".to_string(),
                '¶' => "para".to_string(),
                '‖' => "parallel".to_string(),
                '#' => "hash".to_string(),
                other => other.to_string(),
            })
            .collect();
        match self.scope {
            MarkerScope::Document => label,
            MarkerScope::Page(page) => format!("p{}-{}", page, label),
        }
    }
}

/// An inline marker found in body text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FootnoteRef {
    /// Matching key
    pub key: MarkerKey,
    /// Token carrying the marker
    pub token: TokenId,
    /// Whether a body with the same key exists
    pub resolved: bool,
}

/// Where a footnote body came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FootnoteKind {
    /// Page-bottom footnote
    Footnote,
    /// Reference-list entry
    Reference,
}

/// A footnote or reference body, linked to the markers that cite it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Footnote {
    /// Matching key
    pub key: MarkerKey,
    /// Footnote or reference entry
    pub kind: FootnoteKind,
    /// Body text (including its leading marker)
    pub body: Paragraph,
    /// Marker tokens in the body text that cite this footnote
    pub cited_by: Vec<TokenId>,
}

impl Footnote {
    /// Whether at least one marker cites this body.
    pub fn is_resolved(&self) -> bool {
        !self.cited_by.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anchor() {
        assert_eq!(MarkerKey::numeral("12").anchor(), "12");
        assert_eq!(MarkerKey::symbol("*", 4).anchor(), "p4-star");
        assert_eq!(MarkerKey::symbol("††", 1).anchor(), "p1-daggerdagger");
    }

    #[test]
    fn test_scope_equality() {
        assert_ne!(MarkerKey::symbol("*", 1), MarkerKey::symbol("*", 2));
        assert_eq!(MarkerKey::numeral("3"), MarkerKey::numeral("3"));
    }
}
