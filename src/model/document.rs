//! Document-level types.

use serde::{Deserialize, Serialize};

use super::{Footnote, Heading, LogicalTable, Paragraph, TokenId};

/// An inclusive range of pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    /// First page (1-indexed)
    pub start: u32,
    /// Last page (inclusive)
    pub end: u32,
}

impl PageRange {
    /// A range covering one page.
    pub fn single(page: u32) -> Self {
        Self {
            start: page,
            end: page,
        }
    }

    /// Create a range, ordering the bounds.
    pub fn new(start: u32, end: u32) -> Self {
        Self {
            start: start.min(end),
            end: start.max(end),
        }
    }

    /// Grow the range to include `page`.
    pub fn include(&mut self, page: u32) {
        self.start = self.start.min(page);
        self.end = self.end.max(page);
    }

    /// Check if a page is inside the range.
    pub fn contains(&self, page: u32) -> bool {
        (self.start..=self.end).contains(&page)
    }

    /// Whether the range covers more than one page.
    pub fn is_multi_page(&self) -> bool {
        self.end > self.start
    }
}

/// The reconstructed logical document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    /// Sections in reading order; the first may have no heading
    pub sections: Vec<Section>,

    /// Footnotes collected at the end of the document
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub footnotes: Vec<Footnote>,

    /// Number of pages that contributed to the document
    pub page_count: u32,
}

impl Document {
    /// Create a new empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the document has no content nodes.
    pub fn is_empty(&self) -> bool {
        self.sections
            .iter()
            .all(|s| s.heading.is_none() && s.nodes.is_empty())
            && self.footnotes.is_empty()
    }

    /// All nodes in reading order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.sections.iter().flat_map(|s| s.nodes.iter())
    }

    /// All reconstructed tables in reading order.
    pub fn tables(&self) -> impl Iterator<Item = &LogicalTable> {
        self.nodes().filter_map(|n| match n {
            Node::Table(t) => Some(t),
            _ => None,
        })
    }

    /// All body paragraphs in reading order.
    pub fn paragraphs(&self) -> impl Iterator<Item = &Paragraph> {
        self.nodes().filter_map(|n| match n {
            Node::Paragraph(p) => Some(p),
            _ => None,
        })
    }

    /// All footnote and reference bodies, in place and trailing.
    pub fn all_footnotes(&self) -> impl Iterator<Item = &Footnote> {
        self.nodes()
            .filter_map(|n| match n {
                Node::Footnote(f) => Some(f),
                _ => None,
            })
            .chain(self.footnotes.iter())
    }

    /// Every token id reachable from the tree.
    pub fn token_ids(&self) -> Vec<TokenId> {
        let mut ids = Vec::new();
        for section in &self.sections {
            if let Some(heading) = &section.heading {
                ids.extend(heading.tokens.iter().copied());
            }
            for node in &section.nodes {
                ids.extend(node.token_ids());
            }
        }
        for footnote in &self.footnotes {
            ids.extend(footnote.body.tokens.iter().copied());
        }
        ids
    }

    /// Get plain text content of the entire document.
    pub fn plain_text(&self) -> String {
        let mut parts = Vec::new();
        for section in &self.sections {
            if let Some(heading) = &section.heading {
                parts.push(heading.text.clone());
            }
            for node in &section.nodes {
                parts.push(node.plain_text());
            }
        }
        for footnote in &self.footnotes {
            parts.push(footnote.body.plain_text());
        }
        parts.retain(|p| !p.trim().is_empty());
        parts.join("\n\n")
    }
}

/// A run of content under one heading.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Section {
    /// Opening heading, if any
    pub heading: Option<Heading>,
    /// Content nodes in reading order
    pub nodes: Vec<Node>,
}

impl Section {
    /// Create a section opened by a heading.
    pub fn with_heading(heading: Heading) -> Self {
        Self {
            heading: Some(heading),
            nodes: Vec::new(),
        }
    }
}

/// A content node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    /// A paragraph of body text
    Paragraph(Paragraph),

    /// A reconstructed table
    Table(LogicalTable),

    /// A figure or table caption not attached to a table
    Caption(Paragraph),

    /// A footnote or reference-list entry
    Footnote(Footnote),

    /// Content passed through without classification
    Unclassified(Passthrough),
}

impl Node {
    /// Tokens consumed by this node.
    pub fn token_ids(&self) -> Vec<TokenId> {
        match self {
            Node::Paragraph(p) | Node::Caption(p) => p.tokens.clone(),
            Node::Table(t) => t.token_ids(),
            Node::Footnote(f) => f.body.tokens.clone(),
            Node::Unclassified(u) => u.tokens.clone(),
        }
    }

    /// Plain text of this node.
    pub fn plain_text(&self) -> String {
        match self {
            Node::Paragraph(p) | Node::Caption(p) => p.plain_text(),
            Node::Table(t) => t.plain_text(),
            Node::Footnote(f) => f.body.plain_text(),
            Node::Unclassified(u) => u.text.clone(),
        }
    }

    /// Check if this node is a table.
    pub fn is_table(&self) -> bool {
        matches!(self, Node::Table(_))
    }
}

/// Tokens kept verbatim because they could not be placed structurally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passthrough {
    /// Concatenated token text
    pub text: String,
    /// Tokens passed through
    pub tokens: Vec<TokenId>,
    /// Page the tokens came from
    pub page: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_new() {
        let doc = Document::new();
        assert!(doc.is_empty());
        assert_eq!(doc.token_ids().len(), 0);
    }

    #[test]
    fn test_page_range() {
        let mut range = PageRange::single(3);
        assert!(!range.is_multi_page());
        range.include(4);
        assert!(range.is_multi_page());
        assert!(range.contains(4));
        assert_eq!(PageRange::new(5, 2).start, 2);
    }

    #[test]
    fn test_token_ids_walk_sections() {
        let mut heading = Heading::new(1, "Intro", 1);
        heading.tokens.push(TokenId::new(1, 0));
        let mut section = Section::with_heading(heading);
        let mut para = Paragraph::with_text(1, "Body");
        para.add_token(TokenId::new(1, 1));
        section.nodes.push(Node::Paragraph(para));

        let doc = Document {
            sections: vec![section],
            footnotes: Vec::new(),
            page_count: 1,
        };
        assert_eq!(doc.token_ids(), vec![TokenId::new(1, 0), TokenId::new(1, 1)]);
        assert_eq!(doc.plain_text(), "Intro\n\nBody");
    }
}
