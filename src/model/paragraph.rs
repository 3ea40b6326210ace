//! Paragraph and heading types.

use serde::{Deserialize, Serialize};

use super::{FootnoteRef, PageRange, TokenId};

/// A paragraph of reconstructed text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paragraph {
    /// Inline content in reading order
    pub content: Vec<InlineContent>,

    /// Tokens this paragraph consumed
    pub tokens: Vec<TokenId>,

    /// Pages covered
    pub span: PageRange,

    /// Set when the paragraph is a table candidate that failed reconstruction
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub demoted: bool,
}

impl Paragraph {
    /// Create a new empty paragraph on a page.
    pub fn new(page: u32) -> Self {
        Self {
            content: Vec::new(),
            tokens: Vec::new(),
            span: PageRange::single(page),
            demoted: false,
        }
    }

    /// Create a paragraph with plain text.
    pub fn with_text(page: u32, text: impl Into<String>) -> Self {
        let mut p = Self::new(page);
        p.add_text(text);
        p
    }

    /// Add plain text, merging with a trailing text run.
    pub fn add_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        if text.is_empty() {
            return;
        }
        if let Some(InlineContent::Text(last)) = self.content.last_mut() {
            last.push_str(&text);
        } else {
            self.content.push(InlineContent::Text(text));
        }
    }

    /// Add an inline footnote reference.
    pub fn add_reference(&mut self, text: impl Into<String>, reference: FootnoteRef) {
        self.content.push(InlineContent::FootnoteRef {
            text: text.into(),
            reference,
        });
    }

    /// Add a line break.
    pub fn add_line_break(&mut self) {
        self.content.push(InlineContent::LineBreak);
    }

    /// Record a consumed token.
    pub fn add_token(&mut self, id: TokenId) {
        self.tokens.push(id);
    }

    /// Get plain text content of the paragraph.
    pub fn plain_text(&self) -> String {
        self.content
            .iter()
            .map(|c| match c {
                InlineContent::Text(text) => text.as_str(),
                InlineContent::FootnoteRef { text, .. } => text.as_str(),
                InlineContent::LineBreak => "\n",
            })
            .collect()
    }

    /// Footnote references in order of appearance.
    pub fn references(&self) -> impl Iterator<Item = &FootnoteRef> {
        self.content.iter().filter_map(|c| match c {
            InlineContent::FootnoteRef { reference, .. } => Some(reference),
            _ => None,
        })
    }

    /// Mutable access to footnote references.
    pub fn references_mut(&mut self) -> impl Iterator<Item = &mut FootnoteRef> {
        self.content.iter_mut().filter_map(|c| match c {
            InlineContent::FootnoteRef { reference, .. } => Some(reference),
            _ => None,
        })
    }

    /// Check if the paragraph is empty.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty() || self.plain_text().trim().is_empty()
    }
}

/// Inline content within a paragraph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum InlineContent {
    /// Plain text
    Text(String),

    /// A footnote or citation marker, kept verbatim
    FootnoteRef {
        /// Marker text as extracted
        text: String,
        /// Resolution record
        reference: FootnoteRef,
    },

    /// A physical line break kept from the source
    LineBreak,
}

/// A section heading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Heading {
    /// Heading level (1-6)
    pub level: u8,
    /// Heading text
    pub text: String,
    /// Tokens this heading consumed
    pub tokens: Vec<TokenId>,
    /// Page the heading appears on
    pub page: u32,
}

impl Heading {
    /// Create a new heading.
    pub fn new(level: u8, text: impl Into<String>, page: u32) -> Self {
        Self {
            level: level.clamp(1, 6),
            text: text.into(),
            tokens: Vec::new(),
            page,
        }
    }
}
