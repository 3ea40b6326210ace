//! Document model types.
//!
//! Input tokens on one side, the reconstructed logical document on the
//! other. Everything here is plain data; the layout stages live in
//! [`crate::layout`].

mod diagnostic;
mod document;
mod footnote;
mod paragraph;
mod table;
mod token;

pub use diagnostic::{Diagnostic, DiagnosticKind};
pub use document::{Document, Node, PageRange, Passthrough, Section};
pub use footnote::{Footnote, FootnoteKind, FootnoteRef, MarkerKey, MarkerScope};
pub use paragraph::{Heading, InlineContent, Paragraph};
pub use table::{Cell, ColumnSpec, LogicalTable, RepeatedHeader, Row};
pub use token::{
    load_tokens_file, PageTokens, Rule, Token, TokenId, TokenStream, MAX_COORDINATE, MAX_PAGE_GAP,
};
