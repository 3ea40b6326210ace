//! Rendering of the reconstructed document to Markdown, plain text and JSON.

mod json;
mod markdown;
mod options;
mod text;

pub use json::{to_json, JsonFormat};
pub use markdown::{to_markdown, MarkdownRenderer};
pub use options::{PageSelection, RenderOptions, TableFallback};
pub use text::to_text;

use crate::model::{Node, PageRange};

/// Pages a node was built from.
pub(crate) fn node_span(node: &Node) -> PageRange {
    match node {
        Node::Paragraph(p) | Node::Caption(p) => p.span,
        Node::Table(t) => t.span,
        Node::Footnote(f) => f.body.span,
        Node::Unclassified(u) => PageRange::single(u.page),
    }
}

/// Whether a node falls inside the page selection.
pub(crate) fn selected(node: &Node, selection: &PageSelection) -> bool {
    let span = node_span(node);
    selection.overlaps(span.start, span.end)
}
