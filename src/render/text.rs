//! Plain text rendering.

use crate::error::Result;
use crate::model::Document;

use super::{selected, RenderOptions};

/// Convert a document to plain text.
///
/// Blocks are separated by blank lines, table rows are tab separated and
/// trailing footnotes follow the body.
pub fn to_text(doc: &Document, options: &RenderOptions) -> Result<String> {
    let selection = &options.page_selection;
    let mut blocks: Vec<String> = Vec::new();

    for section in &doc.sections {
        if let Some(heading) = section.heading.as_ref().filter(|h| selection.includes(h.page)) {
            blocks.push(heading.text.clone());
        }
        blocks.extend(
            section
                .nodes
                .iter()
                .filter(|node| selected(node, selection))
                .map(|node| node.plain_text()),
        );
    }

    blocks.extend(
        doc.footnotes
            .iter()
            .filter(|f| selection.overlaps(f.body.span.start, f.body.span.end))
            .map(|f| f.body.plain_text()),
    );

    let output = blocks
        .iter()
        .map(|b| b.trim())
        .filter(|b| !b.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

    Ok(output)
}
