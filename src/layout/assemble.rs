//! Document assembly.
//!
//! Walks blocks and finished tables in reading order and builds the
//! logical tree. No inference happens here beyond attaching captions.

use crate::model::{
    Diagnostic, Document, Footnote, FootnoteKind, FootnoteRef, Heading, InlineContent,
    LogicalTable, Node, Paragraph, Passthrough, Section,
};

use super::footnotes::{FootnoteInterleaver, Inline};
use super::markers;
use super::options::LayoutOptions;
use super::types::{Block, BlockKind};

/// Owns the growing document tree.
pub struct DocumentAssembler {
    interleaver: FootnoteInterleaver,
    document: Document,
    pending_caption: Option<Paragraph>,
}

impl DocumentAssembler {
    /// Create a new assembler.
    pub fn new(options: &LayoutOptions) -> Self {
        Self {
            interleaver: FootnoteInterleaver::new(options),
            document: Document::new(),
            pending_caption: None,
        }
    }

    /// Append a classified block.
    pub fn push_block(&mut self, block: Block<'_>) {
        if block.is_empty() {
            return;
        }
        if block.is_blank() {
            // kept as an empty paragraph so its tokens stay traceable
            let paragraph = self.paragraph(&block);
            self.section().nodes.push(Node::Paragraph(paragraph));
            return;
        }
        match block.kind {
            BlockKind::Heading => {
                self.flush_caption();
                let mut heading = Heading::new(block.heading_level.max(1), block.text(), block.page());
                heading.tokens = block.token_ids();
                log::trace!("Section: {:?} (level {})", heading.text, heading.level);
                self.document.sections.push(Section::with_heading(heading));
            }
            BlockKind::Caption => {
                self.flush_caption();
                let caption = self.paragraph(&block);
                let text = caption.plain_text();
                if !markers::is_table_caption(&text) {
                    self.section().nodes.push(Node::Caption(caption));
                    return;
                }
                // caption below a table on the same page
                let page = block.page();
                if let Some(Node::Table(table)) = self.section().nodes.last_mut() {
                    if table.caption.is_none() && table.span.end == page {
                        log::debug!("Attaching caption {:?} to preceding table", text);
                        table.caption = Some(caption);
                        return;
                    }
                }
                self.pending_caption = Some(caption);
            }
            BlockKind::Footnote | BlockKind::Reference => {
                self.flush_caption();
                let kind = if block.kind == BlockKind::Footnote {
                    FootnoteKind::Footnote
                } else {
                    FootnoteKind::Reference
                };
                let node = match self.interleaver.body_key(&block) {
                    Some(key) => Node::Footnote(Footnote {
                        key,
                        kind,
                        body: plain_paragraph(&block),
                        cited_by: Vec::new(),
                    }),
                    None => Node::Paragraph(self.paragraph(&block)),
                };
                self.section().nodes.push(node);
            }
            BlockKind::Paragraph | BlockKind::TableCandidate => {
                self.flush_caption();
                let paragraph = self.paragraph(&block);
                self.section().nodes.push(Node::Paragraph(paragraph));
            }
        }
    }

    /// Append a finished table.
    pub fn push_table(&mut self, mut table: LogicalTable) {
        if let Some(caption) = self.pending_caption.take() {
            log::debug!("Attaching caption {:?} to following table", caption.plain_text());
            table.caption = Some(caption);
        }
        self.section().nodes.push(Node::Table(table));
    }

    /// Append tokens passed through without classification.
    pub fn push_passthrough(&mut self, passthrough: Passthrough) {
        self.flush_caption();
        self.section().nodes.push(Node::Unclassified(passthrough));
    }

    /// Link footnotes and return the finished document.
    pub fn finish(mut self, page_count: u32) -> (Document, Vec<Diagnostic>) {
        self.flush_caption();
        self.document.page_count = page_count;
        let diagnostics = self.interleaver.link(&mut self.document);
        (self.document, diagnostics)
    }

    fn flush_caption(&mut self) {
        if let Some(caption) = self.pending_caption.take() {
            self.section().nodes.push(Node::Caption(caption));
        }
    }

    fn section(&mut self) -> &mut Section {
        if self.document.sections.is_empty() {
            self.document.sections.push(Section::default());
        }
        let last = self.document.sections.len() - 1;
        &mut self.document.sections[last]
    }

    /// Body text with inline markers.
    ///
    /// Demoted table candidates keep their physical line breaks.
    fn paragraph(&self, block: &Block<'_>) -> Paragraph {
        let mut paragraph = Paragraph::new(block.page());
        paragraph.span = block.span;
        paragraph.demoted = block.demoted;

        for (i, line) in block.lines.iter().enumerate() {
            if i > 0 {
                if block.demoted {
                    paragraph.add_line_break();
                } else if !ends_with_hyphen(&paragraph) {
                    paragraph.add_text(" ");
                }
            }
            for inline in self.interleaver.scan_line(line) {
                match inline {
                    Inline::Text(text) => paragraph.add_text(text),
                    Inline::Marker { text, key, token } => paragraph.add_reference(
                        text,
                        FootnoteRef {
                            key,
                            token,
                            resolved: false,
                        },
                    ),
                }
            }
            for id in line.ids() {
                paragraph.add_token(id);
            }
        }
        paragraph
    }
}

fn ends_with_hyphen(paragraph: &Paragraph) -> bool {
    matches!(paragraph.content.last(), Some(InlineContent::Text(t)) if t.ends_with('-'))
}

/// Footnote and reference bodies, kept as plain text with their marker.
fn plain_paragraph(block: &Block<'_>) -> Paragraph {
    let mut paragraph = Paragraph::with_text(block.page(), block.text());
    paragraph.span = block.span;
    paragraph.tokens = block.token_ids();
    paragraph
}
