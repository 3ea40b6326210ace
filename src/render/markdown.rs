//! Markdown rendering.
//!
//! Resolved markers become `[^key]` references and their bodies
//! `[^key]: ...` definitions. Unresolved markers and never-cited bodies
//! are written out verbatim so no text is lost.

use crate::error::Result;
use crate::layout::markers;
use crate::model::{
    Cell, Document, Footnote, Heading, InlineContent, LogicalTable, Node, Paragraph, Row,
};

use super::{selected, RenderOptions, TableFallback};

/// Convert a document to Markdown.
pub fn to_markdown(doc: &Document, options: &RenderOptions) -> Result<String> {
    MarkdownRenderer::new(options.clone()).render(doc)
}

/// Markdown renderer.
pub struct MarkdownRenderer {
    options: RenderOptions,
}

impl MarkdownRenderer {
    /// Create a new Markdown renderer.
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }

    /// Render a document to Markdown.
    pub fn render(&self, doc: &Document) -> Result<String> {
        let mut output = String::new();

        for section in &doc.sections {
            if let Some(heading) = &section.heading {
                if self.options.page_selection.includes(heading.page) {
                    self.render_heading(&mut output, heading);
                }
            }
            for node in &section.nodes {
                if selected(node, &self.options.page_selection) {
                    self.render_node(&mut output, node);
                }
            }
        }

        let trailing: Vec<&Footnote> = doc
            .footnotes
            .iter()
            .filter(|f| {
                self.options
                    .page_selection
                    .overlaps(f.body.span.start, f.body.span.end)
            })
            .collect();
        if !trailing.is_empty() {
            output.push_str("---\n\n");
            for footnote in trailing {
                self.render_footnote(&mut output, footnote);
            }
        }

        Ok(output.trim().to_string())
    }

    fn render_heading(&self, output: &mut String, heading: &Heading) {
        let level = heading.level.min(self.options.max_heading_level).max(1);
        output.push_str(&"#".repeat(level as usize));
        output.push(' ');
        output.push_str(&self.escape(&heading.text));
        output.push_str("\n\n");
    }

    fn render_node(&self, output: &mut String, node: &Node) {
        match node {
            Node::Paragraph(p) => {
                if p.is_empty() {
                    return;
                }
                self.render_inline_content(output, &p.content);
                output.push_str("\n\n");
            }
            Node::Caption(p) => self.render_caption(output, p),
            Node::Table(t) => self.render_table(output, t),
            Node::Footnote(f) => self.render_footnote(output, f),
            Node::Unclassified(u) => {
                output.push_str(&self.escape(&u.text));
                output.push_str("\n\n");
            }
        }
    }

    fn render_caption(&self, output: &mut String, caption: &Paragraph) {
        let text = caption.plain_text();
        if text.trim().is_empty() {
            return;
        }
        output.push('*');
        output.push_str(&self.escape(text.trim()));
        output.push_str("*\n\n");
    }

    fn render_inline_content(&self, output: &mut String, content: &[InlineContent]) {
        for item in content {
            match item {
                InlineContent::Text(text) => output.push_str(&self.escape(text)),
                InlineContent::FootnoteRef { text, reference } => {
                    if reference.resolved {
                        output.push_str(&format!("[^{}]", reference.key.anchor()));
                    } else {
                        output.push_str(&self.escape(text));
                    }
                }
                InlineContent::LineBreak => output.push_str("  \n"),
            }
        }
    }

    fn render_footnote(&self, output: &mut String, footnote: &Footnote) {
        let text = footnote.body.plain_text();
        if footnote.is_resolved() {
            output.push_str(&format!(
                "[^{}]: {}\n\n",
                footnote.key.anchor(),
                self.escape(strip_marker(&text))
            ));
        } else {
            output.push_str(&self.escape(&text));
            output.push_str("\n\n");
        }
    }

    fn render_table(&self, output: &mut String, table: &LogicalTable) {
        if table.is_empty() {
            return;
        }

        if let Some(caption) = &table.caption {
            self.render_caption(output, caption);
        }

        if table.has_merged_cells() && self.options.table_fallback == TableFallback::Html {
            self.render_table_html(output, table);
        } else {
            self.render_table_markdown(output, table);
        }

        if self.options.continuation_notes && table.span.is_multi_page() {
            output.push_str(&format!(
                "<!-- table continues from page {} to page {} -->\n\n",
                table.continued_from_page.unwrap_or(table.span.start),
                table.span.end
            ));
        }
    }

    fn render_table_markdown(&self, output: &mut String, table: &LogicalTable) {
        let columns = table.column_count();
        if columns == 0 {
            return;
        }

        // Pipe tables carry exactly one header row
        let (header, body): (Vec<String>, &[Row]) = match table.header_rows {
            0 => (
                table.rows[0].cells.iter().map(|c| self.cell_text(c)).collect(),
                &table.rows[1..],
            ),
            _ => (
                (0..columns)
                    .map(|i| {
                        table
                            .header()
                            .iter()
                            .map(|r| self.cell_text(&r.cells[i]))
                            .filter(|t| !t.is_empty())
                            .collect::<Vec<_>>()
                            .join(" ")
                    })
                    .collect(),
                table.body(),
            ),
        };

        push_pipe_row(output, &header);
        output.push('|');
        output.push_str(&" --- |".repeat(columns));
        output.push('\n');
        for row in body {
            let cells: Vec<String> = row.cells.iter().map(|c| self.cell_text(c)).collect();
            push_pipe_row(output, &cells);
        }
        output.push('\n');
    }

    fn render_table_html(&self, output: &mut String, table: &LogicalTable) {
        output.push_str("<table>\n");

        if table.header_rows > 0 {
            output.push_str("<thead>\n");
            for row in table.header() {
                render_html_row(output, row, "th");
            }
            output.push_str("</thead>\n");
        }

        output.push_str("<tbody>\n");
        for row in table.body() {
            render_html_row(output, row, "td");
        }
        output.push_str("</tbody>\n");

        output.push_str("</table>\n\n");
    }

    fn cell_text(&self, cell: &Cell) -> String {
        if cell.covered {
            return String::new();
        }
        // pipes are table syntax even when escaping is off
        let text = self.escape(cell.text.trim());
        if self.options.escape_special_chars {
            text
        } else {
            text.replace('|', "\\|")
        }
    }

    fn escape(&self, text: &str) -> String {
        if self.options.escape_special_chars {
            escape_markdown(text)
        } else {
            text.to_string()
        }
    }
}

fn push_pipe_row(output: &mut String, cells: &[String]) {
    output.push('|');
    for cell in cells {
        output.push(' ');
        output.push_str(cell);
        output.push_str(" |");
    }
    output.push('\n');
}

fn render_html_row(output: &mut String, row: &Row, tag: &str) {
    output.push_str("<tr>");
    for cell in row.cells.iter().filter(|c| !c.covered) {
        let mut attrs = String::new();
        if cell.row_span > 1 {
            attrs.push_str(&format!(" rowspan=\"{}\"", cell.row_span));
        }
        if cell.col_span > 1 {
            attrs.push_str(&format!(" colspan=\"{}\"", cell.col_span));
        }
        output.push_str(&format!("<{}{}>{}</{}>", tag, attrs, escape_html(&cell.text), tag));
    }
    output.push_str("</tr>\n");
}

/// Body text of a footnote without its leading marker.
fn strip_marker(text: &str) -> &str {
    let text = text.trim_start();
    let (first, rest) = text.split_once(char::is_whitespace).unwrap_or((text, ""));
    if markers::footnote_body_label(first).is_none() {
        return text;
    }
    let standalone = markers::superscript_label(first)
        .or_else(|| markers::symbol_label(first))
        .or_else(|| markers::numeral_label(first.trim_end_matches(['.', ')'])))
        .or_else(|| markers::reference_label(first));
    match standalone {
        Some(_) => rest.trim_start(),
        // marker glued to the first word
        None => text.trim_start_matches(|c: char| {
            markers::FOOTNOTE_SYMBOLS.contains(&c) || markers::superscript_label(&c.to_string()).is_some()
        }),
    }
}

/// Escape special Markdown characters.
/// Only characters that could be misinterpreted as Markdown syntax.
fn escape_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' | '`' | '*' | '_' | '[' | ']' | '|' => {
                result.push('\\');
                result.push(c);
            }
            _ => result.push(c),
        }
    }
    result
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
