//! Footnote and citation linking.
//!
//! Inline markers are recognised while paragraph text is built
//! ([`FootnoteInterleaver::scan_line`]); bodies get their key from their
//! leading marker ([`FootnoteInterleaver::body_key`]). Once the whole
//! document is assembled, [`FootnoteInterleaver::link`] matches the two,
//! reports what is left over and moves footnote bodies into place.

use std::collections::{HashMap, HashSet};

use crate::model::{
    Diagnostic, DiagnosticKind, Document, FootnoteKind, InlineContent, MarkerKey, Node, TokenId,
};

use super::markers::{self, MarkerLabel};
use super::options::{FootnotePlacement, LayoutOptions};
use super::types::{needs_space, Block, BlockKind, Line, TokenRef};

/// A piece of paragraph text produced by marker scanning.
#[derive(Debug, Clone, PartialEq)]
pub enum Inline {
    /// Plain text
    Text(String),
    /// An inline marker
    Marker {
        /// Marker text as written (empty for the 2nd.. number of a citation list)
        text: String,
        /// Key of the body it points at
        key: MarkerKey,
        /// Token carrying the marker
        token: TokenId,
    },
}

/// Markers recognised inside one token.
struct Scanned<'t> {
    before: &'t str,
    marker: &'t str,
    keys: Vec<MarkerKey>,
    after: &'t str,
    /// Superscripts attach to the preceding word without a space
    raised: bool,
}

/// Recognises footnote markers and links them to bodies.
pub struct FootnoteInterleaver {
    superscript_ratio: f32,
    placement: FootnotePlacement,
}

impl FootnoteInterleaver {
    /// Create a new interleaver.
    pub fn new(options: &LayoutOptions) -> Self {
        Self {
            superscript_ratio: options.lines.superscript_ratio,
            placement: options.footnotes.placement,
        }
    }

    /// Split a body line into text and inline markers.
    pub fn scan_line(&self, line: &Line<'_>) -> Vec<Inline> {
        let mut out: Vec<Inline> = Vec::new();
        let mut prev: Option<&TokenRef<'_>> = None;

        for t in &line.tokens {
            let space = prev.is_some_and(|p| needs_space(p.token, t.token));
            let small = t.token.font_size < self.superscript_ratio * line.font_size;

            match self.scan_token(t, small, line.page) {
                Some(scanned) => {
                    if space && !(scanned.raised && scanned.before.is_empty()) {
                        push_text(&mut out, " ");
                    }
                    push_text(&mut out, scanned.before);
                    for (i, key) in scanned.keys.into_iter().enumerate() {
                        out.push(Inline::Marker {
                            text: if i == 0 {
                                scanned.marker.to_string()
                            } else {
                                String::new()
                            },
                            key,
                            token: t.id,
                        });
                    }
                    push_text(&mut out, scanned.after);
                }
                None => {
                    if space {
                        push_text(&mut out, " ");
                    }
                    push_text(&mut out, t.text());
                }
            }
            prev = Some(t);
        }
        out
    }

    fn scan_token<'t>(&self, t: &TokenRef<'t>, small: bool, page: u32) -> Option<Scanned<'t>> {
        let text = t.text();

        if let Some(label) = markers::superscript_label(text) {
            return Some(Scanned {
                before: "",
                marker: text,
                keys: vec![MarkerKey::numeral(label)],
                after: "",
                raised: true,
            });
        }
        if let Some(attached) = markers::attached_superscript(text) {
            return Some(Scanned {
                before: attached.before,
                marker: attached.marker,
                keys: vec![MarkerKey::numeral(attached.label)],
                after: attached.after,
                raised: true,
            });
        }
        if small {
            let key = markers::numeral_label(text)
                .map(MarkerKey::numeral)
                .or_else(|| markers::symbol_label(text).map(|s| MarkerKey::symbol(s, page)));
            if let Some(key) = key {
                return Some(Scanned {
                    before: "",
                    marker: text,
                    keys: vec![key],
                    after: "",
                    raised: true,
                });
            }
        }
        if let Some((before, marker, after)) = attached_symbol(text) {
            return Some(Scanned {
                before,
                marker,
                keys: vec![MarkerKey::symbol(marker, page)],
                after,
                raised: true,
            });
        }
        if let Some(labels) = markers::citation_labels(text) {
            let close = text.rfind(']')?;
            return Some(Scanned {
                before: "",
                marker: &text[..=close],
                keys: labels.into_iter().map(MarkerKey::numeral).collect(),
                after: &text[close + 1..],
                raised: false,
            });
        }
        None
    }

    /// Key of a footnote or reference body, from its leading marker.
    pub fn body_key(&self, block: &Block<'_>) -> Option<MarkerKey> {
        let first = block.lines.first()?.first()?.text();
        match block.kind {
            BlockKind::Footnote => match markers::footnote_body_label(first)? {
                MarkerLabel::Numeral(label) => Some(MarkerKey::numeral(label)),
                MarkerLabel::Symbol(label) => Some(MarkerKey::symbol(label, block.page())),
            },
            BlockKind::Reference => markers::reference_label(first).map(MarkerKey::numeral),
            _ => None,
        }
    }

    /// Match markers with bodies and apply footnote placement.
    ///
    /// When a key has several bodies (numbering restarting per chapter), a
    /// marker takes the first body on or after its own page.
    pub fn link(&self, document: &mut Document) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();

        let mut bodies: HashMap<MarkerKey, Vec<((usize, usize), u32)>> = HashMap::new();
        let mut body_order: Vec<(usize, usize)> = Vec::new();
        for (s, section) in document.sections.iter().enumerate() {
            for (n, node) in section.nodes.iter().enumerate() {
                if let Node::Footnote(f) = node {
                    bodies
                        .entry(f.key.clone())
                        .or_default()
                        .push(((s, n), f.body.span.start));
                    body_order.push((s, n));
                }
            }
        }

        let mut citations: Vec<((usize, usize), TokenId)> = Vec::new();
        let mut first_citer: HashMap<(usize, usize), (usize, usize)> = HashMap::new();

        for (s, section) in document.sections.iter_mut().enumerate() {
            for (n, node) in section.nodes.iter_mut().enumerate() {
                let paragraph = match node {
                    Node::Paragraph(p) | Node::Caption(p) => p,
                    Node::Table(t) => match t.caption.as_mut() {
                        Some(caption) => caption,
                        None => continue,
                    },
                    _ => continue,
                };
                for item in paragraph.content.iter_mut() {
                    let InlineContent::FootnoteRef { reference, .. } = item else {
                        continue;
                    };
                    let page = reference.token.page;
                    let target = bodies.get(&reference.key).and_then(|candidates| {
                        candidates
                            .iter()
                            .find(|(_, body_page)| *body_page >= page)
                            .or_else(|| candidates.last())
                            .map(|(pos, _)| *pos)
                    });
                    match target {
                        Some(pos) => {
                            reference.resolved = true;
                            citations.push((pos, reference.token));
                            first_citer.entry(pos).or_insert((s, n));
                        }
                        None => {
                            reference.resolved = false;
                            let message = format!(
                                "marker {} has no matching footnote or reference body",
                                reference.key.label
                            );
                            log::warn!("Page {}: {}", page, message);
                            diagnostics.push(Diagnostic::new(
                                DiagnosticKind::UnmatchedFootnoteMarker,
                                Some(page),
                                message,
                            ));
                        }
                    }
                }
            }
        }

        for ((s, n), token) in citations {
            if let Some(Node::Footnote(f)) = document.sections[s].nodes.get_mut(n) {
                if !f.cited_by.contains(&token) {
                    f.cited_by.push(token);
                }
            }
        }

        for &(s, n) in &body_order {
            if let Some(Node::Footnote(f)) = document.sections[s].nodes.get(n) {
                if f.cited_by.is_empty() {
                    let message = format!("{:?} body {} is never referenced", f.kind, f.key.label);
                    log::warn!("Page {}: {}", f.body.span.start, message);
                    diagnostics.push(Diagnostic::new(
                        DiagnosticKind::UnmatchedFootnoteBody,
                        Some(f.body.span.start),
                        message,
                    ));
                }
            }
        }

        self.place(document, &body_order, &first_citer);
        diagnostics
    }

    fn place(
        &self,
        document: &mut Document,
        body_order: &[(usize, usize)],
        first_citer: &HashMap<(usize, usize), (usize, usize)>,
    ) {
        let is_footnote = |document: &Document, (s, n): (usize, usize)| {
            matches!(
                document.sections[s].nodes.get(n),
                Some(Node::Footnote(f)) if f.kind == FootnoteKind::Footnote
            )
        };

        let mut moves: HashMap<(usize, usize), Vec<(usize, usize)>> = HashMap::new();
        let mut moved: HashSet<(usize, usize)> = HashSet::new();
        for &pos in body_order {
            if !is_footnote(document, pos) {
                continue;
            }
            match self.placement {
                FootnotePlacement::Trailing => {
                    moved.insert(pos);
                }
                FootnotePlacement::Adjacent => {
                    if let Some(&citer) = first_citer.get(&pos) {
                        moves.entry(citer).or_default().push(pos);
                        moved.insert(pos);
                    }
                }
            }
        }
        if moved.is_empty() {
            return;
        }

        let mut store: Vec<Vec<Option<Node>>> = document
            .sections
            .iter_mut()
            .map(|s| std::mem::take(&mut s.nodes).into_iter().map(Some).collect())
            .collect();

        if self.placement == FootnotePlacement::Trailing {
            for &(s, n) in body_order {
                if moved.contains(&(s, n)) {
                    if let Some(Node::Footnote(f)) = store[s][n].take() {
                        document.footnotes.push(f);
                    }
                }
            }
        }

        for s in 0..store.len() {
            let mut nodes = Vec::with_capacity(store[s].len());
            for n in 0..store[s].len() {
                if !moved.contains(&(s, n)) {
                    if let Some(node) = store[s][n].take() {
                        nodes.push(node);
                    }
                }
                if let Some(targets) = moves.get(&(s, n)) {
                    for &(ts, tn) in targets {
                        if let Some(node) = store[ts][tn].take() {
                            nodes.push(node);
                        }
                    }
                }
            }
            document.sections[s].nodes = nodes;
        }
    }
}

fn push_text(out: &mut Vec<Inline>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Inline::Text(last)) = out.last_mut() {
        last.push_str(text);
    } else {
        out.push(Inline::Text(text.to_string()));
    }
}

/// Split a word carrying a trailing symbol marker (`value*`, `Smith†,`).
fn attached_symbol(text: &str) -> Option<(&str, &str, &str)> {
    let trimmed = text.trim_end_matches(['.', ',', ';', ':', ')']);
    let after = &text[trimmed.len()..];
    let word = trimmed.trim_end_matches(['*', '†', '‡']);
    if word.len() == trimmed.len() || !word.chars().last()?.is_alphanumeric() {
        return None;
    }
    let marker = &trimmed[word.len()..];
    markers::symbol_label(marker)?;
    Some((word, marker, after))
}
