//! Table reconstruction.
//!
//! A table candidate either becomes a [`LogicalTable`] or is demoted back
//! to a paragraph with every line kept in order. Column inference is a
//! pure function of the body lines: each column count `k` is scored on
//! its own and the largest `k` that reaches the support threshold wins.

use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

use crate::model::{
    Cell, Diagnostic, DiagnosticKind, LogicalTable, RepeatedHeader, Row, Rule, TokenId,
};

use super::options::{LayoutOptions, TableOptions};
use super::types::{
    join_tokens, median, Block, BlockKind, Line, TokenRef, MAX_HISTOGRAM_BINS,
};

/// Inferred horizontal extent of a table column.
///
/// Only used while reconstructing; the finished table keeps column indices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnBand {
    /// Left edge
    pub x0: f32,
    /// Right edge
    pub x1: f32,
}

impl ColumnBand {
    /// Horizontal center.
    pub fn center(&self) -> f32 {
        (self.x0 + self.x1) / 2.0
    }

    /// Width of the band.
    pub fn width(&self) -> f32 {
        (self.x1 - self.x0).max(0.0)
    }

    /// Distance from `x` to the band (0 inside).
    pub fn distance(&self, x: f32) -> f32 {
        if x < self.x0 {
            self.x0 - x
        } else if x > self.x1 {
            x - self.x1
        } else {
            0.0
        }
    }

    /// Whether two bands describe the same column.
    fn matches(&self, other: &ColumnBand, tolerance: f32) -> bool {
        if (self.center() - other.center()).abs() <= tolerance {
            return true;
        }
        let overlap = self.x1.min(other.x1) - self.x0.max(other.x0);
        overlap > 0.0 && overlap >= 0.5 * self.width().min(other.width())
    }
}

/// Why no column hypothesis with at least two columns was accepted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ColumnInferenceFailure {
    /// Not enough body lines to vote on columns
    #[error("too few body lines ({found}, need {required})")]
    TooFewLines {
        /// Body lines available
        found: usize,
        /// Minimum required
        required: usize,
    },

    /// No vertical whitespace run is shared by enough lines
    #[error("no vertical gutter is shared by enough lines")]
    NoGutter,

    /// Every hypothesis fell short of the thresholds
    #[error("no column hypothesis with k >= 2 reached {required:.0}% row support (best {best:.0}%)")]
    InsufficientSupport {
        /// Best support seen, in percent
        best: f32,
        /// Required support, in percent
        required: f32,
    },
}

/// A whitespace run between table columns.
#[derive(Debug, Clone, Copy)]
struct Gutter {
    /// Core of the run where the fewest lines cross
    x0: f32,
    x1: f32,
    crossings: usize,
    width: f32,
}

/// Infer table column bands from body lines.
pub fn infer_columns(
    lines: &[Line<'_>],
    options: &TableOptions,
) -> Result<Vec<ColumnBand>, ColumnInferenceFailure> {
    let n = lines.len();
    if n < options.min_body_rows.max(1) {
        return Err(ColumnInferenceFailure::TooFewLines {
            found: n,
            required: options.min_body_rows.max(1),
        });
    }

    let min_x = lines.iter().map(|l| l.x0).fold(f32::INFINITY, f32::min);
    let max_x = lines.iter().map(|l| l.x1).fold(f32::NEG_INFINITY, f32::max);
    if !(max_x - min_x).is_finite() || max_x <= min_x {
        return Err(ColumnInferenceFailure::NoGutter);
    }

    let mut fonts: Vec<f32> = lines.iter().map(|l| l.font_size).collect();
    let min_gutter = options.min_gutter_factor * median(&mut fonts);

    // Number of lines covering each bin (1pt unless the table is very wide)
    let bin = ((max_x - min_x) / MAX_HISTOGRAM_BINS as f32).max(1.0);
    let bins = ((max_x - min_x) / bin).ceil() as usize + 1;
    let mut crossing = vec![0usize; bins];
    let mut covered = vec![false; bins];
    for line in lines {
        covered.iter_mut().for_each(|c| *c = false);
        for t in &line.tokens {
            let start = ((t.token.x0 - min_x) / bin).floor().max(0.0) as usize;
            let end = (((t.token.x1 - min_x) / bin).ceil() as usize)
                .saturating_sub(1)
                .max(start);
            for c in covered.iter_mut().take(end.min(bins - 1) + 1).skip(start) {
                *c = true;
            }
        }
        for (count, hit) in crossing.iter_mut().zip(&covered) {
            if *hit {
                *count += 1;
            }
        }
    }

    let allowed = (n as f32 * (1.0 - options.min_row_support) + 1e-4).floor() as usize;
    let mut gutters = find_gutters(&crossing, allowed, min_gutter, min_x, bin);
    if gutters.is_empty() {
        return Err(ColumnInferenceFailure::NoGutter);
    }
    gutters.sort_by(|a, b| {
        a.crossings
            .cmp(&b.crossings)
            .then(b.width.partial_cmp(&a.width).unwrap_or(std::cmp::Ordering::Equal))
    });

    let max_k = options.max_columns.min(gutters.len() + 1);
    let mut best_support = 0.0f32;
    let mut accepted: Option<Vec<ColumnBand>> = None;

    for k in 2..=max_k {
        let mut chosen: Vec<Gutter> = gutters[..k - 1].to_vec();
        chosen.sort_by(|a, b| a.x0.partial_cmp(&b.x0).unwrap_or(std::cmp::Ordering::Equal));

        let bands: Vec<ColumnBand> = (0..k)
            .map(|i| ColumnBand {
                x0: if i == 0 { min_x } else { chosen[i - 1].x1 },
                x1: if i == k - 1 { max_x } else { chosen[i].x0 },
            })
            .collect();

        let clean = lines
            .iter()
            .filter(|l| {
                !chosen
                    .iter()
                    .any(|g| l.tokens.iter().any(|t| t.token.x0 < g.x1 && t.token.x1 > g.x0))
            })
            .count();
        let support = clean as f32 / n as f32;
        best_support = best_support.max(support);

        let mut occupied = vec![false; k];
        let mut multi = 0;
        for line in lines {
            let mut hit = vec![false; k];
            for t in &line.tokens {
                hit[nearest_band(&bands, t.token.center_x())] = true;
            }
            if hit.iter().filter(|h| **h).count() >= 2 {
                multi += 1;
            }
            for (o, h) in occupied.iter_mut().zip(&hit) {
                *o |= *h;
            }
        }
        let multi_ratio = multi as f32 / n as f32;

        let valid = support >= options.min_row_support
            && multi_ratio >= options.min_multi_cell_ratio
            && occupied.iter().all(|o| *o);
        log::trace!(
            "k={}: support={:.2}, multi={:.2}, occupied={}, valid={}",
            k,
            support,
            multi_ratio,
            occupied.iter().all(|o| *o),
            valid
        );
        if valid {
            accepted = Some(bands);
        }
    }

    match accepted {
        Some(bands) => {
            log::debug!("Inferred {} table columns from {} lines", bands.len(), n);
            Ok(bands)
        }
        None => Err(ColumnInferenceFailure::InsufficientSupport {
            best: best_support * 100.0,
            required: options.min_row_support * 100.0,
        }),
    }
}

/// Interior runs of bins crossed by at most `allowed` lines.
fn find_gutters(
    crossing: &[usize],
    allowed: usize,
    min_width: f32,
    origin: f32,
    bin: f32,
) -> Vec<Gutter> {
    let bins = crossing.len();
    let mut gutters = Vec::new();
    let mut i = 1;
    while i + 1 < bins {
        if crossing[i] > allowed {
            i += 1;
            continue;
        }
        let start = i;
        while i + 1 < bins && crossing[i] <= allowed {
            i += 1;
        }
        let end = i; // exclusive
        if end >= bins - 1 && crossing[bins - 1] <= allowed {
            break;
        }
        let width = (end - start) as f32 * bin;
        if width < min_width {
            continue;
        }

        // Longest stretch at the minimum crossing count
        let least = crossing[start..end].iter().copied().min().unwrap_or(0);
        let (mut core_start, mut core_len) = (start, 0);
        let mut run = 0;
        for j in start..end {
            if crossing[j] == least {
                run += 1;
                if run > core_len {
                    core_len = run;
                    core_start = j + 1 - run;
                }
            } else {
                run = 0;
            }
        }

        gutters.push(Gutter {
            x0: origin + core_start as f32 * bin,
            x1: origin + (core_start + core_len) as f32 * bin,
            crossings: least,
            width,
        });
    }
    gutters
}

fn nearest_band(bands: &[ColumnBand], x: f32) -> usize {
    bands
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            a.distance(x)
                .partial_cmp(&b.distance(x))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// First and last band touched by the range `[x0, x1]`.
fn band_range(bands: &[ColumnBand], x0: f32, x1: f32) -> (usize, usize) {
    let first = bands.iter().position(|b| b.x1 >= x0);
    let last = bands.iter().rposition(|b| b.x0 <= x1);
    match (first, last) {
        (Some(a), Some(b)) if a <= b => (a, b),
        _ => {
            let i = nearest_band(bands, (x0 + x1) / 2.0);
            (i, i)
        }
    }
}

/// Normalize header text for comparing repeated headers.
pub fn fingerprint_text(text: &str) -> String {
    let folded: String = text
        .nfc()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{2032}' => '\'',
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{2033}' => '"',
            '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2015}'
            | '\u{2212}' => '-',
            '\u{00B5}' => '\u{03BC}',
            '\u{00A0}' => ' ',
            c => c,
        })
        .collect();
    folded
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn header_fingerprint(rows: &[Row]) -> Option<String> {
    if rows.is_empty() {
        return None;
    }
    let text = rows
        .iter()
        .flat_map(|r| r.cells.iter())
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    Some(fingerprint_text(&text))
}

const CONNECTORS: [&str; 17] = [
    "and", "or", "of", "the", "a", "an", "to", "in", "for", "with", "on", "by", "that", "which",
    "at", "from", "as",
];

/// Whether `next` reads as the continuation of a wrapped `prev`.
pub fn text_continues(prev: &str, next: &str) -> bool {
    let prev = prev.trim_end();
    if prev.ends_with(['-', ',', ';', '/', '(', '&']) {
        return true;
    }
    if let Some(last) = prev.split_whitespace().last() {
        if CONNECTORS.contains(&last.to_lowercase().as_str()) {
            return true;
        }
    }
    next.trim_start()
        .chars()
        .next()
        .is_some_and(|c| c.is_lowercase())
}

/// A table built from a candidate block, with the geometry needed to
/// stitch it to a continuation on the next page.
#[derive(Debug, Clone)]
pub struct ReconstructedTable {
    /// The logical table
    pub table: LogicalTable,
    /// Column bands the table was built on
    pub bands: Vec<ColumnBand>,
    /// Normalized header text, when the table has header rows
    pub header_fingerprint: Option<String>,
}

/// Outcome of reconstructing a table candidate.
#[derive(Debug)]
pub enum Verdict<'a> {
    /// The candidate is a table
    Table(ReconstructedTable),
    /// The candidate was demoted to a paragraph
    Demoted {
        /// The block, now a demoted paragraph
        block: Block<'a>,
        /// Why inference failed
        failure: ColumnInferenceFailure,
    },
}

impl Verdict<'_> {
    /// Diagnostic describing a demotion, if any.
    pub fn diagnostic(&self) -> Option<Diagnostic> {
        match self {
            Verdict::Table(_) => None,
            Verdict::Demoted { block, failure } => Some(Diagnostic::new(
                DiagnosticKind::ColumnInferenceFailure,
                Some(block.page()),
                format!(
                    "table candidate of {} line(s) demoted to paragraph: {}",
                    block.lines.len(),
                    failure
                ),
            )),
        }
    }
}

struct RowBuilder {
    cells: Vec<Cell>,
    page: u32,
}

impl RowBuilder {
    fn new(columns: usize, page: u32) -> Self {
        Self {
            cells: (0..columns).map(|_| Cell::empty()).collect(),
            page,
        }
    }

    fn append(&mut self, band: usize, tokens: &[TokenRef<'_>]) {
        // covered slots hand their text to the spanning cell on the left
        let mut target = band;
        while target > 0 && self.cells[target].covered && self.cells[target].col_span == 1 {
            target -= 1;
        }
        let ids: Vec<TokenId> = tokens.iter().map(|t| t.id).collect();
        self.cells[target].append(&join_tokens(tokens), &ids);
    }

    fn has_col_span(&self) -> bool {
        self.cells.iter().any(|c| c.col_span > 1)
    }

    fn into_row(self, header: bool) -> Row {
        if header {
            Row::header(self.cells, self.page)
        } else {
            Row::new(self.cells, self.page)
        }
    }
}

/// Reconstructs logical tables from table-candidate blocks.
pub struct TableReconstructor<'o> {
    options: &'o TableOptions,
    line_gap_factor: f32,
}

impl<'o> TableReconstructor<'o> {
    /// Create a new reconstructor.
    pub fn new(options: &'o LayoutOptions) -> Self {
        Self {
            options: &options.tables,
            line_gap_factor: options.lines.line_gap_factor,
        }
    }

    /// Reconstruct a table candidate.
    ///
    /// `rules` are the horizontal rules of the block's page.
    pub fn reconstruct<'a>(&self, block: Block<'a>, rules: &[Rule]) -> Verdict<'a> {
        let header_count = self.header_line_count(&block.lines);
        let body = &block.lines[header_count..];

        let bands = match infer_columns(body, self.options) {
            Ok(bands) => bands,
            Err(failure) => {
                log::warn!(
                    "Demoting table candidate on page {}: {}",
                    block.page(),
                    failure
                );
                return Verdict::Demoted {
                    block: demote(block),
                    failure,
                };
            }
        };

        let page = block.page();
        let mut fonts: Vec<f32> = block.lines.iter().map(|l| l.font_size).collect();
        let min_gutter = self.options.min_gutter_factor * median(&mut fonts);

        let header_rows = self.header_rows(&block.lines[..header_count], &bands, min_gutter);
        let body_rows = self.body_rows(body, &bands, rules);

        let mut table = LogicalTable::new(bands.len(), page);
        table.span = block.span;
        table.header_rows = header_rows.len();
        for row in header_rows {
            table.add_row(row.into_row(true));
        }
        for row in body_rows {
            table.add_row(row.into_row(false));
        }

        let header_fingerprint = header_fingerprint(table.header());
        log::debug!(
            "Reconstructed table on page {}: {} columns, {} header row(s), {} body row(s)",
            page,
            table.column_count(),
            table.header_rows,
            table.body().len()
        );

        Verdict::Table(ReconstructedTable {
            table,
            bands,
            header_fingerprint,
        })
    }

    /// Leading bold or larger-font lines, never the whole block.
    fn header_line_count(&self, lines: &[Line<'_>]) -> usize {
        let mut fonts: Vec<f32> = lines.iter().map(|l| l.font_size).collect();
        let typical = median(&mut fonts);
        let count = lines
            .iter()
            .take_while(|l| l.is_bold() || l.font_size >= typical + 0.5)
            .count();
        if count >= lines.len() {
            0
        } else {
            count
        }
    }

    fn header_rows(&self, lines: &[Line<'_>], bands: &[ColumnBand], min_gutter: f32) -> Vec<RowBuilder> {
        let mut rows: Vec<RowBuilder> = Vec::new();

        for line in lines {
            let placements: Vec<(usize, usize, Vec<TokenRef<'_>>)> = split_phrases(line, min_gutter)
                .into_iter()
                .map(|phrase| {
                    let x0 = phrase.first().map(|t| t.token.x0).unwrap_or(0.0);
                    let x1 = phrase.last().map(|t| t.token.x1).unwrap_or(0.0);
                    let (a, b) = band_range(bands, x0, x1);
                    (a, b, phrase)
                })
                .collect();

            let spans = placements.iter().any(|(a, b, _)| b > a);
            let new_row = match rows.last() {
                None => true,
                Some(row) => spans || row.has_col_span(),
            };
            if new_row {
                rows.push(RowBuilder::new(bands.len(), line.page));
            }
            let Some(row) = rows.last_mut() else {
                continue;
            };

            for (a, b, phrase) in placements {
                let free = (a..=b).all(|i| row.cells[i].is_empty() && !row.cells[i].covered);
                if b > a && free {
                    row.append(a, &phrase);
                    row.cells[a].col_span = (b - a + 1) as u32;
                    for i in a + 1..=b {
                        row.cells[i] = Cell::covered();
                    }
                } else {
                    row.append(a, &phrase);
                }
            }
        }
        rows
    }

    fn body_rows(&self, lines: &[Line<'_>], bands: &[ColumnBand], rules: &[Rule]) -> Vec<RowBuilder> {
        let mut rows: Vec<RowBuilder> = Vec::new();
        let mut prev_line: Option<&Line<'_>> = None;

        for line in lines {
            let mut cells: Vec<Vec<TokenRef<'_>>> = vec![Vec::new(); bands.len()];
            for t in &line.tokens {
                cells[nearest_band(bands, t.token.center_x())].push(*t);
            }
            let first_empty = cells[0].is_empty();

            let rule = prev_line.and_then(|prev| self.rule_between(prev, line, bands, rules));
            let continues = match (rows.last(), rule) {
                (None, _) => false,
                (Some(_), Some(_)) => false,
                (Some(_), None) if line.blank_lines_above(self.line_gap_factor) > 0 => false,
                (Some(_), None) if first_empty => true,
                (Some(row), None) => {
                    let anchor = &row.cells[0];
                    !anchor.covered
                        && !anchor.is_empty()
                        && text_continues(&anchor.text, &join_tokens(&cells[0]))
                        && cells
                            .iter()
                            .zip(&row.cells)
                            .skip(1)
                            .all(|(new, old)| new.is_empty() || old.is_empty())
                }
            };

            if !continues {
                let mut row = RowBuilder::new(bands.len(), line.page);
                if rule == Some(RuleKind::Partial) && first_empty {
                    // the first cell above spans into this row
                    if let Some(owner) = rows.iter_mut().rev().find(|r| !r.cells[0].covered) {
                        owner.cells[0].row_span += 1;
                        row.cells[0] = Cell::covered();
                    }
                }
                rows.push(row);
            }

            if let Some(row) = rows.last_mut() {
                for (band, tokens) in cells.iter().enumerate() {
                    if !tokens.is_empty() {
                        row.append(band, tokens);
                    }
                }
            }
            prev_line = Some(line);
        }
        rows
    }

    fn rule_between(
        &self,
        above: &Line<'_>,
        below: &Line<'_>,
        bands: &[ColumnBand],
        rules: &[Rule],
    ) -> Option<RuleKind> {
        let first = bands.first()?;
        let mut kind = None;
        for rule in rules {
            if rule.y < above.y1 - 1.0 || rule.y > below.y0 + 1.0 {
                continue;
            }
            if rule.covers(first.x0, first.x1, 0.5) {
                return Some(RuleKind::Full);
            }
            if bands[1..].iter().any(|b| rule.covers(b.x0, b.x1, 0.5)) {
                kind = Some(RuleKind::Partial);
            }
        }
        kind
    }

    /// Append a continuation table from the next page.
    ///
    /// Returns the continuation back with a diagnostic when its geometry or
    /// repeated header does not match.
    pub fn continue_table(
        &self,
        open: &mut ReconstructedTable,
        next: ReconstructedTable,
    ) -> Result<(), (ReconstructedTable, Diagnostic)> {
        let page = next.table.span.start;
        let geometry_matches = open.bands.len() == next.bands.len()
            && open
                .bands
                .iter()
                .zip(&next.bands)
                .all(|(a, b)| a.matches(b, self.options.band_match_tolerance));
        if !geometry_matches {
            let message = format!(
                "table on page {} does not continue the {}-column table from page {} ({} columns)",
                page,
                open.bands.len(),
                open.table.span.end,
                next.bands.len()
            );
            log::warn!("{}", message);
            let diagnostic =
                Diagnostic::new(DiagnosticKind::CrossPageContinuationMismatch, Some(page), message);
            return Err((next, diagnostic));
        }

        let ReconstructedTable {
            table: mut continuation,
            bands,
            header_fingerprint,
        } = next;

        let mut repeated = Vec::new();
        if continuation.header_rows > 0 {
            if header_fingerprint != open.header_fingerprint {
                let message = format!(
                    "header on page {} differs from the table header on page {}",
                    page, open.table.span.start
                );
                log::warn!("{}", message);
                let diagnostic = Diagnostic::new(
                    DiagnosticKind::CrossPageContinuationMismatch,
                    Some(page),
                    message,
                );
                return Err((
                    ReconstructedTable {
                        table: continuation,
                        bands,
                        header_fingerprint,
                    },
                    diagnostic,
                ));
            }
            repeated = continuation
                .rows
                .drain(..continuation.header_rows)
                .collect();
        }

        let table = &mut open.table;
        if !repeated.is_empty() {
            log::debug!("Dropping repeated header on page {}", page);
            table.repeated_headers.push(RepeatedHeader {
                page,
                rows: repeated,
            });
        }
        for mut row in continuation.rows {
            row.is_header = false;
            table.add_row(row);
        }
        table.span.include(continuation.span.end);
        table.continued_from_page = Some(table.span.start);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RuleKind {
    /// Rule across the first column: always a row boundary
    Full,
    /// Rule over later columns only
    Partial,
}

/// Split a line into phrases at gaps of at least `min_gap`.
fn split_phrases<'a>(line: &Line<'a>, min_gap: f32) -> Vec<Vec<TokenRef<'a>>> {
    let mut phrases: Vec<Vec<TokenRef<'a>>> = Vec::new();
    let mut right = f32::NEG_INFINITY;
    for t in &line.tokens {
        match phrases.last_mut() {
            Some(phrase) if t.token.x0 - right < min_gap => phrase.push(*t),
            _ => phrases.push(vec![*t]),
        }
        right = right.max(t.token.x1);
    }
    phrases
}

/// Turn a failed candidate into a demoted paragraph.
fn demote(mut block: Block<'_>) -> Block<'_> {
    block.kind = BlockKind::Paragraph;
    block.demoted = true;
    block
}
