//! Reconstruction pipeline.
//!
//! Two stages joined by a bounded queue:
//!
//! ```text
//! [page stage]  --PageLayout-->  [reconstruction stage]
//!  columns, lines, blocks          tables, continuation, assembly
//!  (rayon, page windows)           (one thread, page order)
//! ```
//!
//! The page stage runs on a producer thread that analyzes pages in
//! windows on the rayon pool and sends each window's results in page
//! order. The reconstruction stage owns the document tree. A table that
//! ends its page is held back until the next page shows whether it
//! continues there.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::bounded;
use rayon::prelude::*;
use serde::Serialize;

use crate::model::{
    Diagnostic, DiagnosticKind, Document, PageTokens, Passthrough, Rule, TokenStream,
};

use super::assemble::DocumentAssembler;
use super::classify::BlockClassifier;
use super::columns::ColumnResolver;
use super::lines::LineAssembler;
use super::options::LayoutOptions;
use super::stats::FontStatistics;
use super::table::{ReconstructedTable, TableReconstructor, Verdict};
use super::types::{Block, BlockKind, Column, TokenRef};

/// Cooperative cancellation flag, checked before each page window.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Result of a reconstruction run.
#[derive(Debug, Clone, Serialize)]
pub struct Reconstruction {
    /// The logical document
    pub document: Document,
    /// Recoverable conditions, in the order they were observed
    pub diagnostics: Vec<Diagnostic>,
    /// Pages that made it through both stages
    pub pages_processed: u32,
    /// Set when the run stopped early on cancellation
    pub cancelled: bool,
}

/// Blocks of one page, ready for sequential reconstruction.
#[derive(Debug)]
pub struct PageLayout<'a> {
    /// Page number
    pub number: u32,
    /// Blocks in reading order
    pub blocks: Vec<Block<'a>>,
    /// Horizontal rules of the page
    pub rules: &'a [Rule],
    /// Malformed tokens of the page
    pub passthrough: Option<Passthrough>,
    /// Conditions found while analyzing the page
    pub diagnostics: Vec<Diagnostic>,
}

/// Per-page stage: columns, lines and block classification.
pub struct PageAnalyzer<'o> {
    options: &'o LayoutOptions,
    stats: &'o FontStatistics,
}

impl<'o> PageAnalyzer<'o> {
    /// Create a new page analyzer.
    pub fn new(options: &'o LayoutOptions, stats: &'o FontStatistics) -> Self {
        Self { options, stats }
    }

    /// Analyze one page. Depends on nothing but the page's own tokens.
    pub fn analyze<'a>(&self, stream: &'a TokenStream, page: &'a PageTokens) -> PageLayout<'a> {
        let mut diagnostics = Vec::new();
        let mut tokens = Vec::with_capacity(page.tokens.len());
        let mut malformed = Vec::new();

        for (index, token) in page.tokens.iter().enumerate() {
            let id = page.token_id(index);
            if stream.is_malformed(id) {
                malformed.push((id, token.text.as_str()));
            } else {
                tokens.push(TokenRef::new(id, token));
            }
        }

        if page.tokens.is_empty() {
            log::warn!("Page {} has no tokens", page.number);
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::EmptyPage,
                Some(page.number),
                "page carries no tokens",
            ));
        }

        let passthrough = (!malformed.is_empty()).then(|| Passthrough {
            text: malformed
                .iter()
                .map(|(_, text)| *text)
                .collect::<Vec<_>>()
                .join(" "),
            tokens: malformed.iter().map(|(id, _)| *id).collect(),
            page: page.number,
        });

        let classifier = BlockClassifier::new(self.options, self.stats);
        let blocks: Vec<Block<'a>> = self
            .columns(page.number, tokens)
            .into_iter()
            .flat_map(|column| classifier.classify(column.lines))
            .collect();
        log::debug!("Page {}: {} block(s)", page.number, blocks.len());

        PageLayout {
            number: page.number,
            blocks,
            rules: &page.rules,
            passthrough,
            diagnostics,
        }
    }

    /// Reading columns of a page, left to right, with their lines.
    pub fn columns<'a>(&self, page: u32, tokens: Vec<TokenRef<'a>>) -> Vec<Column<'a>> {
        let resolver =
            ColumnResolver::new(&self.options.columns, self.options.lines.baseline_tolerance);
        let assembler = LineAssembler::new(&self.options.lines);
        resolver
            .resolve(page, tokens)
            .into_iter()
            .map(|band| Column {
                index: band.index,
                page,
                x0: band.x0,
                x1: band.x1,
                lines: assembler.assemble(page, band.index, band.tokens),
            })
            .collect()
    }
}

/// Sequential stage: table verdicts, cross-page continuation, assembly.
struct ReconstructionStage<'o> {
    classifier: BlockClassifier<'o>,
    reconstructor: TableReconstructor<'o>,
    assembler: DocumentAssembler,
    carry: Option<ReconstructedTable>,
    deferred: Vec<Passthrough>,
    diagnostics: Vec<Diagnostic>,
    pages_processed: u32,
}

impl<'o> ReconstructionStage<'o> {
    fn new(options: &'o LayoutOptions, stats: &'o FontStatistics) -> Self {
        Self {
            classifier: BlockClassifier::new(options, stats),
            reconstructor: TableReconstructor::new(options),
            assembler: DocumentAssembler::new(options),
            carry: None,
            deferred: Vec::new(),
            diagnostics: Vec::new(),
            pages_processed: 0,
        }
    }

    fn push_page(&mut self, layout: PageLayout<'_>) {
        let PageLayout {
            number,
            blocks,
            rules,
            passthrough,
            diagnostics,
        } = layout;
        self.pages_processed += 1;
        self.diagnostics.extend(diagnostics);

        let count = blocks.len();
        if count == 0 {
            self.flush_carry();
        }

        for (i, block) in blocks.into_iter().enumerate() {
            let is_last = i + 1 == count;
            if block.kind != BlockKind::TableCandidate {
                self.flush_carry();
                self.assembler.push_block(block);
                continue;
            }

            let verdict = self.reconstructor.reconstruct(block, rules);
            if let Some(diagnostic) = verdict.diagnostic() {
                self.diagnostics.push(diagnostic);
            }
            match verdict {
                Verdict::Demoted { block, .. } => {
                    self.flush_carry();
                    for block in self.classifier.reclassify(block) {
                        self.assembler.push_block(block);
                    }
                }
                Verdict::Table(table) => {
                    let table = if i == 0 {
                        self.continue_carry(number, table)
                    } else {
                        Some(table)
                    };
                    match table {
                        // merged into the open table
                        None if is_last => {}
                        None => self.flush_carry(),
                        Some(table) => {
                            self.flush_carry();
                            if is_last {
                                self.carry = Some(table);
                            } else {
                                self.assembler.push_table(table.table);
                            }
                        }
                    }
                }
            }
        }

        if let Some(passthrough) = passthrough {
            if self.carry.is_some() {
                self.deferred.push(passthrough);
            } else {
                self.assembler.push_passthrough(passthrough);
            }
        }
    }

    /// Try to append `table` to the table left open by the previous page.
    ///
    /// Returns the table back when it starts a new one.
    fn continue_carry(&mut self, page: u32, table: ReconstructedTable) -> Option<ReconstructedTable> {
        let Some(mut open) = self.carry.take() else {
            return Some(table);
        };
        let result = if open.table.span.end + 1 == page {
            match self.reconstructor.continue_table(&mut open, table) {
                Ok(()) => {
                    log::debug!(
                        "Table from page {} continues on page {}",
                        open.table.span.start,
                        page
                    );
                    None
                }
                Err((table, diagnostic)) => {
                    self.diagnostics.push(diagnostic);
                    Some(table)
                }
            }
        } else {
            Some(table)
        };
        self.carry = Some(open);
        result
    }

    fn flush_carry(&mut self) {
        if let Some(open) = self.carry.take() {
            self.assembler.push_table(open.table);
        }
        for passthrough in self.deferred.drain(..) {
            self.assembler.push_passthrough(passthrough);
        }
    }

    fn finish(mut self, cancelled: bool) -> Reconstruction {
        self.flush_carry();
        let (document, links) = self.assembler.finish(self.pages_processed);
        self.diagnostics.extend(links);
        Reconstruction {
            document,
            diagnostics: self.diagnostics,
            pages_processed: self.pages_processed,
            cancelled,
        }
    }
}

/// Run the full reconstruction over a token stream.
pub fn run(stream: &TokenStream, options: &LayoutOptions, cancel: &CancellationToken) -> Reconstruction {
    let stats = FontStatistics::from_stream(stream);
    let pages: Vec<&PageTokens> = stream
        .pages()
        .iter()
        .filter(|p| options.pages.includes(p.number))
        .collect();
    log::debug!(
        "Reconstructing {} of {} page(s), parallel={}",
        pages.len(),
        stream.page_count(),
        options.parallel
    );

    let analyzer = PageAnalyzer::new(options, &stats);
    let mut stage = ReconstructionStage::new(options, &stats);
    stage.diagnostics.extend(
        stream
            .issues()
            .iter()
            .filter(|d| d.page.map_or(true, |p| options.pages.includes(p)))
            .cloned(),
    );

    let cancelled = if options.parallel && pages.len() > 1 {
        run_parallel(stream, &pages, &analyzer, &mut stage, options.queue_depth, cancel)
    } else {
        run_sequential(stream, &pages, &analyzer, &mut stage, cancel)
    };
    if cancelled {
        log::warn!(
            "Reconstruction cancelled after {} page(s)",
            stage.pages_processed
        );
    }

    stage.finish(cancelled)
}

fn run_sequential(
    stream: &TokenStream,
    pages: &[&PageTokens],
    analyzer: &PageAnalyzer<'_>,
    stage: &mut ReconstructionStage<'_>,
    cancel: &CancellationToken,
) -> bool {
    for &page in pages {
        if cancel.is_cancelled() {
            return true;
        }
        stage.push_page(analyzer.analyze(stream, page));
    }
    false
}

fn run_parallel(
    stream: &TokenStream,
    pages: &[&PageTokens],
    analyzer: &PageAnalyzer<'_>,
    stage: &mut ReconstructionStage<'_>,
    queue_depth: usize,
    cancel: &CancellationToken,
) -> bool {
    let window = rayon::current_num_threads().max(1);
    let (page_tx, page_rx) = bounded::<PageLayout<'_>>(queue_depth);

    thread::scope(|scope| {
        let producer = scope.spawn(move || {
            for chunk in pages.chunks(window) {
                if cancel.is_cancelled() {
                    return true;
                }
                let layouts: Vec<PageLayout<'_>> = chunk
                    .par_iter()
                    .map(|&page| analyzer.analyze(stream, page))
                    .collect();
                for layout in layouts {
                    if page_tx.send(layout).is_err() {
                        // consumer is gone
                        return false;
                    }
                }
            }
            false
        });

        for layout in page_rx.iter() {
            stage.push_page(layout);
        }

        producer
            .join()
            .unwrap_or_else(|payload| std::panic::resume_unwind(payload))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::types::test_support::*;
    use crate::layout::ErrorMode;
    use crate::model::{Node, Token};

    fn page(number: u32, tokens: Vec<Token>) -> PageTokens {
        PageTokens::with_tokens(
            number,
            tokens
                .into_iter()
                .map(|mut t| {
                    t.page = number;
                    t
                })
                .collect(),
        )
    }

    fn prose_pages(count: u32) -> TokenStream {
        let pages = (1..=count)
            .map(|n| {
                let mut tokens = phrase(&format!("Page {} opens with text", n), 10.0, 10.0);
                tokens.extend(phrase("and keeps going for a while", 10.0, 24.0));
                page(n, tokens)
            })
            .collect();
        TokenStream::from_pages(pages, ErrorMode::Strict).unwrap()
    }

    #[test]
    fn test_cancelled_before_start() {
        let stream = prose_pages(3);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = run(&stream, &LayoutOptions::default(), &cancel);
        assert!(result.cancelled);
        assert_eq!(result.pages_processed, 0);
        assert!(result.document.is_empty());
    }

    #[test]
    fn test_cancelled_mid_run_keeps_completed_pages() {
        let stream = prose_pages(4);
        let options = LayoutOptions::default();
        let stats = FontStatistics::from_stream(&stream);
        let pages: Vec<&PageTokens> = stream.pages().iter().collect();
        let analyzer = PageAnalyzer::new(&options, &stats);

        for parallel in [false, true] {
            let cancel = CancellationToken::new();
            let mut stage = ReconstructionStage::new(&options, &stats);
            assert!(!run_sequential(&stream, &pages[..1], &analyzer, &mut stage, &cancel));

            cancel.cancel();
            let cancelled = if parallel {
                run_parallel(&stream, &pages[1..], &analyzer, &mut stage, 2, &cancel)
            } else {
                run_sequential(&stream, &pages[1..], &analyzer, &mut stage, &cancel)
            };
            assert!(cancelled);

            let result = stage.finish(cancelled);
            assert!(result.cancelled);
            assert_eq!(result.pages_processed, 1);
            assert_eq!(
                result.document.plain_text(),
                "Page 1 opens with text and keeps going for a while"
            );
            assert_eq!(
                result.document.token_ids().len(),
                stream.pages()[0].tokens.len()
            );
        }
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let stream = prose_pages(6);
        let cancel = CancellationToken::new();
        let parallel = run(&stream, &LayoutOptions::default(), &cancel);
        let sequential = run(&stream, &LayoutOptions::default().sequential(), &cancel);

        assert_eq!(parallel.pages_processed, 6);
        assert!(!parallel.cancelled);
        assert_eq!(parallel.document.plain_text(), sequential.document.plain_text());
        assert_eq!(parallel.document.token_ids(), sequential.document.token_ids());
    }

    #[test]
    fn test_empty_page_diagnostic() {
        let stream = TokenStream::from_pages(
            vec![page(1, phrase("some text", 10.0, 10.0)), PageTokens::new(2)],
            ErrorMode::Strict,
        )
        .unwrap();
        let result = run(&stream, &LayoutOptions::default(), &CancellationToken::new());
        assert_eq!(result.pages_processed, 2);
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].kind, DiagnosticKind::EmptyPage);
        assert_eq!(result.diagnostics[0].page, Some(2));
    }

    #[test]
    fn test_malformed_token_passthrough() {
        let mut tokens = phrase("good text", 10.0, 10.0);
        tokens.push(Token::new("broken", 1, f32::NAN, 10.0, 40.0, 20.0));
        let stream = TokenStream::from_pages(vec![page(1, tokens)], ErrorMode::Lenient).unwrap();
        let result = run(&stream, &LayoutOptions::default(), &CancellationToken::new());

        assert_eq!(result.diagnostics[0].kind, DiagnosticKind::MalformedToken);
        let passthrough = result
            .document
            .nodes()
            .find_map(|n| match n {
                Node::Unclassified(p) => Some(p),
                _ => None,
            })
            .unwrap();
        assert_eq!(passthrough.text, "broken");
        assert_eq!(result.document.token_ids().len(), 3);
    }

    #[test]
    fn test_page_selection() {
        let stream = prose_pages(4);
        let options = LayoutOptions::default().with_pages(crate::render::PageSelection::Range(2..=3));
        let result = run(&stream, &options, &CancellationToken::new());
        assert_eq!(result.pages_processed, 2);
        assert!(result.document.plain_text().contains("Page 2"));
        assert!(!result.document.plain_text().contains("Page 1 "));
    }
}
