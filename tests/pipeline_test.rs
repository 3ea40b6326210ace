//! Integration tests for the reconstruction pipeline.

use relayout::layout::{
    BlockClassifier, BlockKind, FontStatistics, PageAnalyzer, TableReconstructor, Verdict,
};
use relayout::model::{InlineContent, MarkerKey};
use relayout::{
    reconstruct, DiagnosticKind, Document, ErrorMode, LayoutOptions, LogicalTable, Node,
    PageTokens, Reconstruction, RenderOptions, Token, TokenId, TokenStream,
};

/// A 10pt word, 5pt per character.
fn word(text: &str, page: u32, x: f32, y: f32) -> Token {
    let width = text.chars().count() as f32 * 5.0;
    Token::new(text, page, x, y, x + width, y + 10.0).with_font_size(10.0)
}

fn phrase(text: &str, page: u32, x: f32, y: f32) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut cursor = x;
    for w in text.split_whitespace() {
        let token = word(w, page, cursor, y);
        cursor = token.x1 + 3.0;
        tokens.push(token);
    }
    tokens
}

fn small(text: &str, page: u32, x: f32, y: f32) -> Vec<Token> {
    phrase(text, page, x, y)
        .into_iter()
        .map(|t| {
            let (x0, x1) = (t.x0, t.x0 + (t.x1 - t.x0) * 0.8);
            Token::new(t.text, page, x0, y, x1, y + 8.0).with_font_size(8.0)
        })
        .collect()
}

/// `k` aligned columns, 90pt apart, optionally under a bold header row.
fn grid(page: u32, k: usize, rows: usize, y: f32, header: bool) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut y = y;
    if header {
        for c in 0..k {
            tokens.push(word(&format!("H{}", c + 1), page, 10.0 + c as f32 * 90.0, y).bold());
        }
        y += 14.0;
    }
    for r in 0..rows {
        for c in 0..k {
            let text = format!("p{}r{}c{}", page, r + 1, c + 1);
            tokens.push(word(&text, page, 10.0 + c as f32 * 90.0, y));
        }
        y += 14.0;
    }
    tokens
}

fn stream(pages: Vec<Vec<Token>>, mode: ErrorMode) -> TokenStream {
    let pages = pages
        .into_iter()
        .enumerate()
        .map(|(i, tokens)| PageTokens::with_tokens(i as u32 + 1, tokens))
        .collect();
    TokenStream::from_pages(pages, mode).unwrap()
}

fn run(stream: &TokenStream) -> Reconstruction {
    reconstruct(stream, &LayoutOptions::default())
}

fn tables(doc: &Document) -> Vec<&LogicalTable> {
    doc.tables().collect()
}

fn count(result: &Reconstruction, kind: DiagnosticKind) -> usize {
    result.diagnostics.iter().filter(|d| d.kind == kind).count()
}

// ==================== Losslessness ====================

fn mixed_document() -> TokenStream {
    let mut page1 = vec![Token::new("Introduction", 1, 10.0, 20.0, 90.0, 36.0)
        .with_font_size(16.0)
        .bold()];
    page1.extend(phrase("Measured values appear in the table below and the", 1, 10.0, 60.0));
    page1.extend(phrase("main result¹ is discussed after it in more detail", 1, 10.0, 74.0));
    page1.extend(phrase("Table 1: Scores by group", 1, 10.0, 110.0));
    page1.extend(grid(1, 3, 3, 128.0, true));
    page1.extend(small("¹ Scores are rounded to whole numbers", 1, 10.0, 700.0));

    let mut page2 = grid(2, 3, 2, 40.0, true);
    page2.extend(phrase("Closing remarks end the report here today", 2, 10.0, 200.0));
    page2.push(Token::new("garbled", 2, f32::NAN, 300.0, 60.0, 310.0));

    stream(vec![page1, page2], ErrorMode::Lenient)
}

fn assert_every_token_traced(stream: &TokenStream, result: &Reconstruction) {
    let mut expected: Vec<TokenId> = stream
        .pages()
        .iter()
        .flat_map(|p| (0..p.tokens.len()).map(move |i| p.token_id(i)))
        .collect();
    expected.sort();

    let mut found = result.document.token_ids();
    found.sort();
    assert_eq!(found, expected);
}

#[test]
fn test_every_token_reaches_exactly_one_node() {
    let stream = mixed_document();
    assert_every_token_traced(&stream, &run(&stream));
}

#[test]
fn test_whitespace_tokens_are_traced() {
    let mut page1 = phrase("alpha beta", 1, 10.0, 10.0);
    page1.push(word(" ", 1, 10.0, 24.0));
    page1.extend(phrase("gamma", 1, 10.0, 38.0));
    let page2 = vec![word(" ", 2, 10.0, 10.0), word("\t", 2, 20.0, 10.0)];
    let stream = stream(vec![page1, page2], ErrorMode::Strict);

    let result = run(&stream);
    assert_every_token_traced(&stream, &result);
    assert_eq!(result.document.token_ids().len(), 6);
    assert!(result.document.plain_text().contains("gamma"));
}

#[test]
fn test_far_off_page_token_passes_through() {
    let mut tokens = phrase("two words", 1, 10.0, 10.0);
    tokens.push(Token::new("far", 1, 1.0e13, 30.0, 1.0e13 + 15.0, 40.0));
    let stream = stream(vec![tokens], ErrorMode::Lenient);

    let result = run(&stream);
    assert_every_token_traced(&stream, &result);
    assert_eq!(count(&result, DiagnosticKind::MalformedToken), 1);
    assert_eq!(result.document.plain_text(), "two words\n\nfar");
}

#[test]
fn test_token_text_multiset_preserved() {
    let stream = mixed_document();
    let result = run(&stream);

    let mut input: Vec<String> = stream
        .pages()
        .iter()
        .flat_map(|p| p.tokens.iter().map(|t| t.text.clone()))
        .collect();
    input.sort();

    let mut output: Vec<String> = result
        .document
        .token_ids()
        .into_iter()
        .filter_map(|id| stream.token(id).map(|t| t.text.clone()))
        .collect();
    output.sort();

    assert_eq!(output, input);
    assert_eq!(count(&result, DiagnosticKind::MalformedToken), 1);
}

#[test]
fn test_parallel_matches_sequential() {
    let stream = mixed_document();
    let parallel = run(&stream);
    let sequential = reconstruct(&stream, &LayoutOptions::default().sequential());

    assert_eq!(parallel.document.token_ids(), sequential.document.token_ids());
    assert_eq!(parallel.document.plain_text(), sequential.document.plain_text());
    assert_eq!(parallel.diagnostics, sequential.diagnostics);
}

// ==================== Demotion ====================

/// Two lines share a gutter, then the run continues with left-only text.
fn demotion_tokens() -> Vec<Token> {
    let mut tokens = phrase("Alpha beta", 1, 10.0, 10.0);
    tokens.push(word("Gamma", 1, 200.0, 10.0));
    tokens.extend(phrase("Delta eps", 1, 10.0, 24.0));
    tokens.push(word("Zeta", 1, 200.0, 24.0));
    tokens.extend(phrase("one two", 1, 10.0, 38.0));
    tokens.extend(phrase("three six", 1, 10.0, 52.0));
    tokens.extend(phrase("five", 1, 10.0, 66.0));
    tokens.extend(phrase("seven", 1, 10.0, 80.0));
    tokens
}

#[test]
fn test_failed_table_is_demoted_losslessly() {
    let stream = stream(vec![demotion_tokens()], ErrorMode::Strict);
    let result = run(&stream);

    assert!(tables(&result.document).is_empty());
    assert_eq!(count(&result, DiagnosticKind::ColumnInferenceFailure), 1);
    assert!(result.document.paragraphs().any(|p| p.demoted));
    assert_eq!(result.document.token_ids().len(), stream.token_count());
}

#[test]
fn test_demotion_is_idempotent() {
    let stream = stream(vec![demotion_tokens()], ErrorMode::Strict);
    let options = LayoutOptions::default();
    let stats = FontStatistics::from_stream(&stream);

    let layout = PageAnalyzer::new(&options, &stats).analyze(&stream, &stream.pages()[0]);
    let candidate = layout
        .blocks
        .into_iter()
        .find(|b| b.kind == BlockKind::TableCandidate)
        .expect("table candidate");

    let block = match TableReconstructor::new(&options).reconstruct(candidate, &[]) {
        Verdict::Demoted { block, .. } => block,
        Verdict::Table(_) => panic!("expected demotion"),
    };

    let classifier = BlockClassifier::new(&options, &stats);
    let once = classifier.reclassify(block);
    assert!(!once.is_empty());
    for block in once {
        assert_ne!(block.kind, BlockKind::TableCandidate);
        assert!(block.demoted);
        let twice = classifier.reclassify(block);
        assert!(twice.iter().all(|b| b.kind != BlockKind::TableCandidate));
    }
}

// ==================== Column count stability ====================

#[test]
fn test_column_count_stability() {
    for k in [2, 3, 4, 6] {
        let stream = stream(vec![grid(1, k, 5, 10.0, true)], ErrorMode::Strict);
        let result = run(&stream);
        let tables = tables(&result.document);
        assert_eq!(tables.len(), 1, "k = {}", k);
        assert_eq!(tables[0].columns.len(), k, "k = {}", k);
        assert_eq!(tables[0].body().len(), 5, "k = {}", k);
    }
}

// ==================== Cross-page tables ====================

#[test]
fn test_cross_page_header_dedup() {
    let stream = stream(
        vec![grid(1, 3, 3, 10.0, true), grid(2, 3, 2, 10.0, true)],
        ErrorMode::Strict,
    );
    let result = run(&stream);

    let tables = tables(&result.document);
    assert_eq!(tables.len(), 1);
    let table = tables[0];
    assert_eq!(table.header_rows, 1);
    assert_eq!(table.body().len(), 5);
    assert_eq!(table.continued_from_page, Some(1));
    assert_eq!((table.span.start, table.span.end), (1, 2));
    assert_eq!(table.repeated_headers.len(), 1);
    assert_eq!(table.body()[3].cells[0].text, "p2r1c1");
    assert_eq!(count(&result, DiagnosticKind::CrossPageContinuationMismatch), 0);
}

#[test]
fn test_continuation_without_repeated_header() {
    let stream = stream(
        vec![grid(1, 3, 3, 10.0, true), grid(2, 3, 2, 10.0, false)],
        ErrorMode::Strict,
    );
    let result = run(&stream);

    let tables = tables(&result.document);
    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0].body().len(), 5);
    assert!(tables[0].repeated_headers.is_empty());
}

#[test]
fn test_mismatched_continuation_stays_separate() {
    let stream = stream(
        vec![grid(1, 3, 3, 10.0, true), grid(2, 2, 3, 10.0, false)],
        ErrorMode::Strict,
    );
    let result = run(&stream);

    let tables = tables(&result.document);
    assert_eq!(tables.len(), 2);
    assert_eq!(tables[0].column_count(), 3);
    assert_eq!(tables[1].column_count(), 2);
    assert_eq!(tables[0].continued_from_page, None);
    assert_eq!(count(&result, DiagnosticKind::CrossPageContinuationMismatch), 1);
}

// ==================== Footnotes ====================

fn footnote_stream() -> TokenStream {
    let mut tokens = phrase("The main result¹ holds here.", 1, 10.0, 100.0);
    tokens.extend(phrase("Another claim² stands alone.", 1, 10.0, 114.0));
    tokens.extend(small("¹ See appendix.", 1, 10.0, 700.0));
    stream(vec![tokens], ErrorMode::Strict)
}

#[test]
fn test_footnote_round_trip() {
    let result = run(&footnote_stream());
    let doc = &result.document;

    let footnotes: Vec<_> = doc.all_footnotes().collect();
    assert_eq!(footnotes.len(), 1);
    assert_eq!(footnotes[0].key, MarkerKey::numeral("1"));
    assert!(footnotes[0].is_resolved());
    assert_eq!(footnotes[0].cited_by.len(), 1);

    let resolved: Vec<_> = doc
        .paragraphs()
        .flat_map(|p| p.references())
        .filter(|r| r.resolved)
        .collect();
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].token, footnotes[0].cited_by[0]);
}

#[test]
fn test_unmatched_marker_kept_verbatim() {
    let result = run(&footnote_stream());

    assert_eq!(count(&result, DiagnosticKind::UnmatchedFootnoteMarker), 1);
    assert_eq!(count(&result, DiagnosticKind::UnmatchedFootnoteBody), 0);

    let unresolved = result
        .document
        .paragraphs()
        .flat_map(|p| p.content.iter())
        .find_map(|c| match c {
            InlineContent::FootnoteRef { text, reference } if !reference.resolved => {
                Some(text.clone())
            }
            _ => None,
        });
    assert_eq!(unresolved.as_deref(), Some("²"));
    assert!(result.document.plain_text().contains("claim²"));
}

#[test]
fn test_footnote_markdown() {
    let result = run(&footnote_stream());
    let md = relayout::render::to_markdown(&result.document, &RenderOptions::default()).unwrap();

    assert!(md.contains("result[^1]"));
    assert!(md.contains("[^1]: See appendix."));
    assert!(md.contains("claim²"));
}

// ==================== Wrapped cells ====================

#[test]
fn test_wrapped_cell_inside_table() {
    let mut tokens = vec![
        word("Col", 1, 10.0, 10.0).bold(),
        word("A", 1, 28.0, 10.0).bold(),
        word("Col", 1, 200.0, 10.0).bold(),
        word("B", 1, 218.0, 10.0).bold(),
    ];
    tokens.extend(phrase("long text that", 1, 10.0, 24.0));
    tokens.extend(phrase("wraps here", 1, 10.0, 38.0));
    tokens.extend(phrase("Col B value", 1, 200.0, 38.0));
    tokens.extend(phrase("Gamma delta epsilon", 1, 10.0, 52.0));
    tokens.push(word("Zeta", 1, 200.0, 52.0));
    tokens.extend(phrase("Eta theta iota", 1, 10.0, 66.0));
    tokens.push(word("Kappa", 1, 200.0, 66.0));

    let result = run(&stream(vec![tokens], ErrorMode::Strict));
    let tables = tables(&result.document);
    assert_eq!(tables.len(), 1);

    let table = tables[0];
    assert_eq!(table.column_count(), 2);
    assert_eq!(table.header_rows, 1);
    assert_eq!(table.rows[0].cells[0].text, "Col A");
    assert_eq!(table.body().len(), 3);

    let row = &table.body()[0];
    assert_eq!(row.cells[0].text, "long text that wraps here");
    assert_eq!(row.cells[1].text, "Col B value");
    assert_eq!(row.cells[0].row_span, 1);
    assert_eq!(table.body()[1].cells[1].text, "Zeta");
}

// ==================== Degenerate input ====================

#[test]
fn test_empty_pages_are_reported() {
    let stream = TokenStream::from_pages(
        vec![PageTokens::new(1), PageTokens::new(2)],
        ErrorMode::Strict,
    )
    .unwrap();
    let result = run(&stream);

    assert!(result.document.is_empty());
    assert_eq!(result.pages_processed, 2);
    assert_eq!(count(&result, DiagnosticKind::EmptyPage), 2);
}

#[test]
fn test_caption_attaches_to_table() {
    let mut tokens = phrase("Table 2: Measurements", 1, 10.0, 10.0);
    tokens.extend(grid(1, 3, 3, 30.0, true));
    let result = run(&stream(vec![tokens], ErrorMode::Strict));

    let tables = tables(&result.document);
    assert_eq!(tables.len(), 1);
    let caption = tables[0].caption.as_ref().expect("caption");
    assert_eq!(caption.plain_text(), "Table 2: Measurements");
    assert!(!result
        .document
        .nodes()
        .any(|n| matches!(n, Node::Caption(_))));
}
