//! Benchmarks for relayout reconstruction and rendering.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use relayout::{
    ErrorMode, LayoutOptions, PageTokens, RenderOptions, Token, TokenStream,
};

fn word(text: &str, page: u32, x: f32, y: f32) -> Token {
    let width = text.chars().count() as f32 * 5.0;
    Token::new(text, page, x, y, x + width, y + 10.0).with_font_size(10.0)
}

/// Build a page with two prose paragraphs followed by a four column table.
fn create_page(page: u32) -> PageTokens {
    let mut tokens = Vec::new();
    let mut y = 20.0;

    for paragraph in 0..2 {
        for line in 0..6 {
            let mut x = 40.0;
            for w in 0..10 {
                let text = format!("word{}{}{}", paragraph, line, w);
                let token = word(&text, page, x, y);
                x = token.x1 + 3.0;
                tokens.push(token);
            }
            y += 14.0;
        }
        y += 14.0;
    }

    for c in 0..4 {
        tokens.push(word(&format!("Head{}", c), page, 40.0 + c as f32 * 110.0, y).bold());
    }
    y += 14.0;
    for r in 0..20 {
        for c in 0..4 {
            let text = format!("r{}c{}", r, c);
            tokens.push(word(&text, page, 40.0 + c as f32 * 110.0, y));
        }
        y += 14.0;
    }

    PageTokens::with_tokens(page, tokens)
}

fn create_stream(page_count: u32) -> TokenStream {
    let pages = (1..=page_count).map(create_page).collect();
    TokenStream::from_pages(pages, ErrorMode::Strict).expect("valid synthetic stream")
}

/// Benchmark reconstruction with and without page-level parallelism.
fn bench_reconstruction(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconstruction");

    for page_count in [1, 10, 50].iter() {
        let stream = create_stream(*page_count);

        group.bench_function(format!("{}_pages_parallel", page_count), |b| {
            let options = LayoutOptions::new();
            b.iter(|| relayout::reconstruct(black_box(&stream), &options));
        });

        group.bench_function(format!("{}_pages_sequential", page_count), |b| {
            let options = LayoutOptions::new().sequential();
            b.iter(|| relayout::reconstruct(black_box(&stream), &options));
        });
    }

    group.finish();
}

/// Benchmark Markdown and JSON rendering of an already reconstructed document.
fn bench_rendering(c: &mut Criterion) {
    let stream = create_stream(10);
    let result = relayout::reconstruct(&stream, &LayoutOptions::new());
    let options = RenderOptions::new();

    c.bench_function("render_markdown", |b| {
        b.iter(|| relayout::render::to_markdown(black_box(&result.document), &options));
    });

    c.bench_function("render_json", |b| {
        b.iter(|| {
            relayout::render::to_json(black_box(&result.document), relayout::JsonFormat::Compact)
        });
    });
}

criterion_group!(benches, bench_reconstruction, bench_rendering);
criterion_main!(benches);
