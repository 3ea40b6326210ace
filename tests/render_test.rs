//! Integration tests for rendering reconstructed documents.

use relayout::{
    ErrorMode, JsonFormat, PageSelection, PageTokens, Relayout, TableFallback, Token, TokenStream,
};

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

fn table_page(page: u32, header: bool) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut y = 10.0;
    if header {
        tokens.push(word("Name", page, 10.0, y).bold());
        tokens.push(word("Score", page, 150.0, y).bold());
        y += 14.0;
    }
    for (name, score) in [("Alice", "91"), ("Bob", "78"), ("Carol", "85")] {
        tokens.push(word(&format!("{}{}", name, page), page, 10.0, y));
        tokens.push(word(score, page, 150.0, y));
        y += 14.0;
    }
    tokens
}

fn stream(pages: Vec<Vec<Token>>) -> TokenStream {
    let pages = pages
        .into_iter()
        .enumerate()
        .map(|(i, tokens)| PageTokens::with_tokens(i as u32 + 1, tokens))
        .collect();
    TokenStream::from_pages(pages, ErrorMode::Strict).unwrap()
}

#[test]
fn test_markdown_pipe_table() {
    let result = Relayout::new().run(&stream(vec![table_page(1, true)])).unwrap();
    let md = result.to_markdown().unwrap();

    assert!(md.starts_with("| Name | Score |\n| --- | --- |\n"));
    assert!(md.contains("| Alice1 | 91 |"));
    assert!(md.contains("| Carol1 | 85 |"));
}

#[test]
fn test_markdown_continuation_note() {
    let stream = stream(vec![table_page(1, true), table_page(2, true)]);
    let result = Relayout::new().run(&stream).unwrap();
    let md = result.to_markdown().unwrap();

    // header, separator and six body rows
    assert_eq!(md.matches("| Name | Score |").count(), 1);
    assert_eq!(md.matches(" |\n").count(), 8);
    assert!(md.ends_with("<!-- table continues from page 1 to page 2 -->"));
}

#[test]
fn test_page_selection_renders_subset() {
    let mut page1 = phrase("First page prose stays out of the output", 1, 10.0, 10.0);
    page1.extend(phrase("because only the second page is selected", 1, 10.0, 24.0));
    let page2 = phrase("Second page prose is all that remains", 2, 10.0, 10.0);

    let result = Relayout::new()
        .with_pages(PageSelection::Pages(vec![2]))
        .run(&stream(vec![page1, page2]))
        .unwrap();

    assert_eq!(result.to_text().unwrap(), "Second page prose is all that remains");
    assert_eq!(result.reconstruction.pages_processed, 1);
}

#[test]
fn test_html_fallback_only_for_merged_cells() {
    let result = Relayout::new()
        .with_table_fallback(TableFallback::Html)
        .run(&stream(vec![table_page(1, true)]))
        .unwrap();
    let md = result.to_markdown().unwrap();

    assert!(!md.contains("<table>"));
    assert!(md.contains("| Bob1 | 78 |"));
}

#[test]
fn test_json_round_trip_structure() {
    let result = Relayout::new().run(&stream(vec![table_page(1, true)])).unwrap();
    let json = result.to_json(JsonFormat::Compact).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    let node = &value["sections"][0]["nodes"][0];
    assert_eq!(node["type"], "table");
    assert_eq!(node["header_rows"], 1);
    assert_eq!(node["rows"][1]["cells"][0]["text"], "Alice1");
    assert_eq!(value["page_count"], 1);
}

#[test]
fn test_text_rendering_keeps_all_words() {
    let mut tokens = phrase("The heading free paragraph of body text", 1, 10.0, 10.0);
    tokens.extend(phrase("that wraps onto a second line", 1, 10.0, 24.0));
    let result = Relayout::new().run(&stream(vec![tokens])).unwrap();

    assert_eq!(
        result.to_text().unwrap(),
        "The heading free paragraph of body text that wraps onto a second line"
    );
}
