//! Positioned text tokens and the page-grouped token stream.
//!
//! Tokens are produced by an external extraction layer and never mutated
//! here. Coordinates use a top-left origin: `y0` is the top edge, `y1` the
//! bottom edge, and `y` grows down the page.

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::layout::ErrorMode;

use super::{Diagnostic, DiagnosticKind};

/// Largest absolute coordinate accepted on a token, in points.
///
/// PDF pages are at most 14 400 units on a side.
pub const MAX_COORDINATE: f32 = 100_000.0;

/// Largest run of missing pages filled in lenient mode.
pub const MAX_PAGE_GAP: u32 = 10_000;

/// Stable identity of a token: page number plus index within that page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TokenId {
    /// Page number (1-indexed)
    pub page: u32,
    /// Index within the page's token list
    pub index: u32,
}

impl TokenId {
    /// Create a new token id.
    pub fn new(page: u32, index: u32) -> Self {
        Self { page, index }
    }
}

/// The smallest positioned text unit from extraction (usually a word).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    /// The text content
    pub text: String,
    /// Page number (1-indexed)
    pub page: u32,
    /// Left edge
    pub x0: f32,
    /// Top edge
    pub y0: f32,
    /// Right edge
    pub x1: f32,
    /// Bottom edge
    pub y1: f32,
    /// Font size in points
    pub font_size: f32,
    /// Whether the font appears to be bold
    #[serde(default)]
    pub is_bold: bool,
}

impl Token {
    /// Create a token from its text and bounding box.
    pub fn new(text: impl Into<String>, page: u32, x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        let font_size = (y1 - y0).abs();
        Self {
            text: text.into(),
            page,
            x0,
            y0,
            x1,
            y1,
            font_size,
            is_bold: false,
        }
    }

    /// Set the font size and return self.
    pub fn with_font_size(mut self, font_size: f32) -> Self {
        self.font_size = font_size;
        self
    }

    /// Mark the token bold and return self.
    pub fn bold(mut self) -> Self {
        self.is_bold = true;
        self
    }

    /// Width of the bounding box.
    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    /// Height of the bounding box.
    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    /// Horizontal center.
    pub fn center_x(&self) -> f32 {
        (self.x0 + self.x1) / 2.0
    }

    /// Vertical center.
    pub fn center_y(&self) -> f32 {
        (self.y0 + self.y1) / 2.0
    }

    /// Baseline approximation (bottom edge).
    pub fn baseline(&self) -> f32 {
        self.y1
    }

    /// Whether every coordinate and the font size are finite numbers.
    pub fn is_finite(&self) -> bool {
        [self.x0, self.y0, self.x1, self.y1, self.font_size]
            .iter()
            .all(|v| v.is_finite())
    }

    /// Whether every coordinate lies within [`MAX_COORDINATE`] of the origin.
    pub fn is_in_range(&self) -> bool {
        [self.x0, self.y0, self.x1, self.y1, self.font_size]
            .iter()
            .all(|v| v.abs() <= MAX_COORDINATE)
    }

    fn is_inverted(&self) -> bool {
        self.x1 < self.x0 || self.y1 < self.y0
    }

    fn normalize_box(&mut self) {
        if self.x1 < self.x0 {
            std::mem::swap(&mut self.x0, &mut self.x1);
        }
        if self.y1 < self.y0 {
            std::mem::swap(&mut self.y0, &mut self.y1);
        }
        if self.font_size <= 0.0 {
            self.font_size = self.height().max(1.0);
        }
    }
}

/// A horizontal rule segment drawn on a page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Left end
    pub x0: f32,
    /// Right end
    pub x1: f32,
    /// Vertical position
    pub y: f32,
}

impl Rule {
    /// Create a new rule.
    pub fn new(x0: f32, x1: f32, y: f32) -> Self {
        Self {
            x0: x0.min(x1),
            x1: x0.max(x1),
            y,
        }
    }

    /// Whether the rule covers the horizontal range `[x0, x1]` by at least `ratio`.
    pub fn covers(&self, x0: f32, x1: f32, ratio: f32) -> bool {
        let width = x1 - x0;
        if width <= 0.0 {
            return false;
        }
        let overlap = (self.x1.min(x1) - self.x0.max(x0)).max(0.0);
        overlap / width >= ratio
    }
}

/// All tokens (and optional rules) of one page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageTokens {
    /// Page number (1-indexed)
    pub number: u32,
    /// Tokens in extraction order
    #[serde(default)]
    pub tokens: Vec<Token>,
    /// Horizontal rules on the page
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl PageTokens {
    /// Create an empty page.
    pub fn new(number: u32) -> Self {
        Self {
            number,
            tokens: Vec::new(),
            rules: Vec::new(),
        }
    }

    /// Create a page from tokens.
    pub fn with_tokens(number: u32, tokens: Vec<Token>) -> Self {
        Self {
            number,
            tokens,
            rules: Vec::new(),
        }
    }

    /// Add a rule and return self.
    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Check if the page has no tokens.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Id of the token at `index`.
    pub fn token_id(&self, index: usize) -> TokenId {
        TokenId::new(self.number, index as u32)
    }
}

/// JSON shapes accepted for a token stream.
#[derive(Deserialize)]
#[serde(untagged)]
enum StreamInput {
    Pages { pages: Vec<PageTokens> },
    PageList(Vec<PageTokens>),
    Flat(Vec<Token>),
}

/// Validated, page-ordered token input.
#[derive(Debug, Clone, Default)]
pub struct TokenStream {
    pages: Vec<PageTokens>,
    malformed: HashSet<TokenId>,
    issues: Vec<Diagnostic>,
}

impl TokenStream {
    /// Build a stream from a flat token list grouped by `page`.
    pub fn from_tokens(tokens: Vec<Token>, mode: ErrorMode) -> Result<Self> {
        let mut pages: Vec<PageTokens> = Vec::new();
        for token in tokens {
            match pages.last_mut() {
                Some(page) if page.number == token.page => page.tokens.push(token),
                Some(page) if token.page < page.number => {
                    return Err(Error::InvalidInput(format!(
                        "token on page {} follows page {}",
                        token.page, page.number
                    )));
                }
                _ => {
                    let mut page = PageTokens::new(token.page);
                    page.tokens.push(token);
                    pages.push(page);
                }
            }
        }
        Self::from_pages(pages, mode)
    }

    /// Build a stream from explicit pages.
    pub fn from_pages(pages: Vec<PageTokens>, mode: ErrorMode) -> Result<Self> {
        let mut stream = TokenStream::default();
        let mut previous: Option<u32> = None;

        for mut page in pages {
            if page.number == 0 {
                return Err(Error::InvalidInput("page numbers are 1-indexed".to_string()));
            }
            if let Some(prev) = previous {
                if page.number <= prev {
                    return Err(Error::InvalidInput(format!(
                        "page {} appears after page {}",
                        page.number, prev
                    )));
                }
                let next = prev + 1;
                if page.number > next {
                    let gap = page.number - next;
                    if gap > MAX_PAGE_GAP {
                        return Err(Error::InvalidInput(format!(
                            "page sequence jumps from {} to {}, more than {} missing pages",
                            prev,
                            page.number,
                            MAX_PAGE_GAP
                        )));
                    }
                    if mode == ErrorMode::Strict {
                        return Err(Error::InvalidInput(format!(
                            "page sequence jumps from {} to {}",
                            prev,
                            page.number
                        )));
                    }
                    for missing in next..page.number {
                        log::warn!("Filling missing page {} as empty", missing);
                        stream.pages.push(PageTokens::new(missing));
                    }
                }
            }

            for (index, token) in page.tokens.iter_mut().enumerate() {
                let id = TokenId::new(page.number, index as u32);
                if token.page != page.number {
                    if mode == ErrorMode::Strict {
                        return Err(Error::InvalidInput(format!(
                            "token {:?} claims page {} inside page {}",
                            token.text, token.page, page.number
                        )));
                    }
                    token.page = page.number;
                }
                let problem = if !token.is_finite() {
                    Some("non-finite geometry")
                } else if !token.is_in_range() {
                    Some("coordinates outside the page space")
                } else {
                    None
                };
                if let Some(problem) = problem {
                    if mode == ErrorMode::Strict {
                        return Err(Error::InvalidInput(format!(
                            "token {:?} on page {} has {}",
                            token.text, page.number, problem
                        )));
                    }
                    stream.malformed.insert(id);
                    stream.issues.push(Diagnostic::new(
                        DiagnosticKind::MalformedToken,
                        Some(page.number),
                        format!("token {:?} has {}", token.text, problem),
                    ));
                    continue;
                }
                if token.is_inverted() || token.font_size <= 0.0 {
                    if mode == ErrorMode::Strict {
                        return Err(Error::InvalidInput(format!(
                            "token {:?} on page {} has an inverted bounding box",
                            token.text, page.number
                        )));
                    }
                    token.normalize_box();
                }
            }

            previous = Some(page.number);
            stream.pages.push(page);
        }

        Ok(stream)
    }

    /// Parse a stream from JSON text.
    ///
    /// Accepts `{"pages": [...]}`, a bare page array, or a flat token array.
    pub fn from_json_str(json: &str, mode: ErrorMode) -> Result<Self> {
        match serde_json::from_str::<StreamInput>(json)? {
            StreamInput::Pages { pages } | StreamInput::PageList(pages) => {
                Self::from_pages(pages, mode)
            }
            StreamInput::Flat(tokens) => Self::from_tokens(tokens, mode),
        }
    }

    /// Parse a stream from a JSON reader.
    pub fn from_json_reader<R: Read>(mut reader: R, mode: ErrorMode) -> Result<Self> {
        let mut json = String::new();
        reader.read_to_string(&mut json)?;
        Self::from_json_str(&json, mode)
    }

    /// Pages in order.
    pub fn pages(&self) -> &[PageTokens] {
        &self.pages
    }

    /// Number of pages.
    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Total number of tokens.
    pub fn token_count(&self) -> usize {
        self.pages.iter().map(|p| p.tokens.len()).sum()
    }

    /// Look up a token by id.
    pub fn token(&self, id: TokenId) -> Option<&Token> {
        self.page(id.page)
            .and_then(|p| p.tokens.get(id.index as usize))
    }

    /// Get a page by number.
    pub fn page(&self, number: u32) -> Option<&PageTokens> {
        let first = self.pages.first()?.number;
        if number < first {
            return None;
        }
        self.pages.get((number - first) as usize)
    }

    /// Check if the stream has no pages.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Whether a token was rejected as malformed during validation.
    pub fn is_malformed(&self, id: TokenId) -> bool {
        self.malformed.contains(&id)
    }

    pub(crate) fn issues(&self) -> &[Diagnostic] {
        &self.issues
    }
}

/// Load a token stream from a JSON file.
pub fn load_tokens_file<P: AsRef<Path>>(path: P, mode: ErrorMode) -> Result<TokenStream> {
    let file = std::fs::File::open(path)?;
    TokenStream::from_json_reader(std::io::BufReader::new(file), mode)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(text: &str, page: u32, x: f32, y: f32) -> Token {
        Token::new(text, page, x, y, x + 20.0, y + 10.0)
    }

    #[test]
    fn test_from_tokens_groups_pages() {
        let stream = TokenStream::from_tokens(
            vec![word("a", 1, 0.0, 0.0), word("b", 1, 30.0, 0.0), word("c", 2, 0.0, 0.0)],
            ErrorMode::Strict,
        )
        .unwrap();
        assert_eq!(stream.page_count(), 2);
        assert_eq!(stream.token_count(), 3);
        assert_eq!(stream.token(TokenId::new(2, 0)).unwrap().text, "c");
    }

    #[test]
    fn test_decreasing_pages_rejected() {
        let result = TokenStream::from_tokens(
            vec![word("a", 2, 0.0, 0.0), word("b", 1, 0.0, 0.0)],
            ErrorMode::Lenient,
        );
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_page_gap_strict_vs_lenient() {
        let tokens = vec![word("a", 1, 0.0, 0.0), word("b", 3, 0.0, 0.0)];
        assert!(TokenStream::from_tokens(tokens.clone(), ErrorMode::Strict).is_err());

        let stream = TokenStream::from_tokens(tokens, ErrorMode::Lenient).unwrap();
        assert_eq!(stream.page_count(), 3);
        assert!(stream.page(2).unwrap().is_empty());
    }

    #[test]
    fn test_non_finite_token_lenient() {
        let mut bad = word("nan", 1, 0.0, 0.0);
        bad.x0 = f32::NAN;
        let stream =
            TokenStream::from_pages(vec![PageTokens::with_tokens(1, vec![bad])], ErrorMode::Lenient)
                .unwrap();
        assert!(stream.is_malformed(TokenId::new(1, 0)));
        assert_eq!(stream.issues().len(), 1);
        assert_eq!(stream.issues()[0].kind, DiagnosticKind::MalformedToken);
    }

    #[test]
    fn test_far_off_page_token() {
        let far = Token::new("far", 1, 1.0e13, 30.0, 1.0e13 + 15.0, 40.0);
        let tokens = vec![word("a", 1, 0.0, 0.0), far];
        assert!(matches!(
            TokenStream::from_tokens(tokens.clone(), ErrorMode::Strict),
            Err(Error::InvalidInput(_))
        ));

        let stream = TokenStream::from_tokens(tokens, ErrorMode::Lenient).unwrap();
        assert!(stream.is_malformed(TokenId::new(1, 1)));
        assert!(!stream.is_malformed(TokenId::new(1, 0)));
        assert_eq!(stream.issues()[0].kind, DiagnosticKind::MalformedToken);
    }

    #[test]
    fn test_huge_page_gap_rejected() {
        let tokens = vec![word("a", 1, 0.0, 0.0), word("b", 4_000_000_000, 0.0, 0.0)];
        for mode in [ErrorMode::Strict, ErrorMode::Lenient] {
            assert!(matches!(
                TokenStream::from_tokens(tokens.clone(), mode),
                Err(Error::InvalidInput(_))
            ));
        }
    }

    #[test]
    fn test_last_page_number() {
        let tokens = vec![word("a", u32::MAX - 1, 0.0, 0.0), word("b", u32::MAX, 0.0, 0.0)];
        let stream = TokenStream::from_tokens(tokens, ErrorMode::Strict).unwrap();
        assert_eq!(stream.page_count(), 2);
        assert_eq!(stream.token(TokenId::new(u32::MAX, 0)).unwrap().text, "b");
    }

    #[test]
    fn test_inverted_box_normalized() {
        let inverted = Token::new("x", 1, 50.0, 20.0, 10.0, 10.0).with_font_size(10.0);
        let stream = TokenStream::from_pages(
            vec![PageTokens::with_tokens(1, vec![inverted])],
            ErrorMode::Lenient,
        )
        .unwrap();
        let token = stream.token(TokenId::new(1, 0)).unwrap();
        assert!(token.x0 < token.x1);
        assert!(token.y0 < token.y1);
    }

    #[test]
    fn test_json_shapes() {
        let flat = r#"[{"text":"a","page":1,"x0":0,"y0":0,"x1":5,"y1":10,"font_size":10}]"#;
        let stream = TokenStream::from_json_str(flat, ErrorMode::Strict).unwrap();
        assert_eq!(stream.token_count(), 1);

        let paged = r#"{"pages":[{"number":1,"tokens":[],"rules":[{"x0":0,"x1":100,"y":50}]}]}"#;
        let stream = TokenStream::from_json_str(paged, ErrorMode::Strict).unwrap();
        assert_eq!(stream.page_count(), 1);
        assert_eq!(stream.pages()[0].rules.len(), 1);
    }

    #[test]
    fn test_rule_covers() {
        let rule = Rule::new(100.0, 0.0, 10.0);
        assert!(rule.covers(10.0, 50.0, 0.9));
        assert!(!rule.covers(90.0, 150.0, 0.5));
    }
}
