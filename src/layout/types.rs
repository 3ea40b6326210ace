//! Derived layout views: lines, columns and blocks.
//!
//! These borrow the tokens of a [`TokenStream`](crate::model::TokenStream)
//! and are never mutated after they are built.

use std::cmp::Ordering;

use crate::model::{PageRange, Token, TokenId};

/// A borrowed token together with its stable id.
#[derive(Debug, Clone, Copy)]
pub struct TokenRef<'a> {
    /// Token identity
    pub id: TokenId,
    /// The token itself
    pub token: &'a Token,
}

impl<'a> TokenRef<'a> {
    /// Create a new token reference.
    pub fn new(id: TokenId, token: &'a Token) -> Self {
        Self { id, token }
    }

    /// The token text.
    pub fn text(&self) -> &'a str {
        &self.token.text
    }
}

/// A horizontal whitespace run inside a line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gap {
    /// Left edge (end of the token before)
    pub x0: f32,
    /// Right edge (start of the token after)
    pub x1: f32,
}

impl Gap {
    /// Width of the gap.
    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    /// Overlap of two gaps, if any.
    pub fn intersect(&self, other: &Gap) -> Option<Gap> {
        let x0 = self.x0.max(other.x0);
        let x1 = self.x1.min(other.x1);
        (x1 > x0).then_some(Gap { x0, x1 })
    }
}

/// Tokens sharing a baseline band within one column of one page.
#[derive(Debug, Clone)]
pub struct Line<'a> {
    /// Tokens sorted left to right
    pub tokens: Vec<TokenRef<'a>>,
    /// Page number
    pub page: u32,
    /// Layout column index on the page
    pub column: usize,
    /// Left edge
    pub x0: f32,
    /// Right edge
    pub x1: f32,
    /// Top edge
    pub y0: f32,
    /// Bottom edge
    pub y1: f32,
    /// Dominant font size (weighted by text length)
    pub font_size: f32,
    /// Whitespace between this line and the line above in the column
    pub gap_above: Option<f32>,
}

impl<'a> Line<'a> {
    /// Build a line from its tokens.
    pub fn from_tokens(mut tokens: Vec<TokenRef<'a>>, page: u32, column: usize) -> Self {
        tokens.sort_by(|a, b| cmp_f32(a.token.x0, b.token.x0));

        let x0 = tokens.iter().map(|t| t.token.x0).fold(f32::INFINITY, f32::min);
        let x1 = tokens.iter().map(|t| t.token.x1).fold(f32::NEG_INFINITY, f32::max);
        let y0 = tokens.iter().map(|t| t.token.y0).fold(f32::INFINITY, f32::min);
        let y1 = tokens.iter().map(|t| t.token.y1).fold(f32::NEG_INFINITY, f32::max);

        let total_chars: usize = tokens.iter().map(|t| t.token.text.chars().count()).sum();
        let weighted: f32 = tokens
            .iter()
            .map(|t| t.token.font_size * t.token.text.chars().count() as f32)
            .sum();
        let font_size = if total_chars > 0 {
            weighted / total_chars as f32
        } else {
            tokens.first().map(|t| t.token.font_size).unwrap_or(0.0)
        };

        Self {
            tokens,
            page,
            column,
            x0: if x0.is_finite() { x0 } else { 0.0 },
            x1: if x1.is_finite() { x1 } else { 0.0 },
            y0: if y0.is_finite() { y0 } else { 0.0 },
            y1: if y1.is_finite() { y1 } else { 0.0 },
            font_size,
            gap_above: None,
        }
    }

    /// Baseline of the line (largest token bottom).
    pub fn baseline(&self) -> f32 {
        self.y1
    }

    /// Get the combined text of all tokens with appropriate spacing.
    ///
    /// A space goes between two tokens only when there is a visible gap
    /// between them; two CJK characters are never separated.
    pub fn text(&self) -> String {
        join_tokens(&self.tokens)
    }

    /// Ids of the tokens in this line.
    pub fn ids(&self) -> Vec<TokenId> {
        self.tokens.iter().map(|t| t.id).collect()
    }

    /// Check if the line is predominantly bold.
    pub fn is_bold(&self) -> bool {
        let bold_chars: usize = self
            .tokens
            .iter()
            .filter(|t| t.token.is_bold)
            .map(|t| t.token.text.chars().count())
            .sum();
        let total_chars: usize = self
            .tokens
            .iter()
            .map(|t| t.token.text.chars().count())
            .sum();
        total_chars > 0 && bold_chars as f32 / total_chars as f32 > 0.5
    }

    /// Whitespace runs between tokens at least `min_width` wide.
    pub fn gaps(&self, min_width: f32) -> Vec<Gap> {
        let mut gaps = Vec::new();
        let mut right = f32::NEG_INFINITY;
        for token in &self.tokens {
            if right.is_finite() && token.token.x0 - right >= min_width {
                gaps.push(Gap {
                    x0: right,
                    x1: token.token.x0,
                });
            }
            right = right.max(token.token.x1);
        }
        gaps
    }

    /// Whether any token reaches into `gap`.
    pub fn crosses(&self, gap: &Gap) -> bool {
        self.tokens
            .iter()
            .any(|t| t.token.x0 < gap.x1 && t.token.x1 > gap.x0)
    }

    /// Number of blank lines between this line and the one above.
    pub fn blank_lines_above(&self, line_gap_factor: f32) -> usize {
        match self.gap_above {
            Some(gap) if self.font_size > 0.0 => {
                (gap / (line_gap_factor * self.font_size)).floor().max(0.0) as usize
            }
            _ => 0,
        }
    }

    /// Number of whitespace-separated words.
    pub fn word_count(&self) -> usize {
        self.tokens
            .iter()
            .map(|t| t.token.text.split_whitespace().count())
            .sum()
    }

    /// First token, if any.
    pub fn first(&self) -> Option<&TokenRef<'a>> {
        self.tokens.first()
    }
}

/// Join tokens with gap-based spacing.
pub(crate) fn join_tokens(tokens: &[TokenRef<'_>]) -> String {
    let mut result = String::new();
    for (i, current) in tokens.iter().enumerate() {
        if i > 0 && needs_space(tokens[i - 1].token, current.token) {
            result.push(' ');
        }
        result.push_str(&current.token.text);
    }
    result
}

/// Decide whether a space separates two horizontally adjacent tokens.
pub(crate) fn needs_space(prev: &Token, curr: &Token) -> bool {
    let gap = curr.x0 - prev.x1;

    let char_count = curr.text.chars().count();
    let avg_char_width = if char_count > 0 && curr.width() > 0.0 {
        curr.width() / char_count as f32
    } else {
        curr.font_size * 0.5
    };

    if gap <= avg_char_width * 0.2 {
        return false;
    }

    let prev_is_cjk = prev
        .text
        .chars()
        .last()
        .map(is_spaceless_script_char)
        .unwrap_or(false);
    let curr_is_cjk = curr
        .text
        .chars()
        .next()
        .map(is_spaceless_script_char)
        .unwrap_or(false);
    if prev_is_cjk && curr_is_cjk {
        return false;
    }

    let prev_ends_with_space = prev.text.ends_with(' ') || prev.text.ends_with('\u{00A0}');
    let curr_starts_with_space = curr.text.starts_with(' ') || curr.text.starts_with('\u{00A0}');
    !prev_ends_with_space && !curr_starts_with_space
}

/// Check if a character belongs to a script written without word spaces.
pub(crate) fn is_spaceless_script_char(c: char) -> bool {
    let code = c as u32;

    // CJK Unified Ideographs
    (0x4E00..=0x9FFF).contains(&code)
    // Extension A
    || (0x3400..=0x4DBF).contains(&code)
    // Extensions B-F
    || (0x20000..=0x2EBEF).contains(&code)
    // Hiragana
    || (0x3040..=0x309F).contains(&code)
    // Katakana
    || (0x30A0..=0x30FF).contains(&code)
    // Hangul is not listed: Korean uses word spaces
    // CJK Symbols and Punctuation
    || (0x3000..=0x303F).contains(&code)
}

/// Total order on floats for sorting geometry (NaN sorts equal).
pub(crate) fn cmp_f32(a: f32, b: f32) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

/// Upper bound on the bins of a horizontal coverage histogram.
///
/// Wider extents get proportionally wider bins.
pub(crate) const MAX_HISTOGRAM_BINS: usize = 1 << 16;

/// Median of a list of values (0 when empty).
pub(crate) fn median(values: &mut [f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| cmp_f32(*a, *b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// A vertical reading band of a page.
#[derive(Debug, Clone)]
pub struct Column<'a> {
    /// Column index (0 = leftmost)
    pub index: usize,
    /// Page number
    pub page: u32,
    /// Left boundary
    pub x0: f32,
    /// Right boundary
    pub x1: f32,
    /// Lines top to bottom
    pub lines: Vec<Line<'a>>,
}

impl Column<'_> {
    /// Check if an X coordinate falls within this column.
    pub fn contains(&self, x: f32) -> bool {
        x >= self.x0 && x <= self.x1
    }
}

/// Kind of a classified block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// Body text
    Paragraph,
    /// Section heading
    Heading,
    /// Tentatively tabular, pending reconstruction
    TableCandidate,
    /// Page-bottom footnote
    Footnote,
    /// Reference-list entry
    Reference,
    /// Figure or table caption
    Caption,
}

/// A run of lines with one classification.
#[derive(Debug, Clone)]
pub struct Block<'a> {
    /// Block kind
    pub kind: BlockKind,
    /// Lines in reading order
    pub lines: Vec<Line<'a>>,
    /// Pages covered
    pub span: PageRange,
    /// Heading level (1-6 for headings, 0 otherwise)
    pub heading_level: u8,
    /// Set once the block failed table reconstruction
    pub demoted: bool,
}

impl<'a> Block<'a> {
    /// Create a new block.
    pub fn new(kind: BlockKind, lines: Vec<Line<'a>>) -> Self {
        let mut pages = lines.iter().map(|l| l.page);
        let first = pages.next().unwrap_or(1);
        let mut span = PageRange::single(first);
        for page in pages {
            span.include(page);
        }
        Self {
            kind,
            lines,
            span,
            heading_level: 0,
            demoted: false,
        }
    }

    /// Page the block starts on.
    pub fn page(&self) -> u32 {
        self.span.start
    }

    /// Get the combined text of all lines.
    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(|l| l.text())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Ids of every token in the block.
    pub fn token_ids(&self) -> Vec<TokenId> {
        self.lines.iter().flat_map(|l| l.ids()).collect()
    }

    /// Check if the block holds no tokens.
    pub fn is_empty(&self) -> bool {
        self.lines.iter().all(|l| l.tokens.is_empty())
    }

    /// Check if the block's tokens carry only whitespace.
    pub fn is_blank(&self) -> bool {
        self.text().trim().is_empty()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::model::{Token, TokenId};

    /// Word-sized token with a 10pt font; width is 5pt per character.
    pub fn word(text: &str, x: f32, y: f32) -> Token {
        let width = text.chars().count() as f32 * 5.0;
        Token::new(text, 1, x, y, x + width, y + 10.0).with_font_size(10.0)
    }

    /// Lay out `words` left to right starting at `x`, one space apart.
    pub fn phrase(text: &str, x: f32, y: f32) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut cursor = x;
        for w in text.split_whitespace() {
            let token = word(w, cursor, y);
            cursor = token.x1 + 3.0;
            tokens.push(token);
        }
        tokens
    }

    pub fn refs(tokens: &[Token]) -> Vec<super::TokenRef<'_>> {
        tokens
            .iter()
            .enumerate()
            .map(|(i, t)| super::TokenRef::new(TokenId::new(t.page, i as u32), t))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_line_text_spacing() {
        let tokens = phrase("hello big world", 10.0, 10.0);
        let line = Line::from_tokens(refs(&tokens), 1, 0);
        assert_eq!(line.text(), "hello big world");
        assert_eq!(line.word_count(), 3);
    }

    #[test]
    fn test_attached_tokens_not_spaced() {
        let base = word("result", 10.0, 10.0);
        let sup = Token::new("¹", 1, base.x1, 8.0, base.x1 + 3.0, 14.0).with_font_size(6.0);
        let tokens = vec![base, sup];
        let line = Line::from_tokens(refs(&tokens), 1, 0);
        assert_eq!(line.text(), "result¹");
    }

    #[test]
    fn test_cjk_not_spaced() {
        let a = Token::new("中", 1, 0.0, 0.0, 10.0, 10.0);
        let b = Token::new("文", 1, 12.0, 0.0, 22.0, 10.0);
        let tokens = vec![a, b];
        let line = Line::from_tokens(refs(&tokens), 1, 0);
        assert_eq!(line.text(), "中文");
    }

    #[test]
    fn test_gaps_and_crossing() {
        let mut tokens = phrase("Alice", 10.0, 10.0);
        tokens.extend(phrase("30", 100.0, 10.0));
        let line = Line::from_tokens(refs(&tokens), 1, 0);
        let gaps = line.gaps(10.0);
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].x0, 35.0);
        assert_eq!(gaps[0].x1, 100.0);

        let wide = phrase("a much longer sentence here", 10.0, 30.0);
        let wide_line = Line::from_tokens(refs(&wide), 1, 0);
        assert!(wide_line.crosses(&gaps[0]));
        assert!(!line.crosses(&Gap { x0: 40.0, x1: 90.0 }));
    }

    #[test]
    fn test_gap_intersect() {
        let a = Gap { x0: 10.0, x1: 30.0 };
        let b = Gap { x0: 20.0, x1: 40.0 };
        assert_eq!(a.intersect(&b), Some(Gap { x0: 20.0, x1: 30.0 }));
        assert_eq!(a.intersect(&Gap { x0: 31.0, x1: 40.0 }), None);
    }

    #[test]
    fn test_blank_lines_above() {
        let tokens = phrase("text", 0.0, 0.0);
        let mut line = Line::from_tokens(refs(&tokens), 1, 0);
        assert_eq!(line.blank_lines_above(1.2), 0);
        line.gap_above = Some(3.0);
        assert_eq!(line.blank_lines_above(1.2), 0);
        line.gap_above = Some(14.0);
        assert_eq!(line.blank_lines_above(1.2), 1);
        line.gap_above = Some(30.0);
        assert_eq!(line.blank_lines_above(1.2), 2);
    }

    #[test]
    fn test_block_span_and_text() {
        let first = phrase("first line", 0.0, 0.0);
        let second = phrase("second line", 0.0, 14.0);
        let block = Block::new(
            BlockKind::Paragraph,
            vec![
                Line::from_tokens(refs(&first), 2, 0),
                Line::from_tokens(refs(&second), 2, 0),
            ],
        );
        assert_eq!(block.page(), 2);
        assert_eq!(block.text(), "first line second line");
        assert_eq!(block.token_ids().len(), 4);
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&mut [3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&mut [4.0, 1.0, 2.0, 3.0]), 2.5);
        assert_eq!(median(&mut []), 0.0);
    }
}
