//! Rendering options and configuration.

use std::ops::RangeInclusive;

/// Options for rendering a reconstructed document.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// How to render tables with merged cells
    pub table_fallback: TableFallback,

    /// Maximum heading level (1-6)
    pub max_heading_level: u8,

    /// Escape special Markdown characters
    pub escape_special_chars: bool,

    /// Note the page range of tables continued across a page break
    pub continuation_notes: bool,

    /// Page selection
    pub page_selection: PageSelection,
}

impl RenderOptions {
    /// Create new render options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the table fallback mode.
    pub fn with_table_fallback(mut self, fallback: TableFallback) -> Self {
        self.table_fallback = fallback;
        self
    }

    /// Set the maximum heading level.
    pub fn with_max_heading(mut self, level: u8) -> Self {
        self.max_heading_level = level.clamp(1, 6);
        self
    }

    /// Enable or disable Markdown escaping.
    pub fn with_escaping(mut self, escape: bool) -> Self {
        self.escape_special_chars = escape;
        self
    }

    /// Enable or disable continuation notes on multi-page tables.
    pub fn with_continuation_notes(mut self, notes: bool) -> Self {
        self.continuation_notes = notes;
        self
    }

    /// Set page selection.
    pub fn with_pages(mut self, selection: PageSelection) -> Self {
        self.page_selection = selection;
        self
    }

    /// Set specific page range.
    pub fn with_page_range(mut self, range: RangeInclusive<u32>) -> Self {
        self.page_selection = PageSelection::Range(range);
        self
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            table_fallback: TableFallback::Markdown,
            max_heading_level: 6,
            escape_special_chars: true,
            continuation_notes: true,
            page_selection: PageSelection::All,
        }
    }
}

/// How to render tables that can't be expressed in simple Markdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TableFallback {
    /// Pipe tables; spans are flattened
    #[default]
    Markdown,
    /// HTML tables with `rowspan`/`colspan` when a table has merged cells
    Html,
}

/// Page selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PageSelection {
    /// All pages
    #[default]
    All,
    /// A range of pages (inclusive, 1-indexed)
    Range(RangeInclusive<u32>),
    /// Specific pages (1-indexed)
    Pages(Vec<u32>),
}

impl PageSelection {
    /// Check if a page number should be included.
    pub fn includes(&self, page: u32) -> bool {
        match self {
            PageSelection::All => true,
            PageSelection::Range(range) => range.contains(&page),
            PageSelection::Pages(pages) => pages.contains(&page),
        }
    }

    /// Check if any page in `start..=end` is included.
    pub fn overlaps(&self, start: u32, end: u32) -> bool {
        match self {
            PageSelection::All => true,
            PageSelection::Range(range) => *range.start() <= end && start <= *range.end(),
            PageSelection::Pages(pages) => pages.iter().any(|p| (start..=end).contains(p)),
        }
    }

    /// Parse a page selection string (e.g., "1-10", "1,3,5,7-10").
    pub fn parse(s: &str) -> Result<Self, String> {
        let s = s.trim();

        if s.is_empty() || s == "all" {
            return Ok(PageSelection::All);
        }

        if let Some((start, end)) = s.split_once('-') {
            if !start.contains(',') && !end.contains(',') {
                let start: u32 = start.trim().parse().map_err(|_| "Invalid start page")?;
                let end: u32 = end.trim().parse().map_err(|_| "Invalid end page")?;
                if start == 0 || end < start {
                    return Err(format!("Invalid page range {}-{}", start, end));
                }
                return Ok(PageSelection::Range(start..=end));
            }
        }

        let mut pages = Vec::new();
        for part in s.split(',') {
            let part = part.trim();
            if let Some((start, end)) = part.split_once('-') {
                let start: u32 = start.trim().parse().map_err(|_| "Invalid page number")?;
                let end: u32 = end.trim().parse().map_err(|_| "Invalid page number")?;
                pages.extend(start..=end);
            } else {
                pages.push(part.parse().map_err(|_| "Invalid page number")?);
            }
        }
        if pages.contains(&0) {
            return Err("Pages are 1-indexed".to_string());
        }

        pages.sort_unstable();
        pages.dedup();
        Ok(PageSelection::Pages(pages))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_options_builder() {
        let options = RenderOptions::new()
            .with_max_heading(9)
            .with_escaping(false)
            .with_table_fallback(TableFallback::Html);

        assert_eq!(options.max_heading_level, 6);
        assert!(!options.escape_special_chars);
        assert!(options.continuation_notes);
        assert_eq!(options.table_fallback, TableFallback::Html);
    }

    #[test]
    fn test_page_selection_includes() {
        let range = PageSelection::Range(5..=10);
        assert!(!range.includes(4));
        assert!(range.includes(5));
        assert!(range.includes(10));
        assert!(!range.includes(11));

        let pages = PageSelection::Pages(vec![1, 3, 5, 7]);
        assert!(pages.includes(3));
        assert!(!pages.includes(2));
        assert!(PageSelection::All.includes(100));
    }

    #[test]
    fn test_page_selection_overlaps() {
        let range = PageSelection::Range(3..=4);
        assert!(range.overlaps(2, 3));
        assert!(!range.overlaps(5, 6));
        assert!(PageSelection::Pages(vec![7]).overlaps(6, 8));
    }

    #[test]
    fn test_page_selection_parse() {
        assert_eq!(PageSelection::parse("all").unwrap(), PageSelection::All);
        assert_eq!(PageSelection::parse("1-10").unwrap(), PageSelection::Range(1..=10));
        assert_eq!(
            PageSelection::parse("1,3,5-7,3").unwrap(),
            PageSelection::Pages(vec![1, 3, 5, 6, 7])
        );
        assert!(PageSelection::parse("0-2").is_err());
        assert!(PageSelection::parse("x").is_err());
    }
}
