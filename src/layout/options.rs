//! Layout options and thresholds.
//!
//! The numeric thresholds are empirical; every one of them can be
//! overridden from code or from a (partial) JSON file.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::render::PageSelection;

/// Options for reconstructing a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutOptions {
    /// Input validation mode
    pub error_mode: ErrorMode,

    /// Whether to run per-page stages in parallel
    pub parallel: bool,

    /// Capacity of the page queue between the parallel and sequential stages
    pub queue_depth: usize,

    /// Pages to process
    #[serde(skip)]
    pub pages: PageSelection,

    /// Column/reading-order resolver thresholds
    pub columns: ColumnOptions,

    /// Line assembler thresholds
    pub lines: LineOptions,

    /// Block classifier thresholds
    pub classifier: ClassifierOptions,

    /// Table reconstructor thresholds
    pub tables: TableOptions,

    /// Footnote handling
    pub footnotes: FootnoteOptions,
}

impl LayoutOptions {
    /// Create new layout options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse options from JSON; missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let options: LayoutOptions = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// Set error mode.
    pub fn with_error_mode(mut self, mode: ErrorMode) -> Self {
        self.error_mode = mode;
        self
    }

    /// Enable lenient mode (repair or pass through bad input).
    pub fn lenient(mut self) -> Self {
        self.error_mode = ErrorMode::Lenient;
        self
    }

    /// Enable or disable parallel processing.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Disable parallel processing.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    /// Set page selection.
    pub fn with_pages(mut self, pages: PageSelection) -> Self {
        self.pages = pages;
        self
    }

    /// Set the minimum row support for table column inference.
    pub fn with_min_row_support(mut self, support: f32) -> Self {
        self.tables.min_row_support = support;
        self
    }

    /// Set the minimum gutter width between layout columns.
    pub fn with_min_gutter_width(mut self, width: GutterWidth) -> Self {
        self.columns.min_gutter_width = width;
        self
    }

    /// Set where footnotes are placed in the document tree.
    pub fn with_footnote_placement(mut self, placement: FootnotePlacement) -> Self {
        self.footnotes.placement = placement;
        self
    }

    /// Check that every threshold is in range.
    pub fn validate(&self) -> Result<()> {
        fn ratio(name: &str, value: f32) -> Result<()> {
            if value > 0.0 && value <= 1.0 {
                Ok(())
            } else {
                Err(Error::InvalidConfig(format!(
                    "{} must be in (0, 1], got {}",
                    name, value
                )))
            }
        }
        fn positive(name: &str, value: f32) -> Result<()> {
            if value > 0.0 && value.is_finite() {
                Ok(())
            } else {
                Err(Error::InvalidConfig(format!(
                    "{} must be positive, got {}",
                    name, value
                )))
            }
        }

        ratio("tables.min_row_support", self.tables.min_row_support)?;
        ratio("tables.min_multi_cell_ratio", self.tables.min_multi_cell_ratio)?;
        ratio("lines.superscript_ratio", self.lines.superscript_ratio)?;
        positive("lines.baseline_tolerance", self.lines.baseline_tolerance)?;
        positive("lines.line_gap_factor", self.lines.line_gap_factor)?;
        positive("classifier.min_cell_gap_factor", self.classifier.min_cell_gap_factor)?;
        positive("tables.band_match_tolerance", self.tables.band_match_tolerance)?;
        positive("tables.min_gutter_factor", self.tables.min_gutter_factor)?;
        positive("columns.bin_width", self.columns.bin_width)?;
        match self.columns.min_gutter_width {
            GutterWidth::MedianTokenFactor(f) => positive("columns.min_gutter_width", f)?,
            GutterWidth::Absolute(w) => positive("columns.min_gutter_width", w)?,
        }
        if !(0.0..1.0).contains(&self.columns.gutter_noise_ratio) {
            return Err(Error::InvalidConfig(format!(
                "columns.gutter_noise_ratio must be in [0, 1), got {}",
                self.columns.gutter_noise_ratio
            )));
        }
        if self.tables.max_columns < 2 {
            return Err(Error::InvalidConfig(
                "tables.max_columns must be at least 2".to_string(),
            ));
        }
        if self.queue_depth == 0 {
            return Err(Error::InvalidConfig(
                "queue_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            error_mode: ErrorMode::Strict,
            parallel: true,
            queue_depth: 4,
            pages: PageSelection::All,
            columns: ColumnOptions::default(),
            lines: LineOptions::default(),
            classifier: ClassifierOptions::default(),
            tables: TableOptions::default(),
            footnotes: FootnoteOptions::default(),
        }
    }
}

/// Input validation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorMode {
    /// Reject input that breaks the input contract
    #[default]
    Strict,
    /// Repair what can be repaired and pass the rest through
    Lenient,
}

/// Minimum width of a gutter between layout columns.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GutterWidth {
    /// Multiple of the page's median token width
    MedianTokenFactor(f32),
    /// Fixed width in points
    Absolute(f32),
}

impl GutterWidth {
    /// Resolve to points for a page.
    pub fn resolve(&self, median_token_width: f32) -> f32 {
        match *self {
            GutterWidth::MedianTokenFactor(f) => f * median_token_width,
            GutterWidth::Absolute(w) => w,
        }
    }
}

/// Column/reading-order resolver thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnOptions {
    /// Minimum gutter width
    pub min_gutter_width: GutterWidth,
    /// Histogram density (fraction of tokens) still counted as empty
    pub gutter_noise_ratio: f32,
    /// Bands with fewer tokens are merged into a neighbor
    pub min_band_tokens: usize,
    /// Bands with fewer than this fraction of the page's tokens are merged
    pub min_band_token_ratio: f32,
    /// Bands narrower than this fraction of the text width are merged
    pub min_band_width_ratio: f32,
    /// Bands whose median line holds fewer tokens are merged (table cells, not text)
    pub min_line_tokens: f32,
    /// Histogram bin width in points
    pub bin_width: f32,
}

impl Default for ColumnOptions {
    fn default() -> Self {
        Self {
            min_gutter_width: GutterWidth::MedianTokenFactor(1.5),
            gutter_noise_ratio: 0.02,
            min_band_tokens: 3,
            min_band_token_ratio: 0.05,
            min_band_width_ratio: 0.2,
            min_line_tokens: 3.0,
            bin_width: 1.0,
        }
    }
}

/// Line assembler thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LineOptions {
    /// Baseline distance (fraction of font size) still on the same line
    pub baseline_tolerance: f32,
    /// Vertical whitespace (fraction of font size) that counts as a blank line
    pub line_gap_factor: f32,
    /// Tokens smaller than this fraction of the line font are superscripts
    pub superscript_ratio: f32,
}

impl Default for LineOptions {
    fn default() -> Self {
        Self {
            baseline_tolerance: 0.3,
            line_gap_factor: 1.2,
            superscript_ratio: 0.8,
        }
    }
}

/// Block classifier thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierOptions {
    /// Horizontal whitespace (fraction of font size) that separates cells
    pub min_cell_gap_factor: f32,
    /// Aligned gaps two consecutive lines must share to start a table
    pub min_shared_gaps: usize,
    /// Font size increase over body text that marks a heading
    pub heading_size_delta: f32,
    /// Font size decrease under body text that marks footnote text
    pub footnote_size_delta: f32,
    /// Longest bold line (in words) still taken as a heading
    pub max_heading_words: usize,
    /// Line spacing (multiple of average) that breaks a paragraph
    pub paragraph_gap_factor: f32,
    /// Left-edge shift (multiple of font size) that breaks a paragraph
    pub indent_break_factor: f32,
}

impl Default for ClassifierOptions {
    fn default() -> Self {
        Self {
            min_cell_gap_factor: 1.0,
            min_shared_gaps: 1,
            heading_size_delta: 1.5,
            footnote_size_delta: 1.0,
            max_heading_words: 12,
            paragraph_gap_factor: 1.5,
            indent_break_factor: 2.0,
        }
    }
}

/// Table reconstructor thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TableOptions {
    /// Fraction of lines that must agree with a column hypothesis
    pub min_row_support: f32,
    /// Largest column count considered
    pub max_columns: usize,
    /// Fewest body lines a table may have
    pub min_body_rows: usize,
    /// Fraction of body lines that must fill two or more columns
    pub min_multi_cell_ratio: f32,
    /// Narrowest gutter between table columns (multiple of font size)
    pub min_gutter_factor: f32,
    /// Horizontal tolerance (points) when matching column bands across pages
    pub band_match_tolerance: f32,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            min_row_support: 0.6,
            max_columns: 16,
            min_body_rows: 2,
            min_multi_cell_ratio: 0.5,
            min_gutter_factor: 1.0,
            band_match_tolerance: 12.0,
        }
    }
}

/// Footnote handling.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FootnoteOptions {
    /// Where resolved footnotes go
    pub placement: FootnotePlacement,
}

/// Where resolved footnotes are placed in the document tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FootnotePlacement {
    /// Right after the paragraph holding the first reference
    #[default]
    Adjacent,
    /// In a trailing list at the end of the document
    Trailing,
}
