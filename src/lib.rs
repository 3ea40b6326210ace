//! # relayout
//!
//! Layout-aware reconstruction of logical documents from positioned PDF text.
//!
//! The extraction layer hands over words with bounding boxes, grouped by page.
//! This library rebuilds what the layout implied: reading columns, lines,
//! paragraphs, sections, tables that survive wrapped cells and page breaks,
//! and footnote markers linked to their bodies. Every input token ends up in
//! exactly one output node.
//!
//! ## Quick Start
//!
//! ```no_run
//! use relayout::{load_tokens_file, ErrorMode, Relayout};
//!
//! fn main() -> relayout::Result<()> {
//!     let stream = load_tokens_file("tokens.json", ErrorMode::Strict)?;
//!
//!     let result = Relayout::new().run(&stream)?;
//!     println!("{}", result.to_markdown()?);
//!
//!     for diagnostic in result.diagnostics() {
//!         eprintln!("{}", diagnostic);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Multi-column pages**: gutter detection with rotated-label handling
//! - **Tables**: column inference, wrapped cells, spans, cross-page continuation
//! - **Footnotes**: superscripts, symbols and bracket citations, resolved by key
//! - **Parallel processing**: per-page stages run on Rayon
//! - **Diagnostics**: recoverable conditions are reported, never fatal

pub mod error;
pub mod layout;
pub mod model;
pub mod render;

// Re-export commonly used types
pub use error::{Error, Result};
pub use layout::{
    CancellationToken, ErrorMode, FootnotePlacement, GutterWidth, LayoutOptions, Reconstruction,
};
pub use model::{
    load_tokens_file, Cell, Diagnostic, DiagnosticKind, Document, Footnote, LogicalTable, Node,
    PageTokens, Paragraph, Row, Rule, Token, TokenId, TokenStream,
};
pub use render::{JsonFormat, PageSelection, RenderOptions, TableFallback};

/// Reconstruct a logical document from a token stream.
///
/// Layout problems never fail the call; they are returned as diagnostics
/// next to the document.
///
/// # Example
///
/// ```
/// use relayout::{reconstruct, ErrorMode, LayoutOptions, Token, TokenStream};
///
/// let tokens = vec![
///     Token::new("Hello", 1, 72.0, 90.0, 100.0, 100.0),
///     Token::new("world", 1, 104.0, 90.0, 132.0, 100.0),
/// ];
/// let stream = TokenStream::from_tokens(tokens, ErrorMode::Strict).unwrap();
/// let result = reconstruct(&stream, &LayoutOptions::default());
/// assert_eq!(result.document.plain_text(), "Hello world");
/// ```
pub fn reconstruct(stream: &TokenStream, options: &LayoutOptions) -> Reconstruction {
    layout::run(stream, options, &CancellationToken::new())
}

/// Reconstruct a document, stopping early when `cancel` is triggered.
///
/// Pages completed before the cancellation was observed are kept and
/// `Reconstruction::cancelled` is set.
pub fn reconstruct_with_cancel(
    stream: &TokenStream,
    options: &LayoutOptions,
    cancel: &CancellationToken,
) -> Reconstruction {
    layout::run(stream, options, cancel)
}

/// Builder for reconstructing and rendering documents.
///
/// # Example
///
/// ```no_run
/// use relayout::{load_tokens_file, ErrorMode, PageSelection, Relayout};
///
/// let stream = load_tokens_file("tokens.json", ErrorMode::Lenient)?;
/// let markdown = Relayout::new()
///     .lenient()
///     .sequential()
///     .with_pages(PageSelection::Range(1..=3))
///     .run(&stream)?
///     .to_markdown()?;
/// # Ok::<(), relayout::Error>(())
/// ```
pub struct Relayout {
    layout_options: LayoutOptions,
    render_options: RenderOptions,
    cancel: CancellationToken,
}

impl Relayout {
    /// Create a new builder with default options.
    pub fn new() -> Self {
        Self {
            layout_options: LayoutOptions::default(),
            render_options: RenderOptions::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Enable lenient input handling.
    pub fn lenient(mut self) -> Self {
        self.layout_options = self.layout_options.lenient();
        self
    }

    /// Disable parallel processing.
    pub fn sequential(mut self) -> Self {
        self.layout_options = self.layout_options.sequential();
        self
    }

    /// Replace the layout options.
    ///
    /// The page selection already set on the builder is kept.
    pub fn with_options(mut self, options: LayoutOptions) -> Self {
        let pages = std::mem::take(&mut self.layout_options.pages);
        self.layout_options = options;
        if self.layout_options.pages == PageSelection::All {
            self.layout_options.pages = pages;
        }
        self
    }

    /// Set render options.
    pub fn with_render_options(mut self, options: RenderOptions) -> Self {
        self.render_options = options.with_pages(self.layout_options.pages.clone());
        self
    }

    /// Set table fallback mode.
    pub fn with_table_fallback(mut self, fallback: TableFallback) -> Self {
        self.render_options = self.render_options.with_table_fallback(fallback);
        self
    }

    /// Set footnote placement.
    pub fn with_footnote_placement(mut self, placement: FootnotePlacement) -> Self {
        self.layout_options = self.layout_options.with_footnote_placement(placement);
        self
    }

    /// Set page selection.
    pub fn with_pages(mut self, pages: PageSelection) -> Self {
        self.layout_options = self.layout_options.with_pages(pages.clone());
        self.render_options = self.render_options.with_pages(pages);
        self
    }

    /// Use a cancellation token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Validate the options and reconstruct a token stream.
    pub fn run(self, stream: &TokenStream) -> Result<RelayoutResult> {
        self.layout_options.validate()?;
        let reconstruction = layout::run(stream, &self.layout_options, &self.cancel);
        Ok(RelayoutResult {
            reconstruction,
            render_options: self.render_options,
        })
    }
}

impl Default for Relayout {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a reconstruction, ready to render.
pub struct RelayoutResult {
    /// The reconstruction
    pub reconstruction: Reconstruction,
    /// Render options to use
    render_options: RenderOptions,
}

impl RelayoutResult {
    /// Convert to Markdown.
    pub fn to_markdown(&self) -> Result<String> {
        render::to_markdown(&self.reconstruction.document, &self.render_options)
    }

    /// Convert to plain text.
    pub fn to_text(&self) -> Result<String> {
        render::to_text(&self.reconstruction.document, &self.render_options)
    }

    /// Convert the document to JSON.
    pub fn to_json(&self, format: JsonFormat) -> Result<String> {
        render::to_json(&self.reconstruction.document, format)
    }

    /// Recoverable conditions observed during reconstruction.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.reconstruction.diagnostics
    }

    /// Get the document.
    pub fn document(&self) -> &Document {
        &self.reconstruction.document
    }

    /// Whether reconstruction stopped early.
    pub fn is_cancelled(&self) -> bool {
        self.reconstruction.cancelled
    }
}
