//! Layout reconstruction stages.
//!
//! Per page: [`ColumnResolver`] splits tokens into reading columns,
//! [`LineAssembler`] groups each column into lines and
//! [`BlockClassifier`] labels runs of lines. Across pages, in order:
//! [`TableReconstructor`] turns table candidates into [`LogicalTable`]s
//! (or demotes them) and [`DocumentAssembler`] builds the tree.
//!
//! [`LogicalTable`]: crate::model::LogicalTable

mod assemble;
mod classify;
mod columns;
mod footnotes;
mod lines;
pub mod markers;
mod options;
mod pipeline;
mod stats;
mod table;
mod types;

pub use assemble::DocumentAssembler;
pub use classify::{BlockClassifier, LineFeatures};
pub use columns::{ColumnResolver, ReadingBand};
pub use footnotes::{FootnoteInterleaver, Inline};
pub use lines::LineAssembler;
pub use options::{
    ClassifierOptions, ColumnOptions, ErrorMode, FootnoteOptions, FootnotePlacement, GutterWidth,
    LayoutOptions, LineOptions, TableOptions,
};
pub use pipeline::{run, CancellationToken, PageAnalyzer, PageLayout, Reconstruction};
pub use stats::FontStatistics;
pub use table::{
    fingerprint_text, infer_columns, text_continues, ColumnBand, ColumnInferenceFailure,
    ReconstructedTable, TableReconstructor, Verdict,
};
pub use types::{Block, BlockKind, Column, Gap, Line, TokenRef};
