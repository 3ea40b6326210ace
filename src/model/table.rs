//! Logical table types.

use serde::{Deserialize, Serialize};

use super::{PageRange, Paragraph, TokenId};

/// A reconstructed table.
///
/// Every row holds exactly `columns.len()` cells.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogicalTable {
    /// Column descriptions
    pub columns: Vec<ColumnSpec>,

    /// Rows in the table, header rows first
    pub rows: Vec<Row>,

    /// Number of leading header rows (0 = no header)
    pub header_rows: usize,

    /// Page the table started on, set when it continues across a page break
    pub continued_from_page: Option<u32>,

    /// Pages covered
    pub span: PageRange,

    /// Header rows repeated on continuation pages and removed from `rows`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub repeated_headers: Vec<RepeatedHeader>,

    /// Table caption
    pub caption: Option<Paragraph>,
}

impl LogicalTable {
    /// Create an empty table with `columns` columns on a page.
    pub fn new(columns: usize, page: u32) -> Self {
        Self {
            columns: (0..columns).map(ColumnSpec::new).collect(),
            rows: Vec::new(),
            header_rows: 0,
            continued_from_page: None,
            span: PageRange::single(page),
            repeated_headers: Vec::new(),
            caption: None,
        }
    }

    /// Add a row, padding or truncating it to the column count.
    pub fn add_row(&mut self, mut row: Row) {
        row.pad_to(self.columns.len());
        self.rows.push(row);
    }

    /// Get the number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Get the number of columns.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Get header rows.
    pub fn header(&self) -> &[Row] {
        &self.rows[..self.header_rows.min(self.rows.len())]
    }

    /// Get body rows (non-header).
    pub fn body(&self) -> &[Row] {
        &self.rows[self.header_rows.min(self.rows.len())..]
    }

    /// Get plain text representation of the table.
    pub fn plain_text(&self) -> String {
        self.rows
            .iter()
            .map(|row| row.plain_text())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Check if the table has complex structure (merged cells).
    pub fn has_merged_cells(&self) -> bool {
        self.rows
            .iter()
            .flat_map(|r| &r.cells)
            .any(|c| c.is_merged() || c.covered)
    }

    /// Tokens consumed by the table, including repeated headers and caption.
    pub fn token_ids(&self) -> Vec<TokenId> {
        let mut ids: Vec<TokenId> = self
            .rows
            .iter()
            .chain(self.repeated_headers.iter().flat_map(|h| h.rows.iter()))
            .flat_map(|r| r.cells.iter())
            .flat_map(|c| c.tokens.iter().copied())
            .collect();
        if let Some(caption) = &self.caption {
            ids.extend(caption.tokens.iter().copied());
        }
        ids
    }
}

/// A table column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column index (0 = leftmost)
    pub index: usize,
}

impl ColumnSpec {
    /// Create a column spec.
    pub fn new(index: usize) -> Self {
        Self { index }
    }
}

/// A logical table row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Row {
    /// Cells in the row
    pub cells: Vec<Cell>,

    /// Whether this is a header row
    pub is_header: bool,

    /// Page the row's first line appears on
    pub page: u32,
}

impl Row {
    /// Create a body row.
    pub fn new(cells: Vec<Cell>, page: u32) -> Self {
        Self {
            cells,
            is_header: false,
            page,
        }
    }

    /// Create a header row.
    pub fn header(cells: Vec<Cell>, page: u32) -> Self {
        Self {
            cells,
            is_header: true,
            page,
        }
    }

    /// Create a row from text values.
    pub fn from_strings<S: Into<String>>(values: impl IntoIterator<Item = S>, page: u32) -> Self {
        Self::new(values.into_iter().map(Cell::text).collect(), page)
    }

    /// Pad with empty cells (or truncate) to exactly `columns` cells.
    pub fn pad_to(&mut self, columns: usize) {
        self.cells.resize_with(columns, Cell::empty);
    }

    /// Get plain text representation.
    pub fn plain_text(&self) -> String {
        self.cells
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\t")
    }

    /// Check whether every cell is empty.
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|c| c.is_empty())
    }
}

/// A table cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    /// Cell text, wrapped fragments joined with single spaces
    pub text: String,

    /// Number of rows this cell spans
    pub row_span: u32,

    /// Number of columns this cell spans
    pub col_span: u32,

    /// Set when the slot is covered by a spanning neighbor
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub covered: bool,

    /// Tokens this cell consumed
    #[serde(default)]
    pub tokens: Vec<TokenId>,
}

impl Cell {
    /// Create a new cell with text content.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            row_span: 1,
            col_span: 1,
            covered: false,
            tokens: Vec::new(),
        }
    }

    /// Create an empty cell.
    pub fn empty() -> Self {
        Self::text("")
    }

    /// Create a slot covered by a spanning cell.
    pub fn covered() -> Self {
        Self {
            covered: true,
            ..Self::empty()
        }
    }

    /// Set col_span and return self.
    pub fn col_span(mut self, span: u32) -> Self {
        self.col_span = span;
        self
    }

    /// Set row_span and return self.
    pub fn row_span(mut self, span: u32) -> Self {
        self.row_span = span;
        self
    }

    /// Append a wrapped fragment, joined with a single space.
    pub fn append(&mut self, fragment: &str, tokens: &[TokenId]) {
        let fragment = fragment.trim();
        if !fragment.is_empty() {
            if !self.text.is_empty() {
                self.text.push(' ');
            }
            self.text.push_str(fragment);
        }
        self.tokens.extend_from_slice(tokens);
    }

    /// Check if the cell is empty.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Check if this cell spans multiple rows or columns.
    pub fn is_merged(&self) -> bool {
        self.row_span > 1 || self.col_span > 1
    }
}

/// Header rows that a continuation page repeated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepeatedHeader {
    /// Page the repetition appeared on
    pub page: u32,
    /// The repeated rows
    pub rows: Vec<Row>,
}
