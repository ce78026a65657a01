//! `tally-xlsx` serializes a grid snapshot into a portable, static XLSX
//! workbook.
//!
//! The export is one deterministically named sheet. Live formula cells
//! (string values carrying the `=` sigil) become native `<f>` formula
//! cells — the evaluator's A1 dialect is assumed range-compatible with
//! SpreadsheetML's, an explicit design gap if the two ever diverge — and
//! every other cell is written as a typed literal. Export reads a captured
//! snapshot; it never touches the live grid or evaluator state.

mod writer;

pub use writer::{write_grid, write_grid_to_file, XlsxWriteError, SHEET_NAME};
