//! `tally-model` defines the core in-memory data structures for the
//! transaction grid.
//!
//! The crate is intentionally self-contained so it can be reused by:
//! - the grid builder (record → grid materialization)
//! - the formula engine (cell addressing, value resolution)
//! - the XLSX export layer
//! - UI boundaries via `serde` (JSON-safe schema)

mod address;
mod amount;
mod cell;
mod entry;
mod grid;
mod record;
mod store;
mod value;

pub use address::{A1ParseError, CellRef, Range, RangeParseError, MAX_COLS, MAX_ROWS};
pub use amount::format_amount;
pub use cell::{Cell, FORMULA_SIGIL};
pub use entry::{EntryBatch, EntryRow, EntryValidationError};
pub use grid::{Grid, StructuralViolation};
pub use record::{DateRange, TransferRecord};
pub use store::{Store, SubscriptionId};
pub use value::CellValue;
