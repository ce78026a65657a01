//! `tally-grid` turns an ordered list of ledger transfer records into a
//! two-dimensional cell grid: a read-only header, one data row per record,
//! one generated `SUMIF` total row per distinct commodity unit, and a fixed
//! block of empty padding rows for manual editing headroom.
//!
//! The builder is a pure function of `(records, date_range)`. A grid is
//! rebuilt wholesale whenever either input changes; there is no incremental
//! patching of a previously built grid. Whatever change-notification layer
//! owns the record set simply calls [`build`] again and swaps the result in.

mod builder;

pub use builder::{build, currency_groups, COLUMNS, COLUMN_COUNT, PADDING_ROWS};
