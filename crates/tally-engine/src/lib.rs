//! `tally-engine` is the embedded formula evaluator behind the interactive
//! transaction grid.
//!
//! It is deliberately small: the grid builder emits exactly one kind of
//! aggregate formula (`SUMIF` with an exact-equality criterion), so the
//! parser covers function calls, A1 cell/range references, and string and
//! number literals — nothing more. The [`SheetEngine`] owns a grid,
//! evaluates its formula cells, and recomputes the affected ones whenever a
//! non-read-only cell is edited.
//!
//! Evaluation never panics and never poisons the grid: a malformed formula
//! or unresolvable reference resolves that one cell to `0` with a logged
//! diagnostic.

mod engine;
mod eval;
mod parser;
mod value;

pub use engine::{EditError, SheetEngine};
pub use eval::{Evaluator, ValueResolver};
pub use parser::{parse_formula, Expr, ParseError};
pub use value::{ErrorKind, Value};
