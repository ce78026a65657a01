use std::collections::HashMap;

use thiserror::Error;

use tally_model::{CellRef, CellValue, Grid, Range};

use crate::eval::{Evaluator, ValueResolver};
use crate::parser::{parse_formula, Expr};
use crate::value::Value;

/// Interactive evaluator over one grid.
///
/// The engine owns the grid for the duration of a session: the builder
/// hands over a freshly built grid, user edits flow through
/// [`SheetEngine::set_value`], and a rebuild replaces the whole engine.
/// Formula cells recompute automatically whenever an edit touches a cell
/// inside one of their referenced ranges.
pub struct SheetEngine {
    grid: Grid,
    formulas: Vec<FormulaCell>,
    computed: HashMap<CellRef, f64>,
}

struct FormulaCell {
    at: CellRef,
    /// `None` when the formula text failed to parse; the cell then holds 0.
    expr: Option<Expr>,
    ranges: Vec<Range>,
}

/// An interactive edit was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("cell {at} is read-only")]
    ReadOnly { at: CellRef },
    #[error("cell {at} is outside the grid")]
    OutOfBounds { at: CellRef },
}

impl SheetEngine {
    /// Index the grid's formula cells and compute them all.
    pub fn new(grid: Grid) -> Self {
        let formulas = index_formulas(&grid);
        let mut engine = Self {
            grid,
            formulas,
            computed: HashMap::new(),
        };
        engine.recompute(|_| true);
        engine
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Release the grid, e.g. to hand a snapshot to the exporter.
    pub fn into_grid(self) -> Grid {
        self.grid
    }

    /// The current value of a cell: computed for formula cells, literal
    /// otherwise. Out-of-bounds cells are blank.
    pub fn value_at(&self, at: CellRef) -> Value {
        if let Some(result) = self.computed.get(&at) {
            return Value::Number(*result);
        }
        match self.grid.cell(at) {
            Some(cell) => Value::from(&cell.value),
            None => Value::Blank,
        }
    }

    /// Computed result of a formula cell, if `at` is one.
    pub fn computed_value(&self, at: CellRef) -> Option<f64> {
        self.computed.get(&at).copied()
    }

    /// Edit a non-read-only cell and recompute the formulas the edit feeds.
    ///
    /// Entering a `=`-sigiled string turns the cell into a formula cell;
    /// overwriting a formula cell with a literal turns it back.
    pub fn set_value(&mut self, at: CellRef, value: CellValue) -> Result<(), EditError> {
        let Some(cell) = self.grid.cell_mut(at) else {
            return Err(EditError::OutOfBounds { at });
        };
        if cell.read_only {
            return Err(EditError::ReadOnly { at });
        }

        let was_formula = cell.is_formula();
        cell.value = value;
        cell.formula = None;
        let is_formula = cell.is_formula();

        if was_formula || is_formula {
            // The formula population changed; re-index and recompute
            // everything. Edits like this are rare next to plain value edits.
            self.formulas = index_formulas(&self.grid);
            self.computed.clear();
            self.recompute(|_| true);
        } else {
            self.recompute(|formula| formula.ranges.iter().any(|range| range.contains(at)));
        }
        Ok(())
    }

    /// Recompute every formula cell selected by `affected`, plus every
    /// formula whose ranges read a recomputed formula's cell, transitively.
    ///
    /// Evaluation repeats until the computed values settle, so chains
    /// resolve regardless of where the cells sit in the grid: n formulas
    /// settle within n passes, and a reference cycle simply stops changing
    /// when the pass budget runs out. Evaluation failures resolve to 0 so a
    /// single malformed formula never breaks the rest of the grid.
    fn recompute(&mut self, affected: impl Fn(&FormulaCell) -> bool) {
        let mut selected: Vec<bool> = self.formulas.iter().map(|f| affected(f)).collect();
        loop {
            let mut grew = false;
            for index in 0..self.formulas.len() {
                if selected[index] {
                    continue;
                }
                let reads_selected = self.formulas[index].ranges.iter().any(|range| {
                    self.formulas
                        .iter()
                        .zip(&selected)
                        .any(|(other, chosen)| *chosen && range.contains(other.at))
                });
                if reads_selected {
                    selected[index] = true;
                    grew = true;
                }
            }
            if !grew {
                break;
            }
        }

        let passes = selected.iter().filter(|chosen| **chosen).count();
        let mut outcomes: HashMap<CellRef, Value> = HashMap::new();
        for _ in 0..passes {
            let mut results = Vec::new();
            {
                let resolver = SnapshotResolver {
                    grid: &self.grid,
                    computed: &self.computed,
                };
                let evaluator = Evaluator::new(&resolver);
                for (formula, _) in self
                    .formulas
                    .iter()
                    .zip(&selected)
                    .filter(|(_, chosen)| **chosen)
                {
                    let outcome = match &formula.expr {
                        Some(expr) => evaluator.eval(expr),
                        None => Value::Number(0.0),
                    };
                    results.push((formula.at, outcome));
                }
            }

            let mut settled = true;
            for (at, outcome) in results {
                let number = outcome.as_number().unwrap_or(0.0);
                if self.computed.insert(at, number) != Some(number) {
                    settled = false;
                }
                outcomes.insert(at, outcome);
            }
            if settled {
                break;
            }
        }

        // Warn from the settled outcomes only; intermediate passes see
        // not-yet-computed formula cells as their sigil text.
        for (at, outcome) in outcomes {
            match outcome {
                Value::Number(_) => {}
                Value::Error(e) => {
                    log::warn!("formula at {at} failed to evaluate ({e}), using 0");
                }
                other => {
                    log::warn!("formula at {at} produced non-numeric value {other:?}, using 0");
                }
            }
        }
    }
}

fn index_formulas(grid: &Grid) -> Vec<FormulaCell> {
    grid.iter_cells()
        .filter_map(|(at, cell)| {
            let text = cell.formula_text()?;
            let expr = match parse_formula(text) {
                Ok(expr) => Some(expr),
                Err(e) => {
                    log::warn!("formula at {at} failed to parse ({e}), using 0");
                    None
                }
            };
            let ranges = expr
                .as_ref()
                .map(Expr::referenced_ranges)
                .unwrap_or_default();
            Some(FormulaCell { at, expr, ranges })
        })
        .collect()
}

/// Resolver over the engine's grid plus the previously computed formula
/// results, so formulas referencing other formula cells see numbers
/// instead of sigil strings.
struct SnapshotResolver<'a> {
    grid: &'a Grid,
    computed: &'a HashMap<CellRef, f64>,
}

impl ValueResolver for SnapshotResolver<'_> {
    fn value_at(&self, at: CellRef) -> Value {
        if let Some(result) = self.computed.get(&at) {
            return Value::Number(*result);
        }
        match self.grid.cell(at) {
            Some(cell) => Value::from(&cell.value),
            None => Value::Blank,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tally_model::Cell;

    /// Header + two data rows + one total row summing E where G is "EUR".
    fn small_grid() -> Grid {
        let header: Vec<Cell> = (0..7).map(|_| Cell::read_only("H")).collect();
        let data = |unit: &str, amount: i64| {
            let mut row: Vec<Cell> = (0..7).map(|_| Cell::default()).collect();
            row[4] = Cell::new(amount);
            row[6] = Cell::new(unit);
            row
        };
        let mut total: Vec<Cell> = (0..7).map(|_| Cell::default()).collect();
        total[4] = Cell::from_formula(r#"SUMIF(G2:G3, "EUR", E2:E3)"#);
        Grid::from_rows(vec![header, data("EUR", 100), data("USD", 7), total])
    }

    fn at(a1: &str) -> CellRef {
        CellRef::from_a1(a1).unwrap()
    }

    #[test]
    fn initial_computation_covers_all_formulas() {
        let engine = SheetEngine::new(small_grid());
        assert_eq!(engine.computed_value(at("E4")), Some(100.0));
        assert_eq!(engine.value_at(at("E4")), Value::Number(100.0));
    }

    #[test]
    fn edit_inside_a_dependency_range_recomputes() {
        let mut engine = SheetEngine::new(small_grid());
        engine.set_value(at("E2"), CellValue::Int(250)).unwrap();
        assert_eq!(engine.computed_value(at("E4")), Some(250.0));

        // Switching the USD row to EUR pulls its amount into the total.
        engine.set_value(at("G3"), CellValue::from("EUR")).unwrap();
        assert_eq!(engine.computed_value(at("E4")), Some(257.0));
    }

    #[test]
    fn edit_outside_dependencies_leaves_result_alone() {
        let mut engine = SheetEngine::new(small_grid());
        engine.set_value(at("A2"), CellValue::from("note")).unwrap();
        assert_eq!(engine.computed_value(at("E4")), Some(100.0));
    }

    #[test]
    fn read_only_and_out_of_bounds_edits_are_rejected() {
        let mut engine = SheetEngine::new(small_grid());
        assert_eq!(
            engine.set_value(at("A1"), CellValue::from("x")),
            Err(EditError::ReadOnly { at: at("A1") })
        );
        assert_eq!(
            engine.set_value(at("A99"), CellValue::from("x")),
            Err(EditError::OutOfBounds { at: at("A99") })
        );
    }

    #[test]
    fn malformed_formula_resolves_to_zero() {
        let mut grid = small_grid();
        grid.cell_mut(at("E4")).unwrap().formula = Some("SUMIF(".to_string());
        grid.cell_mut(at("E4")).unwrap().value = CellValue::from("=SUMIF(");
        let engine = SheetEngine::new(grid);
        assert_eq!(engine.computed_value(at("E4")), Some(0.0));
    }

    #[test]
    fn chained_formulas_read_computed_totals() {
        let mut engine = SheetEngine::new(small_grid());
        engine.set_value(at("F2"), CellValue::from("=E4")).unwrap();
        assert_eq!(engine.computed_value(at("F2")), Some(100.0));

        // A data edit under the total flows through to the chained cell.
        engine.set_value(at("E2"), CellValue::Int(250)).unwrap();
        assert_eq!(engine.computed_value(at("E4")), Some(250.0));
        assert_eq!(engine.computed_value(at("F2")), Some(250.0));
    }

    #[test]
    fn chains_resolve_regardless_of_cell_order() {
        // The chained cell sits above the total it reads, so a single
        // row-major pass would see the total's sigil text.
        let mut grid = small_grid();
        let cell = grid.cell_mut(at("F2")).unwrap();
        cell.value = CellValue::from("=E4");
        cell.formula = Some("E4".to_string());
        let engine = SheetEngine::new(grid);
        assert_eq!(engine.computed_value(at("F2")), Some(100.0));
    }

    #[test]
    fn self_referencing_formula_settles_to_zero() {
        let mut engine = SheetEngine::new(small_grid());
        engine.set_value(at("F2"), CellValue::from("=F2")).unwrap();
        assert_eq!(engine.computed_value(at("F2")), Some(0.0));
    }

    #[test]
    fn typing_a_sigil_string_creates_a_live_formula() {
        let mut engine = SheetEngine::new(small_grid());
        engine
            .set_value(at("F2"), CellValue::from(r#"=SUMIF(G2:G3, "USD", E2:E3)"#))
            .unwrap();
        assert_eq!(engine.computed_value(at("F2")), Some(7.0));

        // Overwriting with a literal clears the formula again.
        engine.set_value(at("F2"), CellValue::Int(1)).unwrap();
        assert_eq!(engine.computed_value(at("F2")), None);
        assert_eq!(engine.value_at(at("F2")), Value::Number(1.0));
    }
}
