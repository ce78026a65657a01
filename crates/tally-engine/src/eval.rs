use tally_model::{CellRef, Range};

use crate::parser::Expr;
use crate::value::{ErrorKind, Value};

/// Supplies cell values to the evaluator.
///
/// Out-of-bounds references resolve to [`Value::Blank`]; the grid's data
/// model has no notion of a hard reference error inside its own bounds.
pub trait ValueResolver {
    fn value_at(&self, at: CellRef) -> Value;
}

/// Evaluates parsed formula expressions against a resolver.
///
/// Pure: never mutates anything, returns errors as [`Value::Error`] so one
/// bad formula stays local to its cell.
pub struct Evaluator<'a, R: ValueResolver> {
    resolver: &'a R,
}

enum EvalValue {
    Scalar(Value),
    Reference(Range),
}

impl<'a, R: ValueResolver> Evaluator<'a, R> {
    pub fn new(resolver: &'a R) -> Self {
        Self { resolver }
    }

    /// Evaluate an expression to a scalar result.
    pub fn eval(&self, expr: &Expr) -> Value {
        match self.eval_value(expr) {
            EvalValue::Scalar(v) => v,
            EvalValue::Reference(range) => {
                if range.is_single_cell() {
                    self.resolver.value_at(range.start)
                } else {
                    // A multi-cell range used as a scalar has no meaning here.
                    Value::Error(ErrorKind::Value)
                }
            }
        }
    }

    fn eval_value(&self, expr: &Expr) -> EvalValue {
        match expr {
            Expr::Number(n) => EvalValue::Scalar(Value::Number(*n)),
            Expr::Text(s) => EvalValue::Scalar(Value::Text(s.clone())),
            Expr::Cell(cell) => EvalValue::Reference(Range::new(*cell, *cell)),
            Expr::Range(range) => EvalValue::Reference(*range),
            Expr::Call { name, args } => EvalValue::Scalar(self.call(name, args)),
        }
    }

    fn call(&self, name: &str, args: &[Expr]) -> Value {
        match name {
            "SUMIF" => self.sumif(args),
            _ => Value::Error(ErrorKind::Name),
        }
    }

    /// `SUMIF(value_range, criteria, sum_range)`.
    ///
    /// The two ranges resolve to parallel sequences of equal length. For
    /// each index where the value entry exactly equals the scalar criteria
    /// — no wildcard expansion, a deliberate simplification of the
    /// conventional spreadsheet semantics — a numeric sum entry is
    /// accumulated; non-numeric entries at matching indexes are skipped
    /// without error. No match sums to 0.
    fn sumif(&self, args: &[Expr]) -> Value {
        let [value_arg, criteria_arg, sum_arg] = args else {
            return Value::Error(ErrorKind::Value);
        };

        let Some(value_range) = self.as_range(value_arg) else {
            return Value::Error(ErrorKind::Value);
        };
        let Some(sum_range) = self.as_range(sum_arg) else {
            return Value::Error(ErrorKind::Value);
        };
        if value_range.cell_count() != sum_range.cell_count() {
            return Value::Error(ErrorKind::Value);
        }

        let criteria = self.eval(criteria_arg);
        if criteria.is_error() {
            return criteria;
        }

        let mut sum = 0.0;
        for (value_cell, sum_cell) in value_range.iter().zip(sum_range.iter()) {
            if !self.resolver.value_at(value_cell).exactly_equals(&criteria) {
                continue;
            }
            if let Some(n) = self.resolver.value_at(sum_cell).as_number() {
                sum += n;
            }
        }
        Value::Number(sum)
    }

    fn as_range(&self, expr: &Expr) -> Option<Range> {
        match self.eval_value(expr) {
            EvalValue::Reference(range) => Some(range),
            EvalValue::Scalar(_) => None,
        }
    }
}
