use std::fmt;

use tally_model::CellValue;

/// Evaluation error categories, rendered in the usual spreadsheet codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Wrong argument shape or type (mismatched range lengths, bad criteria).
    Value,
    /// Reference outside the grid.
    Ref,
    /// Unknown function name.
    Name,
}

impl ErrorKind {
    pub fn as_code(self) -> &'static str {
        match self {
            ErrorKind::Value => "#VALUE!",
            ErrorKind::Ref => "#REF!",
            ErrorKind::Name => "#NAME?",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}

/// Scalar value flowing through the evaluator.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Blank,
    Number(f64),
    Text(String),
    Bool(bool),
    Error(ErrorKind),
}

impl Value {
    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Exact equality as the grid's SUMIF defines it: same type, same
    /// content. No coercion, no wildcard expansion, text is case-sensitive.
    pub fn exactly_equals(&self, other: &Value) -> bool {
        self == other
    }
}

impl From<&CellValue> for Value {
    fn from(value: &CellValue) -> Self {
        match value {
            CellValue::Empty => Value::Blank,
            CellValue::Int(i) => Value::Number(*i as f64),
            CellValue::Number(n) => Value::Number(*n),
            CellValue::String(s) => Value::Text(s.clone()),
            CellValue::Boolean(b) => Value::Bool(*b),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Blank => Ok(()),
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(s) => f.write_str(s),
            Value::Bool(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
            Value::Error(e) => write!(f, "{e}"),
        }
    }
}
