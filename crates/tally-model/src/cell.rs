use serde::{Deserialize, Serialize};

use crate::CellValue;

/// Marker character identifying a cell's string content as a live formula
/// rather than a literal.
pub const FORMULA_SIGIL: char = '=';

/// A single cell record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    /// The cell's literal value, or the sigil-prefixed live formula text.
    #[serde(default)]
    pub value: CellValue,

    /// Sigil-free formula text, if the cell contains a formula.
    ///
    /// Mirrors `value` for formula cells so consumers don't have to strip
    /// the sigil themselves.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,

    /// Read-only cells (header, generated total rows) reject interactive
    /// edits; the builder is the only thing that writes them.
    #[serde(default)]
    pub read_only: bool,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            value: CellValue::Empty,
            formula: None,
            read_only: false,
        }
    }
}

impl Cell {
    /// Create an editable cell with the given literal value.
    pub fn new(value: impl Into<CellValue>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }

    /// Create a read-only cell with the given literal value.
    pub fn read_only(value: impl Into<CellValue>) -> Self {
        Self {
            value: value.into(),
            read_only: true,
            ..Self::default()
        }
    }

    /// Create a read-only formula cell from sigil-free formula text.
    ///
    /// The live representation stores the sigil form in `value` (what an
    /// editing surface displays and re-parses) and mirrors the bare text in
    /// `formula`.
    pub fn from_formula(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            value: CellValue::String(format!("{FORMULA_SIGIL}{text}")),
            formula: Some(text),
            read_only: true,
        }
    }

    /// Returns true if the cell holds a live formula.
    pub fn is_formula(&self) -> bool {
        self.formula_text().is_some()
    }

    /// Sigil-free formula text, if this cell is a formula cell.
    ///
    /// Prefers the mirrored `formula` field; falls back to stripping the
    /// sigil from a string value, so externally supplied cells that only
    /// carry the sigil form are still recognized.
    pub fn formula_text(&self) -> Option<&str> {
        if let Some(f) = self.formula.as_deref() {
            return Some(f);
        }
        self.value.as_str()?.strip_prefix(FORMULA_SIGIL)
    }

    /// Returns true if this cell has no observable content.
    pub fn is_truly_empty(&self) -> bool {
        self.value.is_empty() && self.formula.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn formula_cell_carries_sigil_and_mirror() {
        let cell = Cell::from_formula(r#"SUMIF(G2:G5, "EUR", E2:E5)"#);
        assert!(cell.is_formula());
        assert!(cell.read_only);
        assert_eq!(cell.formula_text(), Some(r#"SUMIF(G2:G5, "EUR", E2:E5)"#));
        assert_eq!(
            cell.value,
            CellValue::String(r#"=SUMIF(G2:G5, "EUR", E2:E5)"#.to_string())
        );
    }

    #[test]
    fn sigil_only_cell_is_recognized() {
        // A cell edited in place to "=1" has no mirrored formula field.
        let cell = Cell::new("=1");
        assert!(cell.is_formula());
        assert_eq!(cell.formula_text(), Some("1"));
    }

    #[test]
    fn literal_cells_are_not_formulas() {
        assert!(!Cell::new("EUR").is_formula());
        assert!(!Cell::new(42i64).is_formula());
        assert!(Cell::default().is_truly_empty());
    }
}
