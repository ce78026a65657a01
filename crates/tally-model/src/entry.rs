use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One row of a new-transaction entry form.
///
/// The entry surface builds these incrementally as an explicit ordered
/// list; there is no indexed string-key scanning (`debit0`, `debit1`, …)
/// and no loop-termination guessing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryRow {
    pub debit_account: String,
    pub credit_account: String,
    /// Minor units to move.
    pub amount: i64,
    pub commodity_unit: String,
    pub code: i64,
    /// Random hex string of 1–31 characters linking related transfers.
    pub related_id: String,
}

/// A dated batch of entry rows submitted together.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryBatch {
    /// User-chosen date for the whole batch, unix milliseconds.
    pub custom_date: i64,
    pub rows: Vec<EntryRow>,
}

/// Validation failures for an [`EntryBatch`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum EntryValidationError {
    #[error("entry batch has no rows")]
    Empty,
    #[error("row {row}: invalid account name {name:?}, expected `a:`/`l:`/`e:`/`r:`/`x:` prefix")]
    InvalidAccount { row: usize, name: String },
    #[error("row {row}: related id must be 1-31 characters of a-f and/or 0-9")]
    InvalidRelatedId { row: usize },
    #[error("row {row}: commodity unit must not be empty")]
    EmptyUnit { row: usize },
    #[error("row {row}: code must be positive")]
    NonPositiveCode { row: usize },
}

impl EntryBatch {
    /// Check every row against the ledger's naming rules.
    ///
    /// Returns the first violation; batches are small enough that callers
    /// re-validate after fixing a row.
    pub fn validate(&self) -> Result<(), EntryValidationError> {
        if self.rows.is_empty() {
            return Err(EntryValidationError::Empty);
        }
        for (row, entry) in self.rows.iter().enumerate() {
            for name in [&entry.debit_account, &entry.credit_account] {
                if !is_account_name(name) {
                    return Err(EntryValidationError::InvalidAccount {
                        row,
                        name: name.clone(),
                    });
                }
            }
            if !is_hex_id(&entry.related_id) {
                return Err(EntryValidationError::InvalidRelatedId { row });
            }
            if entry.commodity_unit.is_empty() {
                return Err(EntryValidationError::EmptyUnit { row });
            }
            if entry.code < 1 {
                return Err(EntryValidationError::NonPositiveCode { row });
            }
        }
        Ok(())
    }
}

/// Account names are `<kind>:<rest>` where kind is one of the five ledger
/// top-level categories: assets, liabilities, equity, revenue, expenses.
fn is_account_name(name: &str) -> bool {
    let Some((kind, _rest)) = name.split_once(':') else {
        return false;
    };
    matches!(kind, "a" | "l" | "e" | "r" | "x")
}

fn is_hex_id(id: &str) -> bool {
    (1..=31).contains(&id.len())
        && id
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
