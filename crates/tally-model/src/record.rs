use serde::{Deserialize, Serialize};

/// One ledger transfer as supplied by the upstream query layer.
///
/// Records are immutable inputs: the grid builder reads them, nothing in
/// this core ever writes them back. Amounts are signed 64-bit minor-unit
/// integers; timestamps are unix milliseconds. The wire form is camelCase
/// to match the ledger server's JSON.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRecord {
    /// Random hex u128 string identifying the transfer.
    pub transfer_id: String,
    /// Random hex u128 string linking related transfers.
    pub related_id: String,
    /// Transaction code.
    pub code: i64,
    /// Account the amount was added to.
    pub debit_account: String,
    /// Account the amount was removed from.
    pub credit_account: String,
    /// Minor units added to the debit account.
    pub debit_amount: i64,
    /// Minor units removed from the credit account.
    pub credit_amount: i64,
    /// Commodity the amounts are denominated in.
    pub commodity_unit: String,
    /// Number of fractional digits separating minor units from the display value.
    pub commodity_decimal: u32,
    /// Unix milliseconds the transfer was recorded.
    pub created_at: i64,
    /// User-chosen date, unix milliseconds.
    pub custom_date: i64,
}

/// The date window a grid was built for, unix milliseconds.
///
/// The upstream query already filtered records to this window; the builder
/// carries the range as part of rebuild identity and does not filter again.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: i64,
    pub end: i64,
}

impl DateRange {
    pub const fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn record_wire_form_is_camel_case() {
        let json = r#"{
            "transferId": "ab12",
            "relatedId": "cd34",
            "code": 7,
            "debitAccount": "a:bank",
            "creditAccount": "r:salary",
            "debitAmount": 12345,
            "creditAmount": 12345,
            "commodityUnit": "EUR",
            "commodityDecimal": 2,
            "createdAt": 1700000000000,
            "customDate": 1700000000000
        }"#;
        let record: TransferRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.transfer_id, "ab12");
        assert_eq!(record.debit_amount, 12345);
        assert_eq!(record.commodity_decimal, 2);

        let back = serde_json::to_string(&record).unwrap();
        assert!(back.contains(r#""commodityUnit":"EUR""#));
    }
}
