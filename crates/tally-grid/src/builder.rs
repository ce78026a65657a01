use chrono::{SecondsFormat, TimeZone, Utc};

use tally_model::{Cell, CellRef, DateRange, Grid, TransferRecord};

/// Header labels, in column order.
pub const COLUMNS: [&str; 10] = [
    "TransferID",
    "Created",
    "DebitAccount",
    "CreditAccount",
    "DebitAmount",
    "CreditAmount",
    "Unit",
    "Code",
    "RelatedID",
    "CustomDate",
];

/// Fixed column count every row must match.
pub const COLUMN_COUNT: usize = COLUMNS.len();

/// Number of fully empty rows appended for manual editing headroom.
pub const PADDING_ROWS: usize = 20;

const COL_DEBIT_AMOUNT: u32 = 4;
const COL_CREDIT_AMOUNT: u32 = 5;
const COL_UNIT: u32 = 6;

/// Materialize transfer records into a grid.
///
/// Row layout: header, one row per record in input order, one total row per
/// distinct commodity unit in first-seen order, then [`PADDING_ROWS`] empty
/// rows. Amounts stay raw minor-unit integers — the total formulas sum them
/// directly, and display scaling is `format_amount`'s job elsewhere.
///
/// The date range identifies the window the records were fetched for; the
/// upstream query already filtered by it, so it only participates in
/// rebuild identity here.
pub fn build(records: &[TransferRecord], date_range: DateRange) -> Grid {
    log::debug!(
        "rebuilding grid: {} records, window {}..{}",
        records.len(),
        date_range.start,
        date_range.end
    );

    let mut rows = Vec::with_capacity(1 + records.len() + PADDING_ROWS);
    rows.push(header_row());
    rows.extend(records.iter().map(record_row));
    rows.extend(total_rows(records));
    rows.extend((0..PADDING_ROWS).map(|_| empty_row()));

    let grid = Grid::from_rows(rows);
    for violation in grid.check_structure() {
        // Lenient on purpose: the malformed row is kept and rendered.
        log::warn!("structural violation in built grid: {violation}");
    }
    grid
}

/// Distinct commodity units in first-seen order, each with the 0-indexed
/// positions (within `records`) of the records carrying that unit.
///
/// An empty unit string is a valid group key like any other. The grouping
/// is derived per build and never stored independently of a grid.
pub fn currency_groups(records: &[TransferRecord]) -> Vec<(String, Vec<usize>)> {
    let mut groups: Vec<(String, Vec<usize>)> = Vec::new();
    for (index, record) in records.iter().enumerate() {
        match groups
            .iter_mut()
            .find(|(unit, _)| *unit == record.commodity_unit)
        {
            Some((_, members)) => members.push(index),
            None => groups.push((record.commodity_unit.clone(), vec![index])),
        }
    }
    groups
}

fn header_row() -> Vec<Cell> {
    COLUMNS.iter().map(|label| Cell::read_only(*label)).collect()
}

fn record_row(record: &TransferRecord) -> Vec<Cell> {
    vec![
        Cell::new(record.transfer_id.as_str()),
        Cell::new(iso_timestamp(record.created_at)),
        Cell::new(record.debit_account.as_str()),
        Cell::new(record.credit_account.as_str()),
        Cell::new(record.debit_amount),
        Cell::new(record.credit_amount),
        Cell::new(record.commodity_unit.as_str()),
        Cell::new(record.code),
        Cell::new(record.related_id.as_str()),
        Cell::new(iso_timestamp(record.custom_date)),
    ]
}

/// One total row per distinct unit. The "Totals:" label appears on the
/// first total row only; each row carries a debit and a credit `SUMIF`
/// over the full data-row range plus the unit string in the Unit column.
fn total_rows(records: &[TransferRecord]) -> Vec<Vec<Cell>> {
    let groups = currency_groups(records);
    groups
        .iter()
        .enumerate()
        .map(|(position, (unit, _))| {
            let mut row = empty_row();
            if position == 0 {
                row[0] = Cell::read_only("Totals:");
            }
            row[COL_DEBIT_AMOUNT as usize] =
                Cell::from_formula(sumif_formula(records.len(), unit, COL_DEBIT_AMOUNT));
            row[COL_CREDIT_AMOUNT as usize] =
                Cell::from_formula(sumif_formula(records.len(), unit, COL_CREDIT_AMOUNT));
            row[COL_UNIT as usize] = Cell::read_only(unit.as_str());
            row
        })
        .collect()
}

/// `SUMIF(G2:G<n>, "<unit>", E2:E<n>)` over the full data-row span.
///
/// Data rows start right after the header, so the 0-indexed span is
/// `1..=record_count`. Double quotes in the unit are doubled, the usual
/// quote escape in formula text.
fn sumif_formula(record_count: usize, unit: &str, amount_col: u32) -> String {
    // Always the explicit `start:end` form, even for a single data row.
    let span = |col: u32| {
        let start = CellRef::new(1, col);
        let end = CellRef::new(record_count as u32, col);
        format!("{start}:{end}")
    };
    let unit = unit.replace('"', "\"\"");
    format!(
        "SUMIF({}, \"{unit}\", {})",
        span(COL_UNIT),
        span(amount_col)
    )
}

fn empty_row() -> Vec<Cell> {
    (0..COLUMN_COUNT).map(|_| Cell::default()).collect()
}

/// Unix milliseconds → ISO-8601 with millisecond precision (`…T…Z`).
fn iso_timestamp(unix_ms: i64) -> String {
    match Utc.timestamp_millis_opt(unix_ms).single() {
        Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Millis, true),
        None => {
            log::warn!("timestamp out of chrono range: {unix_ms}");
            unix_ms.to_string()
        }
    }
}
