//! Export → reopen round-trip: literal cells keep exact value and type,
//! formula cells carry text a compliant reader recomputes to the value the
//! live evaluator produced before export.

use std::collections::HashMap;
use std::io::Read;

use pretty_assertions::assert_eq;
use tally_engine::SheetEngine;
use tally_grid::build;
use tally_model::{CellRef, DateRange, TransferRecord};
use tally_xlsx::{write_grid, SHEET_NAME};

fn record(id: &str, unit: &str, debit: i64, credit: i64) -> TransferRecord {
    TransferRecord {
        transfer_id: id.into(),
        related_id: "beef".into(),
        code: 4,
        debit_account: "a:bank".into(),
        credit_account: "r:salary".into(),
        debit_amount: debit,
        credit_amount: credit,
        commodity_unit: unit.into(),
        commodity_decimal: 2,
        created_at: 1_700_000_000_000,
        custom_date: 1_700_000_000_000,
    }
}

fn read_part(bytes: &[u8], name: &str) -> String {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
    let mut part = archive.by_name(name).unwrap();
    let mut out = String::new();
    part.read_to_string(&mut out).unwrap();
    out
}

/// Minimal reader view of one exported cell.
#[derive(Debug, PartialEq)]
enum ReadCell {
    Number(f64),
    Text(String),
    Formula(String),
}

fn read_sheet(bytes: &[u8]) -> HashMap<String, ReadCell> {
    let shared: Vec<String> = {
        let xml = read_part(bytes, "xl/sharedStrings.xml");
        let doc = roxmltree::Document::parse(&xml).unwrap();
        doc.descendants()
            .filter(|n| n.has_tag_name("t"))
            .map(|n| n.text().unwrap_or_default().to_string())
            .collect()
    };

    let xml = read_part(bytes, "xl/worksheets/sheet1.xml");
    let doc = roxmltree::Document::parse(&xml).unwrap();
    let mut cells = HashMap::new();
    for c in doc.descendants().filter(|n| n.has_tag_name("c")) {
        let r = c.attribute("r").unwrap().to_string();
        if let Some(f) = c.children().find(|n| n.has_tag_name("f")) {
            cells.insert(r, ReadCell::Formula(f.text().unwrap_or_default().into()));
            continue;
        }
        let Some(v) = c.children().find(|n| n.has_tag_name("v")) else {
            continue;
        };
        let raw = v.text().unwrap_or_default();
        let cell = match c.attribute("t") {
            Some("s") => ReadCell::Text(shared[raw.parse::<usize>().unwrap()].clone()),
            _ => ReadCell::Number(raw.parse().unwrap()),
        };
        cells.insert(r, cell);
    }
    cells
}

#[test]
fn workbook_has_one_deterministically_named_sheet() {
    let grid = build(&[record("t1", "EUR", 1, 1)], DateRange::new(0, 1));
    let bytes = write_grid(&grid).unwrap();
    let workbook = read_part(&bytes, "xl/workbook.xml");
    assert!(workbook.contains(r#"<sheet name="export" sheetId="1" r:id="rId1"/>"#));
    assert_eq!(SHEET_NAME, "export");
}

#[test]
fn literals_and_formulas_survive_export() {
    let records = vec![
        record("t1", "EUR", 100, 90),
        record("t2", "USD", 7, 7),
        record("t3", "EUR", 200, 180),
        record("t4", "USD", 11, 11),
    ];
    let grid = build(&records, DateRange::new(0, 1));
    let bytes = write_grid(&grid).unwrap();
    let cells = read_sheet(&bytes);

    // Header and id strings come back exactly.
    assert_eq!(cells["A1"], ReadCell::Text("TransferID".into()));
    assert_eq!(cells["A2"], ReadCell::Text("t1".into()));
    assert_eq!(
        cells["B2"],
        ReadCell::Text("2023-11-14T22:13:20.000Z".into())
    );

    // Raw minor-unit amounts stay numeric and unscaled.
    assert_eq!(cells["E2"], ReadCell::Number(100.0));
    assert_eq!(cells["F4"], ReadCell::Number(180.0));

    // Total rows: native formula cells, sigil stripped.
    assert_eq!(
        cells["E6"],
        ReadCell::Formula(r#"SUMIF(G2:G5, "EUR", E2:E5)"#.into())
    );
    assert_eq!(
        cells["F7"],
        ReadCell::Formula(r#"SUMIF(G2:G5, "USD", F2:F5)"#.into())
    );
    assert_eq!(cells["A6"], ReadCell::Text("Totals:".into()));
    assert!(!cells.contains_key("A7"));

    // Padding rows are implicit (no cells past the total rows).
    assert!(!cells.contains_key("A8"));
}

#[test]
fn reader_recomputation_matches_live_evaluator() {
    let records = vec![
        record("t1", "EUR", 100, 90),
        record("t2", "USD", 7, 7),
        record("t3", "EUR", 200, 180),
    ];
    let grid = build(&records, DateRange::new(0, 1));
    let engine = SheetEngine::new(grid.clone());
    let live_eur_debit = engine
        .computed_value(CellRef::from_a1("E5").unwrap())
        .unwrap();

    let bytes = write_grid(&grid).unwrap();
    let cells = read_sheet(&bytes);

    // A compliant reader recomputes SUMIF over the exported literals; the
    // naive reducer here stands in for that reader.
    let naive: f64 = records
        .iter()
        .filter(|r| r.commodity_unit == "EUR")
        .map(|r| r.debit_amount as f64)
        .sum();
    assert_eq!(
        cells["E5"],
        ReadCell::Formula(r#"SUMIF(G2:G4, "EUR", E2:E4)"#.into())
    );
    assert_eq!(naive, live_eur_debit);
    assert_eq!(naive, 300.0);
}

#[test]
fn export_failure_surfaces_as_io_error() {
    let grid = build(&[record("t1", "EUR", 1, 1)], DateRange::new(0, 1));
    let err = tally_xlsx::write_grid_to_file(&grid, "/nonexistent-dir/export.xlsx").unwrap_err();
    assert!(matches!(err, tally_xlsx::XlsxWriteError::Io(_)));
}
