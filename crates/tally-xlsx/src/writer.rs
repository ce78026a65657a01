use std::collections::HashMap;
use std::fs::File;
use std::io::{Cursor, Seek, Write};
use std::path::Path;

use thiserror::Error;
use zip::ZipWriter;

use tally_model::{Cell, CellRef, CellValue, Grid};

/// Name of the single exported worksheet.
pub const SHEET_NAME: &str = "export";

#[derive(Debug, Error)]
pub enum XlsxWriteError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// Serialize a grid snapshot into XLSX bytes.
///
/// Rows whose width differs from the header's are written as-is and logged
/// as structural violations; they are never dropped or coerced here.
pub fn write_grid(grid: &Grid) -> Result<Vec<u8>, XlsxWriteError> {
    let mut buffer = Cursor::new(Vec::new());
    write_grid_to_writer(grid, &mut buffer)?;
    Ok(buffer.into_inner())
}

/// Serialize a grid snapshot to a file (the downloadable artifact).
pub fn write_grid_to_file(grid: &Grid, path: impl AsRef<Path>) -> Result<(), XlsxWriteError> {
    let file = File::create(path)?;
    write_grid_to_writer(grid, file)
}

fn write_grid_to_writer<W: Write + Seek>(grid: &Grid, writer: W) -> Result<(), XlsxWriteError> {
    for violation in grid.check_structure() {
        log::warn!("exporting grid with structural violation: {violation}");
    }

    let shared_strings = build_shared_strings(grid);

    let mut zip = ZipWriter::new(writer);
    let options = zip::write::FileOptions::<()>::default()
        .compression_method(zip::CompressionMethod::Deflated);

    zip.start_file("[Content_Types].xml", options)?;
    zip.write_all(content_types_xml(&shared_strings).as_bytes())?;

    zip.start_file("_rels/.rels", options)?;
    zip.write_all(root_rels_xml().as_bytes())?;

    zip.start_file("xl/workbook.xml", options)?;
    zip.write_all(workbook_xml().as_bytes())?;

    zip.start_file("xl/_rels/workbook.xml.rels", options)?;
    zip.write_all(workbook_rels_xml(!shared_strings.values.is_empty()).as_bytes())?;

    zip.start_file("xl/styles.xml", options)?;
    zip.write_all(styles_xml().as_bytes())?;

    if !shared_strings.values.is_empty() {
        zip.start_file("xl/sharedStrings.xml", options)?;
        zip.write_all(shared_strings_xml(&shared_strings).as_bytes())?;
    }

    zip.start_file("xl/worksheets/sheet1.xml", options)?;
    zip.write_all(sheet_xml(grid, &shared_strings).as_bytes())?;

    zip.finish()?;
    Ok(())
}

fn root_rels_xml() -> String {
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#
        .to_owned()
}

fn workbook_xml() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <sheets>
    <sheet name="{}" sheetId="1" r:id="rId1"/>
  </sheets>
</workbook>"#,
        escape_xml(SHEET_NAME)
    )
}

fn workbook_rels_xml(has_shared_strings: bool) -> String {
    let mut rels = String::new();
    rels.push_str(
        r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>"#,
    );
    let mut next = 2;
    if has_shared_strings {
        rels.push_str(&format!(
            r#"<Relationship Id="rId{next}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/>"#
        ));
        next += 1;
    }
    rels.push_str(&format!(
        r#"<Relationship Id="rId{next}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#
    ));

    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  {rels}
</Relationships>"#
    )
}

fn content_types_xml(shared_strings: &SharedStrings) -> String {
    let mut overrides = String::new();
    overrides.push_str(
        r#"<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#,
    );
    overrides.push_str(
        r#"<Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
    );
    overrides.push_str(
        r#"<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#,
    );
    if !shared_strings.values.is_empty() {
        overrides.push_str(
            r#"<Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/>"#,
        );
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="xml" ContentType="application/xml"/>
  {overrides}
</Types>"#
    )
}

fn styles_xml() -> String {
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts>
  <fills count="1"><fill><patternFill patternType="none"/></fill></fills>
  <borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders>
  <cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>
  <cellXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/></cellXfs>
  <cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>
</styleSheet>"#
        .to_owned()
}

fn sheet_xml(grid: &Grid, shared_strings: &SharedStrings) -> String {
    let mut sheet_data = String::new();
    for (row_index, row) in grid.rows().iter().enumerate() {
        let mut row_xml = String::new();
        for (col_index, cell) in row.iter().enumerate() {
            let cell_ref = CellRef::new(row_index as u32, col_index as u32);
            if let Some(xml) = cell_xml(cell_ref, cell, shared_strings) {
                row_xml.push_str(&xml);
            }
        }
        // Fully empty rows stay implicit, the usual sparse encoding.
        if !row_xml.is_empty() {
            sheet_data.push_str(&format!(r#"<row r="{}">"#, row_index + 1));
            sheet_data.push_str(&row_xml);
            sheet_data.push_str("</row>");
        }
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <sheetData>
    {sheet_data}
  </sheetData>
</worksheet>"#
    )
}

/// One `<c>` element, or `None` for a cell with nothing to encode.
///
/// A sigil-marked live formula becomes a native formula cell with the sigil
/// stripped and no cached result; any compliant reader recomputes it.
/// Literals keep their type: integers and floats as plain `<v>`, strings
/// via the shared-string table, booleans as `t="b"`.
fn cell_xml(cell_ref: CellRef, cell: &Cell, shared_strings: &SharedStrings) -> Option<String> {
    let a1 = cell_ref.to_a1();

    if let Some(formula) = cell.formula_text() {
        return Some(format!(r#"<c r="{a1}"><f>{}</f></c>"#, escape_xml(formula)));
    }

    match &cell.value {
        CellValue::Empty => None,
        CellValue::Int(i) => Some(format!(r#"<c r="{a1}"><v>{i}</v></c>"#)),
        CellValue::Number(n) => Some(format!(r#"<c r="{a1}"><v>{n}</v></c>"#)),
        CellValue::String(s) => match shared_strings.index.get(s) {
            Some(idx) => Some(format!(r#"<c r="{a1}" t="s"><v>{idx}</v></c>"#)),
            None => {
                // Table and cells are built from the same grid, so a miss
                // means the snapshot changed underneath us. Inline the text
                // rather than point at some other table entry.
                log::warn!("string at {a1} missing from shared-string table, inlining");
                Some(format!(
                    r#"<c r="{a1}" t="inlineStr"><is><t>{}</t></is></c>"#,
                    escape_xml(s)
                ))
            }
        },
        CellValue::Boolean(b) => Some(format!(
            r#"<c r="{a1}" t="b"><v>{}</v></c>"#,
            if *b { 1 } else { 0 }
        )),
    }
}

#[derive(Debug, Clone, Default)]
struct SharedStrings {
    values: Vec<String>,
    index: HashMap<String, usize>,
}

fn build_shared_strings(grid: &Grid) -> SharedStrings {
    let mut shared = SharedStrings::default();
    for (_, cell) in grid.iter_cells() {
        // Formula cells serialize as `<f>`, not as strings.
        if cell.is_formula() {
            continue;
        }
        if let CellValue::String(s) = &cell.value {
            if !shared.index.contains_key(s) {
                shared.index.insert(s.clone(), shared.values.len());
                shared.values.push(s.clone());
            }
        }
    }
    shared
}

fn shared_strings_xml(shared: &SharedStrings) -> String {
    let count = shared.values.len();
    let mut si = String::new();
    for v in &shared.values {
        si.push_str(&format!(r#"<si><t>{}</t></si>"#, escape_xml(v)));
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="{count}" uniqueCount="{count}">
  {si}
</sst>"#
    )
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn shared_for(cells: &[&Cell]) -> SharedStrings {
        let grid = Grid::from_rows(vec![cells.iter().map(|c| (*c).clone()).collect()]);
        build_shared_strings(&grid)
    }

    #[test]
    fn formula_cells_strip_the_sigil() {
        let cell = Cell::from_formula(r#"SUMIF(G2:G5, "EUR", E2:E5)"#);
        let xml = cell_xml(CellRef::new(5, 4), &cell, &SharedStrings::default()).unwrap();
        assert_eq!(
            xml,
            r#"<c r="E6"><f>SUMIF(G2:G5, &quot;EUR&quot;, E2:E5)</f></c>"#
        );
    }

    #[test]
    fn literal_types_are_preserved() {
        let int_cell = Cell::new(-12345i64);
        assert_eq!(
            cell_xml(CellRef::new(0, 0), &int_cell, &SharedStrings::default()).unwrap(),
            r#"<c r="A1"><v>-12345</v></c>"#
        );

        let text_cell = Cell::new("a:bank");
        let shared = shared_for(&[&text_cell]);
        assert_eq!(
            cell_xml(CellRef::new(0, 1), &text_cell, &shared).unwrap(),
            r#"<c r="B1" t="s"><v>0</v></c>"#
        );

        let bool_cell = Cell::new(true);
        assert_eq!(
            cell_xml(CellRef::new(0, 2), &bool_cell, &SharedStrings::default()).unwrap(),
            r#"<c r="C1" t="b"><v>1</v></c>"#
        );

        assert_eq!(
            cell_xml(CellRef::new(0, 3), &Cell::default(), &SharedStrings::default()),
            None
        );
    }

    #[test]
    fn unindexed_string_is_inlined_not_misnumbered() {
        let other = Cell::new("present");
        let shared = shared_for(&[&other]);
        let orphan = Cell::new("orphan");
        assert_eq!(
            cell_xml(CellRef::new(0, 0), &orphan, &shared).unwrap(),
            r#"<c r="A1" t="inlineStr"><is><t>orphan</t></is></c>"#
        );
    }

    #[test]
    fn shared_strings_skip_formula_sigils() {
        let formula = Cell::from_formula("SUMIF(A1:A2, \"x\", B1:B2)");
        let text = Cell::new("x");
        let shared = shared_for(&[&formula, &text, &text]);
        assert_eq!(shared.values, vec!["x".to_string()]);
    }

    #[test]
    fn malformed_rows_are_still_written() {
        let grid = Grid::from_rows(vec![
            vec![Cell::read_only("A"), Cell::read_only("B")],
            vec![Cell::new(1i64)], // short row, logged and kept
        ]);
        let bytes = write_grid(&grid).unwrap();
        assert!(!bytes.is_empty());
    }

    #[test]
    fn xml_escaping_covers_markup_characters() {
        assert_eq!(escape_xml(r#"<a & "b">"#), "&lt;a &amp; &quot;b&quot;&gt;");
    }
}
