//! Annotated CSV format for table files.
//!
//! ```text
//! ### META ###
//! entity,Emissions|CO2
//! source,SRC_2020
//! unit,Mt CO2
//! ### DATA ###
//! region,2000,2001
//! ZAF,1.5,
//! ```
//!
//! Metadata lines are sorted by key. Empty data cells are missing values.

use std::fs;
use std::path::Path;

use crate::table::data::{Cell, DataTable};
use crate::table::error::{TableError, TableResult};
use crate::table::meta::TableMeta;

pub const META_MARKER: &str = "### META ###";
pub const DATA_MARKER: &str = "### DATA ###";
const REGION_HEADER: &str = "region";

fn format_error(path: &Path, reason: impl Into<String>) -> TableError {
    TableError::Format {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> TableResult<Vec<u8>> {
    wtr.into_inner()
        .map_err(|e| TableError::Io(e.into_error()))
}

/// Serialize a table to the annotated CSV text.
pub fn to_csv_string(table: &DataTable) -> TableResult<String> {
    let mut out = String::new();
    out.push_str(META_MARKER);
    out.push('\n');

    let mut meta = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    for (key, value) in table.meta.iter() {
        meta.write_record([key, value])?;
    }
    out.push_str(&String::from_utf8_lossy(&finish(meta)?));

    out.push_str(DATA_MARKER);
    out.push('\n');

    let mut data = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    let mut header = vec![REGION_HEADER.to_string()];
    header.extend(table.columns().iter().cloned());
    data.write_record(&header)?;
    for (region, cells) in table.rows() {
        let mut record = Vec::with_capacity(cells.len() + 1);
        record.push(region.to_string());
        record.extend(cells.iter().map(Cell::to_string));
        data.write_record(&record)?;
    }
    out.push_str(&String::from_utf8_lossy(&finish(data)?));

    Ok(out)
}

/// Parse annotated CSV text; `origin` only names the source in errors.
///
/// The section markers count only as lines of their own, so a quoted
/// metadata value may contain them. Metadata values are kept verbatim.
pub fn from_csv_str(text: &str, origin: &Path) -> TableResult<DataTable> {
    let text = text.trim_start_matches('\u{feff}');
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let is_marker = |record: &csv::StringRecord, marker: &str| {
        record.len() == 1 && record.get(0).map(str::trim) == Some(marker)
    };

    let mut record = csv::StringRecord::new();
    if !rdr.read_record(&mut record)? || !is_marker(&record, META_MARKER) {
        return Err(format_error(origin, "missing meta section"));
    }

    let mut meta = TableMeta::new();
    let body_start = loop {
        if !rdr.read_record(&mut record)? {
            return Err(format_error(origin, "missing data section"));
        }
        if is_marker(&record, DATA_MARKER) {
            break rdr.position().byte() as usize;
        }
        let key = record.get(0).unwrap_or("").trim();
        if key.is_empty() {
            continue;
        }
        meta.set(key, record.get(1).unwrap_or(""));
    };
    let body = text.get(body_start..).unwrap_or("");

    let body = body.trim_start_matches(['\r', '\n']);
    if body.trim().is_empty() {
        return Ok(DataTable::empty(meta));
    }

    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());
    let headers = rdr.headers()?.clone();
    let columns: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();

    let mut regions = Vec::new();
    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let mut fields = record.iter();
        let region = fields.next().unwrap_or("").to_string();
        let row: Vec<Cell> = fields.map(Cell::parse).collect();
        if row.len() != columns.len() {
            return Err(format_error(
                origin,
                format!("row {} has {} values for {} columns", region, row.len(), columns.len()),
            ));
        }
        regions.push(region);
        rows.push(row);
    }

    DataTable::from_cells(regions, columns, rows, meta)
}

/// Write a table file, creating parent directories as needed.
pub fn write_table(table: &DataTable, path: &Path) -> TableResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, to_csv_string(table)?)?;
    Ok(())
}

/// Read a table file.
pub fn read_table(path: &Path) -> TableResult<DataTable> {
    let text = fs::read_to_string(path)?;
    from_csv_str(&text, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn sample() -> DataTable {
        let mut meta = TableMeta::from_pairs([
            ("entity", "Emissions|CO2"),
            ("category", "Total"),
            ("scenario", "Historic"),
            ("source", "SRC_2020"),
            ("unit", "Mt CO2"),
            ("note", "quoted, with comma"),
        ]);
        meta.assign_id().unwrap();
        DataTable::new(
            vec!["DEU".into(), "ZAF".into()],
            vec![2000, 2001, 2010],
            vec![
                vec![Some(0.1), None, Some(-3.25)],
                vec![Some(1e-7), Some(123456789.5), None],
            ],
            meta,
        )
        .unwrap()
    }

    #[test]
    fn test_layout() {
        let text = to_csv_string(&sample()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], META_MARKER);
        assert!(lines.contains(&"unit,Mt CO2"));
        assert!(lines.contains(&"note,\"quoted, with comma\""));
        let data = lines.iter().position(|l| *l == DATA_MARKER).unwrap();
        assert_eq!(lines[data + 1], "region,2000,2001,2010");
        assert_eq!(lines[data + 2], "DEU,0.1,,-3.25");
    }

    #[test]
    fn test_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tables").join("t.csv");
        let table = sample();

        write_table(&table, &path).unwrap();
        let back = read_table(&path).unwrap();

        assert_eq!(back, table);
        assert_eq!(back.id(), table.id());
    }

    #[test]
    fn test_non_numeric_cells_survive_parsing() {
        let text = "### META ###\nentity,X\n### DATA ###\nregion,2000\nZAF,abc\n";
        let table = from_csv_str(text, Path::new("x.csv")).unwrap();
        assert_eq!(table.cell(0, 0), &Cell::Text("abc".into()));
    }

    #[test]
    fn test_missing_sections() {
        let err = from_csv_str("region,2000\nZAF,1\n", Path::new("x.csv")).unwrap_err();
        assert!(matches!(err, TableError::Format { .. }));

        let err = from_csv_str("### DATA ###\nregion,2000\n", Path::new("x.csv")).unwrap_err();
        assert!(matches!(err, TableError::Format { .. }));
    }

    #[test]
    fn test_meta_values_are_kept_verbatim() {
        let mut table = sample();
        table.meta.set("note", "  padded  ");
        table.meta.set("comment", DATA_MARKER);
        table.meta.set("history", format!("first\n{}\nsecond", DATA_MARKER));

        let back = from_csv_str(&to_csv_string(&table).unwrap(), Path::new("x.csv")).unwrap();
        assert_eq!(back.meta.get("note"), Some("  padded  "));
        assert_eq!(back.meta.get("comment"), Some(DATA_MARKER));
        assert_eq!(
            back.meta.get("history"),
            Some(format!("first\n{}\nsecond", DATA_MARKER).as_str())
        );
        assert_eq!(back, table);
    }

    #[test]
    fn test_empty_data_section() {
        let table = from_csv_str("### META ###\nentity,X\n### DATA ###\n", Path::new("x.csv")).unwrap();
        assert_eq!(table.shape(), (0, 0));
        assert_eq!(table.meta.get("entity"), Some("X"));
    }
}
