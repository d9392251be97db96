//! CSV helpers shared by statement, extraction and reconciliation files.
//!
//! Output files start with a UTF-8 byte-order mark so spreadsheet tools
//! render the `£` sign correctly; readers accept files with or without one.

use serde::Serialize;
use serde::de::DeserializeOwned;

pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[must_use]
pub fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes)
}

/// Header-aware reader that tolerates ragged rows and a leading BOM.
#[must_use]
pub fn reader(bytes: &[u8]) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(strip_bom(bytes))
}

/// A row type written to one of the output files.
pub trait CsvRow: Serialize {
    /// Column names, in serialization order.
    const HEADER: &'static [&'static str];
}

/// Serialize rows into BOM-prefixed CSV. The header row is always written,
/// even when there are no rows.
///
/// # Errors
///
/// Returns an error if a row cannot be serialized.
pub fn write_rows<T: CsvRow>(rows: &[T]) -> Result<Vec<u8>, csv::Error> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(UTF8_BOM.to_vec());
    wtr.write_record(T::HEADER)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.into_inner().map_err(|e| csv::Error::from(e.into_error()))
}

/// Deserialize every row of a headered CSV.
///
/// # Errors
///
/// Returns an error if the CSV is malformed or a row does not fit `T`.
pub fn read_rows<T: DeserializeOwned>(bytes: &[u8]) -> Result<Vec<T>, csv::Error> {
    reader(bytes).deserialize().collect()
}

/// Read a headered CSV as one JSON object per row, keyed by header.
///
/// # Errors
///
/// Returns an error if the CSV is malformed.
pub fn read_records(bytes: &[u8]) -> Result<Vec<serde_json::Map<String, serde_json::Value>>, csv::Error> {
    let mut rdr = reader(bytes);
    let headers = rdr.headers()?.clone();
    let mut out = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let row = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.to_string(), serde_json::Value::String(record.get(i).unwrap_or("").to_string())))
            .collect();
        out.push(row);
    }
    Ok(out)
}
