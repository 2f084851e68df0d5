//! Raw tabular input.
//!
//! Everything is read as text: every column of the source CSV comes back as a
//! `String` column so that header detection and coordinate validation can happen
//! downstream with full knowledge of the original cell contents.

use std::io::Cursor;
use std::path::Path;

use polars::prelude::*;
use tracing::{debug, info, instrument, warn};

mod source;

pub use super::error::Result;
use crate::DataError;
pub use source::{SourceId, SourceMetadata};

const UTF8_BOM: char = '\u{feff}';

/// A header row plus string cells, stored column-major.
///
/// `None` marks a missing cell. Blank cells read from CSV are normalised to `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    headers: Vec<String>,
    columns: Vec<Vec<Option<String>>>,
    height: usize,
}

/// A parsed source together with its identity.
#[derive(Debug, Clone)]
pub struct LoadedSource {
    pub table: RawTable,
    pub metadata: SourceMetadata,
}

/// Trim surrounding whitespace and a leading UTF-8 byte order mark.
pub fn normalize_header(value: &str) -> String {
    value.trim_start_matches(UTF8_BOM).trim().to_string()
}

fn normalize_cell(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

impl RawTable {
    /// Build a table from row-major records. Empty strings become missing cells.
    pub fn from_records<H, R, S>(headers: &[H], records: impl IntoIterator<Item = R>) -> Result<Self>
    where
        H: AsRef<str>,
        R: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if headers.is_empty() {
            return Err(DataError::MissingHeader);
        }
        let headers: Vec<String> = headers
            .iter()
            .map(|h| normalize_header(h.as_ref()))
            .collect();
        let mut columns = vec![Vec::new(); headers.len()];
        let mut height = 0;

        for (row, record) in records.into_iter().enumerate() {
            let cells: Vec<Option<String>> = record
                .into_iter()
                .map(|cell| normalize_cell(Some(cell.as_ref())))
                .collect();
            if cells.len() != headers.len() {
                return Err(DataError::RaggedRow {
                    row,
                    expected: headers.len(),
                    found: cells.len(),
                });
            }
            for (column, cell) in columns.iter_mut().zip(cells) {
                column.push(cell);
            }
            height += 1;
        }

        Ok(Self {
            headers,
            columns,
            height,
        })
    }

    /// Convert a polars frame into a string table. Non-string columns are cast.
    pub fn from_dataframe(df: &DataFrame) -> Result<Self> {
        let headers: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|name| normalize_header(name.as_str()))
            .collect();
        if headers.is_empty() {
            return Err(DataError::MissingHeader);
        }

        let mut columns = Vec::with_capacity(df.width());
        for column in df.get_columns() {
            let column = column.cast(&DataType::String)?;
            let values: Vec<Option<String>> =
                column.str()?.into_iter().map(normalize_cell).collect();
            columns.push(values);
        }

        Ok(Self {
            headers,
            columns,
            height: df.height(),
        })
    }

    /// Header names in their original column order.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Number of data rows.
    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.height == 0
    }

    /// Position of a header, exact match.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Cell value at `(row, column)`; `None` for missing or out of bounds.
    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.columns
            .get(column)
            .and_then(|values| values.get(row))
            .and_then(Option::as_deref)
    }
}

/// Parse CSV bytes into a [`RawTable`], reading every column as text.
#[instrument(name = "Parse CSV", skip_all, level = "debug")]
pub fn read_csv_bytes(bytes: &[u8]) -> Result<RawTable> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(DataError::MissingHeader);
    }
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .map_parse_options(|opts| opts.with_encoding(CsvEncoding::LossyUtf8))
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()?;
    debug!(rows = df.height(), columns = df.width(), "CSV parsed");
    RawTable::from_dataframe(&df)
}

/// Read and parse a CSV file, fingerprinting its contents.
#[instrument(name = "Load CSV source", skip_all, level = "info", fields(path = %path.as_ref().display()))]
pub fn load_csv(path: impl AsRef<Path>) -> Result<LoadedSource> {
    let path = path.as_ref();
    if !path.exists() {
        warn!("Data file does not exist");
        return Err(DataError::SourceNotFound(path.display().to_string()));
    }
    let bytes = std::fs::read(path)?;
    load_csv_bytes(path.display().to_string(), &bytes)
}

/// Parse CSV content that did not come from a file (e.g. an upload).
pub fn load_csv_bytes(name: impl Into<String>, bytes: &[u8]) -> Result<LoadedSource> {
    let t_read = std::time::Instant::now();
    let id = SourceId::of_bytes(bytes);
    let table = read_csv_bytes(bytes)?;
    let metadata = SourceMetadata::new(name, id, &table);
    info!(
        source = %metadata.name,
        checksum = %metadata.id,
        rows = metadata.rows,
        columns = metadata.columns,
        elapsed = ?t_read.elapsed(),
        "Source loaded"
    );
    Ok(LoadedSource { table, metadata })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_records_normalizes_blank_cells() {
        let table = RawTable::from_records(
            &["이름", " 위도 "],
            vec![vec!["A병원", "37.5"], vec!["  ", "37.6"]],
        )
        .unwrap();

        assert_eq!(table.headers(), &["이름".to_string(), "위도".to_string()]);
        assert_eq!(table.height(), 2);
        assert_eq!(table.cell(0, 0), Some("A병원"));
        assert_eq!(table.cell(1, 0), None);
        assert_eq!(table.cell(5, 0), None);
        assert_eq!(table.cell(0, 9), None);
    }

    #[test]
    fn test_from_records_rejects_ragged_rows() {
        let result = RawTable::from_records(&["a", "b"], vec![vec!["1", "2"], vec!["3"]]);
        assert!(matches!(
            result,
            Err(DataError::RaggedRow {
                row: 1,
                expected: 2,
                found: 1
            })
        ));
    }

    #[test]
    fn test_from_records_requires_header() {
        let headers: [&str; 0] = [];
        let result = RawTable::from_records(&headers, Vec::<Vec<&str>>::new());
        assert!(matches!(result, Err(DataError::MissingHeader)));
    }

    #[test]
    fn test_normalize_header_strips_bom() {
        assert_eq!(normalize_header("\u{feff}병원명"), "병원명");
        assert_eq!(normalize_header("  lat "), "lat");
    }

    #[test]
    fn test_read_csv_bytes_reads_everything_as_text() {
        let csv = "병원명,위도,경도,응급실\n서울병원,37.5665,126.9780,Y\n빈병원,,127.0,\n";
        let table = read_csv_bytes(csv.as_bytes()).unwrap();

        assert_eq!(table.width(), 4);
        assert_eq!(table.height(), 2);
        assert_eq!(table.column_index("위도"), Some(1));
        assert_eq!(table.cell(0, 1), Some("37.5665"));
        assert_eq!(table.cell(1, 1), None);
        assert_eq!(table.cell(0, 3), Some("Y"));
    }

    #[test]
    fn test_read_csv_bytes_empty_input() {
        assert!(matches!(
            read_csv_bytes(b"  \n"),
            Err(DataError::MissingHeader)
        ));
    }

    #[test]
    fn test_load_csv_missing_file() {
        let result = load_csv("/definitely/not/here.csv");
        assert!(matches!(result, Err(DataError::SourceNotFound(_))));
    }

    #[test]
    fn test_load_csv_bytes_fingerprints_content() {
        let a = load_csv_bytes("a", b"name,lat,lon\nx,1,2\n").unwrap();
        let b = load_csv_bytes("b", b"name,lat,lon\nx,1,2\n").unwrap();
        let c = load_csv_bytes("c", b"name,lat,lon\nx,1,3\n").unwrap();

        assert_eq!(a.metadata.id, b.metadata.id);
        assert_ne!(a.metadata.id, c.metadata.id);
        assert_eq!(a.metadata.rows, 1);
        assert_eq!(a.metadata.columns, 3);
    }
}
