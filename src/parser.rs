//! Header-keyed CSV parsing with row-shape checks.

use csv_async::{AsyncReaderBuilder, ByteRecord};
use std::path::Path;
use tokio::io::AsyncRead;
use tracing::{debug, warn};

use crate::error::{CsvResult, ValidationError};
use crate::io::{open_upload, CsvMeta};
use crate::model::{RawRow, REQUIRED_COLUMNS};

/// Result of parsing one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
    /// Non-blank lines dropped because their width differed from the header.
    pub malformed_rows: usize,
}

impl CsvTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Reads a header line and every data line of matching width.
///
/// Blank lines are skipped without trace. Lines of the wrong width are
/// skipped and logged. Returns an empty table when there is no header.
pub async fn parse_csv_stream<R>(reader: R) -> CsvResult<CsvTable>
where
    R: AsyncRead + Unpin + Send,
{
    let mut rdr = AsyncReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .buffer_capacity(1 << 16)
        .create_reader(reader);

    let mut record = ByteRecord::new();
    if !rdr.read_byte_record(&mut record).await? {
        return Ok(CsvTable::default());
    }

    let headers: Vec<String> = record
        .iter()
        .enumerate()
        .map(|(i, cell)| {
            let text = String::from_utf8_lossy(cell);
            let text: &str = if i == 0 {
                text.trim_start_matches('\u{feff}')
            } else {
                &text
            };
            text.trim().to_string()
        })
        .collect();
    if headers.iter().all(String::is_empty) {
        return Ok(CsvTable::default());
    }

    let mut table = CsvTable {
        headers,
        ..Default::default()
    };

    while rdr.read_byte_record(&mut record).await? {
        let values: Vec<String> = record
            .iter()
            .map(|cell| String::from_utf8_lossy(cell).into_owned())
            .collect();

        if values.iter().all(|v| v.trim().is_empty()) {
            continue;
        }

        if values.len() != table.headers.len() {
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            warn!(
                line,
                columns = values.len(),
                expected = table.headers.len(),
                "skipping row with mismatched column count"
            );
            table.malformed_rows += 1;
            continue;
        }

        table.rows.push(RawRow::new(&table.headers, values));
    }

    debug!(
        rows = table.rows.len(),
        malformed = table.malformed_rows,
        "parsed csv"
    );
    Ok(table)
}

/// Parses a stored upload. A file that cannot be opened parses as empty.
pub async fn parse_csv_path(path: &Path, meta: &CsvMeta) -> CsvResult<CsvTable> {
    match open_upload(path, meta).await {
        Ok(reader) => parse_csv_stream(reader).await,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "could not open csv file");
            Ok(CsvTable::default())
        }
    }
}

/// Fails unless every required column is present in `headers`.
pub fn check_required_columns(headers: &[String]) -> Result<(), ValidationError> {
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|req| !headers.iter().any(|h| h == *req))
        .map(|req| req.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::MissingColumns {
            missing,
            found: headers.to_vec(),
        })
    }
}
