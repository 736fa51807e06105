//! Loaders for Movella CSV exports.
//!
//! A Movella export is a vendor header block followed by a delimited table:
//!
//! ```text
//! Movella DOT Export            <- title, skipped
//! DeviceTag:,D422CD0060E2       <- key/value lines
//! AppVersion:,4.2
//! Movella                       <- single field: manufacturer
//! OutputRate:,120Hz
//!                               <- blank line (or a row with an empty first field)
//! PacketCounter,SampleTimeFine,FreeAcc_X,...
//! ```

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, Trim};
use log::debug;
use thiserror::Error;

use crate::config::HeaderConfig;

/// Errors that can occur during file loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Empty file: {0}")]
    EmptyFile(PathBuf),

    #[error("no blank line separates the header from the data table (stopped at line {line})")]
    MissingTerminator { line: usize },

    #[error("second manufacturer line '{value}' at line {line}")]
    DuplicateManufacturer { line: usize, value: String },

    #[error("header block has no manufacturer line")]
    MissingManufacturer,

    #[error("data table has no header row")]
    EmptyTable,

    #[error("delimiter '{0}' is not a single-byte character")]
    InvalidDelimiter(char),
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Which line ended the header block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminator {
    /// A zero-length line
    BlankLine,
    /// A row whose first field is empty (e.g. ",,")
    EmptyFirstField,
}

/// Parsed vendor header.
#[derive(Debug, Clone)]
pub struct HeaderBlock {
    /// Header keys (trailing key suffix removed) to raw values
    pub fields: HashMap<String, String>,
    /// Value of the single-field line
    pub manufacturer: String,
    /// Line index where the table header row begins
    pub data_start: usize,
    pub terminator: Terminator,
}

impl HeaderBlock {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }
}

/// Motion samples keyed by column header.
///
/// Cells are kept as the text found in the export so that columns which are
/// never transformed are written back unchanged.
#[derive(Debug, Clone, Default)]
pub struct MotionTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    rescaled: HashSet<String>,
}

impl MotionTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            columns,
            rows,
            rescaled: HashSet::new(),
        }
    }

    /// Number of sample rows.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column by exact name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Whether a unit rescale has already been applied to `name`.
    pub fn is_rescaled(&self, name: &str) -> bool {
        self.rescaled.contains(name)
    }

    pub(crate) fn mark_rescaled(&mut self, name: &str) {
        self.rescaled.insert(name.to_string());
    }
}

/// One device export: header block plus motion table.
#[derive(Debug, Clone)]
pub struct Recording {
    pub source: PathBuf,
    pub header: HeaderBlock,
    pub table: MotionTable,
}

fn delimiter_byte(delimiter: char) -> Result<u8> {
    u8::try_from(delimiter).map_err(|_| LoaderError::InvalidDelimiter(delimiter))
}

/// Split one header line into trimmed fields.
///
/// Lines are read one at a time because the csv reader skips blank lines,
/// and a blank line ends the header block.
fn header_cells(line: &str, delimiter: u8) -> Result<Vec<String>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .delimiter(delimiter)
        .from_reader(line.as_bytes());

    let mut record = StringRecord::new();
    reader.read_record(&mut record)?;
    Ok(record.iter().map(str::to_string).collect())
}

/// Parse the vendor header block.
///
/// The first line is a title and is skipped. Lines with two or more fields
/// are key/value pairs (extra fields are ignored), a line with exactly one
/// field is the manufacturer. The block ends at a blank line or at a row
/// whose first field is empty; both shapes occur in exports and both are
/// accepted.
///
/// # Arguments
///
/// * `lines` - All lines of the file
/// * `config` - Header parsing options
/// * `table_column` - A column every table header row contains
///
/// # Errors
///
/// Returns `MissingTerminator` when the file ends, or a row naming
/// `table_column` is reached, before any terminator. Header lines are never
/// silently read into the table or the table into the header.
pub fn parse_header(
    lines: &[&str],
    config: &HeaderConfig,
    table_column: &str,
) -> Result<HeaderBlock> {
    let delimiter = delimiter_byte(config.delimiter)?;
    let mut fields = HashMap::new();
    let mut manufacturer: Option<String> = None;

    for (idx, line) in lines.iter().enumerate().skip(1) {
        if line.trim().is_empty() {
            debug!("Header ends at blank line {}", idx + 1);
            return finish_header(fields, manufacturer, idx + 1, Terminator::BlankLine);
        }

        let mut cells = header_cells(line, delimiter)?;

        if cells.first().map_or(true, String::is_empty) {
            debug!("Header ends at empty-first-field line {}", idx + 1);
            return finish_header(fields, manufacturer, idx + 1, Terminator::EmptyFirstField);
        }

        if cells.iter().any(|c| c == table_column) {
            return Err(LoaderError::MissingTerminator { line: idx + 1 });
        }

        if cells.len() == 1 {
            let value = cells.swap_remove(0);
            if manufacturer.is_some() {
                return Err(LoaderError::DuplicateManufacturer {
                    line: idx + 1,
                    value,
                });
            }
            manufacturer = Some(value);
            continue;
        }

        let key = cells[0].strip_suffix(config.key_suffix).unwrap_or(cells[0].as_str());
        fields.insert(key.to_string(), cells[1].clone());
    }

    Err(LoaderError::MissingTerminator { line: lines.len() })
}

fn finish_header(
    fields: HashMap<String, String>,
    manufacturer: Option<String>,
    data_start: usize,
    terminator: Terminator,
) -> Result<HeaderBlock> {
    let manufacturer = manufacturer.ok_or(LoaderError::MissingManufacturer)?;
    Ok(HeaderBlock {
        fields,
        manufacturer,
        data_start,
        terminator,
    })
}

/// Parse a delimited table with a header row.
pub fn parse_table(text: &str, delimiter: char) -> Result<MotionTable> {
    let delimiter = delimiter_byte(delimiter)?;

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());

    let columns: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if columns.iter().all(|c| c.is_empty()) {
        return Err(LoaderError::EmptyTable);
    }

    let mut rows = Vec::with_capacity(4096);
    for result in reader.records() {
        let record = result?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(MotionTable::new(columns, rows))
}

/// Load a Movella export.
///
/// The file is read once in full; the header block and the table are then
/// split at the header terminator.
///
/// # Arguments
///
/// * `path` - Path to the device CSV
/// * `config` - Header parsing options
/// * `table_column` - A column every table header row contains
///
/// # Errors
///
/// Returns an error if the file cannot be read, the header boundary is not
/// found, or the table is malformed.
pub fn load_recording<P: AsRef<Path>>(
    path: P,
    config: &HeaderConfig,
    table_column: &str,
) -> Result<Recording> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let lines: Vec<&str> = content.lines().collect();

    if lines.is_empty() {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }

    let header = parse_header(&lines, config, table_column)?;
    let body = lines[header.data_start.min(lines.len())..].join("\n");
    let table = parse_table(&body, config.delimiter)?;

    debug!(
        "Loaded {}: {} header fields, {} columns, {} rows",
        path.display(),
        header.fields.len(),
        table.columns.len(),
        table.len()
    );

    Ok(Recording {
        source: path.to_path_buf(),
        header,
        table,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const EXPORT: &str = "\
Movella DOT Export
DeviceTag:,D422CD0060E2
AppVersion:,4.2
Movella
OutputRate:,120Hz

PacketCounter,SampleTimeFine,FreeAcc_X,FreeAcc_Y,FreeAcc_Z
1,1000000,0.1,0.2,9.8
2,1008333,0.1,0.3,9.7
";

    const TIME: &str = "SampleTimeFine";

    fn lines(text: &str) -> Vec<&str> {
        text.lines().collect()
    }

    #[test]
    fn test_parse_header_blank_line() {
        let header = parse_header(&lines(EXPORT), &HeaderConfig::default(), TIME).unwrap();

        assert_eq!(header.manufacturer, "Movella");
        assert_eq!(header.get("OutputRate"), Some("120Hz"));
        assert_eq!(header.get("AppVersion"), Some("4.2"));
        assert_eq!(header.get("DeviceTag"), Some("D422CD0060E2"));
        assert_eq!(header.terminator, Terminator::BlankLine);
        assert_eq!(header.data_start, 6);
    }

    #[test]
    fn test_parse_header_empty_first_field() {
        let text = "title\nOutputRate:,60Hz\nMovella\n,,\nPacketCounter,SampleTimeFine\n1,2\n";
        let header = parse_header(&lines(text), &HeaderConfig::default(), TIME).unwrap();

        assert_eq!(header.terminator, Terminator::EmptyFirstField);
        assert_eq!(header.data_start, 4);
        assert_eq!(header.get("OutputRate"), Some("60Hz"));
    }

    #[test]
    fn test_parse_header_key_without_suffix() {
        let text = "title\nOutputRate,120Hz\nMovella\n\nA,B\n";
        let header = parse_header(&lines(text), &HeaderConfig::default(), TIME).unwrap();
        assert_eq!(header.get("OutputRate"), Some("120Hz"));
    }

    #[test]
    fn test_parse_header_empty_value_is_key_value() {
        let text = "title\nDeviceTag:,\nMovella\n\nA,B\n";
        let header = parse_header(&lines(text), &HeaderConfig::default(), TIME).unwrap();
        assert_eq!(header.get("DeviceTag"), Some(""));
        assert_eq!(header.manufacturer, "Movella");
    }

    #[test]
    fn test_parse_header_runs_into_table() {
        let text = "title\nOutputRate:,120Hz\nMovella\nPacketCounter,SampleTimeFine,FreeAcc_X\n1,2,3\n";
        let result = parse_header(&lines(text), &HeaderConfig::default(), TIME);

        match result {
            Err(LoaderError::MissingTerminator { line }) => assert_eq!(line, 4),
            other => panic!("Expected MissingTerminator, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_header_quoted_value_with_delimiter() {
        let text = "title\nFilterProfile:,\"General, v2\"\nMovella\n\nA,B\n";
        let header = parse_header(&lines(text), &HeaderConfig::default(), TIME).unwrap();
        assert_eq!(header.get("FilterProfile"), Some("General, v2"));
        assert_eq!(header.manufacturer, "Movella");
    }

    #[test]
    fn test_parse_header_quoted_manufacturer() {
        let text = "title\n\"Movella, Inc.\"\nOutputRate:,60Hz\n\nA,B\n";
        let header = parse_header(&lines(text), &HeaderConfig::default(), TIME).unwrap();
        assert_eq!(header.manufacturer, "Movella, Inc.");
    }

    #[test]
    fn test_parse_header_extra_fields_kept_as_key_value() {
        let text = "title\nMeasurement Mode:,Custom,Mode 4\nMovella\nOutputRate:,120Hz\n\nA,B\n";
        let header = parse_header(&lines(text), &HeaderConfig::default(), TIME).unwrap();
        assert_eq!(header.get("Measurement Mode"), Some("Custom"));
        assert_eq!(header.get("OutputRate"), Some("120Hz"));
        assert_eq!(header.data_start, 5);
    }

    #[test]
    fn test_parse_header_no_terminator_before_eof() {
        let text = "title\nOutputRate:,120Hz\nMovella\n";
        let result = parse_header(&lines(text), &HeaderConfig::default(), TIME);
        assert!(matches!(result, Err(LoaderError::MissingTerminator { line: 3 })));
    }

    #[test]
    fn test_parse_header_missing_manufacturer() {
        let text = "title\nOutputRate:,120Hz\n\nA,B\n";
        let result = parse_header(&lines(text), &HeaderConfig::default(), TIME);
        assert!(matches!(result, Err(LoaderError::MissingManufacturer)));
    }

    #[test]
    fn test_parse_header_duplicate_manufacturer() {
        let text = "title\nMovella\nXsens\n\nA,B\n";
        let result = parse_header(&lines(text), &HeaderConfig::default(), TIME);
        assert!(matches!(
            result,
            Err(LoaderError::DuplicateManufacturer { line: 3, .. })
        ));
    }

    #[test]
    fn test_parse_table() {
        let table = parse_table("A,B\n1,2\n3,4\n", ',').unwrap();
        assert_eq!(table.columns, vec!["A", "B"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[1], vec!["3", "4"]);
        assert_eq!(table.column_index("B"), Some(1));
        assert!(!table.is_rescaled("B"));
    }

    #[test]
    fn test_parse_table_ragged_row() {
        let result = parse_table("A,B\n1,2,3\n", ',');
        assert!(matches!(result, Err(LoaderError::Csv(_))));
    }

    #[test]
    fn test_load_recording() -> Result<()> {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", EXPORT).unwrap();
        file.flush().unwrap();

        let recording = load_recording(file.path(), &HeaderConfig::default(), TIME)?;
        assert_eq!(recording.header.manufacturer, "Movella");
        assert_eq!(
            recording.table.columns,
            vec!["PacketCounter", "SampleTimeFine", "FreeAcc_X", "FreeAcc_Y", "FreeAcc_Z"]
        );
        assert_eq!(recording.table.len(), 2);
        assert_eq!(recording.table.rows[0][1], "1000000");

        Ok(())
    }

    #[test]
    fn test_load_recording_crlf() -> Result<()> {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", EXPORT.replace('\n', "\r\n")).unwrap();
        file.flush().unwrap();

        let recording = load_recording(file.path(), &HeaderConfig::default(), TIME)?;
        assert_eq!(recording.header.get("OutputRate"), Some("120Hz"));
        assert_eq!(recording.table.columns.len(), 5);
        assert_eq!(recording.table.rows[1][4], "9.7");

        Ok(())
    }

    #[test]
    fn test_load_recording_empty_file() {
        let file = NamedTempFile::new().unwrap();
        let result = load_recording(file.path(), &HeaderConfig::default(), TIME);
        assert!(matches!(result, Err(LoaderError::EmptyFile(_))));
    }
}
