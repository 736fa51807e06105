//! Writers for BIDS motion outputs.
//!
//! Each device recording produces three files sharing one base name:
//! - `<base>_channels.tsv` describing every column of the motion table
//! - `<base>_motion.tsv` holding the samples
//! - `<base>_motion.json` sidecar with acquisition metadata

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use super::loaders::MotionTable;

/// Suffix of the channel description table.
pub const CHANNELS_SUFFIX: &str = "_channels.tsv";
/// Suffix of the motion data table.
pub const MOTION_SUFFIX: &str = "_motion.tsv";
/// Suffix of the sidecar document.
pub const SIDECAR_SUFFIX: &str = "_motion.json";

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV writing error.
    #[error("TSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },

    /// JSON serialization error.
    #[error("JSON write error for '{path}': {source}")]
    JsonError {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Paths of one written output group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub channels: PathBuf,
    pub motion: PathBuf,
    pub sidecar: PathBuf,
}

impl OutputPaths {
    /// Paths for `base` inside `dir`.
    pub fn new(dir: &Path, base: &str) -> Self {
        Self {
            channels: dir.join(format!("{}{}", base, CHANNELS_SUFFIX)),
            motion: dir.join(format!("{}{}", base, MOTION_SUFFIX)),
            sidecar: dir.join(format!("{}{}", base, SIDECAR_SUFFIX)),
        }
    }
}

/// Build the BIDS base name for one device recording.
///
/// ```
/// use movella_bids::core::writers::base_name;
///
/// assert_eq!(base_name("sub-10", "RS", "1", 1), "sub-10_task-RS_tracksys-IMU1_run-01");
/// ```
pub fn base_name(subject: &str, task: &str, device_id: &str, run: u32) -> String {
    format!(
        "{}_task-{}_tracksys-IMU{}_run-{:02}",
        subject, task, device_id, run
    )
}

/// Creates parent directories for a file path if they don't exist.
fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Creates a buffered writer for the given path.
fn create_buffered_writer(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(BufWriter::new(file))
}

fn tsv_writer(path: &Path) -> Result<csv::Writer<BufWriter<File>>> {
    ensure_parent_dirs(path)?;
    let buf_writer = create_buffered_writer(path)?;
    Ok(csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(buf_writer))
}

/// Write serializable rows as a tab-separated table.
///
/// Column names come from the row type's field names, so the header row
/// always matches the row layout.
///
/// # Arguments
///
/// * `path` - Output file path (parent directories will be created if needed)
/// * `rows` - Rows to write, one record each
pub fn write_records_tsv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut writer = tsv_writer(path)?;
    let path_str = path.display().to_string();

    for row in rows {
        writer.serialize(row).map_err(|e| WriteError::CsvError {
            path: path_str.clone(),
            source: e,
        })?;
    }

    writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    Ok(())
}

/// Write a motion table as tab-separated values with its header row.
pub fn write_motion_tsv(path: &Path, table: &MotionTable) -> Result<()> {
    let mut writer = tsv_writer(path)?;
    let path_str = path.display().to_string();

    writer
        .write_record(&table.columns)
        .map_err(|e| WriteError::CsvError {
            path: path_str.clone(),
            source: e,
        })?;

    for row in &table.rows {
        writer.write_record(row).map_err(|e| WriteError::CsvError {
            path: path_str.clone(),
            source: e,
        })?;
    }

    writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    Ok(())
}

/// Write a value as JSON indented with four spaces.
pub fn write_json_pretty<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    ensure_parent_dirs(path)?;
    let mut writer = create_buffered_writer(path)?;
    let path_str = path.display().to_string();

    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut writer, formatter);
    value
        .serialize(&mut serializer)
        .map_err(|e| WriteError::JsonError {
            path: path_str.clone(),
            source: e,
        })?;

    writeln!(writer).map_err(|e| WriteError::WriteFile {
        path: path_str.clone(),
        source: e,
    })?;
    writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    Ok(())
}

/// Write the three files of one output group.
///
/// Files are written in order channels, motion, sidecar. There is no
/// rollback: if a later write fails the earlier files stay on disk.
pub fn write_output_group<C: Serialize, J: Serialize>(
    paths: &OutputPaths,
    channels: &[C],
    table: &MotionTable,
    sidecar: &J,
) -> Result<()> {
    write_records_tsv(&paths.channels, channels)?;
    write_motion_tsv(&paths.motion, table)?;
    write_json_pretty(&paths.sidecar, sidecar)?;
    Ok(())
}
