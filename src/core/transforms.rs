//! Unit transforms applied to motion tables.

use log::debug;
use thiserror::Error;

use super::loaders::MotionTable;

/// Errors that can occur while transforming a table.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("column '{0}' not found in motion table")]
    MissingColumn(String),

    #[error("column '{column}' row {row}: '{value}' is not numeric")]
    NonNumeric {
        column: String,
        row: usize,
        value: String,
    },

    #[error("column '{0}' has already been rescaled")]
    AlreadyRescaled(String),
}

/// Result type for transform operations.
pub type Result<T> = std::result::Result<T, TransformError>;

/// Render a rescaled value. Whole numbers keep a trailing ".0" so the
/// column reads as floating point throughout.
fn format_value(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

/// Divide every cell of a column by `divisor`.
///
/// Empty cells are left empty. A column can only be rescaled once per
/// table; a second call returns `AlreadyRescaled` instead of dividing again.
///
/// # Arguments
///
/// * `table` - Table to modify in place
/// * `column` - Exact column name
/// * `divisor` - Value each cell is divided by (e.g. 1e6 for µs -> s)
///
/// # Returns
///
/// The number of cells rescaled.
pub fn rescale_column(table: &mut MotionTable, column: &str, divisor: f64) -> Result<usize> {
    if table.is_rescaled(column) {
        return Err(TransformError::AlreadyRescaled(column.to_string()));
    }

    let idx = table
        .column_index(column)
        .ok_or_else(|| TransformError::MissingColumn(column.to_string()))?;

    let mut count = 0;
    for (row_idx, row) in table.rows.iter_mut().enumerate() {
        let Some(cell) = row.get_mut(idx) else {
            continue;
        };

        let trimmed = cell.trim();
        if trimmed.is_empty() {
            continue;
        }

        let value: f64 = trimmed.parse().map_err(|_| TransformError::NonNumeric {
            column: column.to_string(),
            row: row_idx + 1,
            value: trimmed.to_string(),
        })?;

        *cell = format_value(value / divisor);
        count += 1;
    }

    table.mark_rescaled(column);
    debug!("Rescaled {} cells of '{}' by 1/{}", count, column, divisor);

    Ok(count)
}
