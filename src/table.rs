//! Read exported CSV files back into `polars` frames.
//!
//! Logic 2 writes these files itself; the helpers here only load them.
//! Raw exports get their timestamp column renamed to [`TIME_COLUMN_NAME`] so
//! frames from digital and analog exports can be joined on it.

use std::path::{Path, PathBuf};

use polars::prelude::*;

pub const TIME_COLUMN_NAME: &str = "time";

#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("Export file {0} does not exist")]
    MissingFile(PathBuf),

    #[error("Export file {0} has no columns")]
    Empty(PathBuf),

    #[error("Failed to parse export: {0}")]
    Polars(#[from] PolarsError),
}

/// Which file of a raw CSV export to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawCsvKind {
    Digital,
    Analog,
}

impl RawCsvKind {
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Digital => "digital.csv",
            Self::Analog => "analog.csv",
        }
    }
}

fn read_csv(path: &Path) -> Result<DataFrame, TableError> {
    if !path.is_file() {
        return Err(TableError::MissingFile(path.to_path_buf()));
    }

    log::debug!("Reading {}", path.display());
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    if df.width() == 0 {
        return Err(TableError::Empty(path.to_path_buf()));
    }
    Ok(df)
}

/// Load a file written by [`Capture::export_data_table`](crate::Capture::export_data_table).
pub fn read_data_table_csv(filepath: impl AsRef<Path>) -> Result<DataFrame, TableError> {
    read_csv(filepath.as_ref())
}

/// Load `digital.csv` or `analog.csv` from a raw CSV export directory.
///
/// The first column holds the timestamps and is renamed to
/// [`TIME_COLUMN_NAME`]. Digital exports only contain rows where some
/// channel changed state.
pub fn read_raw_csv(directory: impl AsRef<Path>, kind: RawCsvKind) -> Result<DataFrame, TableError> {
    let path = directory.as_ref().join(kind.file_name());
    let mut df = read_csv(&path)?;

    let time_column = df
        .get_column_names()
        .first()
        .map(|name| name.to_string())
        .ok_or_else(|| TableError::Empty(path.clone()))?;
    df.rename(&time_column, TIME_COLUMN_NAME.into())?;

    log::debug!("Loaded {} rows from {}", df.height(), path.display());
    Ok(df)
}

/// Names of the channel columns of a raw export frame.
pub fn channel_columns(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .into_iter()
        .filter(|name| name.as_str() != TIME_COLUMN_NAME)
        .map(|name| name.to_string())
        .collect()
}
