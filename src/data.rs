use std::{fs::File, path::PathBuf};

use polars::{
    frame::DataFrame,
    io::SerReader,
    prelude::{CsvReader, DataType},
};

use crate::error::{Result, TrainError};

/// Anything that can hand the trainer a time-ordered series of closing prices.
pub trait PriceSource {
    fn close_prices(&self) -> Result<Vec<f64>>;
}

impl PriceSource for Vec<f64> {
    fn close_prices(&self) -> Result<Vec<f64>> {
        Ok(self.clone())
    }
}

/// One numeric column of a headed CSV file.
#[derive(Debug, Clone)]
pub struct CsvColumn {
    pub path: PathBuf,
    pub column: String,
}

impl CsvColumn {
    pub fn new(path: impl Into<PathBuf>, column: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            column: column.into(),
        }
    }
}

fn column_values(frame: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let column = frame.column(name)?.cast(&DataType::Float64)?;
    column
        .f64()?
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            value.filter(|v| !v.is_nan()).ok_or_else(|| TrainError::MissingPrice {
                column: name.to_string(),
                row,
            })
        })
        .collect()
}

impl PriceSource for CsvColumn {
    fn close_prices(&self) -> Result<Vec<f64>> {
        let file = File::open(&self.path)?;
        let frame = CsvReader::new(file).finish()?;
        column_values(&frame, &self.column)
    }
}
