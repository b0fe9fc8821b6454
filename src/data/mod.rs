use crate::error::{Result, TradeGridError};
use polars::prelude::*;
use std::path::Path;

/// Column names the backtester expects, with the aliases seen in
/// common exchange exports.
const COLUMN_ALIASES: [(&str, &[&str]); 5] = [
    ("open", &["open", "Open", "OPEN", "o"]),
    ("high", &["high", "High", "HIGH", "h"]),
    ("low", &["low", "Low", "LOW", "l"]),
    ("close", &["close", "Close", "CLOSE", "c"]),
    ("volume", &["volume", "Volume", "VOLUME", "vol", "Vol", "v"]),
];

pub struct CsvConnector;

impl CsvConnector {
    /// Load CSV file into a DataFrame.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<DataFrame> {
        let df = CsvReadOptions::default()
            .try_into_reader_with_file_path(Some(path.as_ref().to_path_buf()))?
            .finish()
            .map_err(|e| TradeGridError::DataLoading(format!("Failed to read CSV: {}", e)))?;
        Ok(df)
    }

    /// Load, normalize column names and enforce a minimum bar count.
    pub fn load_and_validate<P: AsRef<Path>>(path: P, min_rows: usize) -> Result<DataFrame> {
        let df = Self::normalize_columns(Self::load(&path)?)?;
        if df.height() < min_rows {
            return Err(TradeGridError::DataLoading(format!(
                "{} has {} rows; need at least {} for a meaningful backtest",
                path.as_ref().display(),
                df.height(),
                min_rows
            )));
        }

        let nulls = df.column("close")?.null_count();
        if nulls > 0 {
            log::warn!("close column contains {} null values", nulls);
        }
        Ok(df)
    }

    /// Rename recognized OHLCV column aliases to lowercase standard
    /// names. Only `close` is mandatory; the rest are renamed when
    /// present.
    pub fn normalize_columns(mut df: DataFrame) -> Result<DataFrame> {
        let columns: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();

        for (standard, aliases) in COLUMN_ALIASES {
            if columns.iter().any(|c| c == standard) {
                continue;
            }
            if let Some(actual) = aliases.iter().find(|a| columns.iter().any(|c| c == *a)) {
                df.rename(actual, standard.into()).map_err(|e| {
                    TradeGridError::DataLoading(format!("Failed to rename column: {}", e))
                })?;
            }
        }

        if df.column("close").is_err() {
            return Err(TradeGridError::DataLoading(
                "no close column found in market data".to_string(),
            ));
        }
        Ok(df)
    }
}
