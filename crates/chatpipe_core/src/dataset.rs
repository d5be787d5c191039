use anyhow::{Context, Result};
use polars::io::csv::read::{CsvParseOptions, CsvReadOptions};
use polars::prelude::*;
use std::io::Cursor;
use std::path::Path;

/// Per-column missing-entry counts, recomputed on every load.
/// Preserves the dataset's column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MissingReport {
    pub columns: Vec<ColumnMissing>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMissing {
    pub name: String,
    pub count: usize,
}

impl MissingReport {
    pub fn of(df: &DataFrame) -> Self {
        let columns = df
            .get_columns()
            .iter()
            .map(|s| ColumnMissing { name: s.name().to_string(), count: s.null_count() })
            .collect();
        Self { columns }
    }

    pub fn count_for(&self, name: &str) -> usize {
        self.columns.iter().find(|c| c.name == name).map(|c| c.count).unwrap_or(0)
    }

    /// Columns with at least one missing entry, in dataset order.
    pub fn columns_with_missing(&self) -> impl Iterator<Item = &ColumnMissing> {
        self.columns.iter().filter(|c| c.count > 0)
    }

    pub fn is_clean(&self) -> bool {
        self.columns.iter().all(|c| c.count == 0)
    }
}

pub fn load_csv(path: &Path) -> Result<DataFrame> {
    CsvReadOptions::default()
        .with_infer_schema_length(Some(100))
        .with_has_header(true)
        .with_parse_options(CsvParseOptions::default().with_quote_char(Some(b'"')))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .with_context(|| format!("open {}", path.display()))?
        .finish()
        .with_context(|| format!("parse {}", path.display()))
}

pub fn read_csv_bytes(bytes: &[u8]) -> Result<DataFrame> {
    CsvReadOptions::default()
        .with_infer_schema_length(Some(100))
        .with_has_header(true)
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()
        .context("parse csv bytes")
}

pub fn csv_bytes(df: &DataFrame) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    // CsvWriter mutates its input frame's chunks; write against a copy.
    CsvWriter::new(&mut buf)
        .include_header(true)
        .finish(&mut df.clone())
        .context("encode csv")?;
    Ok(buf)
}

/// Removes every row with a missing value in any column of `subset`.
/// Only ever drops rows; never imputes.
pub fn drop_missing_rows(df: &DataFrame, subset: &[String]) -> Result<DataFrame> {
    df.drop_nulls(Some(subset)).context("drop rows with missing values")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DataFrame {
        df!(
            "age" => &[Some(34i64), None, Some(29), None, Some(51)],
            "income" => &[Some(1000i64), Some(2000), None, Some(4000), Some(5000)],
            "city" => &["a", "b", "c", "d", "e"],
        )
        .unwrap()
    }

    #[test]
    fn missing_report_counts_empty_entries() {
        let df = sample();
        let report = MissingReport::of(&df);
        assert_eq!(report.count_for("age"), 2);
        assert_eq!(report.count_for("income"), 1);
        assert_eq!(report.count_for("city"), 0);
        let flagged: Vec<&str> = report.columns_with_missing().map(|c| c.name.as_str()).collect();
        assert_eq!(flagged, vec!["age", "income"]);
        assert!(!report.is_clean());
    }

    #[test]
    fn missing_report_is_empty_for_clean_dataset() {
        let df = df!("a" => &[1i64, 2, 3]).unwrap();
        let report = MissingReport::of(&df);
        assert!(report.is_clean());
        assert_eq!(report.columns_with_missing().count(), 0);
    }

    #[test]
    fn drop_missing_rows_clears_subset_only() {
        let df = sample();
        let out = drop_missing_rows(&df, &["age".to_string()]).unwrap();
        assert_eq!(out.height(), 3);
        assert_eq!(out.column("age").unwrap().null_count(), 0);
        // income's own missing row survives unless it coincides with a dropped one
        assert_eq!(out.column("income").unwrap().null_count(), 1);
    }

    #[test]
    fn drop_missing_rows_never_grows() {
        let df = sample();
        let out = drop_missing_rows(&df, &["age".to_string(), "income".to_string()]).unwrap();
        assert!(out.height() <= df.height());
        assert_eq!(out.column("age").unwrap().null_count(), 0);
        assert_eq!(out.column("income").unwrap().null_count(), 0);
    }

    #[test]
    fn csv_roundtrip_preserves_frame() {
        let df = sample();
        let bytes = csv_bytes(&df).unwrap();
        let back = read_csv_bytes(&bytes).unwrap();
        assert_eq!(back.height(), df.height());
        assert_eq!(back.get_column_names(), df.get_column_names());
        assert_eq!(MissingReport::of(&back), MissingReport::of(&df));
    }
}
