use crate::dataset;
use anyhow::Result;
use polars::prelude::DataFrame;

pub const DOWNLOAD_FILENAME: &str = "transformed_data.csv";
pub const DOWNLOAD_MIME: &str = "text/csv";

/// The transformed dataset re-encoded for download. Observational only;
/// building an artifact never mutates session state.
#[derive(Debug, Clone)]
pub struct DownloadArtifact {
    pub filename: &'static str,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

pub fn download_artifact(df: &DataFrame) -> Result<DownloadArtifact> {
    Ok(DownloadArtifact {
        filename: DOWNLOAD_FILENAME,
        mime: DOWNLOAD_MIME,
        bytes: dataset::csv_bytes(df)?,
    })
}

/// First rows of a frame, rendered for display.
pub fn preview(df: &DataFrame, rows: usize) -> String {
    format!("{}", df.head(Some(rows)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    #[test]
    fn artifact_has_fixed_name_and_mime() {
        let df = df!("age" => &[1i64, 2]).unwrap();
        let artifact = download_artifact(&df).unwrap();
        assert_eq!(artifact.filename, "transformed_data.csv");
        assert_eq!(artifact.mime, "text/csv");
        let text = String::from_utf8(artifact.bytes).unwrap();
        assert!(text.starts_with("age\n"));
    }

    #[test]
    fn preview_limits_rows() {
        let df = df!("n" => &(0..100i64).collect::<Vec<_>>()).unwrap();
        let text = preview(&df, 5);
        assert!(text.contains("shape: (5, 1)"));
    }
}
