//! 月別CSVの書き出し
//!
//! 一時ファイルに書いてから rename するので、失敗時に中途半端なファイルは残らない。

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::info;

use crate::error::ArchiveError;
use crate::traits::TableWriter;

#[derive(Debug, Clone)]
pub struct CsvTableWriter {
    output_dir: PathBuf,
}

impl CsvTableWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

impl TableWriter for CsvTableWriter {
    fn write(&self, rows: &[Vec<String>], destination: &str) -> Result<PathBuf, ArchiveError> {
        let path = self.output_dir.join(destination);
        let io_err = |source: std::io::Error| ArchiveError::Write {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(&self.output_dir).map_err(io_err)?;
        let tmp = NamedTempFile::new_in(&self.output_dir).map_err(io_err)?;

        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(tmp);
        for row in rows {
            writer.write_record(row).map_err(|source| ArchiveError::Csv {
                destination: destination.to_string(),
                source,
            })?;
        }
        let mut tmp = writer.into_inner().map_err(|e| io_err(e.into_error()))?;
        tmp.flush().map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&path).map_err(|e| io_err(e.error))?;

        info!("Wrote {} rows to {:?}", rows.len(), path);
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment_rows() -> Vec<Vec<String>> {
        vec![
            vec!["Date".into(), "Time".into(), "Temperature (F)".into(), "Condition".into()],
            vec!["01/30/2018".into(), "21:15".into(), "62".into(), "Partly, Cloudy".into()],
            vec!["01/31/2018".into(), "00:53".into(), "".into(), "Fair".into()],
        ]
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let writer = CsvTableWriter::new(dir.path());
        let rows = segment_rows();

        let path = writer
            .write(&rows, "wunderground_KCACAMPO13_20180101to20180131.csv")
            .unwrap();

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&path)
            .unwrap();
        let read: Vec<Vec<String>> = reader
            .records()
            .map(|r| r.unwrap().iter().map(String::from).collect())
            .collect();

        assert_eq!(read, rows);
    }

    #[test]
    fn test_creates_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("archive").join("2018");
        let writer = CsvTableWriter::new(&nested);

        let path = writer.write(&segment_rows(), "out.csv").unwrap();

        assert_eq!(path, nested.join("out.csv"));
        assert!(path.exists());
    }

    #[test]
    fn test_failed_write_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        // 出力先ディレクトリの位置に通常ファイルを置いて失敗させる
        let blocker = dir.path().join("blocked");
        fs::write(&blocker, "not a directory").unwrap();
        let writer = CsvTableWriter::new(&blocker);

        let err = writer.write(&segment_rows(), "out.csv").unwrap_err();

        assert!(matches!(err, ArchiveError::Write { .. }));
        assert!(!err.is_retryable());
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
