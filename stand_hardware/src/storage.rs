//! CSV file sink standing in for the removable data card.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use stand_traits::{BoxError, Storage};
use tracing::debug;

use crate::error::HwError;

pub struct CsvFileStorage {
    path: PathBuf,
    writer: Option<csv::Writer<File>>,
}

impl CsvFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    fn writer(&mut self) -> Result<&mut csv::Writer<File>, HwError> {
        self.writer.as_mut().ok_or(HwError::StorageNotOpen)
    }
}

impl Storage for CsvFileStorage {
    fn open(&mut self, header: &[&str]) -> Result<(), BoxError> {
        // Each run owns a fresh numbered file; an existing one is never reused.
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
            .map_err(HwError::from)?;
        let mut w = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        w.write_record(header).map_err(HwError::from)?;
        w.flush().map_err(HwError::from)?;
        self.writer = Some(w);
        debug!(path = %self.path.display(), "data file opened");
        Ok(())
    }

    fn append(&mut self, fields: &[String]) -> Result<(), BoxError> {
        self.writer()?.write_record(fields).map_err(HwError::from)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), BoxError> {
        self.writer()?.flush().map_err(HwError::from)?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), BoxError> {
        if let Some(mut w) = self.writer.take() {
            w.flush().map_err(HwError::from)?;
            debug!(path = %self.path.display(), "data file closed");
        }
        Ok(())
    }
}

impl Drop for CsvFileStorage {
    fn drop(&mut self) {
        if let Some(mut w) = self.writer.take() {
            let _ = w.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Data_Test1.csv");
        let mut sink = CsvFileStorage::new(&path);
        sink.open(&["State", "OnTime_s"]).unwrap();
        sink.append(&["STANDBY".to_string(), "0.010".to_string()]).unwrap();
        sink.close().unwrap();
        assert!(!sink.is_open());
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "State,OnTime_s\nSTANDBY,0.010\n"
        );
    }

    #[test]
    fn existing_run_file_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Data_Test3.csv");
        fs::write(&path, "previous burn\n").unwrap();

        let mut sink = CsvFileStorage::new(&path);
        assert!(sink.open(&["State"]).is_err());
        assert!(!sink.is_open());
        assert_eq!(fs::read_to_string(&path).unwrap(), "previous burn\n");
    }

    #[test]
    fn append_before_open_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = CsvFileStorage::new(dir.path().join("x.csv"));
        assert!(sink.append(&["a".to_string()]).is_err());
    }
}
