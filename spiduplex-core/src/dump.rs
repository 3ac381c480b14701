//! Received-bytes dump file, shared by both actors.

use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DumpError {
    #[error("could not open output file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("not all bytes written to output file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug)]
pub struct RxDump {
    path: PathBuf,
    file: Mutex<File>,
}

impl RxDump {
    /// Create or truncate the file. Called once, before the actors start.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, DumpError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|source| DumpError::Open {
                path: path.clone(),
                source,
            })?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Append one transfer's received bytes.
    pub fn append(&self, rx: &[u8]) -> Result<(), DumpError> {
        let mut file = self.file.lock();
        file.write_all(rx).map_err(|source| DumpError::Write {
            path: self.path.clone(),
            source,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_truncates_then_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rx.bin");
        std::fs::write(&path, b"stale contents").unwrap();

        let dump = RxDump::create(&path).unwrap();
        assert_eq!(dump.path(), path);
        dump.append(&[1, 2, 3]).unwrap();
        dump.append(&[4, 5]).unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_open_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("rx.bin");

        let err = RxDump::create(&path).unwrap_err();
        assert!(matches!(err, DumpError::Open { .. }));
        assert!(err.to_string().contains("could not open output file"));
    }
}
