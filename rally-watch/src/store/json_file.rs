//! Atomically replaced JSON documents.

use std::fs::File;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::error::PersistenceError;

/// A JSON document on disk that is only ever replaced whole.
///
/// Writes go to a sibling temp file which is fsynced and renamed over the
/// target, so readers see either the old or the new document, never a
/// partial one. All writes hold `write_lock` for their whole duration.
#[derive(Debug)]
pub struct JsonFile {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and decode the document; `Ok(None)` if the file does not exist.
    pub fn load<T: DeserializeOwned>(&self) -> Result<Option<T>, PersistenceError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(PersistenceError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| PersistenceError::Corrupt {
                path: self.path.clone(),
                message: e.to_string(),
            })
    }

    /// Encode and atomically replace the document.
    ///
    /// Creates parent directories if they don't exist.
    pub fn save<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), PersistenceError> {
        let json = serde_json::to_string_pretty(value).map_err(|e| PersistenceError::Serialize {
            path: self.path.clone(),
            message: e.to_string(),
        })?;

        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|source| self.write_error(source))?;
        }

        let tmp = self.temp_path();
        let result = write_synced(&tmp, json.as_bytes())
            .and_then(|()| std::fs::rename(&tmp, &self.path));

        if let Err(source) = result {
            let _ = std::fs::remove_file(&tmp);
            return Err(self.write_error(source));
        }

        Ok(())
    }

    /// Delete the document. Missing files are not an error.
    pub fn remove(&self) -> Result<(), PersistenceError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(self.write_error(e)),
            _ => Ok(()),
        }
    }

    /// Sibling temp path, so the final rename never crosses filesystems.
    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.path.with_file_name(format!(".{name}.tmp"))
    }

    fn write_error(&self, source: std::io::Error) -> PersistenceError {
        PersistenceError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}
