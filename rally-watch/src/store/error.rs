//! Persistence error types.

use std::path::PathBuf;

/// Errors reading or writing a state file.
///
/// Fatal to a sync cycle: the cycle is marked failed and the previously
/// stored state stays as it was.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// The file exists but could not be read
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing, syncing or renaming failed
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file holds something other than the expected document
    #[error("corrupt state in {}: {message}", path.display())]
    Corrupt { path: PathBuf, message: String },

    /// The value could not be encoded
    #[error("failed to serialize {}: {message}", path.display())]
    Serialize { path: PathBuf, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_includes_path() {
        let err = PersistenceError::Corrupt {
            path: PathBuf::from("data/routes.json"),
            message: "expected value at line 1 column 1".into(),
        };
        assert_eq!(
            err.to_string(),
            "corrupt state in data/routes.json: expected value at line 1 column 1"
        );
    }
}
