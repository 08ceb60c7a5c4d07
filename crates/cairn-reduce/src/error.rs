//! Error types for the cairn-reduce subsystem

/// All errors that can occur in the storage-optimization core
#[derive(Debug, thiserror::Error)]
pub enum ReduceError {
    /// No object is stored under this filename
    #[error("File not found: {0}")]
    FileNotFound(String),
    /// The filename exists but the requested version does not
    #[error("Version not found: {filename} @ {version_id}")]
    VersionNotFound {
        /// Logical filename that was queried
        filename: String,
        /// Version identifier that was not found
        version_id: String,
    },
    /// A filename points at a block hash that is no longer stored
    #[error("Block not found: {0}")]
    BlockNotFound(String),
    /// A stored delta payload failed to decode (internal consistency violation)
    #[error("Corrupt delta payload: {0}")]
    CorruptDelta(String),
    /// Configuration failed to parse or validate
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReduceError {
    /// True for the recoverable "not found" family of errors.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ReduceError::FileNotFound(_)
                | ReduceError::VersionNotFound { .. }
                | ReduceError::BlockNotFound(_)
        )
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, ReduceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_family() {
        assert!(ReduceError::FileNotFound("a".into()).is_not_found());
        assert!(ReduceError::BlockNotFound("h".into()).is_not_found());
        assert!(ReduceError::VersionNotFound {
            filename: "a".into(),
            version_id: "v9".into()
        }
        .is_not_found());
        assert!(!ReduceError::CorruptDelta("bad gzip".into()).is_not_found());
        assert!(!ReduceError::InvalidConfig("x".into()).is_not_found());
    }

    #[test]
    fn display_includes_key() {
        let err = ReduceError::VersionNotFound {
            filename: "doc.txt".into(),
            version_id: "v3".into(),
        };
        assert_eq!(err.to_string(), "Version not found: doc.txt @ v3");
    }
}
