use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the result cache
///
/// Corrupt or unreadable records are never reported here; they are treated
/// as absent. Only failures that would lose a written result are errors.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Failed to persist cache partition '{key}': {source}")]
    Persist {
        key: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to serialize cache partition '{key}': {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to access cache directory {}: {source}", path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to fingerprint {what}: {message}")]
    Fingerprint { what: String, message: String },
}

/// Storage backend for cache partitions, addressed by partition key.
///
/// Implementations store opaque text; parsing and validity checks belong to
/// the caller so that they stay independent of the backend.
pub trait PartitionStore {
    /// Retrieves the stored record for a partition.
    ///
    /// # Returns
    /// * `Some(String)` - The raw record if present and readable
    /// * `None` - If the record doesn't exist or cannot be read
    fn load(&self, key: &str) -> Option<String>;

    /// Durably stores the record for a partition, replacing any previous one.
    fn save(&self, key: &str, data: &str) -> Result<(), CacheError>;

    /// Lists the keys of every stored partition.
    fn keys(&self) -> Result<Vec<String>, CacheError>;

    /// Removes every stored partition.
    fn clear(&self) -> Result<(), CacheError>;
}
