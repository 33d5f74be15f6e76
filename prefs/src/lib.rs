//! Persisted boolean preferences.
//!
//! A small key/value store that survives restarts. Writes are committed
//! synchronously: once [`PreferenceStore::set_bool`] returns `Ok`, the value
//! is on disk.

#![warn(missing_docs)]

mod file;
mod memory;

/// Platform-specific implementations.
pub mod sys;

pub use file::FilePreferences;
pub use memory::MemoryPreferences;

/// Errors that can occur when reading or writing preferences.
#[derive(Debug, thiserror::Error)]
pub enum PreferenceError {
    /// Reading or writing the backing file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// The backing file does not hold a preference map.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// No location to store preferences was found.
    #[error("no preference directory available")]
    NoDirectory,
    /// The platform store rejected the operation.
    #[error("platform error: {0}")]
    Platform(String),
}

/// Result type for preference operations.
pub type PreferenceResult<T> = Result<T, PreferenceError>;

/// A persisted boolean key/value store.
pub trait PreferenceStore: Send + Sync {
    /// Reads `key`, falling back to `default` when it was never written.
    fn get_bool(&self, key: &str, default: bool) -> bool;

    /// Writes `key` and commits before returning.
    ///
    /// # Errors
    ///
    /// Returns an error if the value could not be persisted.
    fn set_bool(&self, key: &str, value: bool) -> PreferenceResult<()>;
}
