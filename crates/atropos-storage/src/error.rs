use thiserror::Error;

/// Errors that can occur in storage operations. All of these are fatal,
/// routed to the engine's critical-error sink rather than returned to an
/// ordinary caller.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(String),

    #[error("unknown table: {0}")]
    UnknownTable(String),

    #[error("corrupt encoding in table {table}: {reason}")]
    CorruptEncoding { table: String, reason: String },

    #[error("io error: {0}")]
    Io(String),
}

#[cfg(feature = "rocksdb-backend")]
impl From<rocksdb::Error> for StorageError {
    fn from(e: rocksdb::Error) -> Self {
        StorageError::Database(e.to_string())
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e.to_string())
    }
}
