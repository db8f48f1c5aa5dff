use qbank_core::source::SourceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {key}")]
    NotFound { key: String },

    #[error("invalid identifier: {0:?}")]
    InvalidId(String),

    #[error("serialization error in {key}: {source}")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("read error for {key}: {source}")]
    Read {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

impl From<StorageError> for SourceError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound { key } => SourceError::NotFound(key),
            other => SourceError::Backend(other.to_string()),
        }
    }
}
