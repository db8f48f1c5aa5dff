use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid question {id}: {reason}")]
    InvalidQuestion { id: String, reason: String },

    #[error("invalid file name {name:?}: {reason}")]
    InvalidFileName { name: String, reason: &'static str },

    #[error("invalid export configuration: {0}")]
    InvalidConfiguration(String),
}
