use thiserror::Error;

/// Errors that can occur while constructing or manipulating core types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypesError {
    #[error("invalid event id length: expected 32, got {0}")]
    InvalidEventIdLength(usize),

    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("validator weight overflow while building validator set")]
    WeightOverflow,

    #[error("empty validator set")]
    EmptyValidatorSet,

    #[error("unknown validator id {0}")]
    UnknownValidator(u32),
}

impl From<hex::FromHexError> for TypesError {
    fn from(e: hex::FromHexError) -> Self {
        TypesError::InvalidHex(e.to_string())
    }
}
