use thiserror::Error;

use crate::types::ValidatorCategory;

/// Errors that can occur in the pool node
#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Validator {0} is not a pool member")]
    NotMember(String),

    #[error("Validator {0} is already a pool member")]
    AlreadyMember(String),

    #[error("Validator {id} is already in category {category}")]
    NoOpCategoryChange {
        id: String,
        category: ValidatorCategory,
    },

    #[error("Out-of-order era for {id}: {attempted} is not after last recorded era {last}")]
    OutOfOrderEra {
        id: String,
        attempted: u32,
        last: u32,
    },

    #[error("Hydration failed, serving cached snapshot: {0}")]
    StaleSnapshot(String),

    #[error("Chain state unavailable and no snapshot has been hydrated yet")]
    CollaboratorUnavailable,

    #[error("Validator set for era {era} is not disjoint: {id} appears in more than one category")]
    OverlappingValidatorSet { era: u32, id: String },

    #[error("Chain client error: {0}")]
    ChainClient(String),

    #[error("Storage decode error: {0}")]
    Decode(String),

    #[error("Invalid storage key bytes")]
    InvalidKey,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Metrics error: {0}")]
    Metrics(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

impl From<subxt::Error> for PoolError {
    fn from(err: subxt::Error) -> Self {
        PoolError::ChainClient(err.to_string())
    }
}

impl From<prometheus::Error> for PoolError {
    fn from(err: prometheus::Error) -> Self {
        PoolError::Metrics(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PoolError>;
