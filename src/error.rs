use thiserror::Error;

/// Errors raised at the edges of the checker: parsing user input and
/// loading board files. Evaluation itself never fails.
#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("Invalid blood type '{value}' (expected one of O, A, B, AB)")]
    InvalidBloodType { value: String },

    #[error("Invalid pair '{value}' (expected DONOR:RECIPIENT, e.g. O:A)")]
    InvalidPair { value: String },

    #[error("An exchange board needs at least one pair")]
    EmptyBoard,

    #[error("Pair count {count} is out of range ({min}..={max})")]
    PairCountOutOfRange { count: usize, min: usize, max: usize },

    #[error("Config error: {message}")]
    Config { message: String },

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type ExchangeResult<T> = std::result::Result<T, ExchangeError>;
