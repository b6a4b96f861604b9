use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Missing credential, missing or unparseable connection profile, bad limits.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Network/API failure or malformed response from an embedding provider.
    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Data shape error: provider returned {actual} vectors for {expected} inputs")]
    VectorCount { expected: usize, actual: usize },

    #[error("Data shape error: vector {index} has dimension {actual}, expected {expected}")]
    VectorDim { index: usize, expected: usize, actual: usize },

    /// Source or sink failure against the analytics store.
    #[error("Store error: {0}")]
    Store(String),
}

impl Error {
    /// True for the two variants that signal a misaligned provider response.
    pub fn is_data_shape(&self) -> bool {
        matches!(self, Error::VectorCount { .. } | Error::VectorDim { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
