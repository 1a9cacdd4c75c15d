use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid resource key: {0}")]
    InvalidResourceKey(String),

    #[error("empty {0} component in resource key")]
    EmptyComponent(&'static str),
}
