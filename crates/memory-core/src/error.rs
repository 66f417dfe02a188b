use thiserror::Error;

/// Error kinds the engine can surface. Degradation (scoring defaults,
/// etc.) is handled by the call sites in `query::write` /
/// `query::consolidate`, not by this enum — only genuinely fatal
/// conditions surface here.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("index error: {0}")]
    Index(String),

    #[error("scoring error: {0}")]
    Scoring(String),

    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error("cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<duckdb::Error> for Error {
    fn from(e: duckdb::Error) -> Self {
        Error::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Internal(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Scoring(e.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Error::Cancelled
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Maps an error to a CLI exit code: 0 success, 1 usage, 2
/// configuration/environment, 3 persistence, 4 external-scoring.
/// `Validation`/`NotFound` are caller-input mistakes (usage, code 1);
/// `Invariant` is a core bug signal, surfaced as a persistence-layer
/// failure since it always originates from a stored record.
impl Error {
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Config(_) => 2,
            Error::Storage(_) | Error::Index(_) | Error::Invariant(_) => 3,
            Error::Scoring(_) => 4,
            Error::Validation(_) | Error::NotFound(_) => 1,
            Error::Cancelled | Error::Internal(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_map_error_kinds() {
        assert_eq!(Error::Config("x".into()).exit_code(), 2);
        assert_eq!(Error::Storage("x".into()).exit_code(), 3);
        assert_eq!(Error::Scoring("x".into()).exit_code(), 4);
        assert_eq!(Error::Validation("x".into()).exit_code(), 1);
    }
}
