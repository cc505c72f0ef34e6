use itertools::Itertools;
use std::result;
use thiserror::Error;

/// Generation-time failures. Any of these aborts generation; no partial
/// output is produced.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("IR consistency error: {0}")]
    IrConsistency(String),
    #[error("circular initialization: {}", .path.iter().join(" -> "))]
    CircularInitialization { path: Vec<String> },
    #[error("backend `{backend}` failed: {message}")]
    Backend {
        backend: &'static str,
        message: String,
    },
    #[error("Generic error: {0}")]
    Generic(String),
}

impl Error {
    pub fn ir(message: impl Into<String>) -> Self {
        Error::IrConsistency(message.into())
    }

    pub fn backend(backend: &'static str, message: impl Into<String>) -> Self {
        Error::Backend {
            backend,
            message: message.into(),
        }
    }

    /// Whether the error came out of IR validation or scheduling, as opposed
    /// to a backend or infrastructure failure.
    pub fn is_generation_error(&self) -> bool {
        matches!(
            self,
            Error::IrConsistency(_) | Error::CircularInitialization { .. }
        )
    }
}

pub type Result<T> = result::Result<T, Error>;

// Convert from eyre::Report to our Error type
impl From<eyre::Report> for Error {
    fn from(err: eyre::Report) -> Self {
        Error::Generic(err.to_string())
    }
}

// Convert from std::io::Error to our Error type
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Generic(e.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Generic(s)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Generic(e.to_string())
    }
}

impl From<std::fmt::Error> for Error {
    fn from(e: std::fmt::Error) -> Self {
        Error::Generic(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circular_initialization_reports_full_path() {
        let err = Error::CircularInitialization {
            path: vec!["a.A.x".into(), "a.A.y".into(), "a.A.x".into()],
        };
        assert_eq!(
            err.to_string(),
            "circular initialization: a.A.x -> a.A.y -> a.A.x"
        );
        assert!(err.is_generation_error());
    }
}
