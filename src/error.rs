// src/error.rs

//! Error types for abbs-meta
//!
//! Parse-level problems (unsupported shell constructs, malformed dependency
//! tokens, shell fallback failures) never surface here: they are recovered
//! locally and recorded as diagnostics. Only storage failures, unreadable
//! inputs and interruption abort a reconciliation pass.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Initialization error: {0}")]
    InitError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Shell error: {0}")]
    ShellError(String),

    #[error("Interrupted")]
    Interrupted,
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::DatabaseError(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::ConfigError(err.to_string())
    }
}

impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Self {
        Error::IoError(err.to_string())
    }
}
