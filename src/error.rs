//! Error types for taskflow
//!
//! Failure classes mirror the handling policy:
//! - NotAuthenticated: no session, fatal for the current view
//! - ProfileIncomplete: authenticated but no workspace assigned
//! - Transient: store call failed (network/offline), surface and move on
//! - NotFound: referenced document missing
//! - Invalid: bad input or non-conforming document

use thiserror::Error;

/// How a caller should treat a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    NotAuthenticated,
    ProfileIncomplete,
    Transient,
    NotFound,
    Invalid,
}

/// Main error type for taskflow operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("No authenticated session")]
    NotAuthenticated,

    #[error("Session is still loading")]
    SessionLoading,

    #[error("User {0} has no workspace assigned")]
    ProfileIncomplete(String),

    #[error("Store is offline")]
    Offline,

    #[error("Store operation failed: {0}")]
    Store(String),

    #[error("Company not found: {0}")]
    CompanyNotFound(String),

    #[error("Document not found: {collection}/{id}")]
    DocumentNotFound { collection: String, id: String },

    #[error("Task title cannot be empty")]
    EmptyTitle,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Malformed document in {collection}: {reason}")]
    InvalidDocument { collection: String, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get the failure class for this error
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::NotAuthenticated | Error::SessionLoading => ErrorClass::NotAuthenticated,

            Error::ProfileIncomplete(_) => ErrorClass::ProfileIncomplete,

            Error::Offline | Error::Store(_) | Error::Io(_) => ErrorClass::Transient,

            Error::CompanyNotFound(_) | Error::DocumentNotFound { .. } => ErrorClass::NotFound,

            Error::EmptyTitle
            | Error::InvalidArgument(_)
            | Error::InvalidConfig(_)
            | Error::InvalidDocument { .. }
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_) => ErrorClass::Invalid,
        }
    }

    /// Whether a bounded retry is worth attempting
    pub fn is_transient(&self) -> bool {
        self.class() == ErrorClass::Transient
    }
}

/// Result type alias for taskflow operations
pub type Result<T> = std::result::Result<T, Error>;
