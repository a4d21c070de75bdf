/// SafeConn Error Module
///
/// This module defines the error types for the connection layer. Every
/// failure is returned as a `SafeConnError` and, in addition, recorded in one
/// of the readable `ErrorState` slots on the owning `SafeConnection`.
use thiserror::Error;

use crate::core::db::driver::{BindError, DriverError};

/// Error type for every fallible operation in the crate.
///
/// The variants follow the lifecycle of a connection:
/// - Connection establishment and reconnect preconditions
/// - Statement preparation, binding and execution
/// - Closing of live handles
/// - Option handling and configuration loading
#[derive(Error, Debug)]
pub enum SafeConnError {
    /// The driver refused to open a connection
    #[error("Connection error: {0}")]
    Connect(DriverError),

    /// A live connection could not be closed before reconnecting
    #[error("Connection error: could not close the previous database connection")]
    PreviousConnectionNotClosed,

    /// Reuse-statement mode is on but nothing has been set yet
    #[error("Connection error: no previous statement has been found")]
    NoPreviousStatement,

    /// Reuse-statement mode could not re-prepare the persisted statement
    #[error("Connection error: statement preparation failed")]
    StatementReplayFailed,

    /// The driver rejected the statement template
    #[error("Statement error: {0}")]
    Prepare(DriverError),

    /// Parameters could not be bound to the prepared statement
    #[error("Statement error: binding parameters failed: {0}")]
    Bind(BindError),

    /// Executing the prepared statement failed
    #[error("Execution error: {0}")]
    Execute(DriverError),

    /// A live handle could not be closed
    #[error("Reset error: {0}")]
    Reset(DriverError),

    /// The connection closed but its statement did not
    #[error("Reset error: error closing the associated statement (code {code})")]
    StatementCloseCascade { code: i32 },

    /// An operation needing a connection was called while disconnected
    #[error("No active connection")]
    NoActiveConnection,

    /// `query` was called without a prepared statement
    #[error("No prepared statement")]
    NoPreparedStatement,

    /// Option code or value not understood
    #[error("Invalid option: {0}")]
    InvalidOption(String),

    /// A type signature contained a character outside {i, d, s, b}
    #[error("Invalid type signature: unknown type code '{0}'")]
    InvalidTypeSignature(char),

    /// Configuration loading and validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl SafeConnError {
    /// Numeric code to record next to the message in an `ErrorState`.
    pub fn code(&self) -> i32 {
        match self {
            SafeConnError::Connect(e)
            | SafeConnError::Prepare(e)
            | SafeConnError::Execute(e)
            | SafeConnError::Reset(e) => e.code,
            SafeConnError::Bind(e) => e.code(),
            SafeConnError::StatementCloseCascade { code } => *code,
            _ => 0,
        }
    }

    /// Message recorded in an `ErrorState`: the driver's own message where
    /// there is one, otherwise the bare description without a category.
    pub fn detail(&self) -> String {
        match self {
            SafeConnError::Connect(e)
            | SafeConnError::Prepare(e)
            | SafeConnError::Execute(e)
            | SafeConnError::Reset(e) => e.message.clone(),
            SafeConnError::PreviousConnectionNotClosed => {
                "could not close the previous database connection".to_string()
            }
            SafeConnError::NoPreviousStatement => "no previous statement has been found".to_string(),
            SafeConnError::StatementReplayFailed => "statement preparation failed".to_string(),
            SafeConnError::Bind(_) => "binding parameters failed".to_string(),
            SafeConnError::StatementCloseCascade { .. } => {
                "error closing the associated statement".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Type alias for Result to use SafeConnError as the error type.
pub type Result<T> = std::result::Result<T, SafeConnError>;

/// Last failure recorded for one error domain.
///
/// Empty (`message == None`, `code == 0`) unless the most recent operation in
/// that domain failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorState {
    pub message: Option<String>,
    pub code: i32,
}

impl ErrorState {
    /// Returns true when a failure is recorded.
    pub fn is_set(&self) -> bool {
        self.message.is_some()
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn record(&mut self, message: impl Into<String>, code: i32) {
        self.message = Some(message.into());
        self.code = code;
    }

    /// Records the detail and code of `err`.
    pub fn capture(&mut self, err: &SafeConnError) {
        self.record(err.detail(), err.code());
    }

    pub fn clear(&mut self) {
        self.message = None;
        self.code = 0;
    }
}
