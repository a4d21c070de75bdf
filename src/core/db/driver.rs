/// Driver Contract Module
///
/// The narrow set of primitives `SafeConnection` needs from a database
/// driver: open a connection, prepare a statement, bind, execute, close.
/// Transport, SQL parsing and execution all live behind these traits.

use crate::core::db::params::{Param, TypeSignature};
use crate::core::db::query::QueryOutcome;
use serde::Deserialize;
use std::fmt;
use thiserror::Error;

/// Credentials and location used to (re)establish a connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ConnectionInfo {
    pub host: String,
    pub username: String,
    pub password: String,
    pub database: String,
}

impl ConnectionInfo {
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        ConnectionInfo {
            host: host.into(),
            username: username.into(),
            password: password.into(),
            database: database.into(),
        }
    }
}

/// Error reported by the driver: a message and the driver's numeric code.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} (code {code})")]
pub struct DriverError {
    pub message: String,
    pub code: i32,
}

impl DriverError {
    pub fn new(message: impl Into<String>, code: i32) -> Self {
        DriverError {
            message: message.into(),
            code,
        }
    }
}

/// Reasons a bind can be rejected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BindError {
    /// Signature length and value count disagree
    #[error("type signature expects {expected} values, {actual} given")]
    Arity { expected: usize, actual: usize },

    /// Value count and placeholder count disagree
    #[error("statement has {expected} placeholders, {actual} values given")]
    PlaceholderCount { expected: usize, actual: usize },

    /// A value cannot be read as the type its code demands
    #[error("value {value:?} at position {index} is not a valid '{code}'")]
    TypeMismatch { index: usize, code: char, value: String },

    /// Type deduction is off and no signature has been installed
    #[error("no type signature available")]
    MissingSignature,

    /// Any other failure reported by the driver
    #[error(transparent)]
    Driver(#[from] DriverError),
}

impl BindError {
    pub fn code(&self) -> i32 {
        match self {
            BindError::Driver(e) => e.code,
            _ => 0,
        }
    }
}

/// Validates the value count against a signature before any driver call.
pub fn check_arity(signature: &TypeSignature, values: &[String]) -> Result<(), BindError> {
    if signature.len() != values.len() {
        return Err(BindError::Arity {
            expected: signature.len(),
            actual: values.len(),
        });
    }
    Ok(())
}

/// Entry point of a database driver.
pub trait Driver {
    type Connection: DriverConnection<Statement = Self::Statement>;
    type Statement: DriverStatement;

    /// Opens a new connection. A failed open never yields a handle, so there
    /// is nothing to close afterwards.
    fn open(&self, info: &ConnectionInfo) -> Result<Self::Connection, DriverError>;
}

/// A live driver connection.
pub trait DriverConnection: fmt::Debug {
    type Statement: DriverStatement;

    /// Prepares `template` against this connection.
    fn prepare(&mut self, template: &str) -> Result<Self::Statement, DriverError>;

    /// Closes the connection. On failure the handle must stay usable for
    /// another close attempt.
    fn close(&mut self) -> Result<(), DriverError>;
}

/// A live prepared statement.
pub trait DriverStatement: fmt::Debug {
    /// Binds sanitized values typed by `signature`.
    fn bind(&mut self, signature: &TypeSignature, values: &[String]) -> Result<(), BindError>;

    /// Executes the statement. A non-empty `params` replaces the bound values
    /// for this execution only.
    fn execute(&mut self, params: &[Param]) -> Result<QueryOutcome, DriverError>;

    /// Closes the statement. On failure the handle must stay usable for
    /// another close attempt.
    fn close(&mut self) -> Result<(), DriverError>;
}
