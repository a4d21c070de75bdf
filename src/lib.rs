// Core infrastructure modules
pub mod core;

// Configuration and test support
pub mod config;
pub mod test_utils;

pub use crate::core::db::{
    ConnectionInfo, Options, Param, QueryOutcome, QueryResult, SafeConnection, SessionOption,
    SqliteDriver, TypeSignature,
};
pub use crate::core::{ErrorState, Result, SafeConnError};
