/// Core Module for SafeConn
///
/// This module contains the connection/statement state machine, the driver
/// contract it is written against, and the shared error types.

pub mod db;
pub mod error;

// Re-export commonly used types for convenience
pub use error::{ErrorState, Result, SafeConnError};
