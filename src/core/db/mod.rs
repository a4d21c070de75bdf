/// Database Module
///
/// This module provides the database access layer for SafeConn,
/// organized into focused submodules.
///
/// ## Architecture
///
/// - **Driver Contract** (`driver.rs`): The primitives a database driver must provide
/// - **Parameters** (`params.rs`): Typed values, type signatures and sanitization
/// - **Connection Management** (`connection.rs`): The connection/statement state machine
/// - **Query Results** (`query.rs`): Result sets and execution outcomes
/// - **SQLite Backend** (`sqlite.rs`): The driver contract implemented with rusqlite
///
/// ## Error Handling
///
/// All operations use the standardized `SafeConnError` type; `SafeConnection`
/// additionally records each failure in its readable error slots.
pub mod connection;
pub mod driver;
pub mod params;
pub mod query;
pub mod sqlite;

pub use connection::*;
pub use driver::*;
pub use params::*;
pub use query::*;
pub use sqlite::*;
