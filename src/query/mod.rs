//! Query execution for querygate.
//!
//! Isolates the open/execute/close cycle from session handling so it can be
//! tested on its own.

pub mod executor;

pub use executor::QueryExecutor;
