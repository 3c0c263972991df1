//! querygate - a read-only SQL gateway.
//!
//! Guards SQL text (typed or generated) with a lexical read-only policy,
//! executes approved statements on short-lived connections with bounded
//! retry, classifies driver errors into a uniform shape, and remembers
//! per-session credentials.

pub mod classify;
pub mod cli;
pub mod config;
pub mod connection;
pub mod db;
pub mod demo;
pub mod error;
pub mod generator;
pub mod logging;
pub mod query;
pub mod safety;
pub mod session;
