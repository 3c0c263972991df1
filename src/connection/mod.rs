//! Connection lifecycle for querygate.
//!
//! The factory opens probed handles with bounded retry; the session manager
//! ties those handles to remembered per-session credentials.

pub mod factory;
pub mod manager;

pub use factory::{Backoff, ConnectionFactory, FixedBackoff};
pub use manager::{ConnectionStatus, ConnectionSummary, SessionManager};
