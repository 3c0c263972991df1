//! Integration tests for querygate.

pub mod connection_test;
pub mod executor_test;
pub mod guard_test;
pub mod session_test;
