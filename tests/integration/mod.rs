//! Integration tests for genviz.

pub mod common;
pub mod connection_test;
pub mod query_test;
pub mod schema_test;
pub mod session_test;
