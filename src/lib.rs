//! genviz - natural-language questions over a relational database, answered
//! with SQL and an automatically chosen chart.
//!
//! The library exposes every module so the binary and the integration tests
//! share one build.

pub mod chart;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod connection;
pub mod db;
pub mod error;
pub mod http;
pub mod llm;
pub mod logging;
pub mod output;
pub mod session;
pub mod speech;
