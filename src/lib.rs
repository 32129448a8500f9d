//! ARBSCOPE: Cross-exchange crypto arbitrage spread dashboard
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod dashboard;
pub mod engine;
pub mod exchanges;
pub mod prices;
pub mod storage;
pub mod types;
