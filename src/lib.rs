//! ARBSCAN: prediction-market snapshot arbitrage scanner.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod credentials;
pub mod data;
pub mod detect;
pub mod engine;
pub mod error;
pub mod llm;
pub mod platforms;
pub mod storage;
pub mod types;
