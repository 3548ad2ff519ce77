//! APPRAISER: Price Aggregation & Valuation Engine
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod catalog;
pub mod market;
pub mod engine;
pub mod valuation;
pub mod storage;
pub mod appraiser;
pub mod api;
