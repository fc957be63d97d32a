//! Matching engine - bank statement reconciliation with rule-driven candidate matching.

pub mod config;
pub mod models;
pub mod services;
