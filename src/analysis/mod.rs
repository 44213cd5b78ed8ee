// src/analysis/mod.rs
//! Request orchestration: scan, simulate, correlate, aggregate.

pub mod engine;
pub mod worker;

pub use engine::Engine;
