//! Geolift Core Library
//!
//! Causal-inference core for a geographically clustered experiment:
//! a seeded synthetic panel generator and a Difference-in-Differences
//! estimator, plus the placebo (A/A) validation built on top of them.
//! Everything here is synchronous, stateless per call, and deterministic
//! given explicit seeds and anchor dates.

pub mod config;
pub mod did;
pub mod market;
pub mod panel;
pub mod placebo;
pub mod simulate;

// Re-export the two call contracts at the crate root
pub use did::{estimate, DidResult, EstimateError, Mode};
pub use simulate::Simulator;
