//! Offline evaluation: hit-rate metrics, a concurrent task harness, and a
//! stratified benchmark sample builder.

pub mod harness;
pub mod metrics;
pub mod sample;
