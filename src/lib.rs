//! Polls a Spark stand-alone cluster's REST API and turns jobs, stages,
//! executors and streaming statistics into tagged gauge samples for a
//! metrics backend.

pub mod agent;
pub mod config;
pub mod error;
pub mod export;
pub mod extract;
pub mod harvest;
pub mod sink;
pub mod spark;

pub use error::HarvestError;
