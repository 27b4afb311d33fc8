pub mod aggregator;
pub mod config;
pub mod error;
pub mod export;
pub mod integrator;
pub mod loader;
pub mod models;
pub mod normalizer;
pub mod pipeline;
pub mod results;
pub mod stress;
pub mod table;
pub mod validation;
