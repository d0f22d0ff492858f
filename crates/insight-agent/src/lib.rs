pub mod config;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod service;
pub mod telemetry;
