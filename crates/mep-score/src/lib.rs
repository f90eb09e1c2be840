pub mod config;
pub mod data;
pub mod error;
pub mod scoring;
pub mod service;
pub mod telemetry;
pub mod terms;
