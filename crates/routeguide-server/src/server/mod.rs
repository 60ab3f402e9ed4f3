pub mod config;
pub mod registry;
pub mod service;
pub mod streaming;
pub mod telemetry;
