pub mod api;
pub mod config;
pub mod humanize;
pub mod runner;
pub mod telemetry;
pub mod types;
