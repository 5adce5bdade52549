pub mod api;
pub mod config;
pub mod event;
pub mod sink;
pub mod telemetry;
