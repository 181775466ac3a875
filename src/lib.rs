pub mod client;
pub mod config;
pub mod models;
pub mod prompts;
pub mod providers;
pub mod server;
pub mod services;
pub mod telemetry;
