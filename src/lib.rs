pub mod api;
pub mod client;
pub mod config;
pub mod correlation;
pub mod error;
pub mod health;
pub mod logging;
pub mod middleware;
pub mod payments;
pub mod services;
pub mod workers;
