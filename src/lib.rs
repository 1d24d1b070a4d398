pub mod camera;
pub mod configuration;
pub mod controller;
pub mod dashboard;
pub mod detection;
pub mod error_handling;
pub mod gateway;
pub mod storage;
pub mod telemetry;
pub mod web_interface;

#[cfg(test)]
mod test_support;

pub use configuration::config::Config;
pub use dashboard::DashboardContext;
