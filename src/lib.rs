pub mod alert;
pub mod camera;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod fetch;
pub mod incident_log;
pub mod metrics;
pub mod pacer;
pub mod pipeline;
pub mod risk;
pub mod smoothing;
pub mod state;
pub mod store;
