//! Flood hazard watch: route proximity scoring and live hazard delivery.

pub mod config;
pub mod error;
pub mod models;
pub mod processor;
pub mod proximity;
pub mod realtime;
pub mod source;
