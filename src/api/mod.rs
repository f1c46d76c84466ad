//! HTTP services
pub mod services;
