//! shortstat - a short link redirector with per-link visit statistics
//!
//! # Architecture
//! - `analytics`: Counter store (page views / unique visitors) and periodic persistence
//! - `api`: HTTP redirect service
//! - `config`: Configuration loading and validation
//! - `runtime`: Application lifecycle and server mode
//! - `system`: Logging initialization
//! - `utils`: Client IP extraction

pub mod analytics;
pub mod api;
pub mod config;
pub mod errors;
pub mod runtime;
pub mod system;
pub mod utils;
