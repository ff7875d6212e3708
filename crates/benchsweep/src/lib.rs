//! benchsweep library: command-line configuration and dispatch.

pub mod app;
pub mod config;
pub mod errors;
pub mod version;
