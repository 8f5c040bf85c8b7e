//! Persistent settings.
pub mod config;
