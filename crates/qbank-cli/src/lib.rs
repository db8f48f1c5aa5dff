//! qbank-cli library root.
//!
//! Exposes the settings module so integration tests can exercise loading
//! and migration without going through the binary.

pub mod config;
