//! Application Layer
//!
//! CLI surface and configuration management.

pub mod cli;
pub mod config;
