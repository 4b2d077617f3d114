//! D-channel stack configuration management
//!
//! This crate provides configuration loading and parsing for the stack:
//! - TOML configuration file parsing
//! - Stack configuration structures
//! - The Q.921/Q.931 timer table

pub mod stack_config;
pub mod timers;
pub mod toml_config;

pub use stack_config::*;
pub use timers::*;
pub use toml_config::*;
