//! Application-level settings shared by host front ends

pub mod config;

pub use config::{Config, ConfigError, KeyName, parse_key_name, validate_keybindings};
