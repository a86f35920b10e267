//! # pilight-remote
//!
//! Library half of the `pilight-remote` command-line tool: the TOML
//! configuration file and event rendering.  The binary in `main.rs` wires
//! them to a [`pilight_link::ConnectionManager`].

pub mod config;
pub mod output;

pub use config::{load_config, save_config, ConfigError, RemoteConfig};
pub use output::{render, OutputFormat};
