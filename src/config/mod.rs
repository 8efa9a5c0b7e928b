//! Configuration module for Trawl
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```
//! use trawl::config::parse_config;
//!
//! let config = parse_config("[client]\ntimeout-ms = 2000\n").unwrap();
//! assert_eq!(config.client.timeout_ms, 2000);
//! assert!(config.politeness.respect_robots_txt);
//! ```

mod parser;
mod types;
mod validation;

pub use parser::{load_config, parse_config};
pub use types::{ClientConfig, Config, PolitenessConfig};
pub use validation::validate;
