//! Configuration module for Trawl
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use trawl::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("trawl.toml")).unwrap();
//! println!("Crawler will visit at most {} pages", config.max_pages);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{CrawlConfig, PlatformProbeEntry, WaitPolicyEntry, DEFAULT_USER_AGENT};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
