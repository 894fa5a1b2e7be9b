//! Configuration module for Listed-Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files, and derives the immutable [`CrawlConfig`] the crawler runs with.
//!
//! # Example
//!
//! ```no_run
//! use listed_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! let crawl = config.crawl_config();
//! println!("Crawler will fetch at most {} pages", crawl.max_pages);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{
    Config, CrawlConfig, CrawlSection, EntityEntry, OutputConfig, TlsPolicy, TlsSection,
    UserAgentConfig,
};

pub use parser::{compute_config_hash, hash_str, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
