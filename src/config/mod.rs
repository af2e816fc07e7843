//! Configuration module for Deal-Resolver
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every section has defaults, so an empty file (or `Config::default()`) is a
//! working configuration that simply knows no merchants yet.
//!
//! # Example
//!
//! ```no_run
//! use deal_resolver::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("resolver.toml")).unwrap();
//! println!("Merchants: {:?}", config.resolver.merchant_domains);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    AffiliateConfig, AffiliateRule, BrowserConfig, Config, HttpConfig, MerchantRule,
    ResolverConfig, SanitizeConfig, DEFAULT_AFFILIATE_NETWORK_HINTS, DEFAULT_CTA_SELECTORS,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
