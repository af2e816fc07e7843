//! Deal-Resolver: outbound link resolution for deal aggregation
//!
//! This crate turns aggregator and affiliate-network links (deal forums,
//! editorial articles, tracking redirects) into the real merchant product URL,
//! stripped of tracking parameters and ready to be republished.

pub mod config;
pub mod resolver;
pub mod url;

use thiserror::Error;

/// Main error type for Deal-Resolver operations
#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Invalid value for header {name}: {value}")]
    InvalidHeader { name: &'static str, value: String },

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("Browser error: {0}")]
    Browser(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for Deal-Resolver operations
pub type Result<T> = std::result::Result<T, ResolverError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use resolver::{Candidate, CandidateOrigin, Resolution, ResolutionTier, Resolver};
pub use self::url::{is_merchant, parse_absolute, sanitize, AffiliateRewriter, MerchantDomains};
