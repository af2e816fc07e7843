//! URL handling module for Deal-Resolver
//!
//! This module provides merchant classification, tracking-parameter
//! sanitization and affiliate rewriting. Everything here is pure: no network
//! access, no shared state.

mod affiliate;
mod domain;
mod matcher;
mod normalize;

// Re-export main functions
pub use affiliate::{apply_affiliate, ensure_amazon_tag, AffiliateRewriter};
pub use domain::{extract_host, parse_absolute, resolve_reference};
pub use matcher::{is_merchant, MerchantDomains};
pub use normalize::{normalize_tracking, sanitize, strip_params, SanitizationRules};
