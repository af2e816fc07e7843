//! Resolver module for outbound link resolution
//!
//! This module contains the network-facing side of resolution:
//! - HTTP fetching with retry logic
//! - Redirect chasing through parameters, meta refresh and script navigation
//! - Candidate extraction from aggregator pages
//! - The optional browser fallback
//! - Overall tier coordination

mod browser;
#[cfg(feature = "browser")]
mod chrome;
mod coordinator;
mod fetcher;
mod parser;
mod redirect;
mod signals;

pub use browser::{default_fallback, BrowserFallback};
#[cfg(feature = "browser")]
pub use chrome::ChromeFallback;
pub use coordinator::{Resolution, ResolutionTier, Resolver};
pub use fetcher::{build_http_client, client_builder, FetchError, FetchedPage, Fetcher};
pub use parser::{Candidate, CandidateOrigin, PageAnalyzer};
pub use redirect::{decode_destination, RedirectChaser, ResolutionRequest, DESTINATION_PARAMS};
pub use signals::{
    default_detectors, meta_refresh_target, MetaRefresh, NavigationDetector, ScriptNavigation,
};

use crate::config::Config;
use crate::ResolverError;
use url::Url;

/// Resolves a single URL with a resolver built from `config`
///
/// Convenient for one-off calls; build a [`Resolver`] once and reuse it when
/// resolving many links so the connection pool and browser are shared.
///
/// # Returns
///
/// * `Ok(Resolution)` - Always, once the HTTP client could be built
/// * `Err(ResolverError)` - The HTTP client could not be built
pub async fn resolve(config: &Config, url: &Url) -> Result<Resolution, ResolverError> {
    let resolver = Resolver::from_config(config)?;
    Ok(resolver.resolve(url).await)
}
