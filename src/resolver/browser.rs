//! Rendering-engine fallback capability
//!
//! The resolver only sees the [`BrowserFallback`] trait. The Chrome-backed
//! implementation is compiled in with the `browser` cargo feature and can be
//! switched off at runtime through `[resolver] browser = false`; when neither
//! provides one, the tier is skipped.

use crate::config::Config;
use crate::url::MerchantDomains;
use futures::future::BoxFuture;
use std::fmt::Debug;
use url::Url;

/// Resolves a URL by loading it in a real browser
///
/// Implementations must be time-bounded and must never fail loudly: `None`
/// means "no merchant reached", whatever the reason.
pub trait BrowserFallback: Send + Sync + Debug {
    /// Returns a merchant URL observed while loading `url`, if any
    fn resolve<'a>(
        &'a self,
        url: &'a Url,
        merchants: &'a MerchantDomains,
    ) -> BoxFuture<'a, Option<Url>>;
}

/// The fallback selected by build features and configuration
#[cfg(feature = "browser")]
pub fn default_fallback(config: &Config) -> Option<Box<dyn BrowserFallback>> {
    if !config.resolver.browser {
        tracing::debug!("Browser fallback disabled by configuration");
        return None;
    }
    Some(Box::new(super::chrome::ChromeFallback::new(config)))
}

/// The fallback selected by build features and configuration
#[cfg(not(feature = "browser"))]
pub fn default_fallback(config: &Config) -> Option<Box<dyn BrowserFallback>> {
    if config.resolver.browser {
        tracing::debug!("Browser fallback not compiled in (enable the `browser` feature)");
    }
    None
}
